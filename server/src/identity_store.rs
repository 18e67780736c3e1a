//! Registered users, contact lists, and group membership (§4.3).
//!
//! A single mutex guards both maps; every mutation persists to the sidecar
//! files inside the lock, so every account lives in one place and no caller
//! ever touches the map without going through a method.

use crate::config::Config;
use crate::ids;
use crate::persistence;
use crate::presence::now_ms;
use proto::identity::{GroupSummary, PublicUser};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub username: String,
    pub password_verifier: String,
    pub display_name: String,
    pub email: String,
    pub avatar_token: String,
    pub profile_picture_id: Option<String>,
    pub contacts: Vec<String>,
    pub groups: Vec<String>,
    pub created_at: i64,
}

impl StoredUser {
    fn to_public(&self) -> PublicUser {
        PublicUser {
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            avatar_token: self.avatar_token.clone(),
            profile_picture_id: self.profile_picture_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub members: Vec<String>,
}

impl StoredGroup {
    fn to_summary(&self) -> GroupSummary {
        GroupSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            owner: self.owner.clone(),
            members: self.members.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    users: HashMap<String, StoredUser>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupsFile {
    groups: HashMap<String, StoredGroup>,
}

pub enum RegisterOutcome {
    Ok,
    UsernameTaken,
    UsernameTooShort,
    PasswordTooShort,
}

pub enum ContactOutcome {
    Added,
    AlreadyPresent,
    TargetNotFound,
}

struct Inner {
    users: HashMap<String, StoredUser>,
    groups: HashMap<String, StoredGroup>,
}

pub struct IdentityStore {
    config: Config,
    inner: Mutex<Inner>,
}

impl IdentityStore {
    pub fn load(config: Config) -> Self {
        let users: UsersFile = persistence::load_or_default(&config.users_path());
        let groups: GroupsFile = persistence::load_or_default(&config.groups_path());
        IdentityStore {
            config,
            inner: Mutex::new(Inner {
                users: users.users,
                groups: groups.groups,
            }),
        }
    }

    fn save_users(&self, inner: &Inner) {
        persistence::save(
            &self.config.users_path(),
            &UsersFile { users: inner.users.clone() },
        );
    }

    fn save_groups(&self, inner: &Inner) {
        persistence::save(
            &self.config.groups_path(),
            &GroupsFile { groups: inner.groups.clone() },
        );
    }

    /// Registration rules from §4.3: username length >= 3, password length
    /// >= 4, uniqueness enforced case-insensitively.
    pub fn register(
        &self,
        username: &str,
        password_verifier: &str,
        display_name: &str,
        email: &str,
    ) -> RegisterOutcome {
        let username = username.to_lowercase();
        if username.len() < 3 {
            return RegisterOutcome::UsernameTooShort;
        }
        if password_verifier.len() < 4 {
            return RegisterOutcome::PasswordTooShort;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.users.contains_key(&username) {
            return RegisterOutcome::UsernameTaken;
        }

        inner.users.insert(
            username.clone(),
            StoredUser {
                username,
                password_verifier: password_verifier.to_string(),
                display_name: display_name.to_string(),
                email: email.to_string(),
                avatar_token: ids::random_id(8),
                profile_picture_id: None,
                contacts: Vec::new(),
                groups: Vec::new(),
                created_at: now_ms(),
            },
        );
        self.save_users(&inner);
        RegisterOutcome::Ok
    }

    /// Treats the password verifier as an opaque string equality check; the
    /// actual hashing scheme is out of scope (§1).
    pub fn verify_login(&self, username: &str, password_verifier: &str) -> Option<PublicUser> {
        let username = username.to_lowercase();
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&username)
            .filter(|u| u.password_verifier == password_verifier)
            .map(StoredUser::to_public)
    }

    pub fn public_user(&self, username: &str) -> Option<PublicUser> {
        let inner = self.inner.lock().unwrap();
        inner.users.get(&username.to_lowercase()).map(StoredUser::to_public)
    }

    pub fn all_public_users(&self) -> Vec<PublicUser> {
        let inner = self.inner.lock().unwrap();
        inner.users.values().map(StoredUser::to_public).collect()
    }

    pub fn contacts_of(&self, username: &str) -> Vec<PublicUser> {
        let inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.get(&username.to_lowercase()) else {
            return Vec::new();
        };
        user.contacts
            .iter()
            .filter_map(|c| inner.users.get(c))
            .map(StoredUser::to_public)
            .collect()
    }

    /// Idempotent; only the caller's own list is mutated (§4.3: "not a
    /// symmetric friendship relation in storage").
    pub fn add_contact(&self, username: &str, target: &str) -> ContactOutcome {
        let username = username.to_lowercase();
        let target = target.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&target) {
            return ContactOutcome::TargetNotFound;
        }
        let Some(user) = inner.users.get_mut(&username) else {
            return ContactOutcome::TargetNotFound;
        };
        if user.contacts.contains(&target) {
            return ContactOutcome::AlreadyPresent;
        }
        user.contacts.push(target);
        self.save_users(&inner);
        ContactOutcome::Added
    }

    pub fn remove_contact(&self, username: &str, target: &str) {
        let username = username.to_lowercase();
        let target = target.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&username) {
            user.contacts.retain(|c| c != &target);
            self.save_users(&inner);
        }
    }

    pub fn set_profile_picture(&self, username: &str, blob_id: Option<String>) -> Option<Option<String>> {
        let username = username.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        let previous = {
            let user = inner.users.get_mut(&username)?;
            let previous = user.profile_picture_id.clone();
            user.profile_picture_id = blob_id;
            previous
        };
        self.save_users(&inner);
        Some(previous)
    }

    /// Invariant: owner is always a member (§3).
    pub fn create_group(&self, owner: &str, name: &str, description: &str) -> GroupSummary {
        let owner = owner.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        let group = StoredGroup {
            id: ids::group_id(),
            name: name.to_string(),
            description: description.to_string(),
            owner: owner.clone(),
            members: vec![owner.clone()],
        };
        let summary = group.to_summary();
        inner.groups.insert(group.id.clone(), group);
        if let Some(user) = inner.users.get_mut(&owner) {
            user.groups.push(summary.id.clone());
        }
        self.save_groups(&inner);
        self.save_users(&inner);
        summary
    }

    pub fn group(&self, group_id: &str) -> Option<GroupSummary> {
        let inner = self.inner.lock().unwrap();
        inner.groups.get(group_id).map(StoredGroup::to_summary)
    }

    pub fn add_member(&self, group_id: &str, username: &str) -> Option<GroupSummary> {
        let username = username.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        {
            let group = inner.groups.get_mut(group_id)?;
            if !group.members.contains(&username) {
                group.members.push(username.clone());
            }
        }
        if let Some(user) = inner.users.get_mut(&username) {
            if !user.groups.contains(&group_id.to_string()) {
                user.groups.push(group_id.to_string());
            }
        }
        self.save_groups(&inner);
        self.save_users(&inner);
        inner.groups.get(group_id).map(StoredGroup::to_summary)
    }

    /// Invariant: removing the last member deletes the group (§3).
    pub fn remove_member(&self, group_id: &str, username: &str) -> Option<GroupSummary> {
        let username = username.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        let deleted;
        let summary = {
            let group = inner.groups.get_mut(group_id)?;
            group.members.retain(|m| m != &username);
            if group.members.is_empty() {
                deleted = true;
                None
            } else {
                if group.owner == username {
                    group.owner = group.members[0].clone();
                }
                deleted = false;
                Some(group.to_summary())
            }
        };
        if deleted {
            inner.groups.remove(group_id);
        }
        if let Some(user) = inner.users.get_mut(&username) {
            user.groups.retain(|g| g != group_id);
        }
        self.save_groups(&inner);
        self.save_users(&inner);
        summary
    }
}
