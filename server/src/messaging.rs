//! Direct and group messaging, typing indicators, nudges, contacts, and
//! sticker passthrough (§4.2, §4.3, §6).
//!
//! Holds no state of its own beyond its `Arc` dependencies: every mutation
//! lives in the identity store, every fan-out goes through the session
//! registry: these handlers never cache a copy of anything the store
//! already owns.

use crate::identity_store::{ContactOutcome, IdentityStore};
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::messages::{
    ChatMessage, ChatMessageDelivered, ChatTyping, ContactRequestNotice, CreateGroupAck,
    CreateGroupRequest, ErrorCode, ErrorPayload, GroupInviteReceived, GroupMemberUpdate,
    GroupMessage, InviteToGroupRequest, JoinGroupRequest, LeaveGroupRequest, Nudge,
    RemoveContactRequest, StickerSend,
};
use std::sync::Arc;

pub struct MessagingService {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityStore>,
}

impl MessagingService {
    pub fn new(registry: Arc<SessionRegistry>, identity: Arc<IdentityStore>) -> Self {
        MessagingService { registry, identity }
    }

    async fn error(&self, user: &str, code: ErrorCode, message: &str) {
        self.registry
            .send_to(user, &env(Payload::Error(ErrorPayload { code, message: message.to_string() })))
            .await;
    }

    /// Relays to the recipient if online; offline recipients simply don't get
    /// it (§1 "no offline message queue"), and the sender is told so.
    pub async fn send_chat_message(&self, from: &str, message: ChatMessage) {
        let to = message.to.clone();
        let delivered = self
            .registry
            .send_to(&to, &env(Payload::ChatMessage(ChatMessage { to: to.clone(), from: from.to_string(), content: message.content })))
            .await;
        if delivered {
            self.registry.send_to(from, &env(Payload::ChatMessageDelivered(ChatMessageDelivered { to }))).await;
        } else {
            self.error(from, ErrorCode::UserOffline, &format!("{to} is offline")).await;
        }
    }

    pub async fn send_typing(&self, from: &str, to: &str, is_typing: bool) {
        self.registry
            .send_to(to, &env(Payload::ChatTyping(ChatTyping { to: to.to_string(), from: from.to_string(), is_typing })))
            .await;
    }

    pub async fn send_nudge(&self, from: &str, to: &str) {
        self.registry.send_to(to, &env(Payload::Nudge(Nudge { to: to.to_string(), from: from.to_string() }))).await;
    }

    pub async fn send_sticker(&self, from: &str, sticker: StickerSend) {
        self.registry
            .send_to(&sticker.to, &env(Payload::StickerSend(StickerSend { to: sticker.to.clone(), sticker_id: sticker.sticker_id })))
            .await;
    }

    pub async fn create_group(&self, owner: &str, request: CreateGroupRequest) {
        let group = self.identity.create_group(owner, &request.name, &request.description);
        self.registry
            .send_to(owner, &env(Payload::CreateGroupAck(CreateGroupAck { success: true, message: "created".to_string(), group: Some(group) })))
            .await;
    }

    pub async fn invite_to_group(&self, from: &str, request: InviteToGroupRequest) {
        let Some(group) = self.identity.group(&request.group_id) else {
            self.error(from, ErrorCode::UserNotFound, "group not found").await;
            return;
        };
        if !group.members.iter().any(|m| m == from) {
            self.error(from, ErrorCode::UserNotFound, "not a member of that group").await;
            return;
        }
        self.registry
            .send_to(
                &request.invitee,
                &env(Payload::GroupInviteReceived(GroupInviteReceived {
                    group_id: group.id,
                    group_name: group.name,
                    inviter: from.to_string(),
                })),
            )
            .await;
    }

    pub async fn join_group(&self, user: &str, request: JoinGroupRequest) {
        let Some(group) = self.identity.add_member(&request.group_id, user) else {
            self.error(user, ErrorCode::UserNotFound, "group not found").await;
            return;
        };
        let envelope = env(Payload::GroupMemberUpdate(GroupMemberUpdate { group: group.clone() }));
        for member in &group.members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    /// Deleting the last member is handled inside the store (§3); a now-empty
    /// group produces `None` here and nobody is left to notify.
    pub async fn leave_group(&self, user: &str, request: LeaveGroupRequest) {
        if let Some(group) = self.identity.remove_member(&request.group_id, user) {
            let envelope = env(Payload::GroupMemberUpdate(GroupMemberUpdate { group: group.clone() }));
            for member in &group.members {
                self.registry.send_to(member, &envelope).await;
            }
        }
    }

    pub async fn send_group_message(&self, from: &str, message: GroupMessage) {
        let Some(group) = self.identity.group(&message.group_id) else {
            self.error(from, ErrorCode::UserNotFound, "group not found").await;
            return;
        };
        if !group.members.iter().any(|m| m == from) {
            self.error(from, ErrorCode::UserNotFound, "not a member of that group").await;
            return;
        }
        let envelope = env(Payload::GroupMessage(GroupMessage {
            group_id: message.group_id,
            from: from.to_string(),
            content: message.content,
        }));
        for member in &group.members {
            if member != from {
                self.registry.send_to(member, &envelope).await;
            }
        }
    }

    /// One-directional: only the caller's own contact list is mutated, and
    /// the target is merely notified (§4.3).
    pub async fn add_contact(&self, from: &str, target: &str) {
        match self.identity.add_contact(from, target) {
            ContactOutcome::Added => {
                self.registry
                    .send_to(target, &env(Payload::ContactRequest(ContactRequestNotice { from: from.to_string() })))
                    .await;
            }
            ContactOutcome::AlreadyPresent => {}
            ContactOutcome::TargetNotFound => {
                self.error(from, ErrorCode::UserNotFound, &format!("{target} does not exist")).await;
            }
        }
    }

    pub async fn remove_contact(&self, from: &str, request: RemoveContactRequest) {
        self.identity.remove_contact(from, &request.username);
    }
}
