//! Presence computation and fan-out (§4.2), plus the in-game overlay.
//!
//! Game managers need to announce "this user is playing X with Y" without
//! the presence layer knowing anything about game managers, and the reverse
//! dependency (register a `BroadcastPresence` callback into each manager)
//! would otherwise need a boxed `dyn Fn` returning a future. Since both
//! sides already live in the same process behind `Arc`s, this hub plays the
//! role of that injected accessor concretely: managers hold an
//! `Arc<PresenceHub>` and call `set_in_game`/`clear_in_game` instead of the
//! session registry depending on any game manager type (§9 "Cyclic
//! callbacks", decision recorded in DESIGN.md).

use crate::identity_store::IdentityStore;
use crate::session::SessionRegistry;
use proto::envelope::{Envelope, Payload};
use proto::messages::UserListEntry;
use proto::presence::{EffectivePresence, PresenceBroadcast};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct GameOverlay {
    game_id: String,
    opponent_display: String,
}

pub struct PresenceHub {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityStore>,
    overlays: RwLock<HashMap<String, GameOverlay>>,
}

impl PresenceHub {
    pub fn new(registry: Arc<SessionRegistry>, identity: Arc<IdentityStore>) -> Self {
        PresenceHub {
            registry,
            identity,
            overlays: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_in_game(&self, username: &str, game_id: &str, opponent_display: &str) {
        let mut overlays = self.overlays.write().await;
        overlays.insert(
            username.to_lowercase(),
            GameOverlay {
                game_id: game_id.to_string(),
                opponent_display: opponent_display.to_string(),
            },
        );
        drop(overlays);
        self.broadcast_presence(username, None).await;
    }

    pub async fn clear_in_game(&self, username: &str) {
        let mut overlays = self.overlays.write().await;
        overlays.remove(&username.to_lowercase());
        drop(overlays);
        self.broadcast_presence(username, None).await;
    }

    /// Overlays game state onto the user-chosen presence (§4.2).
    pub async fn effective(&self, username: &str) -> Option<EffectivePresence> {
        let session = self.registry.get(username).await?;
        let user = self.identity.public_user(username)?;
        let state = session.state.read().await;
        let overlay = self.overlays.read().await.get(&username.to_lowercase()).cloned();

        let (personal_message, is_in_game, game_id) = match overlay {
            Some(overlay) => (
                format!("Playing {} with {}", overlay.game_id, overlay.opponent_display),
                true,
                Some(overlay.game_id),
            ),
            None => (state.personal_message.clone(), false, None),
        };

        Some(EffectivePresence {
            username: user.username,
            display_name: state.display_name.clone(),
            state: state.presence,
            personal_message,
            avatar_token: state.avatar_token.clone(),
            is_in_game,
            game_id,
        })
    }

    /// Fans the caller's effective presence out to every other authenticated
    /// session (§4.2 step 5). `except`, when set, is additionally skipped.
    pub async fn broadcast_presence(&self, username: &str, except: Option<&str>) {
        let Some(presence) = self.effective(username).await else {
            return;
        };
        let envelope = Envelope::new(
            crate::ids::random_id(12),
            now_ms(),
            Payload::PresenceBroadcast(PresenceBroadcast { presence }),
        );
        self.registry.broadcast(&envelope, except.or(Some(username))).await;
        // The caller also wants to see their own updated presence reflected
        // (e.g. after changing their personal message), so send it back to
        // them directly too, unless they were the explicit exclusion.
        if except != Some(username) {
            self.registry.send_to(username, &envelope).await;
        }
    }

    /// Announces `username` as offline to every remaining session. Called
    /// from the disconnect cascade, after the session has already been
    /// removed from the registry, so `effective` can no longer be used (it
    /// looks the session up to read the user's chosen presence).
    pub async fn announce_offline(&self, username: &str) {
        let overlays_removed = {
            let mut overlays = self.overlays.write().await;
            overlays.remove(&username.to_lowercase())
        };
        let _ = overlays_removed;
        let Some(user) = self.identity.public_user(username) else {
            return;
        };
        let presence = EffectivePresence {
            username: user.username,
            display_name: user.display_name,
            state: proto::presence::PresenceState::Offline,
            personal_message: String::new(),
            avatar_token: user.avatar_token,
            is_in_game: false,
            game_id: None,
        };
        let envelope = Envelope::new(
            crate::ids::random_id(12),
            now_ms(),
            Payload::PresenceBroadcast(PresenceBroadcast { presence }),
        );
        self.registry.broadcast(&envelope, Some(username)).await;
    }

    /// The full snapshot handed to a freshly logged-in session (§4.2 step 4).
    pub async fn online_snapshot(&self) -> Vec<UserListEntry> {
        let mut entries = Vec::new();
        for session in self.registry.all().await {
            if let (Some(user), Some(presence)) = (
                self.identity.public_user(&session.username),
                self.effective(&session.username).await,
            ) {
                entries.push(UserListEntry { user, presence });
            }
        }
        entries
    }
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
