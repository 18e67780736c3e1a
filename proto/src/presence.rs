//! Presence states and the "effective" presence overlay described in §4.2.

use serde::{Deserialize, Serialize};
use strum::EnumIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum PresenceState {
    Online,
    Away,
    Busy,
    AppearOffline,
    Offline,
}

impl Default for PresenceState {
    fn default() -> Self {
        PresenceState::Online
    }
}

/// The presence record fanned out to other sessions.
///
/// When a user is in a turn-based game, the broadcaster overlays `is_in_game`,
/// `game_id`, and replaces `personal_message` with a "Playing X with Y" string
/// before constructing this. The overlay is computed fresh for every
/// broadcast; nothing here is mutated in place by a game manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePresence {
    pub username: String,
    pub display_name: String,
    pub state: PresenceState,
    pub personal_message: String,
    pub avatar_token: String,
    pub is_in_game: bool,
    pub game_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub state: PresenceState,
    pub personal_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceBroadcast {
    pub presence: EffectivePresence,
}
