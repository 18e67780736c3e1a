//! The wire shape shared by every game's `LobbyState` broadcast (§4.5).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyDescriptor {
    pub id: String,
    pub name: String,
    pub host: String,
    pub max_players: usize,
    pub members: Vec<String>,
    pub display_names: HashMap<String, String>,
    pub started: bool,
}
