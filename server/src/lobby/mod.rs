//! The generic lobby-and-phase engine every turn-based game is built on
//! (§4.5). One `LobbyManager<S>` instance per game kind; `S` is that game's
//! pure state type from `proto::games::*`.

pub mod timer;

use proto::lobby::LobbyDescriptor;
use std::collections::HashMap;
use timer::LobbyTimer;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Lobby<S> {
    pub id: String,
    pub name: String,
    pub host: String,
    pub max_players: usize,
    pub members: Vec<String>,
    pub display_names: HashMap<String, String>,
    pub started: bool,
    pub state: S,
}

impl<S> Lobby<S> {
    pub fn descriptor(&self) -> LobbyDescriptor {
        LobbyDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            max_players: self.max_players,
            members: self.members.clone(),
            display_names: self.display_names.clone(),
            started: self.started,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    AlreadyInLobby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    AlreadyInLobby,
    NotFound,
    Full,
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    NotHost,
    AlreadyStarted,
    NotEnoughPlayers,
    NotFound,
}

/// What happened to the lobby as a result of a member leaving.
pub struct LeaveResult<S> {
    pub lobby_id: String,
    pub destroyed: bool,
    pub host_changed: bool,
    /// `None` when the lobby was destroyed.
    pub lobby: Option<Lobby<S>>,
}

struct Inner<S> {
    lobbies: HashMap<String, Lobby<S>>,
    player_lobby: HashMap<String, String>,
    timers: HashMap<String, LobbyTimer>,
}

/// Guards the lobby map and the player->lobby index behind a single mutex
/// per game kind, exactly as §4.5 specifies.
pub struct LobbyManager<S> {
    inner: Mutex<Inner<S>>,
    min_players: usize,
}

impl<S: Clone> LobbyManager<S> {
    pub fn new(min_players: usize) -> Self {
        LobbyManager {
            inner: Mutex::new(Inner {
                lobbies: HashMap::new(),
                player_lobby: HashMap::new(),
                timers: HashMap::new(),
            }),
            min_players,
        }
    }

    pub async fn create(
        &self,
        host: &str,
        host_display: &str,
        name: String,
        max_players: usize,
        initial_state: S,
    ) -> Result<Lobby<S>, CreateError> {
        let mut inner = self.inner.lock().await;
        if inner.player_lobby.contains_key(host) {
            return Err(CreateError::AlreadyInLobby);
        }

        let id = crate::ids::lobby_id();
        let mut display_names = HashMap::new();
        display_names.insert(host.to_string(), host_display.to_string());

        let lobby = Lobby {
            id: id.clone(),
            name,
            host: host.to_string(),
            max_players,
            members: vec![host.to_string()],
            display_names,
            started: false,
            state: initial_state,
        };
        inner.player_lobby.insert(host.to_string(), id.clone());
        inner.lobbies.insert(id, lobby.clone());
        Ok(lobby)
    }

    pub async fn join(&self, user: &str, display: &str, lobby_id: &str) -> Result<Lobby<S>, JoinError> {
        let mut inner = self.inner.lock().await;
        if inner.player_lobby.contains_key(user) {
            return Err(JoinError::AlreadyInLobby);
        }
        let lobby = inner.lobbies.get_mut(lobby_id).ok_or(JoinError::NotFound)?;
        if lobby.started {
            return Err(JoinError::AlreadyStarted);
        }
        if lobby.members.len() >= lobby.max_players {
            return Err(JoinError::Full);
        }
        lobby.members.push(user.to_string());
        lobby.display_names.insert(user.to_string(), display.to_string());
        let snapshot = lobby.clone();
        inner.player_lobby.insert(user.to_string(), lobby_id.to_string());
        Ok(snapshot)
    }

    /// Removes `user` from whatever lobby they're in, reassigning host and
    /// destroying the lobby if it's now empty (§4.5 `LeaveLobby`).
    pub async fn leave(&self, user: &str) -> Option<LeaveResult<S>> {
        let mut inner = self.inner.lock().await;
        let lobby_id = inner.player_lobby.remove(user)?;
        let lobby = inner.lobbies.get_mut(&lobby_id)?;
        lobby.members.retain(|m| m != user);
        lobby.display_names.remove(user);

        if lobby.members.is_empty() {
            inner.lobbies.remove(&lobby_id);
            inner.timers.remove(&lobby_id);
            return Some(LeaveResult {
                lobby_id,
                destroyed: true,
                host_changed: false,
                lobby: None,
            });
        }

        let mut host_changed = false;
        if lobby.host == user {
            lobby.host = lobby.members[0].clone();
            host_changed = true;
        }
        Some(LeaveResult {
            lobby_id,
            destroyed: false,
            host_changed,
            lobby: Some(lobby.clone()),
        })
    }

    pub async fn get(&self, lobby_id: &str) -> Option<Lobby<S>> {
        let inner = self.inner.lock().await;
        inner.lobbies.get(lobby_id).cloned()
    }

    pub async fn lobby_of(&self, user: &str) -> Option<Lobby<S>> {
        let inner = self.inner.lock().await;
        let lobby_id = inner.player_lobby.get(user)?;
        inner.lobbies.get(lobby_id).cloned()
    }

    pub async fn is_in_a_lobby(&self, user: &str) -> bool {
        self.inner.lock().await.player_lobby.contains_key(user)
    }

    pub async fn start(&self, user: &str) -> Result<Lobby<S>, StartError> {
        let mut inner = self.inner.lock().await;
        let lobby_id = inner.player_lobby.get(user).cloned().ok_or(StartError::NotFound)?;
        let lobby = inner.lobbies.get_mut(&lobby_id).ok_or(StartError::NotFound)?;
        if lobby.host != user {
            return Err(StartError::NotHost);
        }
        if lobby.started {
            return Err(StartError::AlreadyStarted);
        }
        if lobby.members.len() < self.min_players {
            return Err(StartError::NotEnoughPlayers);
        }
        lobby.started = true;
        Ok(lobby.clone())
    }

    /// Restores a lobby to not-started so it can be replayed (used when a
    /// game ends normally rather than by departure).
    pub async fn reset_for_replay(&self, lobby_id: &str, fresh_state: S) -> Option<Lobby<S>> {
        let mut inner = self.inner.lock().await;
        let lobby = inner.lobbies.get_mut(lobby_id)?;
        lobby.started = false;
        lobby.state = fresh_state;
        Some(lobby.clone())
    }

    /// Applies `f` to the lobby's game state under the manager lock and
    /// returns both the closure's result and a post-mutation snapshot, so
    /// the caller can broadcast outside the lock (§5).
    pub async fn mutate<R>(&self, lobby_id: &str, f: impl FnOnce(&mut Lobby<S>) -> R) -> Option<(R, Lobby<S>)> {
        let mut inner = self.inner.lock().await;
        let lobby = inner.lobbies.get_mut(lobby_id)?;
        let result = f(lobby);
        Some((result, lobby.clone()))
    }

    /// Replaces the lobby's timer, cancelling whatever was previously
    /// scheduled (idempotent per §5 "Cancellation and timeouts").
    pub async fn set_timer(&self, lobby_id: &str, timer: LobbyTimer) {
        let mut inner = self.inner.lock().await;
        inner.timers.insert(lobby_id.to_string(), timer);
    }

    pub async fn cancel_timer(&self, lobby_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.timers.remove(lobby_id);
    }

    pub async fn list(&self) -> Vec<Lobby<S>> {
        self.inner.lock().await.lobbies.values().cloned().collect()
    }
}
