//! "Telephone" phrase -> drawing -> description -> drawing -> reveal pipeline
//! (§4.6.3), built on the generic `lobby::LobbyManager`.
//!
//! Each phase timer fires `advance_phase`, which substitutes placeholder
//! content for anyone who never submitted before moving on - a late
//! submission after the timer has already advanced the phase is simply
//! rejected by `phase_matches`.

use crate::lobby::timer::LobbyTimer;
use crate::lobby::{Lobby, LobbyManager};
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::games::telephone::{
    initial_draw_assignment, placeholder_for, rotate_assignment, Phase, Step, TelephoneMessage,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const MIN_PLAYERS: usize = 2;
const MAX_PLAYERS: usize = 8;
const PHASE_SECS: u32 = 45;

#[derive(Debug, Clone, Default)]
pub struct TelephoneState {
    players: Vec<String>,
    phase: Phase,
    phase_secs: u32,
    assignment: Vec<usize>,
    chains: Vec<Vec<Step>>,
    submitted: HashSet<String>,
    reveal_index: usize,
}

fn phase_matches(phase: Phase, step: &Step) -> bool {
    matches!(
        (phase, step),
        (Phase::Write, Step::Phrase(_))
            | (Phase::Draw1, Step::Drawing(_))
            | (Phase::Draw3, Step::Drawing(_))
            | (Phase::Describe, Step::Description(_))
    )
}

pub struct TelephoneManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    lobbies: LobbyManager<TelephoneState>,
}

impl TelephoneManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        TelephoneManager {
            registry,
            presence,
            lobbies: LobbyManager::new(MIN_PLAYERS),
        }
    }

    async fn send_to(&self, user: &str, message: TelephoneMessage) {
        self.registry.send_to(user, &env(Payload::Telephone(message))).await;
    }

    async fn broadcast(&self, lobby: &Lobby<TelephoneState>, message: TelephoneMessage) {
        let envelope = env(Payload::Telephone(message));
        for member in &lobby.members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    async fn broadcast_lobby_state(&self, lobby: &Lobby<TelephoneState>) {
        self.broadcast(lobby, TelephoneMessage::LobbyState(lobby.descriptor())).await;
    }

    pub async fn create(&self, host: &str, host_display: &str, name: String, max_players: usize) {
        let max_players = max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        if let Ok(lobby) = self
            .lobbies
            .create(host, host_display, name, max_players, TelephoneState::default())
            .await
        {
            self.broadcast_lobby_state(&lobby).await;
        }
    }

    pub async fn join(&self, user: &str, display: &str, lobby_id: &str) {
        if let Ok(lobby) = self.lobbies.join(user, display, lobby_id).await {
            self.broadcast_lobby_state(&lobby).await;
        }
    }

    pub async fn leave(self: &Arc<Self>, user: &str) {
        let Some(result) = self.lobbies.leave(user).await else {
            return;
        };
        self.presence.clear_in_game(user).await;
        if let Some(lobby) = result.lobby {
            if lobby.started && lobby.members.len() < MIN_PLAYERS {
                self.force_end_game(lobby.id.clone()).await;
            } else {
                self.broadcast_lobby_state(&lobby).await;
            }
        }
    }

    pub async fn on_disconnect(self: &Arc<Self>, user: &str) {
        self.leave(user).await;
    }

    pub async fn start(self: &Arc<Self>, user: &str) {
        let Ok(lobby) = self.lobbies.start(user).await else {
            return;
        };
        let players = lobby.members.clone();
        let chain_count = players.len();
        self.lobbies
            .mutate(&lobby.id, |lobby| {
                lobby.state.players = players.clone();
                lobby.state.chains = vec![Vec::new(); chain_count];
                lobby.state.assignment = Vec::new();
                lobby.state.submitted = HashSet::new();
                lobby.state.phase = Phase::Write;
                lobby.state.phase_secs = PHASE_SECS;
                lobby.state.reveal_index = 0;
            })
            .await;

        self.broadcast_lobby_state(&lobby).await;
        for member in &lobby.members {
            self.presence.set_in_game(member, &lobby.id, "the lobby").await;
        }
        self.begin_phase(lobby.id).await;
    }

    fn begin_phase<'a>(
        self: &'a Arc<Self>,
        lobby_id: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.begin_phase_inner(lobby_id))
    }

    async fn begin_phase_inner(self: &Arc<Self>, lobby_id: String) {
        let Some(lobby) = self.lobbies.get(&lobby_id).await else {
            return;
        };
        self.broadcast(
            &lobby,
            TelephoneMessage::PhaseState {
                game_id: lobby_id.clone(),
                phase: lobby.state.phase,
                seconds_left: lobby.state.phase_secs,
            },
        )
        .await;

        if lobby.state.phase == Phase::Reveal {
            self.send_current_chain(&lobby_id).await;
            return;
        }

        for (i, member) in lobby.state.players.iter().enumerate() {
            let prior_step = if lobby.state.phase == Phase::Write {
                None
            } else {
                let chain_idx = lobby.state.assignment[i];
                lobby.state.chains[chain_idx].last().cloned()
            };
            self.send_to(
                member,
                TelephoneMessage::YourAssignment { game_id: lobby_id.clone(), prior_step },
            )
            .await;
        }

        let manager = self.clone();
        let id = lobby_id.clone();
        let secs = lobby.state.phase_secs;
        let timer = LobbyTimer::spawn(Duration::from_secs(secs.max(1) as u64), async move {
            manager.advance_phase(id).await;
        });
        self.lobbies.set_timer(&lobby_id, timer).await;
    }

    async fn submit_step(self: &Arc<Self>, user: &str, lobby_id: &str, step: Step) {
        let result = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                if !phase_matches(lobby.state.phase, &step) || lobby.state.submitted.contains(user) {
                    return false;
                }
                let Some(i) = lobby.state.players.iter().position(|p| p == user) else {
                    return false;
                };
                let is_write = lobby.state.phase == Phase::Write;
                let chain_idx = if is_write { i } else { lobby.state.assignment[i] };
                if is_write {
                    lobby.state.chains[chain_idx] = vec![step];
                } else {
                    lobby.state.chains[chain_idx].push(step);
                }
                lobby.state.submitted.insert(user.to_string());
                lobby.state.submitted.len() >= lobby.state.players.len()
            })
            .await;

        let Some((all_submitted, _)) = result else { return };
        if all_submitted {
            self.lobbies.cancel_timer(lobby_id).await;
            self.advance_phase(lobby_id.to_string()).await;
        }
    }

    pub async fn submit_phrase(self: &Arc<Self>, user: &str, lobby_id: &str, text: String) {
        self.submit_step(user, lobby_id, Step::Phrase(text)).await;
    }

    pub async fn submit_drawing(self: &Arc<Self>, user: &str, lobby_id: &str, data_base64: String) {
        self.submit_step(user, lobby_id, Step::Drawing(data_base64)).await;
    }

    pub async fn submit_description(self: &Arc<Self>, user: &str, lobby_id: &str, text: String) {
        self.submit_step(user, lobby_id, Step::Description(text)).await;
    }

    async fn advance_phase(self: &Arc<Self>, lobby_id: String) {
        let advanced = self
            .lobbies
            .mutate(&lobby_id, |lobby| {
                let phase = lobby.state.phase;
                let players = lobby.state.players.clone();
                for (i, member) in players.iter().enumerate() {
                    if lobby.state.submitted.contains(member) {
                        continue;
                    }
                    let chain_idx = if phase == Phase::Write { i } else { lobby.state.assignment[i] };
                    lobby.state.chains[chain_idx].push(placeholder_for(phase));
                }
                lobby.state.submitted.clear();

                match phase.next() {
                    Some(next_phase) => {
                        match next_phase {
                            Phase::Draw1 => lobby.state.assignment = initial_draw_assignment(players.len()),
                            Phase::Describe | Phase::Draw3 => {
                                lobby.state.assignment = rotate_assignment(&lobby.state.assignment)
                            }
                            _ => {}
                        }
                        lobby.state.phase = next_phase;
                        lobby.state.reveal_index = 0;
                        true
                    }
                    None => false,
                }
            })
            .await;

        let Some((has_next, _)) = advanced else { return };
        if has_next {
            self.begin_phase(lobby_id).await;
        }
    }

    async fn send_current_chain(&self, lobby_id: &str) {
        let Some(lobby) = self.lobbies.get(lobby_id).await else {
            return;
        };
        let idx = lobby.state.reveal_index;
        if idx >= lobby.state.players.len() {
            return;
        }
        self.broadcast(
            &lobby,
            TelephoneMessage::ChainResult {
                game_id: lobby_id.to_string(),
                owner: lobby.state.players[idx].clone(),
                steps: lobby.state.chains[idx].clone(),
                is_last: idx + 1 == lobby.state.players.len(),
            },
        )
        .await;
    }

    pub async fn advance_reveal(self: &Arc<Self>, user: &str, lobby_id: &str) {
        let Some(lobby) = self.lobbies.get(lobby_id).await else {
            return;
        };
        if lobby.host != user || lobby.state.phase != Phase::Reveal {
            return;
        }
        let result = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                lobby.state.reveal_index += 1;
                lobby.state.reveal_index >= lobby.state.players.len()
            })
            .await;
        let Some((done, _)) = result else { return };
        if done {
            self.finish_game(lobby_id.to_string()).await;
        } else {
            self.send_current_chain(lobby_id).await;
        }
    }

    async fn finish_game(self: &Arc<Self>, lobby_id: String) {
        let Some(lobby) = self.lobbies.get(&lobby_id).await else {
            return;
        };
        self.broadcast(&lobby, TelephoneMessage::GameOver { game_id: lobby_id.clone() }).await;
        for member in &lobby.members {
            self.presence.clear_in_game(member).await;
        }
        if let Some(reset) = self.lobbies.reset_for_replay(&lobby_id, TelephoneState::default()).await {
            self.broadcast_lobby_state(&reset).await;
        }
    }

    async fn force_end_game(self: &Arc<Self>, lobby_id: String) {
        self.lobbies.cancel_timer(&lobby_id).await;
        self.finish_game(lobby_id).await;
    }
}
