//! Draw-and-guess (Pictionary-style) lobby manager (§4.6.2).
//!
//! Built on the generic `lobby::LobbyManager`. The half-time hint reveal and
//! the round-end sequence are modeled as a single chained `LobbyTimer`
//! future rather than two independently-cancelled timers, since both halves
//! always fire together unless the round ends early — cancelling the one
//! handle cancels both remaining steps atomically. The 10s/1s `RoundState`
//! cadence runs as a second, independently-cancelled ticker task, tracked
//! alongside the round timer in `tick_handles`.

use crate::lobby::timer::LobbyTimer;
use crate::lobby::{Lobby, LobbyManager};
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::games::draw_guess::{
    guesser_points, hint_reveal_count, initial_hint_mask, DrawGuessMessage, Language, DRAWER_POINTS,
};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const MIN_PLAYERS: usize = 2;
const MAX_PLAYERS: usize = 8;
const DEFAULT_TOTAL_ROUNDS: u32 = 3;

const EN_WORDS: &[&str] = &[
    "pizza", "guitar", "rocket", "dolphin", "castle", "umbrella", "volcano", "sandwich", "lighthouse", "penguin",
];
const TR_WORDS: &[&str] = &["kale", "gitar", "roket", "yunus", "semsiye", "yanardag", "penguen"];

fn word_list(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => EN_WORDS,
        Language::Tr => TR_WORDS,
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawGuessState {
    language: Option<Language>,
    round_secs: u32,
    total_rounds: u32,
    round: u32,
    /// Roster snapshot taken at game start — never mutated as members leave,
    /// so `drawer_index % players.len()` always lands on the same rotation
    /// regardless of who else is still connected (mirrors `telephone.rs`'s
    /// frozen `players` field).
    players: Vec<String>,
    drawer_index: usize,
    secret_word: String,
    hint_mask: Vec<char>,
    time_left: u32,
    guessed: HashSet<String>,
    scores: HashMap<String, u32>,
}

/// Resolves the current drawer from the frozen roster, not live membership.
fn current_drawer(lobby: &Lobby<DrawGuessState>) -> String {
    let players = &lobby.state.players;
    if players.is_empty() {
        return String::new();
    }
    players[lobby.state.drawer_index % players.len()].clone()
}

pub struct DrawGuessManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    lobbies: LobbyManager<DrawGuessState>,
    /// The per-lobby `RoundState` cadence ticker, separate from the
    /// hint-reveal/end-round `LobbyTimer` chain so either can be cancelled
    /// without disturbing the other.
    tick_handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DrawGuessManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        DrawGuessManager {
            registry,
            presence,
            lobbies: LobbyManager::new(MIN_PLAYERS),
            tick_handles: Mutex::new(HashMap::new()),
        }
    }

    async fn send_to(&self, user: &str, message: DrawGuessMessage) {
        self.registry.send_to(user, &env(Payload::DrawGuess(message))).await;
    }

    async fn broadcast(&self, lobby: &Lobby<DrawGuessState>, message: DrawGuessMessage) {
        let envelope = env(Payload::DrawGuess(message));
        for member in &lobby.members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    async fn broadcast_lobby_state(&self, lobby: &Lobby<DrawGuessState>) {
        self.broadcast(lobby, DrawGuessMessage::LobbyState(lobby.descriptor())).await;
    }

    /// Sends each member their own view of `RoundState` — the drawer sees
    /// the plaintext word, everyone else sees the current hint mask.
    async fn broadcast_round_state(&self, lobby: &Lobby<DrawGuessState>, time_left_secs: u32) {
        let drawer = current_drawer(lobby);
        for member in &lobby.members {
            let hint_mask: String = if *member == drawer {
                lobby.state.secret_word.clone()
            } else {
                lobby.state.hint_mask.iter().collect()
            };
            self.send_to(
                member,
                DrawGuessMessage::RoundState {
                    game_id: lobby.id.clone(),
                    drawer: drawer.clone(),
                    hint_mask,
                    time_left_secs,
                    round_secs: lobby.state.round_secs,
                    scores: lobby.state.scores.clone(),
                },
            )
            .await;
        }
    }

    /// Starts the §4.6.2 cadence: a `RoundState` broadcast every 10s, plus
    /// every second once the round enters its final 5s.
    async fn start_ticker(self: &Arc<Self>, lobby_id: String, round_secs: u32) {
        self.stop_ticker(&lobby_id).await;
        let manager = self.clone();
        let id = lobby_id.clone();
        let handle = tokio::spawn(async move {
            manager.run_round_ticker(id, round_secs).await;
        });
        self.tick_handles.lock().await.insert(lobby_id, handle);
    }

    async fn stop_ticker(&self, lobby_id: &str) {
        if let Some(handle) = self.tick_handles.lock().await.remove(lobby_id) {
            handle.abort();
        }
    }

    async fn run_round_ticker(self: Arc<Self>, lobby_id: String, round_secs: u32) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut elapsed: u32 = 0;
        loop {
            interval.tick().await;
            elapsed += 1;
            if elapsed >= round_secs {
                return;
            }
            let time_left = round_secs - elapsed;
            if time_left % 10 == 0 || time_left <= 5 {
                let Some(lobby) = self.lobbies.get(&lobby_id).await else { return };
                self.broadcast_round_state(&lobby, time_left).await;
            }
        }
    }

    pub async fn create(&self, host: &str, host_display: &str, name: String, max_players: usize, language: Language, round_secs: u32) {
        let max_players = max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        let state = DrawGuessState {
            language: Some(language),
            round_secs: round_secs.max(15),
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            ..Default::default()
        };
        if let Ok(lobby) = self.lobbies.create(host, host_display, name, max_players, state).await {
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
        let Some(lobby) = result.lobby else { return };

        if lobby.started && lobby.members.len() < MIN_PLAYERS {
            self.force_end_game(lobby.id.clone()).await;
        } else if lobby.started && current_drawer(&lobby) == user {
            // The drawer disconnected mid-round: cancel the timer and
            // ticker, reveal the word, and advance to the next round —
            // the drawer-index fix-up happens in `begin_round`, which skips
            // any frozen-roster slot whose occupant has since left.
            self.lobbies.cancel_timer(&lobby.id).await;
            self.stop_ticker(&lobby.id).await;
            self.broadcast(
                &lobby,
                DrawGuessMessage::WordReveal { game_id: lobby.id.clone(), word: lobby.state.secret_word.clone() },
            )
            .await;
            self.advance_and_begin_next_round(lobby.id.clone()).await;
        } else {
            self.broadcast_lobby_state(&lobby).await;
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
        self.lobbies
            .mutate(&lobby.id, |lobby| {
                lobby.state.players = players;
            })
            .await;
        self.broadcast_lobby_state(&lobby).await;
        for member in &lobby.members {
            self.presence.set_in_game(member, &lobby.id, "the lobby").await;
        }
        self.begin_round(lobby.id).await;
    }

    fn begin_round<'a>(
        self: &'a Arc<Self>,
        lobby_id: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.begin_round_inner(lobby_id))
    }

    async fn begin_round_inner(self: &Arc<Self>, lobby_id: String) {
        let mutated = self
            .lobbies
            .mutate(&lobby_id, |lobby| {
                lobby.state.round += 1;
                if lobby.state.round > lobby.state.total_rounds {
                    return None;
                }
                let language = lobby.state.language.unwrap_or(Language::En);
                let word = *word_list(language).choose(&mut rand::thread_rng()).unwrap_or(&"word");
                lobby.state.secret_word = word.to_string();
                lobby.state.hint_mask = initial_hint_mask(word);
                lobby.state.time_left = lobby.state.round_secs;
                lobby.state.guessed.clear();

                let total = lobby.state.players.len();
                if total > 0 {
                    for _ in 0..total {
                        let candidate = lobby.state.players[lobby.state.drawer_index % total].clone();
                        if lobby.members.contains(&candidate) {
                            break;
                        }
                        lobby.state.drawer_index += 1;
                    }
                }
                Some(lobby.state.round_secs)
            })
            .await;

        let Some((Some(round_secs), _)) = mutated else {
            self.finish_game(lobby_id).await;
            return;
        };

        let Some(lobby) = self.lobbies.get(&lobby_id).await else { return };
        self.broadcast_round_state(&lobby, round_secs).await;

        let half = round_secs / 2;
        let remaining = round_secs.saturating_sub(half);
        let manager = self.clone();
        let id = lobby_id.clone();
        let timer = LobbyTimer::spawn(Duration::from_secs(half.max(1) as u64), async move {
            manager.reveal_hints(&id).await;
            tokio::time::sleep(Duration::from_secs(remaining.max(1) as u64)).await;
            manager.end_round(id).await;
        });
        self.lobbies.set_timer(&lobby_id, timer).await;
        self.start_ticker(lobby_id, round_secs).await;
    }

    async fn reveal_hints(&self, lobby_id: &str) {
        let Some((_, lobby)) = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let count = hint_reveal_count(lobby.state.secret_word.len());
                let mut hidden: Vec<usize> = lobby
                    .state
                    .hint_mask
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c == '_')
                    .map(|(i, _)| i)
                    .collect();
                hidden.shuffle(&mut rand::thread_rng());
                for idx in hidden.into_iter().take(count) {
                    let word_char = lobby.state.secret_word.chars().nth(idx).unwrap();
                    lobby.state.hint_mask[idx] = word_char;
                }
            })
            .await
        else {
            return;
        };

        self.broadcast_round_state(&lobby, lobby.state.round_secs / 2).await;
    }

    pub async fn relay_draw_data(&self, user: &str, lobby_id: &str, stroke: serde_json::Value) {
        self.relay_drawer_only(user, lobby_id, DrawGuessMessage::DrawData { game_id: lobby_id.to_string(), stroke }).await;
    }

    pub async fn relay_clear_canvas(&self, user: &str, lobby_id: &str) {
        self.relay_drawer_only(user, lobby_id, DrawGuessMessage::ClearCanvas { game_id: lobby_id.to_string() }).await;
    }

    async fn relay_drawer_only(&self, user: &str, lobby_id: &str, message: DrawGuessMessage) {
        let Some(lobby) = self.lobbies.get(lobby_id).await else { return };
        if current_drawer(&lobby) != user {
            return;
        }
        let envelope = env(Payload::DrawGuess(message));
        for member in &lobby.members {
            if member != user {
                self.registry.send_to(member, &envelope).await;
            }
        }
    }

    pub async fn submit_guess(self: &Arc<Self>, user: &str, lobby_id: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        enum Outcome {
            Ignored,
            Correct { scores: HashMap<String, u32>, all_guessed: bool, members: Vec<String> },
            Relayed { members: Vec<String> },
        }

        let outcome = {
            let result = self
                .lobbies
                .mutate(lobby_id, |lobby| {
                    let drawer = current_drawer(lobby);
                    if user == drawer || lobby.state.guessed.contains(user) {
                        return Outcome::Ignored;
                    }
                    if text.eq_ignore_ascii_case(&lobby.state.secret_word) {
                        let points = guesser_points(lobby.state.time_left, lobby.state.round_secs);
                        *lobby.state.scores.entry(user.to_string()).or_insert(0) += points;
                        *lobby.state.scores.entry(drawer.clone()).or_insert(0) += DRAWER_POINTS;
                        lobby.state.guessed.insert(user.to_string());
                        let non_drawers = lobby.members.len().saturating_sub(1);
                        let all_guessed = lobby.state.guessed.len() >= non_drawers;
                        Outcome::Correct {
                            scores: lobby.state.scores.clone(),
                            all_guessed,
                            members: lobby.members.clone(),
                        }
                    } else {
                        Outcome::Relayed { members: lobby.members.clone() }
                    }
                })
                .await;
            result.map(|(o, _)| o)
        };

        match outcome {
            None | Some(Outcome::Ignored) => {}
            Some(Outcome::Relayed { members }) => {
                let envelope = env(Payload::DrawGuess(DrawGuessMessage::GuessRelayed {
                    game_id: lobby_id.to_string(),
                    from: user.to_string(),
                    text: text.to_string(),
                }));
                for member in &members {
                    self.registry.send_to(member, &envelope).await;
                }
            }
            Some(Outcome::Correct { scores, all_guessed, members }) => {
                let envelope = env(Payload::DrawGuess(DrawGuessMessage::CorrectGuess {
                    game_id: lobby_id.to_string(),
                    guesser: user.to_string(),
                    scores,
                }));
                for member in &members {
                    self.registry.send_to(member, &envelope).await;
                }
                if all_guessed {
                    self.lobbies.cancel_timer(lobby_id).await;
                    self.end_round(lobby_id.to_string()).await;
                }
            }
        }
    }

    async fn advance_and_begin_next_round(self: &Arc<Self>, lobby_id: String) {
        self.lobbies
            .mutate(&lobby_id, |lobby| {
                lobby.state.drawer_index += 1;
            })
            .await;
        self.begin_round(lobby_id).await;
    }

    async fn end_round(self: &Arc<Self>, lobby_id: String) {
        let Some(lobby) = self.lobbies.get(&lobby_id).await else { return };
        self.stop_ticker(&lobby_id).await;
        self.broadcast(&lobby, DrawGuessMessage::WordReveal { game_id: lobby_id.clone(), word: lobby.state.secret_word.clone() }).await;

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            manager.advance_and_begin_next_round(lobby_id).await;
        });
    }

    async fn finish_game(self: &Arc<Self>, lobby_id: String) {
        let Some(lobby) = self.lobbies.get(&lobby_id).await else { return };
        self.broadcast(&lobby, DrawGuessMessage::GameOver { game_id: lobby_id.clone(), scores: lobby.state.scores.clone() }).await;
        for member in &lobby.members {
            self.presence.clear_in_game(member).await;
        }
        if let Some(reset) = self.lobbies.reset_for_replay(&lobby_id, DrawGuessState { language: lobby.state.language, round_secs: lobby.state.round_secs, total_rounds: lobby.state.total_rounds, ..Default::default() }).await {
            self.broadcast_lobby_state(&reset).await;
        }
    }

    async fn force_end_game(self: &Arc<Self>, lobby_id: String) {
        self.lobbies.cancel_timer(&lobby_id).await;
        self.stop_ticker(&lobby_id).await;
        self.finish_game(lobby_id).await;
    }
}
