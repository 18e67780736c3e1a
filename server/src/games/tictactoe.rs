//! Invite-based head-to-head grid game manager (§4.6.1).
//!
//! Does not go through the generic `lobby::LobbyManager`: a 1v1 invite
//! accept materializes the match directly, rather than a host-created lobby
//! that other players join, so its own single-mutex map plays the role
//! §4.5 prescribes for lobby state.

use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use crate::ids;
use proto::envelope::Payload;
use proto::games::tictactoe::{find_win, is_draw, Board, Mark, TicTacToeMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Match {
    board: Board,
    side_to_move: Mark,
    finished: bool,
    player_x: String,
    player_o: String,
    spectators: Vec<String>,
}

impl Match {
    fn state_message(&self, game_id: &str) -> TicTacToeMessage {
        TicTacToeMessage::State {
            game_id: game_id.to_string(),
            board: self.board,
            side_to_move: self.side_to_move,
            finished: self.finished,
            win_line: find_win(&self.board).map(|(line, _)| line),
            player_x: self.player_x.clone(),
            player_o: self.player_o.clone(),
        }
    }

    fn mark_of(&self, user: &str) -> Option<Mark> {
        if self.player_x == user {
            Some(Mark::X)
        } else if self.player_o == user {
            Some(Mark::O)
        } else {
            None
        }
    }

    fn members(&self) -> Vec<String> {
        let mut all = vec![self.player_x.clone(), self.player_o.clone()];
        all.extend(self.spectators.iter().cloned());
        all
    }
}

struct Inner {
    games: HashMap<String, Match>,
    player_game: HashMap<String, String>,
    pending_invites: HashMap<String, (String, String)>,
}

pub struct TicTacToeManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    inner: Mutex<Inner>,
}

impl TicTacToeManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        TicTacToeManager {
            registry,
            presence,
            inner: Mutex::new(Inner {
                games: HashMap::new(),
                player_game: HashMap::new(),
                pending_invites: HashMap::new(),
            }),
        }
    }

    async fn broadcast_to(&self, members: &[String], message: TicTacToeMessage) {
        let envelope = env(Payload::TicTacToe(message));
        for member in members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    pub async fn invite(&self, from: &str, to: &str) {
        let game_id = ids::game_id();
        {
            let mut inner = self.inner.lock().await;
            inner.pending_invites.insert(to.to_string(), (game_id.clone(), from.to_string()));
        }
        self.broadcast_to(
            &[to.to_string()],
            TicTacToeMessage::InviteReceived { game_id, from: from.to_string() },
        )
        .await;
    }

    pub async fn decline(&self, invitee: &str) {
        let inviter = {
            let mut inner = self.inner.lock().await;
            inner.pending_invites.remove(invitee).map(|(game_id, inviter)| (game_id, inviter))
        };
        if let Some((game_id, inviter)) = inviter {
            self.broadcast_to(&[inviter], TicTacToeMessage::InviteDeclined { game_id }).await;
        }
    }

    pub async fn accept(&self, invitee: &str) {
        let accepted = {
            let mut inner = self.inner.lock().await;
            let Some((game_id, inviter)) = inner.pending_invites.remove(invitee) else {
                return;
            };
            let m = Match {
                board: [None; 9],
                side_to_move: Mark::X,
                finished: false,
                player_x: inviter.clone(),
                player_o: invitee.to_string(),
                spectators: Vec::new(),
            };
            let state_message = m.state_message(&game_id);
            inner.player_game.insert(inviter.clone(), game_id.clone());
            inner.player_game.insert(invitee.to_string(), game_id.clone());
            inner.games.insert(game_id.clone(), m);
            (game_id, inviter, state_message)
        };
        let (game_id, inviter, state_message) = accepted;
        self.presence.set_in_game(&inviter, &game_id, invitee).await;
        self.presence.set_in_game(invitee, &game_id, &inviter).await;
        self.broadcast_to(&[inviter.clone()], TicTacToeMessage::InviteAccepted { game_id }).await;
        self.broadcast_to(&[inviter, invitee.to_string()], state_message).await;
    }

    pub async fn spectate(&self, user: &str, game_id: &str) {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let Some(m) = inner.games.get_mut(game_id) else {
                return;
            };
            if !m.spectators.contains(&user.to_string()) {
                m.spectators.push(user.to_string());
            }
            m.state_message(game_id)
        };
        self.broadcast_to(&[user.to_string()], snapshot).await;
    }

    pub async fn play_move(&self, user: &str, game_id: &str, cell: usize) {
        enum Outcome {
            Rejected,
            Continue(TicTacToeMessage, Vec<String>),
            Finished(TicTacToeMessage, Vec<String>),
        }

        let outcome = {
            let mut inner = self.inner.lock().await;
            let Some(m) = inner.games.get_mut(game_id) else {
                return;
            };
            if m.finished || cell >= 9 || m.board[cell].is_some() {
                Outcome::Rejected
            } else if m.mark_of(user) != Some(m.side_to_move) {
                Outcome::Rejected
            } else {
                m.board[cell] = Some(m.side_to_move);
                let members = m.members();
                if is_draw(&m.board) || find_win(&m.board).is_some() {
                    m.finished = true;
                    let winner = find_win(&m.board).map(|(_, mark)| {
                        if mark == Mark::X { m.player_x.clone() } else { m.player_o.clone() }
                    });
                    let message = TicTacToeMessage::GameOver {
                        game_id: game_id.to_string(),
                        board: m.board,
                        win_line: find_win(&m.board).map(|(line, _)| line),
                        winner,
                    };
                    for member in &members {
                        inner.player_game.remove(member);
                    }
                    inner.games.remove(game_id);
                    Outcome::Finished(message, members)
                } else {
                    m.side_to_move = m.side_to_move.opponent();
                    let message = m.state_message(game_id);
                    Outcome::Continue(message, members)
                }
            }
        };

        match outcome {
            Outcome::Rejected => {}
            Outcome::Continue(message, members) => {
                self.broadcast_to(&members, message).await;
            }
            Outcome::Finished(message, members) => {
                self.broadcast_to(&members, message).await;
                for member in &members {
                    self.presence.clear_in_game(member).await;
                }
            }
        }
    }

    /// Abandonment is an immediate loss for the departing player (§4.6.1).
    pub async fn on_disconnect(&self, user: &str) {
        let finished = {
            let mut inner = self.inner.lock().await;
            inner.pending_invites.remove(user);
            let Some(game_id) = inner.player_game.remove(user) else {
                return;
            };
            let Some(m) = inner.games.remove(&game_id) else {
                return;
            };
            let members = m.members();
            let winner = if m.player_x == user { m.player_o.clone() } else { m.player_x.clone() };
            for member in &members {
                inner.player_game.remove(member);
            }
            let message = TicTacToeMessage::GameOver {
                game_id,
                board: m.board,
                win_line: None,
                winner: Some(winner),
            };
            (message, members)
        };
        let (message, members) = finished;
        self.broadcast_to(&members, message).await;
        for member in &members {
            self.presence.clear_in_game(member).await;
        }
    }
}
