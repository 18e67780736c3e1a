//! Invite-based best-of-N rock-paper-scissors duel manager (§4.6.6).

use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use crate::ids;
use proto::envelope::Payload;
use proto::games::rps::{resolve, Move, RoundOutcome, RpsMessage, TARGET_SCORE};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Duel {
    player_a: String,
    player_b: String,
    pending: HashMap<String, Move>,
    score_a: u32,
    score_b: u32,
}

impl Duel {
    fn other(&self, user: &str) -> &str {
        if user == self.player_a { &self.player_b } else { &self.player_a }
    }

    fn score_of(&self, user: &str) -> u32 {
        if user == self.player_a { self.score_a } else { self.score_b }
    }
}

struct Inner {
    duels: HashMap<String, Duel>,
    player_duel: HashMap<String, String>,
    pending_invites: HashMap<String, (String, String)>,
}

pub struct RpsManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    inner: Mutex<Inner>,
}

impl RpsManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        RpsManager {
            registry,
            presence,
            inner: Mutex::new(Inner {
                duels: HashMap::new(),
                player_duel: HashMap::new(),
                pending_invites: HashMap::new(),
            }),
        }
    }

    async fn send(&self, to: &str, message: RpsMessage) {
        self.registry.send_to(to, &env(Payload::Rps(message))).await;
    }

    pub async fn invite(&self, from: &str, to: &str) {
        let game_id = ids::game_id();
        {
            let mut inner = self.inner.lock().await;
            inner.pending_invites.insert(to.to_string(), (game_id.clone(), from.to_string()));
        }
        self.send(to, RpsMessage::InviteReceived { game_id, from: from.to_string() }).await;
    }

    pub async fn decline(&self, invitee: &str) {
        let inviter = self.inner.lock().await.pending_invites.remove(invitee);
        if let Some((game_id, inviter)) = inviter {
            self.send(&inviter, RpsMessage::InviteDeclined { game_id }).await;
        }
    }

    pub async fn accept(&self, invitee: &str) {
        let accepted = {
            let mut inner = self.inner.lock().await;
            let Some((game_id, inviter)) = inner.pending_invites.remove(invitee) else {
                return;
            };
            let duel = Duel {
                player_a: inviter.clone(),
                player_b: invitee.to_string(),
                pending: HashMap::new(),
                score_a: 0,
                score_b: 0,
            };
            inner.player_duel.insert(inviter.clone(), game_id.clone());
            inner.player_duel.insert(invitee.to_string(), game_id.clone());
            inner.duels.insert(game_id.clone(), duel);
            (game_id, inviter)
        };
        let (game_id, inviter) = accepted;
        self.presence.set_in_game(&inviter, &game_id, invitee).await;
        self.presence.set_in_game(invitee, &game_id, &inviter).await;
        self.send(&inviter, RpsMessage::InviteAccepted { game_id }).await;
    }

    pub async fn submit_move(&self, user: &str, game_id: &str, mv: Move) {
        struct Resolved {
            a: String,
            b: String,
            mv_a: Move,
            mv_b: Move,
            outcome_a: RoundOutcome,
            score_a: u32,
            score_b: u32,
            game_over: bool,
        }

        let resolved = {
            let mut inner = self.inner.lock().await;
            let Some(duel) = inner.duels.get_mut(game_id) else {
                return;
            };
            duel.pending.insert(user.to_string(), mv);
            let (Some(mv_a), Some(mv_b)) =
                (duel.pending.get(&duel.player_a).copied(), duel.pending.get(&duel.player_b).copied())
            else {
                return;
            };
            let outcome_a = resolve(mv_a, mv_b);
            match outcome_a {
                RoundOutcome::Win => duel.score_a += 1,
                RoundOutcome::Lose => duel.score_b += 1,
                RoundOutcome::Tie => {}
            }
            duel.pending.clear();
            let game_over = duel.score_a >= TARGET_SCORE || duel.score_b >= TARGET_SCORE;
            let resolved = Resolved {
                a: duel.player_a.clone(),
                b: duel.player_b.clone(),
                mv_a,
                mv_b,
                outcome_a,
                score_a: duel.score_a,
                score_b: duel.score_b,
                game_over,
            };
            if game_over {
                inner.player_duel.remove(&resolved.a);
                inner.player_duel.remove(&resolved.b);
                inner.duels.remove(game_id);
            }
            resolved
        };

        {
            let Resolved { a, b, mv_a, mv_b, outcome_a, score_a, score_b, game_over } = resolved;
            let outcome_b = match outcome_a {
                RoundOutcome::Win => RoundOutcome::Lose,
                RoundOutcome::Lose => RoundOutcome::Win,
                RoundOutcome::Tie => RoundOutcome::Tie,
            };
            self.send(
                &a,
                RpsMessage::RoundResult {
                    game_id: game_id.to_string(),
                    my_move: mv_a,
                    opp_move: mv_b,
                    outcome: outcome_a,
                    my_score: score_a,
                    opp_score: score_b,
                },
            )
            .await;
            self.send(
                &b,
                RpsMessage::RoundResult {
                    game_id: game_id.to_string(),
                    my_move: mv_b,
                    opp_move: mv_a,
                    outcome: outcome_b,
                    my_score: score_b,
                    opp_score: score_a,
                },
            )
            .await;

            if game_over {
                self.send(&a, RpsMessage::GameOver { game_id: game_id.to_string(), i_won: score_a > score_b, my_score: score_a, opp_score: score_b }).await;
                self.send(&b, RpsMessage::GameOver { game_id: game_id.to_string(), i_won: score_b > score_a, my_score: score_b, opp_score: score_a }).await;
                self.presence.clear_in_game(&a).await;
                self.presence.clear_in_game(&b).await;
            }
        }
    }

    pub async fn on_disconnect(&self, user: &str) {
        let finished = {
            let mut inner = self.inner.lock().await;
            inner.pending_invites.remove(user);
            let Some(game_id) = inner.player_duel.remove(user) else {
                return;
            };
            let Some(duel) = inner.duels.remove(&game_id) else {
                return;
            };
            inner.player_duel.remove(duel.other(user));
            (game_id, duel.other(user).to_string(), duel.score_of(duel.other(user)))
        };
        let (game_id, winner, winner_score) = finished;
        self.send(&winner, RpsMessage::GameOver { game_id, i_won: true, my_score: winner_score.max(TARGET_SCORE), opp_score: 0 }).await;
        self.presence.clear_in_game(&winner).await;
    }
}
