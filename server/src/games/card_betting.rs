//! Dealer-vs-players card-betting game with a standard scored hand value
//! (§4.6.5), built on the generic `lobby::LobbyManager`.
//!
//! Unlike the other lobby games, a round ending never resets the lobby to
//! not-started: balances and scores persist across rounds until the host
//! issues `NextRound`, which loops back to the betting phase in place.

use crate::lobby::{Lobby, LobbyManager};
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::games::card_betting::{
    generate_deck, hand_value, is_natural, payout, settle, Card, CardBettingMessage, PlayerAction,
    DEALER_STAND_THRESHOLD, MIN_BET, STARTING_BALANCE,
};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MIN_PLAYERS: usize = 1;
const MAX_PLAYERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RoundPhase {
    #[default]
    Betting,
    PlayerTurns,
    Settlement,
}

#[derive(Debug, Clone, Default)]
pub struct CardBettingState {
    balances: HashMap<String, u32>,
    scores: HashMap<String, u32>,
    bets: HashMap<String, u32>,
    hands: HashMap<String, Vec<Card>>,
    dealer_hand: Vec<Card>,
    deck: Vec<Card>,
    turn_order: Vec<String>,
    turn_index: usize,
    finished_players: HashSet<String>,
    phase: RoundPhase,
}

impl CardBettingState {
    fn advance_turn(&mut self) -> bool {
        let n = self.turn_order.len();
        for _ in 0..n {
            self.turn_index = (self.turn_index + 1) % n;
            if !self.finished_players.contains(&self.turn_order[self.turn_index]) {
                return false;
            }
        }
        true
    }

    fn draw(&mut self) -> Card {
        if self.deck.is_empty() {
            self.deck = generate_deck();
            self.deck.shuffle(&mut rand::thread_rng());
        }
        self.deck.pop().expect("deck replenished when empty")
    }
}

pub struct CardBettingManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    lobbies: LobbyManager<CardBettingState>,
}

impl CardBettingManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        CardBettingManager {
            registry,
            presence,
            lobbies: LobbyManager::new(MIN_PLAYERS),
        }
    }

    async fn send_to(&self, user: &str, message: CardBettingMessage) {
        self.registry.send_to(user, &env(Payload::CardBetting(message))).await;
    }

    async fn broadcast(&self, lobby: &Lobby<CardBettingState>, message: CardBettingMessage) {
        let envelope = env(Payload::CardBetting(message));
        for member in &lobby.members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    async fn broadcast_lobby_state(&self, lobby: &Lobby<CardBettingState>) {
        self.broadcast(lobby, CardBettingMessage::LobbyState(lobby.descriptor())).await;
    }

    pub async fn create(&self, host: &str, host_display: &str, name: String, max_players: usize) {
        let max_players = max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        if let Ok(lobby) = self
            .lobbies
            .create(host, host_display, name, max_players, CardBettingState::default())
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

    pub async fn leave(&self, user: &str) {
        let Some(result) = self.lobbies.leave(user).await else {
            return;
        };
        self.presence.clear_in_game(user).await;
        let Some(lobby) = result.lobby else { return };
        let user_owned = user.to_string();
        self.lobbies
            .mutate(&lobby.id, |lobby| {
                let state = &mut lobby.state;
                state.balances.remove(&user_owned);
                state.hands.remove(&user_owned);
                state.bets.remove(&user_owned);
                state.finished_players.remove(&user_owned);
                state.turn_order.retain(|m| m != &user_owned);
                if state.turn_index >= state.turn_order.len() {
                    state.turn_index = 0;
                }
            })
            .await;
        self.broadcast_lobby_state(&lobby).await;
    }

    pub async fn on_disconnect(&self, user: &str) {
        self.leave(user).await;
    }

    pub async fn start(self: &Arc<Self>, user: &str) {
        let Ok(lobby) = self.lobbies.start(user).await else {
            return;
        };
        let members = lobby.members.clone();
        self.lobbies
            .mutate(&lobby.id, |lobby| {
                for member in &members {
                    lobby.state.balances.insert(member.clone(), STARTING_BALANCE);
                    lobby.state.scores.insert(member.clone(), 0);
                }
                lobby.state.turn_order = members.clone();
                lobby.state.phase = RoundPhase::Betting;
            })
            .await;
        self.broadcast_lobby_state(&lobby).await;
        for member in &lobby.members {
            self.presence.set_in_game(member, &lobby.id, "the table").await;
        }
        self.begin_betting_phase(&lobby.id).await;
    }

    async fn begin_betting_phase(&self, lobby_id: &str) {
        let Some((_, lobby)) = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                lobby.state.phase = RoundPhase::Betting;
                lobby.state.bets.clear();
                lobby.state.hands.clear();
                lobby.state.dealer_hand.clear();
                lobby.state.finished_players.clear();
                lobby.state.turn_index = 0;
            })
            .await
        else {
            return;
        };
        self.broadcast(
            &lobby,
            CardBettingMessage::BettingPhase { game_id: lobby_id.to_string(), balances: lobby.state.balances.clone() },
        )
        .await;
    }

    pub async fn place_bet(self: &Arc<Self>, user: &str, lobby_id: &str, amount: u32) {
        let result = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                if state.phase != RoundPhase::Betting || state.bets.contains_key(user) {
                    return false;
                }
                let Some(&balance) = state.balances.get(user) else {
                    return false;
                };
                let amount = amount.clamp(MIN_BET, balance.max(MIN_BET)).min(balance);
                state.bets.insert(user.to_string(), amount);
                *state.balances.get_mut(user).expect("checked above") -= amount;
                state.bets.len() >= state.turn_order.len()
            })
            .await;

        let Some((all_bet, _)) = result else { return };
        if all_bet {
            self.deal_cards(lobby_id).await;
        }
    }

    async fn deal_cards(&self, lobby_id: &str) {
        let Some((_, lobby)) = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                let mut deck = generate_deck();
                deck.shuffle(&mut rand::thread_rng());
                for member in state.turn_order.clone() {
                    let hand = vec![deck.pop().unwrap(), deck.pop().unwrap()];
                    state.hands.insert(member, hand);
                }
                state.dealer_hand = vec![deck.pop().unwrap(), deck.pop().unwrap()];
                state.deck = deck;
                state.phase = RoundPhase::PlayerTurns;
                state.turn_index = 0;
            })
            .await
        else {
            return;
        };

        let dealer_up_card = lobby.state.dealer_hand[0];
        for member in &lobby.state.turn_order {
            self.send_to(
                member,
                CardBettingMessage::Dealing {
                    game_id: lobby_id.to_string(),
                    your_hand: lobby.state.hands.get(member).cloned().unwrap_or_default(),
                    dealer_up_card,
                },
            )
            .await;
        }
    }

    pub async fn action(self: &Arc<Self>, user: &str, lobby_id: &str, action: PlayerAction) {
        enum Outcome {
            Rejected,
            Continue,
            AllDone,
        }

        let outcome = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                if state.phase != RoundPhase::PlayerTurns
                    || state.turn_order.get(state.turn_index).map(|s| s.as_str()) != Some(user)
                    || state.finished_players.contains(user)
                {
                    return Outcome::Rejected;
                }
                match action {
                    PlayerAction::Hit => {
                        let card = state.draw();
                        let hand = state.hands.entry(user.to_string()).or_default();
                        hand.push(card);
                        if hand_value(hand) > 21 {
                            state.finished_players.insert(user.to_string());
                            if state.advance_turn() {
                                return Outcome::AllDone;
                            }
                        }
                    }
                    PlayerAction::Stand => {
                        state.finished_players.insert(user.to_string());
                        if state.advance_turn() {
                            return Outcome::AllDone;
                        }
                    }
                }
                Outcome::Continue
            })
            .await;

        match outcome {
            None | Some((Outcome::Rejected, _)) => {}
            Some((Outcome::Continue, lobby)) => {
                let hand = lobby.state.hands.get(user).cloned().unwrap_or_default();
                self.send_to(
                    user,
                    CardBettingMessage::Dealing { game_id: lobby_id.to_string(), your_hand: hand, dealer_up_card: lobby.state.dealer_hand[0] },
                )
                .await;
            }
            Some((Outcome::AllDone, _)) => {
                self.settle_round(lobby_id).await;
            }
        }
    }

    async fn settle_round(&self, lobby_id: &str) {
        let Some((outcomes, lobby)) = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                while hand_value(&state.dealer_hand) < DEALER_STAND_THRESHOLD {
                    let card = state.draw();
                    state.dealer_hand.push(card);
                }
                let dealer_total = hand_value(&state.dealer_hand);
                let dealer_natural = is_natural(&state.dealer_hand);

                let mut outcomes = HashMap::new();
                for member in state.turn_order.clone() {
                    let hand = state.hands.get(&member).cloned().unwrap_or_default();
                    let player_total = hand_value(&hand);
                    let player_natural = is_natural(&hand);
                    let outcome = settle(player_total, player_natural, dealer_total, dealer_natural);
                    let bet = state.bets.get(&member).copied().unwrap_or(0) as i64;
                    let delta = payout(bet as u32, outcome);
                    let balance = state.balances.entry(member.clone()).or_insert(0);
                    *balance = (*balance as i64 + bet + delta).max(0) as u32;
                    if matches!(outcome, proto::games::card_betting::Outcome::Win | proto::games::card_betting::Outcome::Natural) {
                        *state.scores.entry(member.clone()).or_insert(0) += 1;
                    }
                    outcomes.insert(member, outcome);
                }
                state.phase = RoundPhase::Settlement;
                outcomes
            })
            .await
        else {
            return;
        };

        self.broadcast(
            &lobby,
            CardBettingMessage::DealerTurn {
                game_id: lobby_id.to_string(),
                dealer_hand: lobby.state.dealer_hand.clone(),
                dealer_total: hand_value(&lobby.state.dealer_hand),
            },
        )
        .await;

        self.broadcast(
            &lobby,
            CardBettingMessage::RoundResult {
                game_id: lobby_id.to_string(),
                outcomes,
                balances: lobby.state.balances.clone(),
                scores: lobby.state.scores.clone(),
            },
        )
        .await;
    }

    pub async fn next_round(self: &Arc<Self>, user: &str, lobby_id: &str) {
        let Some(lobby) = self.lobbies.get(lobby_id).await else {
            return;
        };
        if lobby.host != user || lobby.state.phase != RoundPhase::Settlement {
            return;
        }
        self.begin_betting_phase(lobby_id).await;
    }
}
