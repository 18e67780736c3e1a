//! Color-and-value matching card game with wilds, reversal, and skips
//! (§4.6.4), built on the generic `lobby::LobbyManager`.

use crate::lobby::{Lobby, LobbyManager};
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::games::card_hand::{
    generate_deck, is_legal_play, recycle_discard, Card, CardHandMessage, Color, Value, COLORS,
};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

const MIN_PLAYERS: usize = 2;
const MAX_PLAYERS: usize = 6;
const HAND_SIZE: usize = 7;

#[derive(Debug, Clone, Default)]
pub struct CardHandState {
    draw_pile: Vec<Card>,
    discard_pile: Vec<Card>,
    hands: HashMap<String, Vec<Card>>,
    turn_order: Vec<String>,
    turn_index: usize,
    direction: i8,
    current_color: Option<Color>,
    awaiting_color_choice: bool,
}

impl CardHandState {
    fn draw_one(&mut self) -> Card {
        if self.draw_pile.is_empty() {
            let (top, mut rest) = recycle_discard(std::mem::take(&mut self.discard_pile));
            rest.shuffle(&mut rand::thread_rng());
            self.discard_pile = vec![top];
            self.draw_pile = rest;
        }
        self.draw_pile.pop().expect("draw pile replenished by recycle when empty")
    }

    fn advance(&mut self, steps: i64) {
        let n = self.turn_order.len() as i64;
        let current = self.turn_index as i64;
        self.turn_index = (current + self.direction as i64 * steps).rem_euclid(n) as usize;
    }

    fn top(&self) -> Card {
        *self.discard_pile.last().expect("discard pile always has a top card once dealt")
    }
}

pub struct CardHandManager {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceHub>,
    lobbies: LobbyManager<CardHandState>,
}

impl CardHandManager {
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<PresenceHub>) -> Self {
        CardHandManager {
            registry,
            presence,
            lobbies: LobbyManager::new(MIN_PLAYERS),
        }
    }

    async fn send_to(&self, user: &str, message: CardHandMessage) {
        self.registry.send_to(user, &env(Payload::CardHand(message))).await;
    }

    async fn broadcast(&self, lobby: &Lobby<CardHandState>, message: CardHandMessage) {
        let envelope = env(Payload::CardHand(message));
        for member in &lobby.members {
            self.registry.send_to(member, &envelope).await;
        }
    }

    async fn broadcast_lobby_state(&self, lobby: &Lobby<CardHandState>) {
        self.broadcast(lobby, CardHandMessage::LobbyState(lobby.descriptor())).await;
    }

    pub async fn create(&self, host: &str, host_display: &str, name: String, max_players: usize) {
        let max_players = max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        if let Ok(lobby) = self
            .lobbies
            .create(host, host_display, name, max_players, CardHandState::default())
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
                self.finish_game(lobby.id.clone(), None).await;
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
        let turn_order = lobby.members.clone();

        self.lobbies
            .mutate(&lobby.id, |lobby| {
                let mut deck = generate_deck();
                deck.shuffle(&mut rand::thread_rng());

                let mut hands = HashMap::new();
                for member in &turn_order {
                    let hand = deck.split_off(deck.len() - HAND_SIZE);
                    hands.insert(member.clone(), hand);
                }

                let mut top = deck.pop().expect("deck has cards left after dealing hands");
                while top.value == Value::WildDrawFour {
                    deck.insert(0, top);
                    deck.shuffle(&mut rand::thread_rng());
                    top = deck.pop().expect("deck has cards left after dealing hands");
                }
                let current_color = top.color.or_else(|| COLORS.choose(&mut rand::thread_rng()).copied());

                lobby.state.draw_pile = deck;
                lobby.state.discard_pile = vec![top];
                lobby.state.hands = hands;
                lobby.state.turn_order = turn_order.clone();
                lobby.state.turn_index = 0;
                lobby.state.direction = 1;
                lobby.state.current_color = current_color;
                lobby.state.awaiting_color_choice = false;
            })
            .await;

        self.broadcast_lobby_state(&lobby).await;
        for member in &lobby.members {
            self.presence.set_in_game(member, &lobby.id, "the lobby").await;
        }
        self.broadcast_hands(&lobby.id).await;
    }

    async fn broadcast_hands(&self, lobby_id: &str) {
        let Some(lobby) = self.lobbies.get(lobby_id).await else {
            return;
        };
        let opponent_counts: HashMap<String, usize> =
            lobby.state.hands.iter().map(|(user, hand)| (user.clone(), hand.len())).collect();
        let top_card = lobby.state.top();
        let turn = lobby.state.turn_order[lobby.state.turn_index].clone();
        for member in &lobby.members {
            self.send_to(
                member,
                CardHandMessage::HandUpdate {
                    game_id: lobby_id.to_string(),
                    your_hand: lobby.state.hands.get(member).cloned().unwrap_or_default(),
                    opponent_counts: opponent_counts.clone(),
                    top_card,
                    current_color: lobby.state.current_color.unwrap_or(Color::Red),
                    turn: turn.clone(),
                    direction: lobby.state.direction,
                    awaiting_color_choice: lobby.state.awaiting_color_choice,
                },
            )
            .await;
        }
    }

    pub async fn play_card(self: &Arc<Self>, user: &str, lobby_id: &str, card_id: u32) {
        enum Outcome {
            Rejected,
            Continue,
            AwaitingColor,
            Winner(String),
        }

        let outcome = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                if state.awaiting_color_choice || state.turn_order.get(state.turn_index).map(|s| s.as_str()) != Some(user) {
                    return Outcome::Rejected;
                }
                let Some(hand) = state.hands.get(user) else {
                    return Outcome::Rejected;
                };
                let Some(pos) = hand.iter().position(|c| c.id == card_id) else {
                    return Outcome::Rejected;
                };
                let current_color = state.current_color.unwrap_or(Color::Red);
                let top_value = state.top().value;
                let card = hand[pos];
                if !is_legal_play(&card, current_color, top_value) {
                    return Outcome::Rejected;
                }

                let hand = state.hands.get_mut(user).expect("checked above");
                hand.remove(pos);
                let hand_empty = hand.is_empty();
                state.discard_pile.push(card);

                let two_player = state.turn_order.len() == 2;
                match card.value {
                    Value::Wild | Value::WildDrawFour => {
                        state.awaiting_color_choice = true;
                        if card.value == Value::WildDrawFour {
                            let next = (state.turn_index as i64 + state.direction as i64).rem_euclid(state.turn_order.len() as i64) as usize;
                            let victim = state.turn_order[next].clone();
                            let drawn: Vec<Card> = (0..4).map(|_| state.draw_one()).collect();
                            state.hands.entry(victim).or_default().extend(drawn);
                        }
                        return Outcome::AwaitingColor;
                    }
                    Value::Reverse => {
                        if two_player {
                            state.advance(2);
                        } else {
                            state.direction *= -1;
                            state.advance(1);
                        }
                    }
                    Value::Skip => state.advance(2),
                    Value::DrawTwo => {
                        let next = (state.turn_index as i64 + state.direction as i64).rem_euclid(state.turn_order.len() as i64) as usize;
                        let victim = state.turn_order[next].clone();
                        let drawn: Vec<Card> = (0..2).map(|_| state.draw_one()).collect();
                        state.hands.entry(victim).or_default().extend(drawn);
                        state.advance(2);
                    }
                    Value::Number(_) => state.advance(1),
                }
                state.current_color = card.color;

                if hand_empty {
                    Outcome::Winner(user.to_string())
                } else {
                    Outcome::Continue
                }
            })
            .await;

        match outcome {
            None | Some((Outcome::Rejected, _)) => {}
            Some((Outcome::Continue, _)) | Some((Outcome::AwaitingColor, _)) => {
                self.broadcast_hands(lobby_id).await;
            }
            Some((Outcome::Winner(winner), _)) => {
                self.finish_game(lobby_id.to_string(), Some(winner)).await;
            }
        }
    }

    pub async fn choose_color(self: &Arc<Self>, user: &str, lobby_id: &str, color: Color) {
        let result = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                if !state.awaiting_color_choice || state.turn_order.get(state.turn_index).map(|s| s.as_str()) != Some(user) {
                    return false;
                }
                state.awaiting_color_choice = false;
                state.current_color = Some(color);
                if let Some(top) = state.discard_pile.last_mut() {
                    top.color = Some(color);
                }
                let drew_four = state.discard_pile.last().map(|c| c.value) == Some(Value::WildDrawFour);
                state.advance(if drew_four { 2 } else { 1 });
                true
            })
            .await;

        if matches!(result, Some((true, _))) {
            self.broadcast_hands(lobby_id).await;
        }
    }

    pub async fn draw_card(self: &Arc<Self>, user: &str, lobby_id: &str) {
        let drew = self
            .lobbies
            .mutate(lobby_id, |lobby| {
                let state = &mut lobby.state;
                if state.awaiting_color_choice || state.turn_order.get(state.turn_index).map(|s| s.as_str()) != Some(user) {
                    return false;
                }
                let card = state.draw_one();
                state.hands.entry(user.to_string()).or_default().push(card);
                state.advance(1);
                true
            })
            .await;

        if matches!(drew, Some((true, _))) {
            self.broadcast_hands(lobby_id).await;
        }
    }

    async fn finish_game(self: &Arc<Self>, lobby_id: String, winner: Option<String>) {
        let Some(lobby) = self.lobbies.get(&lobby_id).await else {
            return;
        };
        if let Some(winner) = winner {
            self.broadcast(&lobby, CardHandMessage::GameOver { game_id: lobby_id.clone(), winner }).await;
        }
        for member in &lobby.members {
            self.presence.clear_in_game(member).await;
        }
        if let Some(reset) = self.lobbies.reset_for_replay(&lobby_id, CardHandState::default()).await {
            self.broadcast_lobby_state(&reset).await;
        }
    }
}
