//! Color-and-value matching card game with wilds, reversal, and skips (§4.6.4).

use crate::lobby::LobbyDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Yellow,
    Green,
    Blue,
}

pub const COLORS: [Color; 4] = [Color::Red, Color::Yellow, Color::Green, Color::Blue];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl Value {
    pub fn is_wild(self) -> bool {
        matches!(self, Value::Wild | Value::WildDrawFour)
    }
}

/// A single card instance. `color` is `None` only for an unplayed/un-chosen
/// wild; every colored card (including a wild after `ChooseColor`) always
/// carries `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: u32,
    pub color: Option<Color>,
    pub value: Value,
}

/// Builds the full 108-card deck: four colors x {one 0, two of each 1-9, two
/// Skip/Reverse/DrawTwo} plus four Wild and four WildDrawFour.
pub fn generate_deck() -> Vec<Card> {
    let mut id = 0u32;
    let mut next_id = || {
        let v = id;
        id += 1;
        v
    };

    let mut deck = Vec::with_capacity(108);
    for &color in &COLORS {
        deck.push(Card { id: next_id(), color: Some(color), value: Value::Number(0) });
        for n in 1..=9u8 {
            for _ in 0..2 {
                deck.push(Card { id: next_id(), color: Some(color), value: Value::Number(n) });
            }
        }
        for value in [Value::Skip, Value::Reverse, Value::DrawTwo] {
            for _ in 0..2 {
                deck.push(Card { id: next_id(), color: Some(color), value });
            }
        }
    }
    for _ in 0..4 {
        deck.push(Card { id: next_id(), color: None, value: Value::Wild });
    }
    for _ in 0..4 {
        deck.push(Card { id: next_id(), color: None, value: Value::WildDrawFour });
    }

    deck
}

/// A card is legal iff it matches the current color, matches the top card's
/// value, or is a wild (§4.6.4, §8 testable property).
pub fn is_legal_play(card: &Card, current_color: Color, top_value: Value) -> bool {
    card.value.is_wild() || card.color == Some(current_color) || card.value == top_value
}

/// Recycles the draw pile when it empties: keeps the current top of discard,
/// shuffles the rest back into a fresh draw pile (caller shuffles), and
/// resets every wild's chosen color back to `None`.
///
/// Returns `(new_top, cards_to_reshuffle)`.
pub fn recycle_discard(mut discard_pile: Vec<Card>) -> (Card, Vec<Card>) {
    let top = discard_pile
        .pop()
        .expect("discard pile always retains at least the current top card");
    for card in discard_pile.iter_mut() {
        if card.value.is_wild() {
            card.color = None;
        }
    }
    (top, discard_pile)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CardHandMessage {
    Create { name: String, max_players: usize },
    Join { lobby_id: String },
    Leave,
    Start,

    /// Play a card from hand. `chosen_color` is ignored unless the card is a wild.
    PlayCard { game_id: String, card_id: u32 },

    /// Follow-up to a wild play, per the two-step protocol preserved from the
    /// source (§9 Open Questions).
    ChooseColor { game_id: String, color: Color },

    /// Voluntarily draw, ending the turn.
    DrawCard { game_id: String },

    /// Personalized per-recipient view: every opponent's card *count* only,
    /// the recipient's own hand in full (§4.6.4).
    HandUpdate {
        game_id: String,
        your_hand: Vec<Card>,
        opponent_counts: HashMap<String, usize>,
        top_card: Card,
        current_color: Color,
        turn: String,
        direction: i8,
        awaiting_color_choice: bool,
    },

    GameOver { game_id: String, winner: String },

    LobbyState(LobbyDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deck_has_108_cards() {
        assert_eq!(generate_deck().len(), 108);
    }

    #[test]
    fn wild_is_always_legal() {
        let wild = Card { id: 0, color: None, value: Value::Wild };
        assert!(is_legal_play(&wild, Color::Red, Value::Number(5)));
    }

    #[test]
    fn color_match_is_legal_even_with_different_value() {
        let card = Card { id: 1, color: Some(Color::Red), value: Value::Number(3) };
        assert!(is_legal_play(&card, Color::Red, Value::Skip));
    }

    #[test]
    fn value_match_is_legal_even_with_different_color() {
        let card = Card { id: 2, color: Some(Color::Blue), value: Value::Skip };
        assert!(is_legal_play(&card, Color::Red, Value::Skip));
    }

    #[test]
    fn mismatched_card_is_illegal() {
        let card = Card { id: 3, color: Some(Color::Blue), value: Value::Number(4) };
        assert!(!is_legal_play(&card, Color::Red, Value::Number(9)));
    }

    #[test]
    fn recycling_preserves_every_non_top_card_and_resets_wild_colors() {
        let discard = vec![
            Card { id: 0, color: Some(Color::Red), value: Value::Number(1) },
            Card { id: 1, color: Some(Color::Blue), value: Value::Wild },
            Card { id: 2, color: Some(Color::Green), value: Value::Number(2) },
        ];
        let (top, rest) = recycle_discard(discard);
        assert_eq!(top.value, Value::Number(2));
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|c| !c.value.is_wild() || c.color.is_none()));
        assert!(rest.iter().any(|c| c.id == 0));
        assert!(rest.iter().any(|c| c.id == 1));
    }
}
