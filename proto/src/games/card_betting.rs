//! Dealer-vs-players card-betting game with a standard scored hand value (§4.6.5).

use crate::lobby::LobbyDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

pub const SUITS: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

pub const RANKS: [Rank; 13] = [
    Rank::Ace,
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
];

impl Rank {
    fn base_value(self) -> u32 {
        match self {
            Rank::Ace => 11,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

pub fn generate_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &SUITS {
        for &rank in &RANKS {
            deck.push(Card { rank, suit });
        }
    }
    deck
}

/// Aces count as 11 and are downgraded to 1, one at a time, while the total
/// exceeds 21 (§4.6.5).
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(|c| c.rank.base_value()).sum();
    let mut aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    while total > 21 && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    total
}

pub fn is_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && hand_value(cards) == 21
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Bust,
    Natural,
    Win,
    Push,
    Lose,
}

/// Determines a player's outcome against the settled dealer hand.
pub fn settle(player_total: u32, player_natural: bool, dealer_total: u32, dealer_natural: bool) -> Outcome {
    if player_total > 21 {
        return Outcome::Bust;
    }
    if player_natural && !dealer_natural {
        return Outcome::Natural;
    }
    if dealer_total > 21 || player_total > dealer_total {
        return Outcome::Win;
    }
    if player_total == dealer_total {
        return Outcome::Push;
    }
    Outcome::Lose
}

/// Net balance change for a settled bet (negative on a loss).
pub fn payout(bet: u32, outcome: Outcome) -> i64 {
    match outcome {
        Outcome::Bust | Outcome::Lose => -(bet as i64),
        Outcome::Natural => (bet as i64 * 3) / 2,
        Outcome::Win => bet as i64,
        Outcome::Push => 0,
    }
}

pub const STARTING_BALANCE: u32 = 1000;
pub const MIN_BET: u32 = 5;
pub const DEALER_STAND_THRESHOLD: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Hit,
    Stand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CardBettingMessage {
    Create { name: String, max_players: usize },
    Join { lobby_id: String },
    Leave,
    Start,

    BettingPhase { game_id: String, balances: HashMap<String, u32> },

    PlaceBet { game_id: String, amount: u32 },

    Dealing {
        game_id: String,
        your_hand: Vec<Card>,
        dealer_up_card: Card,
    },

    Action { game_id: String, action: PlayerAction },

    DealerTurn { game_id: String, dealer_hand: Vec<Card>, dealer_total: u32 },

    RoundResult {
        game_id: String,
        outcomes: HashMap<String, Outcome>,
        balances: HashMap<String, u32>,
        scores: HashMap<String, u32>,
    },

    NextRound { game_id: String },

    LobbyState(LobbyDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn card(rank: Rank) -> Card {
        Card { rank, suit: Suit::Spades }
    }

    #[test]
    fn ace_counts_as_eleven_until_it_must_not() {
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::King)]), 21);
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::King), card(Rank::Five)]),
            16
        );
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::Ace), card(Rank::Nine)]),
            21
        );
    }

    #[test]
    fn natural_pays_three_to_two() {
        assert_eq!(payout(10, Outcome::Natural), 15);
    }

    #[test]
    fn dealer_bust_wins_even_money() {
        let outcome = settle(18, false, 24, false);
        assert_eq!(outcome, Outcome::Win);
        assert_eq!(payout(10, outcome), 10);
    }

    #[test]
    fn tie_pushes() {
        assert_eq!(settle(19, false, 19, false), Outcome::Push);
    }

    #[test]
    fn bust_loses_regardless_of_dealer() {
        assert_eq!(settle(22, false, 18, false), Outcome::Bust);
    }
}
