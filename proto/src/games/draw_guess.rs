//! Draw-and-guess / Pictionary-style game (§4.6.2).

use crate::lobby::LobbyDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed word-list languages supported by the draw-and-guess manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    En,
    Tr,
}

/// Points a correct guesser earns, scaled by time remaining.
///
/// `max(10, t * 100 / T)` per §4.6.2 step 4 and the testable property in §8.
pub fn guesser_points(time_left_secs: u32, round_secs: u32) -> u32 {
    let scaled = (time_left_secs as u64) * 100 / (round_secs.max(1) as u64);
    scaled.max(10) as u32
}

/// Fixed bonus the drawer earns for every correct guess.
pub const DRAWER_POINTS: u32 = 25;

/// How many non-space characters the half-time hint reveals: `max(1, ceil(L/3))`.
pub fn hint_reveal_count(word_len: usize) -> usize {
    ((word_len + 2) / 3).max(1)
}

/// Builds the initial hint mask: every non-space character becomes `_`,
/// spaces pass through unchanged.
pub fn initial_hint_mask(word: &str) -> Vec<char> {
    word.chars()
        .map(|c| if c.is_whitespace() { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DrawGuessMessage {
    Create { name: String, max_players: usize, language: Language, round_secs: u32 },
    Join { lobby_id: String },
    Leave,
    Start,

    StartRound { language: Language },

    /// Broadcast on a 10s cadence, plus every second in the final 5s (§4.6.2).
    RoundState {
        game_id: String,
        drawer: String,
        hint_mask: String,
        time_left_secs: u32,
        round_secs: u32,
        scores: HashMap<String, u32>,
    },

    /// Opaque drawing stroke, relayed verbatim from the drawer to everyone else.
    DrawData { game_id: String, stroke: serde_json::Value },

    ClearCanvas { game_id: String },

    /// A guess submitted by a non-drawer.
    ChatGuess { game_id: String, text: String },

    /// A wrong guess, relayed to all members as a chat line (step 5).
    GuessRelayed { game_id: String, from: String, text: String },

    CorrectGuess {
        game_id: String,
        guesser: String,
        scores: HashMap<String, u32>,
    },

    WordReveal { game_id: String, word: String },

    GameOver { game_id: String, scores: HashMap<String, u32> },

    LobbyState(LobbyDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scoring_example_from_spec() {
        // 45s left of a 60s round -> 75 points, matching scenario 4 in §8.
        assert_eq!(guesser_points(45, 60), 75);
    }

    #[test]
    fn scoring_has_a_floor_of_ten() {
        assert_eq!(guesser_points(1, 600), 10);
        assert_eq!(guesser_points(0, 60), 10);
    }

    #[test]
    fn hint_count_matches_spec_example() {
        // "pizza" has length 5: ceil(5/3) = 2.
        assert_eq!(hint_reveal_count(5), 2);
        assert_eq!(hint_reveal_count(1), 1);
        assert_eq!(hint_reveal_count(2), 1);
    }

    #[test]
    fn initial_mask_hides_only_non_space_chars() {
        let mask = initial_hint_mask("ice cream");
        let rendered: String = mask.into_iter().collect();
        assert_eq!(rendered, "___ _____");
    }
}
