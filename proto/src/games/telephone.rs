//! "Telephone" phrase -> drawing -> description -> drawing -> reveal pipeline (§4.6.3).

use crate::lobby::LobbyDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Write,
    Draw1,
    Describe,
    Draw3,
    Reveal,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Write => Some(Phase::Draw1),
            Phase::Draw1 => Some(Phase::Describe),
            Phase::Describe => Some(Phase::Draw3),
            Phase::Draw3 => Some(Phase::Reveal),
            Phase::Reveal => None,
        }
    }
}

/// One step contributed to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Phrase(String),
    /// Opaque base64-encoded drawing bytes, relayed without interpretation.
    Drawing(String),
    Description(String),
}

/// The default placeholder substituted for a timed-out submission (§4.6.3 Invariants).
pub fn placeholder_for(phase: Phase) -> Step {
    match phase {
        Phase::Write => Step::Phrase("...".to_string()),
        Phase::Draw1 | Phase::Draw3 => Step::Drawing(String::new()),
        Phase::Describe => Step::Description("(no description)".to_string()),
        Phase::Reveal => unreachable!("reveal phase never substitutes a step"),
    }
}

/// Initial assignment for the first draw phase: player `i` draws chain `i+1 mod n`.
pub fn initial_draw_assignment(player_count: usize) -> Vec<usize> {
    (0..player_count).map(|i| (i + 1) % player_count).collect()
}

/// Rotates every player's assignment forward by one chain.
pub fn rotate_assignment(assignment: &[usize]) -> Vec<usize> {
    let n = assignment.len();
    assignment.iter().map(|&chain| (chain + 1) % n).collect()
}

/// No player is ever assigned their own chain (player index == chain index).
pub fn no_self_assignment(assignment: &[usize]) -> bool {
    assignment.iter().enumerate().all(|(player, &chain)| player != chain)
}

/// Every chain index appears exactly once: the assignment is a bijection.
pub fn is_bijection(assignment: &[usize]) -> bool {
    let mut seen = HashSet::new();
    assignment.len() > 0 && assignment.iter().all(|&chain| seen.insert(chain))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelephoneMessage {
    Create { name: String, max_players: usize },
    Join { lobby_id: String },
    Leave,
    Start,

    PhaseState {
        game_id: String,
        phase: Phase,
        seconds_left: u32,
    },

    SubmitPhrase { game_id: String, text: String },
    SubmitDrawing { game_id: String, data_base64: String },
    SubmitDescription { game_id: String, text: String },

    /// What the player must work from this phase: the prior step of their
    /// currently assigned chain (nothing, for the write phase).
    YourAssignment { game_id: String, prior_step: Option<Step> },

    /// Host-paced reveal of one chain at a time, owner's phrase synthesized
    /// as the first step (§4.6.3 phase 5).
    ChainResult {
        game_id: String,
        owner: String,
        steps: Vec<Step>,
        is_last: bool,
    },

    AdvanceReveal { game_id: String },

    GameOver { game_id: String },

    LobbyState(LobbyDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn initial_assignment_has_no_self_assignment_and_is_bijective() {
        let assignment = initial_draw_assignment(4);
        assert_eq!(assignment, vec![1, 2, 3, 0]);
        assert!(no_self_assignment(&assignment));
        assert!(is_bijection(&assignment));
    }

    #[test]
    fn rotation_preserves_invariants_across_all_phases() {
        let mut assignment = initial_draw_assignment(5);
        for _ in 0..10 {
            assert!(no_self_assignment(&assignment));
            assert!(is_bijection(&assignment));
            assignment = rotate_assignment(&assignment);
        }
    }
}
