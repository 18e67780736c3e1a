//! One manager per game kind, each plugged either into the generic
//! `lobby::LobbyManager` (draw-and-guess, telephone, card-hand, card-betting)
//! or, for the two invite-based 1v1 games, a purpose-built pending-invite map
//! that mirrors the same single-mutex-per-manager discipline (§4.5, §4.6.1,
//! §4.6.6).

pub mod card_betting;
pub mod card_hand;
pub mod draw_guess;
pub mod rps;
pub mod telephone;
pub mod tictactoe;
