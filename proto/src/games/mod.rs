//! One module per game kind, each plugged into the generic lobby engine (§4.6).

pub mod card_betting;
pub mod card_hand;
pub mod draw_guess;
pub mod rps;
pub mod telephone;
pub mod tictactoe;
