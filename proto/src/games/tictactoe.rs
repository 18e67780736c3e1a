//! Head-to-head grid game (§4.6.1).

use crate::lobby::LobbyDescriptor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub type Board = [Option<Mark>; 9];

/// Returns the winning line and mark if the board has one.
pub fn find_win(board: &Board) -> Option<([usize; 3], Mark)> {
    WIN_LINES.iter().find_map(|&line| {
        let [a, b, c] = line;
        match (board[a], board[b], board[c]) {
            (Some(m1), Some(m2), Some(m3)) if m1 == m2 && m2 == m3 => Some((line, m1)),
            _ => None,
        }
    })
}

/// A draw is a full board with no winner.
pub fn is_draw(board: &Board) -> bool {
    board.iter().all(Option::is_some) && find_win(board).is_none()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TicTacToeMessage {
    /// Invite another user to a head-to-head match.
    Invite { to: String },

    /// Delivered to the invitee.
    InviteReceived { game_id: String, from: String },

    InviteAccepted { game_id: String },

    InviteDeclined { game_id: String },

    /// Attach as a spectator to an in-progress game by id.
    Spectate { game_id: String },

    /// Full board snapshot, sent to both players, any spectators that join,
    /// and re-sent after every accepted move.
    State {
        game_id: String,
        board: Board,
        side_to_move: Mark,
        finished: bool,
        win_line: Option<[usize; 3]>,
        player_x: String,
        player_o: String,
    },

    /// Submit a move in the cell index `0..9`.
    Move { game_id: String, cell: usize },

    GameOver {
        game_id: String,
        board: Board,
        win_line: Option<[usize; 3]>,
        winner: Option<String>,
    },

    LobbyState(LobbyDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn detects_a_row_win() {
        let mut board: Board = [None; 9];
        board[0] = Some(Mark::X);
        board[1] = Some(Mark::X);
        board[2] = Some(Mark::X);
        assert_eq!(find_win(&board), Some(([0, 1, 2], Mark::X)));
    }

    #[test]
    fn full_board_with_no_line_is_a_draw() {
        // X O X / X O O / O X X
        let board: Board = [
            Some(Mark::X),
            Some(Mark::O),
            Some(Mark::X),
            Some(Mark::X),
            Some(Mark::O),
            Some(Mark::O),
            Some(Mark::O),
            Some(Mark::X),
            Some(Mark::X),
        ];
        assert!(is_draw(&board));
    }

    #[test]
    fn empty_board_is_not_a_draw() {
        assert!(!is_draw(&[None; 9]));
    }
}
