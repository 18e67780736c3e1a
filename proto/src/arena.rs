//! Territory-painting arena engine wire types and pure grid logic (§4.7).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

pub const GRID_WIDTH: usize = 50;
pub const GRID_HEIGHT: usize = 50;
pub const TICK_MS: u64 = 150;

pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Up, Direction::Down)
                | (Direction::Down, Direction::Up)
                | (Direction::Left, Direction::Right)
                | (Direction::Right, Direction::Left)
        )
    }
}

pub fn in_bounds(cell: Cell, width: usize, height: usize) -> bool {
    cell.0 >= 0 && cell.1 >= 0 && (cell.0 as usize) < width && (cell.1 as usize) < height
}

fn index(cell: Cell, width: usize) -> usize {
    cell.1 as usize * width + cell.0 as usize
}

/// Flood-fills from every border cell through non-solid cells, then returns
/// the set of non-solid cells the fill could *not* reach — the cells a loop
/// closure claims (§4.7 "Loop closure", §8 testable property).
///
/// `solid` marks cells that block the fill (a mover's own territory plus
/// their trail). Flattened row-major, length `width * height`.
pub fn claimable_cells(width: usize, height: usize, solid: &[bool]) -> Vec<bool> {
    assert_eq!(solid.len(), width * height);

    let mut reached = vec![false; width * height];
    let mut queue = VecDeque::new();

    let mut seed = |x: i32, y: i32, reached: &mut Vec<bool>, queue: &mut VecDeque<Cell>| {
        let cell = (x, y);
        let idx = index(cell, width);
        if !solid[idx] && !reached[idx] {
            reached[idx] = true;
            queue.push_back(cell);
        }
    };

    for x in 0..width as i32 {
        seed(x, 0, &mut reached, &mut queue);
        seed(x, height as i32 - 1, &mut reached, &mut queue);
    }
    for y in 0..height as i32 {
        seed(0, y, &mut reached, &mut queue);
        seed(width as i32 - 1, y, &mut reached, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
            let next = (x + dx, y + dy);
            if !in_bounds(next, width, height) {
                continue;
            }
            let idx = index(next, width);
            if !solid[idx] && !reached[idx] {
                reached[idx] = true;
                queue.push_back(next);
            }
        }
    }

    (0..width * height)
        .map(|idx| !solid[idx] && !reached[idx])
        .collect()
}

/// Returns the set of usernames whose proposed next cell collides with at
/// least one other player's proposed next cell this tick (§4.7 step 3, §8
/// testable property: "Arena head-on").
pub fn detect_head_on_collisions(proposed: &HashMap<String, Cell>) -> HashSet<String> {
    let mut by_cell: HashMap<Cell, Vec<&String>> = HashMap::new();
    for (user, &cell) in proposed {
        by_cell.entry(cell).or_default().push(user);
    }
    by_cell
        .into_iter()
        .filter(|(_, users)| users.len() > 1)
        .flat_map(|(_, users)| users.into_iter().cloned())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub username: String,
    pub position: Cell,
    pub color: (u8, u8, u8),
    pub trail: Vec<Cell>,
    pub score: usize,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiff {
    pub cell: Cell,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArenaMessage {
    Join,
    Leave,
    Input { direction: Direction },

    /// Sent once to a new joiner before they're added to the broadcast set (§4.7).
    Snapshot {
        width: usize,
        height: usize,
        owners: Vec<Option<String>>,
        players: Vec<PlayerView>,
    },

    /// Per-tick broadcast to every remaining player.
    State { players: Vec<PlayerView>, diffs: Vec<CellDiff> },

    Death,

    GameInfo { width: usize, height: usize, tick_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_grid_has_no_claimable_cells() {
        let solid = vec![false; GRID_WIDTH * GRID_HEIGHT];
        let claimable = claimable_cells(GRID_WIDTH, GRID_HEIGHT, &solid);
        assert!(claimable.iter().all(|&c| !c));
    }

    #[test]
    fn closed_ring_claims_its_interior() {
        // 5x5 grid, solid ring around the border of a 3x3 interior square,
        // i.e. cells (1,1)..(3,3) form a hollow box; the single interior
        // cell (2,2) should be claimable.
        let w = 5;
        let h = 5;
        let mut solid = vec![false; w * h];
        let ring: [(i32, i32); 8] = [
            (1, 1), (2, 1), (3, 1),
            (1, 2),         (3, 2),
            (1, 3), (2, 3), (3, 3),
        ];
        for &cell in &ring {
            solid[index(cell, w)] = true;
        }

        let claimable = claimable_cells(w, h, &solid);
        assert!(claimable[index((2, 2), w)], "interior cell must be claimable");

        // No border or ring cell is claimable.
        assert!(!claimable[index((0, 0), w)]);
        for &cell in &ring {
            assert!(!claimable[index(cell, w)]);
        }
    }

    #[test]
    fn head_on_collision_detects_all_contenders() {
        let mut proposed = HashMap::new();
        proposed.insert("p1".to_string(), (11, 10));
        proposed.insert("p2".to_string(), (11, 10));
        proposed.insert("p3".to_string(), (20, 20));

        let dead = detect_head_on_collisions(&proposed);
        assert_eq!(dead.len(), 2);
        assert!(dead.contains("p1"));
        assert!(dead.contains("p2"));
        assert!(!dead.contains("p3"));
    }

    #[test]
    fn no_collision_when_all_cells_distinct() {
        let mut proposed = HashMap::new();
        proposed.insert("p1".to_string(), (1, 1));
        proposed.insert("p2".to_string(), (2, 2));
        assert!(detect_head_on_collisions(&proposed).is_empty());
    }
}
