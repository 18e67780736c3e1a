//! Continuous territory-painting arena engine (§4.7).
//!
//! One tick-loop task runs per process, spawned lazily on the first join and
//! exiting once the player set drains, rather than running continuously from
//! server startup whether or not anyone is playing.

use crate::session::SessionRegistry;
use crate::wire::env;
use proto::arena::{claimable_cells, detect_head_on_collisions, ArenaMessage, Cell, CellDiff, Direction, PlayerView, GRID_HEIGHT, GRID_WIDTH, TICK_MS};
use proto::envelope::Payload;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

const PALETTE: &[(u8, u8, u8)] = &[
    (230, 25, 75),
    (60, 180, 75),
    (255, 225, 25),
    (0, 130, 200),
    (245, 130, 48),
    (145, 30, 180),
    (70, 240, 240),
    (240, 50, 230),
];

struct PlayerState {
    position: Cell,
    direction: Direction,
    alive: bool,
    color: (u8, u8, u8),
    trail: Vec<Cell>,
}

struct Inner {
    owners: Vec<Option<String>>,
    players: HashMap<String, PlayerState>,
    inputs: HashMap<String, Direction>,
    tick_running: bool,
}

impl Inner {
    fn index(&self, cell: Cell) -> usize {
        cell.1 as usize * GRID_WIDTH + cell.0 as usize
    }

    fn player_view(&self, username: &str, player: &PlayerState) -> PlayerView {
        PlayerView {
            username: username.to_string(),
            position: player.position,
            color: player.color,
            trail: player.trail.clone(),
            score: self.owners.iter().filter(|o| o.as_deref() == Some(username)).count(),
            alive: player.alive,
        }
    }
}

pub struct ArenaEngine {
    registry: Arc<SessionRegistry>,
    inner: Mutex<Inner>,
}

impl ArenaEngine {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        ArenaEngine {
            registry,
            inner: Mutex::new(Inner {
                owners: vec![None; GRID_WIDTH * GRID_HEIGHT],
                players: HashMap::new(),
                inputs: HashMap::new(),
                tick_running: false,
            }),
        }
    }

    async fn send_to(&self, user: &str, message: ArenaMessage) {
        self.registry.send_to(user, &env(Payload::Arena(message))).await;
    }

    pub async fn join(self: &Arc<Self>, username: &str) {
        let mut inner = self.inner.lock().await;
        if inner.players.contains_key(username) {
            return;
        }
        let used_colors: Vec<(u8, u8, u8)> = inner.players.values().map(|p| p.color).collect();
        let (color, spawn_x, spawn_y) = {
            let mut rng = rand::thread_rng();
            let color = PALETTE
                .iter()
                .copied()
                .find(|c| !used_colors.contains(c))
                .unwrap_or_else(|| (rng.gen(), rng.gen(), rng.gen()));
            let spawn_x = rng.gen_range(3, GRID_WIDTH as i32 - 3);
            let spawn_y = rng.gen_range(3, GRID_HEIGHT as i32 - 3);
            (color, spawn_x, spawn_y)
        };
        let position = (spawn_x, spawn_y);

        let mut diffs = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                let cell = (spawn_x + dx, spawn_y + dy);
                let idx = inner.index(cell);
                inner.owners[idx] = Some(username.to_string());
                diffs.push(CellDiff { cell, owner: Some(username.to_string()) });
            }
        }

        inner.players.insert(
            username.to_string(),
            PlayerState { position, direction: Direction::Right, alive: true, color, trail: Vec::new() },
        );

        let snapshot = ArenaMessage::Snapshot {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            owners: inner.owners.clone(),
            players: inner.players.iter().map(|(u, p)| inner.player_view(u, p)).collect(),
        };
        let needs_spawn = !inner.tick_running;
        if needs_spawn {
            inner.tick_running = true;
        }
        drop(inner);

        self.send_to(username, ArenaMessage::GameInfo { width: GRID_WIDTH, height: GRID_HEIGHT, tick_ms: TICK_MS }).await;
        self.send_to(username, snapshot).await;
        self.broadcast_diffs(diffs).await;

        if needs_spawn {
            let engine = self.clone();
            tokio::spawn(async move { engine.run_tick_loop().await });
        }
    }

    pub async fn leave(&self, username: &str) {
        let diffs = {
            let mut inner = self.inner.lock().await;
            let Some(_) = inner.players.remove(username) else {
                return;
            };
            inner.inputs.remove(username);
            self.clear_ownership(&mut inner, username)
        };
        self.broadcast_diffs(diffs).await;
    }

    fn clear_ownership(&self, inner: &mut Inner, username: &str) -> Vec<CellDiff> {
        let mut diffs = Vec::new();
        for (idx, owner) in inner.owners.iter_mut().enumerate() {
            if owner.as_deref() == Some(username) {
                *owner = None;
                let cell = ((idx % GRID_WIDTH) as i32, (idx / GRID_WIDTH) as i32);
                diffs.push(CellDiff { cell, owner: None });
            }
        }
        diffs
    }

    pub async fn input(&self, username: &str, direction: Direction) {
        let mut inner = self.inner.lock().await;
        let Some(player) = inner.players.get(username) else {
            return;
        };
        if direction.is_opposite(player.direction) {
            return;
        }
        inner.inputs.insert(username.to_string(), direction);
    }

    async fn broadcast_diffs(&self, diffs: Vec<CellDiff>) {
        if diffs.is_empty() {
            return;
        }
        let inner = self.inner.lock().await;
        let players: Vec<PlayerView> = inner.players.iter().map(|(u, p)| inner.player_view(u, p)).collect();
        let usernames: Vec<String> = inner.players.keys().cloned().collect();
        drop(inner);
        let envelope = env(Payload::Arena(ArenaMessage::State { players, diffs }));
        for user in &usernames {
            self.registry.send_to(user, &envelope).await;
        }
    }

    async fn run_tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let empty = self.tick().await;
            if empty {
                let mut inner = self.inner.lock().await;
                if inner.players.is_empty() {
                    inner.tick_running = false;
                    return;
                }
            }
        }
    }

    /// Runs one tick; returns `true` if the player set is now empty.
    async fn tick(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.players.is_empty() {
            return true;
        }

        for (username, direction) in inner.inputs.drain().collect::<Vec<_>>() {
            if let Some(player) = inner.players.get_mut(&username) {
                player.direction = direction;
            }
        }

        let mut proposed: HashMap<String, Cell> = HashMap::new();
        let mut dead: Vec<String> = Vec::new();
        for (username, player) in inner.players.iter() {
            if !player.alive {
                continue;
            }
            let (dx, dy) = player.direction.delta();
            let next = (player.position.0 + dx, player.position.1 + dy);
            if !proto::arena::in_bounds(next, GRID_WIDTH, GRID_HEIGHT) {
                dead.push(username.clone());
            } else {
                proposed.insert(username.clone(), next);
            }
        }

        for collided in detect_head_on_collisions(&proposed) {
            proposed.remove(&collided);
            dead.push(collided);
        }

        let mut order: Vec<String> = proposed.keys().cloned().collect();
        order.sort();

        let mut diffs = Vec::new();
        for username in order {
            if dead.contains(&username) {
                continue;
            }
            let next = proposed[&username];

            let trail_owner = inner.players.iter().find_map(|(owner, p)| {
                if owner != &username && p.trail.contains(&next) { Some(owner.clone()) } else { None }
            });

            let own_trail_hit = inner.players.get(&username).map(|p| p.trail.contains(&next)).unwrap_or(false);
            if own_trail_hit {
                dead.push(username.clone());
                continue;
            }

            if let Some(victim) = trail_owner {
                let victim_trail = inner.players.get(&victim).map(|p| p.trail.clone()).unwrap_or_default();
                for cell in &victim_trail {
                    let idx = inner.index(*cell);
                    inner.owners[idx] = Some(username.clone());
                    diffs.push(CellDiff { cell: *cell, owner: Some(username.clone()) });
                }
                for owner in inner.owners.iter_mut() {
                    if owner.as_deref() == Some(victim.as_str()) {
                        *owner = Some(username.clone());
                    }
                }
                dead.push(victim.clone());
            }

            inner.players.get_mut(&username).expect("mover still present").position = next;

            let idx = inner.index(next);
            let owns_cell = inner.owners[idx].as_deref() == Some(username.as_str());
            let has_trail = !inner.players[&username].trail.is_empty();

            if owns_cell && has_trail {
                diffs.extend(self.close_loop(&mut inner, &username));
            } else {
                inner.players.get_mut(&username).expect("mover still present").trail.push(next);
            }
        }

        for username in &dead {
            let cleared = self.clear_ownership(&mut inner, username);
            diffs.extend(cleared);
            inner.players.remove(username);
        }

        let players: Vec<PlayerView> = inner.players.iter().map(|(u, p)| inner.player_view(u, p)).collect();
        let recipients: Vec<String> = inner.players.keys().cloned().collect();
        let is_empty = inner.players.is_empty();
        drop(inner);

        for username in &dead {
            self.send_to(username, ArenaMessage::Death).await;
        }
        let envelope = env(Payload::Arena(ArenaMessage::State { players, diffs }));
        for user in &recipients {
            self.registry.send_to(user, &envelope).await;
        }

        is_empty
    }

    /// Claims every cell enclosed by the mover's territory plus trail, per
    /// the flood-fill rule in §4.7, and resets the trail.
    fn close_loop(&self, inner: &mut Inner, username: &str) -> Vec<CellDiff> {
        let mut solid = vec![false; GRID_WIDTH * GRID_HEIGHT];
        for (idx, owner) in inner.owners.iter().enumerate() {
            if owner.as_deref() == Some(username) {
                solid[idx] = true;
            }
        }
        let trail = inner.players[username].trail.clone();
        for cell in &trail {
            let idx = inner.index(*cell);
            solid[idx] = true;
        }

        let claimable = claimable_cells(GRID_WIDTH, GRID_HEIGHT, &solid);
        let mut diffs = Vec::new();

        for cell in &trail {
            let idx = inner.index(*cell);
            if inner.owners[idx].as_deref() != Some(username) {
                inner.owners[idx] = Some(username.to_string());
                diffs.push(CellDiff { cell: *cell, owner: Some(username.to_string()) });
            }
        }
        for (idx, &claimed) in claimable.iter().enumerate() {
            if claimed && inner.owners[idx].as_deref() != Some(username) {
                inner.owners[idx] = Some(username.to_string());
                let cell = ((idx % GRID_WIDTH) as i32, (idx / GRID_WIDTH) as i32);
                diffs.push(CellDiff { cell, owner: Some(username.to_string()) });
            }
        }

        inner.players.get_mut(username).expect("mover still present").trail.clear();
        diffs
    }
}
