//! Library surface for the binary in `main.rs`, and the seam integration
//! tests connect through (§6, §8).

pub mod arena;
pub mod config;
pub mod connection;
pub mod file_store;
pub mod files;
pub mod games;
pub mod identity_store;
pub mod ids;
pub mod lan_discovery;
pub mod lobby;
pub mod messaging;
pub mod persistence;
pub mod ping;
pub mod presence;
pub mod router;
pub mod session;
pub mod state;
pub mod wire;
