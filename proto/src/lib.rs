pub mod arena;
pub mod envelope;
pub mod error;
pub mod games;
pub mod identity;
pub mod lobby;
pub mod messages;
pub mod presence;
