//! Opaque id generation for sessions, blobs, lobbies, and groups.
//!
//! Short-lived, low-cardinality ids could get by with an `AtomicU64` counter,
//! but ids that leave the process lifetime or need to be unguessable (blob
//! ids, group ids, session ids, lobby ids) are random alphanumeric strings
//! instead, built on the same `rand` dependency already pulled in elsewhere
//! for shuffling.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generates a random, URL-safe opaque id of the given length.
pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .collect()
}

pub fn session_id() -> String {
    random_id(24)
}

pub fn blob_id() -> String {
    random_id(24)
}

pub fn lobby_id() -> String {
    random_id(12)
}

pub fn group_id() -> String {
    random_id(16)
}

pub fn game_id() -> String {
    random_id(12)
}
