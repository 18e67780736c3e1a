//! Tiny helper for building server-originated envelopes with a fresh id and
//! timestamp, used by every handler and game manager.

use crate::ids;
use crate::presence::now_ms;
use proto::envelope::{Envelope, Payload};

pub fn env(payload: Payload) -> Envelope {
    Envelope::new(ids::random_id(12), now_ms(), payload)
}
