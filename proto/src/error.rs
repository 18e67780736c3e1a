//! Errors surfaced while decoding or encoding wire envelopes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown packet type tag: {0}")]
    UnknownPacketType(i32),

    #[error("payload for packet type {packet_type:?} did not match its schema: {source}")]
    PayloadMismatch {
        packet_type: crate::envelope::PacketType,
        source: serde_json::Error,
    },
}
