//! The framed wire envelope: `{ "t": <int>, "id": "<string>", "ts": <int ms>, "d": <payload> }`.
//!
//! Frames are newline-terminated UTF-8 JSON objects (see `server::codec`). The
//! envelope itself carries no schema for `d` — the schema is selected by `t`.
//! `Payload::from_value`/`to_value` perform that dispatch explicitly; there is
//! no reflection involved.

use crate::error::ProtoError;
use crate::games::{card_betting::CardBettingMessage, card_hand::CardHandMessage, rps::RpsMessage};
use crate::games::{draw_guess::DrawGuessMessage, telephone::TelephoneMessage, tictactoe::TicTacToeMessage};
use crate::arena::ArenaMessage;
use crate::identity::*;
use crate::messages::*;
use crate::presence::*;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Placeholder payload for packet types that carry no data on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty;

macro_rules! define_payload {
    ($($variant:ident($ty:ty) = $tag:literal),+ $(,)?) => {
        /// Fixed integer tag identifying the schema of an envelope's `d` field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
        #[repr(i32)]
        pub enum PacketType {
            $($variant = $tag,)+
        }

        /// The decoded payload of an envelope, tagged by the matching `PacketType`.
        #[derive(Debug, Clone)]
        pub enum Payload {
            $($variant($ty),)+
        }

        impl Payload {
            pub fn packet_type(&self) -> PacketType {
                match self {
                    $(Payload::$variant(_) => PacketType::$variant,)+
                }
            }

            pub(crate) fn to_value(&self) -> serde_json::Value {
                match self {
                    $(Payload::$variant(inner) => {
                        serde_json::to_value(inner).expect("payload types always serialize")
                    })+
                }
            }

            pub(crate) fn from_value(
                packet_type: PacketType,
                value: serde_json::Value,
            ) -> Result<Self, ProtoError> {
                match packet_type {
                    $(PacketType::$variant => serde_json::from_value(value)
                        .map(Payload::$variant)
                        .map_err(|source| ProtoError::PayloadMismatch { packet_type, source }),)+
                }
            }
        }
    };
}

define_payload! {
    Ping(Empty) = 0,
    Pong(Empty) = 1,
    Register(RegisterRequest) = 2,
    RegisterAck(RegisterAck) = 3,
    Login(LoginRequest) = 4,
    LoginAck(LoginAck) = 5,
    Logout(Empty) = 6,
    Error(ErrorPayload) = 7,
    UserList(UserListPayload) = 8,
    PresenceUpdate(PresenceUpdate) = 9,
    PresenceBroadcast(PresenceBroadcast) = 10,
    ChatMessage(ChatMessage) = 11,
    ChatMessageDelivered(ChatMessageDelivered) = 12,
    ChatTyping(ChatTyping) = 13,
    Nudge(Nudge) = 14,
    CreateGroup(CreateGroupRequest) = 15,
    CreateGroupAck(CreateGroupAck) = 16,
    InviteToGroup(InviteToGroupRequest) = 17,
    GroupInviteReceived(GroupInviteReceived) = 18,
    JoinGroup(JoinGroupRequest) = 19,
    LeaveGroup(LeaveGroupRequest) = 20,
    GroupMemberUpdate(GroupMemberUpdate) = 21,
    GroupMessage(GroupMessage) = 22,
    AddContact(AddContactRequest) = 23,
    ContactRequest(ContactRequestNotice) = 24,
    RemoveContact(RemoveContactRequest) = 25,
    FileSend(FileSendRequest) = 26,
    FileSendAck(FileSendAck) = 27,
    FileReceive(FileReceive) = 28,
    FileRequest(FileRequestPayload) = 29,
    FileData(FileData) = 30,
    ProfilePictureUpdate(ProfilePictureUpdate) = 31,
    ProfilePictureAck(ProfilePictureAck) = 32,
    RequestProfilePic(RequestProfilePic) = 33,
    ProfilePicData(ProfilePicData) = 34,
    StickerSend(StickerSend) = 35,
    TicTacToe(TicTacToeMessage) = 36,
    DrawGuess(DrawGuessMessage) = 37,
    Telephone(TelephoneMessage) = 38,
    CardHand(CardHandMessage) = 39,
    CardBetting(CardBettingMessage) = 40,
    Rps(RpsMessage) = 41,
    Arena(ArenaMessage) = 42,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEnvelope {
    t: PacketType,
    id: String,
    ts: i64,
    d: serde_json::Value,
}

/// A single framed message, reassembled from one newline-terminated line.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: String,
    pub ts: i64,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(id: impl Into<String>, ts: i64, payload: Payload) -> Self {
        Envelope {
            id: id.into(),
            ts,
            payload,
        }
    }

    /// Serializes this envelope as a single line of JSON, without the
    /// trailing line feed (the caller appends that when writing to the
    /// socket).
    pub fn encode(&self) -> String {
        let wire = WireEnvelope {
            t: self.payload.packet_type(),
            id: self.id.clone(),
            ts: self.ts,
            d: self.payload.to_value(),
        };
        serde_json::to_string(&wire).expect("envelope always serializes")
    }

    /// Parses one line of input (without its trailing line feed) into an envelope.
    pub fn decode(line: &str) -> Result<Self, ProtoError> {
        let wire: WireEnvelope = serde_json::from_str(line)?;
        let payload = Payload::from_value(wire.t, wire.d)?;
        Ok(Envelope {
            id: wire.id,
            ts: wire.ts,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_a_simple_payload() {
        let envelope = Envelope::new(
            "abc123",
            1_700_000_000_000,
            Payload::ChatMessage(ChatMessage {
                to: "bob".into(),
                from: "alice".into(),
                content: "hi".into(),
            }),
        );

        let encoded = envelope.encode();
        let decoded = Envelope::decode(&encoded).unwrap();

        assert_eq!(decoded.id, envelope.id);
        assert_eq!(decoded.ts, envelope.ts);
        match decoded.payload {
            Payload::ChatMessage(msg) => {
                assert_eq!(msg.to, "bob");
                assert_eq!(msg.from, "alice");
                assert_eq!(msg.content, "hi");
            }
            other => panic!("wrong variant decoded: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_packet_type() {
        let err = Envelope::decode(r#"{"t":999,"id":"x","ts":0,"d":null}"#).unwrap_err();
        assert!(matches!(err, ProtoError::Malformed(_)));
    }

    #[test]
    fn ping_pong_round_trip() {
        let envelope = Envelope::new("1", 0, Payload::Ping(Empty));
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert!(matches!(decoded.payload, Payload::Ping(Empty)));
    }
}
