//! Payload definitions for every non-game packet type in the catalog (§6).

use crate::identity::{GroupSummary, PublicUser};
use crate::presence::EffectivePresence;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAck {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// One entry in the full snapshot sent on successful login (§4.2 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListEntry {
    pub user: PublicUser,
    pub presence: EffectivePresence,
}

/// Combines the login result, the caller's own record, and the full presence
/// snapshot (every authenticated user, plus the caller's offline contacts) in
/// a single ack, per SPEC_FULL.md §D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAck {
    pub success: bool,
    pub message: String,
    pub session_id: Option<String>,
    pub user: Option<PublicUser>,
    pub online_users: Vec<UserListEntry>,
    pub offline_contacts: Vec<PublicUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthRequired,
    Kicked,
    UserOffline,
    UserNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListPayload {
    pub users: Vec<UserListEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub to: String,
    pub from: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDelivered {
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTyping {
    pub to: String,
    pub from: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub to: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupAck {
    pub success: bool,
    pub message: String,
    pub group: Option<GroupSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteToGroupRequest {
    pub group_id: String,
    pub invitee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInviteReceived {
    pub group_id: String,
    pub group_name: String,
    pub inviter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveGroupRequest {
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMemberUpdate {
    pub group: GroupSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    pub group_id: String,
    pub from: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContactRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRequestNotice {
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveContactRequest {
    pub username: String,
}

/// Who a file upload is destined for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileTarget {
    User(String),
    Group(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSendRequest {
    pub to: FileTarget,
    pub filename: String,
    pub mime: String,
    /// Base64-encoded file bytes. Decoded and size-checked by the server
    /// before it is accepted into the blob store (§4.4).
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSendAck {
    pub success: bool,
    pub message: String,
    pub file_id: Option<String>,
}

/// Notification delivered to a recipient when a file has been sent to them.
///
/// `inline_data` is populated only when the delivery rule's inline threshold
/// is met (§4.4); otherwise the recipient must follow up with `FileRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReceive {
    pub file_id: String,
    pub from: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
    pub inline_data: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRequestPayload {
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileData {
    pub file_id: String,
    pub found: bool,
    pub filename: String,
    pub mime: String,
    pub data_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePictureUpdate {
    pub data_base64: String,
    pub mime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePictureAck {
    pub success: bool,
    pub message: String,
    pub blob_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProfilePic {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePicData {
    pub username: String,
    pub found: bool,
    pub blob_id: Option<String>,
    pub mime: Option<String>,
    pub data_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StickerSend {
    pub to: String,
    pub sticker_id: String,
}
