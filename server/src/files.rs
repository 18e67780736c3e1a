//! File send/request handlers and profile-picture management (§4.4).
//!
//! Thin wiring over `FileStore`: this module owns the delivery rule (inline
//! vs. deferred, fan-out to online group members only) while `FileStore`
//! owns the bytes.

use crate::file_store::{FileStore, PutOutcome};
use crate::identity_store::IdentityStore;
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use crate::wire::env;
use proto::envelope::Payload;
use proto::messages::{
    ErrorCode, ErrorPayload, FileData, FileReceive, FileRequestPayload, FileSendAck,
    FileSendRequest, FileTarget, ProfilePicData, ProfilePictureAck, ProfilePictureUpdate,
    RequestProfilePic,
};
use std::sync::Arc;

pub struct FileService {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityStore>,
    presence: Arc<PresenceHub>,
    store: Arc<FileStore>,
}

impl FileService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        identity: Arc<IdentityStore>,
        presence: Arc<PresenceHub>,
        store: Arc<FileStore>,
    ) -> Self {
        FileService { registry, identity, presence, store }
    }

    async fn error(&self, user: &str, code: ErrorCode, message: &str) {
        self.registry
            .send_to(user, &env(Payload::Error(ErrorPayload { code, message: message.to_string() })))
            .await;
    }

    pub async fn send_file(&self, from: &str, request: FileSendRequest) {
        let Ok(bytes) = base64::decode(request.data_base64.as_bytes()) else {
            self.registry
                .send_to(from, &env(Payload::FileSendAck(FileSendAck { success: false, message: "malformed base64".to_string(), file_id: None })))
                .await;
            return;
        };

        let metadata = match self.store.put(&request.filename, &request.mime, &bytes, from) {
            PutOutcome::Ok(metadata) => metadata,
            PutOutcome::TooLarge => {
                self.registry
                    .send_to(from, &env(Payload::FileSendAck(FileSendAck { success: false, message: "file exceeds the size limit".to_string(), file_id: None })))
                    .await;
                return;
            }
        };

        self.registry
            .send_to(from, &env(Payload::FileSendAck(FileSendAck { success: true, message: "sent".to_string(), file_id: Some(metadata.id.clone()) })))
            .await;

        let inline_data = FileStore::is_inlineable(&metadata.mime, metadata.size).then(|| request.data_base64.clone());

        match request.to {
            FileTarget::User(to) => {
                let notice = FileReceive {
                    file_id: metadata.id,
                    from: from.to_string(),
                    filename: metadata.filename,
                    mime: metadata.mime,
                    size: metadata.size,
                    inline_data,
                    group_id: None,
                };
                // No offline queue: the blob is stored, but a missing session
                // just means nobody to notify (§4.4).
                self.registry.send_to(&to, &env(Payload::FileReceive(notice))).await;
            }
            FileTarget::Group(group_id) => {
                let Some(group) = self.identity.group(&group_id) else {
                    self.error(from, ErrorCode::UserNotFound, "group not found").await;
                    return;
                };
                let envelope = env(Payload::FileReceive(FileReceive {
                    file_id: metadata.id,
                    from: from.to_string(),
                    filename: metadata.filename,
                    mime: metadata.mime,
                    size: metadata.size,
                    inline_data,
                    group_id: Some(group_id),
                }));
                for member in &group.members {
                    if member != from {
                        self.registry.send_to(member, &envelope).await;
                    }
                }
            }
        }
    }

    pub async fn request_file(&self, user: &str, request: FileRequestPayload) {
        let response = match self.store.metadata(&request.file_id) {
            Some(metadata) => {
                let data_base64 = self.store.read(&request.file_id).map(|bytes| base64::encode(bytes));
                FileData {
                    file_id: metadata.id,
                    found: data_base64.is_some(),
                    filename: metadata.filename,
                    mime: metadata.mime,
                    data_base64,
                }
            }
            None => FileData { file_id: request.file_id, found: false, filename: String::new(), mime: String::new(), data_base64: None },
        };
        self.registry.send_to(user, &env(Payload::FileData(response))).await;
    }

    /// Deletes the previous blob atomically and re-broadcasts presence so
    /// clients invalidate their blob-id-keyed avatar cache (§4.4).
    pub async fn update_profile_picture(&self, user: &str, update: ProfilePictureUpdate) {
        let Ok(bytes) = base64::decode(update.data_base64.as_bytes()) else {
            self.registry
                .send_to(user, &env(Payload::ProfilePictureAck(ProfilePictureAck { success: false, message: "malformed base64".to_string(), blob_id: None })))
                .await;
            return;
        };

        let metadata = match self.store.put("avatar", &update.mime, &bytes, user) {
            PutOutcome::Ok(metadata) => metadata,
            PutOutcome::TooLarge => {
                self.registry
                    .send_to(user, &env(Payload::ProfilePictureAck(ProfilePictureAck { success: false, message: "image exceeds the size limit".to_string(), blob_id: None })))
                    .await;
                return;
            }
        };

        if let Some(Some(previous)) = self.identity.set_profile_picture(user, Some(metadata.id.clone())) {
            self.store.delete(&previous);
        }

        self.registry
            .send_to(user, &env(Payload::ProfilePictureAck(ProfilePictureAck { success: true, message: "updated".to_string(), blob_id: Some(metadata.id) })))
            .await;
        self.presence.broadcast_presence(user, None).await;
    }

    pub async fn request_profile_pic(&self, user: &str, request: RequestProfilePic) {
        let response = match self.identity.public_user(&request.username) {
            Some(public) => match public.profile_picture_id.as_deref() {
                Some(blob_id) => {
                    let metadata = self.store.metadata(blob_id);
                    let data_base64 = self.store.read(blob_id).map(|bytes| base64::encode(bytes));
                    ProfilePicData {
                        username: request.username,
                        found: data_base64.is_some(),
                        blob_id: Some(blob_id.to_string()),
                        mime: metadata.map(|m| m.mime),
                        data_base64,
                    }
                }
                None => ProfilePicData { username: request.username, found: false, blob_id: None, mime: None, data_base64: None },
            },
            None => ProfilePicData { username: request.username, found: false, blob_id: None, mime: None, data_base64: None },
        };
        self.registry.send_to(user, &env(Payload::ProfilePicData(response))).await;
    }
}
