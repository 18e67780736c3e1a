//! Content-addressed blob storage with a hard size cap and an inline-delivery
//! threshold (§4.4).

use crate::config::Config;
use crate::ids;
use crate::persistence;
use crate::presence::now_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub const MAX_BLOB_BYTES: u64 = 50 * 1024 * 1024;
pub const INLINE_THRESHOLD_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub id: String,
    pub filename: String,
    pub mime: String,
    pub size: u64,
    pub uploader: String,
    pub uploaded_at: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FilesIndex {
    blobs: HashMap<String, BlobMetadata>,
}

pub enum PutOutcome {
    Ok(BlobMetadata),
    TooLarge,
}

struct Inner {
    index: HashMap<String, BlobMetadata>,
}

pub struct FileStore {
    config: Config,
    inner: Mutex<Inner>,
}

impl FileStore {
    pub fn load(config: Config) -> Self {
        let index: FilesIndex = persistence::load_or_default(&config.files_index_path());
        std::fs::create_dir_all(config.files_dir()).ok();
        FileStore {
            config,
            inner: Mutex::new(Inner { index: index.blobs }),
        }
    }

    fn save_index(&self, inner: &Inner) {
        persistence::save(
            &self.config.files_index_path(),
            &FilesIndex { blobs: inner.index.clone() },
        );
    }

    fn blob_path(&self, id: &str) -> std::path::PathBuf {
        self.config.files_dir().join(id)
    }

    pub fn put(&self, filename: &str, mime: &str, bytes: &[u8], uploader: &str) -> PutOutcome {
        if bytes.len() as u64 > MAX_BLOB_BYTES {
            return PutOutcome::TooLarge;
        }

        let metadata = BlobMetadata {
            id: ids::blob_id(),
            filename: filename.to_string(),
            mime: mime.to_string(),
            size: bytes.len() as u64,
            uploader: uploader.to_string(),
            uploaded_at: now_ms(),
        };

        if std::fs::write(self.blob_path(&metadata.id), bytes).is_err() {
            return PutOutcome::TooLarge;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.index.insert(metadata.id.clone(), metadata.clone());
        self.save_index(&inner);
        PutOutcome::Ok(metadata)
    }

    pub fn metadata(&self, id: &str) -> Option<BlobMetadata> {
        let inner = self.inner.lock().unwrap();
        inner.index.get(id).cloned()
    }

    pub fn read(&self, id: &str) -> Option<Vec<u8>> {
        if !self.exists(id) {
            return None;
        }
        std::fs::read(self.blob_path(id)).ok()
    }

    pub fn exists(&self, id: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.index.contains_key(id)
    }

    /// Deletes a blob from both the index and disk. Used when a profile
    /// picture is replaced (§4.4); silently a no-op if the id is unknown.
    pub fn delete(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.index.remove(id).is_some() {
            self.save_index(&inner);
            std::fs::remove_file(self.blob_path(id)).ok();
        }
    }

    pub fn is_inlineable(mime: &str, size: u64) -> bool {
        mime.starts_with("image/") && size <= INLINE_THRESHOLD_BYTES
    }
}
