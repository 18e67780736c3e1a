//! Small JSON sidecar load/save helpers shared by the identity and file stores.
//!
//! The server tolerates a missing or unreadable persistence file by starting
//! with empty collections (§6 "Persisted state"); I/O errors during save are
//! logged but never fail the caller's request (§7 propagation policy).

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::warn;

pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "failed to parse persisted state, starting empty");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

pub fn save<T: Serialize>(path: &Path, value: &T) {
    let result = (|| -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(path, contents)?;
        Ok(())
    })();

    if let Err(err) = result {
        warn!(path = %path.display(), %err, "failed to persist state");
    }
}
