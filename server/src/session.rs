//! The connection handle, the authenticated session, and the session
//! registry (§4.2, §5).
//!
//! A `Mutex`-guarded writer half per connection plus an `RwLock`-guarded
//! mutable presence record, rather than routing every read through a single
//! actor mailbox.

use futures::SinkExt;
use proto::envelope::Envelope;
use proto::presence::PresenceState;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, RwLock};
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::debug;

/// The serialized writer half of a TCP connection. Exists independently of
/// authentication so that pre-login replies (RegisterAck, failed LoginAck,
/// Pong) can be sent without a session in the registry.
pub struct ConnectionHandle {
    pub addr: SocketAddr,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl ConnectionHandle {
    pub fn new(addr: SocketAddr, write_half: OwnedWriteHalf) -> Self {
        ConnectionHandle {
            addr,
            writer: Mutex::new(FramedWrite::new(write_half, LinesCodec::new())),
        }
    }

    /// Serializes writes per connection (§4.1, §5 "writer serialization").
    /// Failures indicate the connection is dead; the caller treats that as
    /// transport loss (§7).
    pub async fn send(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(envelope.encode()).await?;
        Ok(())
    }
}

/// Mutable presence fields, held behind a lock separate from the write path
/// so a presence update never blocks on socket backpressure.
pub struct SessionState {
    pub display_name: String,
    pub presence: PresenceState,
    pub personal_message: String,
    pub avatar_token: String,
}

pub struct Session {
    pub username: String,
    pub session_id: String,
    pub conn: Arc<ConnectionHandle>,
    pub state: RwLock<SessionState>,
    /// Signaled when this session is displaced by a newer login, so the
    /// owning connection's read loop can stop waiting on the socket and exit
    /// (§4.2 step 2, §7 "Displacement").
    pub shutdown: tokio::sync::Notify,
}

impl Session {
    /// Best-effort send; on failure the caller (the registry's broadcast
    /// helpers, or the read loop) is responsible for treating the session as
    /// dead and cascading the disconnect (§7 "Transport loss").
    pub async fn send(&self, envelope: &Envelope) -> bool {
        match self.conn.send(envelope).await {
            Ok(()) => true,
            Err(err) => {
                debug!(username = %self.username, %err, "write failed, session is dead");
                false
            }
        }
    }

    pub fn close(&self) {
        self.shutdown.notify_waiters();
    }
}

/// Concurrent map from lowercased username to live session (§4.2).
///
/// Invariant: at most one session per username (§3); `displace` enforces
/// "last writer wins" atomically under the same lock that readers use.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    /// Inserts `session`, returning the displaced prior session (if any) so
    /// the caller can send it a `KICKED` error and close its connection
    /// (§4.2 step 2, §7 "Displacement").
    pub async fn displace_and_insert(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.username.clone(), session)
    }

    pub async fn get(&self, username: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.get(&username.to_lowercase()).cloned()
    }

    /// Removes `username` only if `session_id` still matches, so a stale
    /// disconnect cannot evict a session that already displaced it.
    pub async fn remove_if_current(&self, username: &str, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if let std::collections::hash_map::Entry::Occupied(entry) = sessions.entry(username.to_lowercase()) {
            if entry.get().session_id == session_id {
                entry.remove();
                return true;
            }
        }
        false
    }

    pub async fn all(&self) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn send_to(&self, username: &str, envelope: &Envelope) -> bool {
        match self.get(username).await {
            Some(session) => session.send(envelope).await,
            None => false,
        }
    }

    /// Snapshots the recipient list under the lock, then releases it before
    /// writing to any socket (§5 "Broadcast helpers never hold the manager
    /// lock while performing network I/O").
    pub async fn broadcast(&self, envelope: &Envelope, except: Option<&str>) {
        let recipients = self.all().await;
        for session in recipients {
            if Some(session.username.as_str()) == except {
                continue;
            }
            session.send(envelope).await;
        }
    }
}
