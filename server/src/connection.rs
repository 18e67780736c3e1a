//! Per-connection accept/read loop (§4.1, §4.2).
//!
//! Reads frames off the stream until it closes, dispatching each one, then
//! cleans up. The `tokio::select!` against `Session::shutdown` is needed
//! because a connection can be told to stop reading by someone *other* than
//! the peer (a newer login displacing it).

use crate::router;
use crate::session::{ConnectionHandle, Session};
use crate::state::AppState;
use futures::StreamExt;
use proto::envelope::Envelope;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::debug;

pub async fn handle(state: Arc<AppState>, stream: TcpStream, addr: SocketAddr) {
    let (read_half, write_half) = stream.into_split();
    let conn = Arc::new(ConnectionHandle::new(addr, write_half));
    let mut lines = FramedRead::new(read_half, LinesCodec::new());
    let mut auth: Option<Arc<Session>> = None;

    loop {
        let shutdown = wait_for_shutdown(&auth);

        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else {
                    debug!(%addr, "connection closed");
                    break;
                };
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        debug!(%addr, %err, "frame read error, closing connection");
                        break;
                    }
                };
                let envelope = match Envelope::decode(&line) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        debug!(%addr, %err, "dropping malformed frame");
                        continue;
                    }
                };
                router::dispatch(&state, &conn, &mut auth, envelope).await;
            }
            _ = shutdown => {
                debug!(%addr, "session displaced, closing connection");
                break;
            }
        }
    }

    if let Some(session) = auth {
        state.disconnect(&session.username, &session.session_id).await;
    }
}

/// Never resolves for an unauthenticated connection; once logged in,
/// resolves when `Session::close` is called on the session currently held.
async fn wait_for_shutdown(auth: &Option<Arc<Session>>) {
    match auth {
        Some(session) => session.shutdown.notified().await,
        None => std::future::pending::<()>().await,
    }
}
