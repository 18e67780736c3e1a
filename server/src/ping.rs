//! Periodic liveness ping (§4.1).
//!
//! A write failure here is the only way a half-open TCP connection ever gets
//! noticed: the OS won't tell us the peer is gone until we try to write to
//! it, so this task is what eventually drives a silently-vanished client
//! through the same disconnect cascade as a clean close.

use crate::state::AppState;
use crate::wire::env;
use proto::envelope::{Empty, Payload};
use std::sync::Arc;
use std::time::Duration;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let sessions = state.registry.all().await;
        let envelope = env(Payload::Ping(Empty));
        for session in sessions {
            if !session.send(&envelope).await {
                state.disconnect(&session.username, &session.session_id).await;
            }
        }
    }
}
