//! The shared application state assembled once at startup and cloned as an
//! `Arc` into every connection task (§5, §6).
//!
//! One place that knows about every subsystem, but no actor mailbox behind
//! it: every field here is already internally synchronized, so handlers
//! reach straight through the `Arc<AppState>` instead of sending a message
//! and awaiting a reply.

use crate::arena::ArenaEngine;
use crate::config::Config;
use crate::file_store::FileStore;
use crate::files::FileService;
use crate::games::card_betting::CardBettingManager;
use crate::games::card_hand::CardHandManager;
use crate::games::draw_guess::DrawGuessManager;
use crate::games::rps::RpsManager;
use crate::games::telephone::TelephoneManager;
use crate::games::tictactoe::TicTacToeManager;
use crate::identity_store::IdentityStore;
use crate::messaging::MessagingService;
use crate::presence::PresenceHub;
use crate::session::SessionRegistry;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub identity: Arc<IdentityStore>,
    pub files: Arc<FileStore>,
    pub presence: Arc<PresenceHub>,
    pub messaging: MessagingService,
    pub file_service: FileService,
    pub tictactoe: Arc<TicTacToeManager>,
    pub draw_guess: Arc<DrawGuessManager>,
    pub telephone: Arc<TelephoneManager>,
    pub card_hand: Arc<CardHandManager>,
    pub card_betting: Arc<CardBettingManager>,
    pub rps: Arc<RpsManager>,
    pub arena: Arc<ArenaEngine>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let identity = Arc::new(IdentityStore::load(config.clone()));
        let files = Arc::new(FileStore::load(config.clone()));
        let presence = Arc::new(PresenceHub::new(registry.clone(), identity.clone()));

        let messaging = MessagingService::new(registry.clone(), identity.clone());
        let file_service = FileService::new(registry.clone(), identity.clone(), presence.clone(), files.clone());

        let tictactoe = Arc::new(TicTacToeManager::new(registry.clone(), presence.clone()));
        let draw_guess = Arc::new(DrawGuessManager::new(registry.clone(), presence.clone()));
        let telephone = Arc::new(TelephoneManager::new(registry.clone(), presence.clone()));
        let card_hand = Arc::new(CardHandManager::new(registry.clone(), presence.clone()));
        let card_betting = Arc::new(CardBettingManager::new(registry.clone(), presence.clone()));
        let rps = Arc::new(RpsManager::new(registry.clone(), presence.clone()));
        let arena = Arc::new(ArenaEngine::new(registry.clone()));

        Arc::new(AppState {
            config,
            registry,
            identity,
            files,
            presence,
            messaging,
            file_service,
            tictactoe,
            draw_guess,
            telephone,
            card_hand,
            card_betting,
            rps,
            arena,
        })
    }

    /// Tears a session down across every subsystem that could still hold a
    /// reference to it, triggered either by the read loop seeing the socket
    /// close or by the ping task seeing a write fail (§7 "Transport loss").
    ///
    /// `remove_if_current` guards against the case where this session was
    /// already displaced by a newer login: if it no longer owns the registry
    /// entry, the newer session's own eventual disconnect owns the cascade,
    /// and running it twice here would incorrectly evict the live one.
    pub async fn disconnect(&self, username: &str, session_id: &str) {
        if !self.registry.remove_if_current(username, session_id).await {
            return;
        }

        self.tictactoe.on_disconnect(username).await;
        self.rps.on_disconnect(username).await;
        self.draw_guess.on_disconnect(username).await;
        self.telephone.on_disconnect(username).await;
        self.card_hand.on_disconnect(username).await;
        self.card_betting.on_disconnect(username).await;
        self.arena.leave(username).await;
        self.presence.announce_offline(username).await;
    }
}
