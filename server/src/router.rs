//! Dispatches a decoded envelope to the handler for its packet type, gated by
//! connection auth state (§6, §7).
//!
//! Unauthenticated connections may only reach `Register`, `Login`, `Ping`,
//! `Pong`, and `Logout` (the last two are harmless no-ops pre-auth); anything
//! else earns an `AUTH_REQUIRED` error reply and the connection stays open,
//! because a connection stays open even after one frame is rejected.

use crate::identity_store::RegisterOutcome;
use crate::ids;
use crate::session::{ConnectionHandle, Session, SessionState};
use crate::state::AppState;
use crate::wire::env;
use proto::envelope::{Empty, Envelope, Payload};
use proto::games::card_betting::CardBettingMessage;
use proto::games::card_hand::CardHandMessage;
use proto::games::draw_guess::DrawGuessMessage;
use proto::games::rps::RpsMessage;
use proto::games::telephone::TelephoneMessage;
use proto::games::tictactoe::TicTacToeMessage;
use proto::arena::ArenaMessage;
use proto::messages::{
    ErrorCode, ErrorPayload, LoginAck, LoginRequest, RegisterAck, RegisterRequest,
};
use proto::presence::PresenceState;
use std::sync::Arc;
use tokio::sync::RwLock;

pub async fn dispatch(
    state: &Arc<AppState>,
    conn: &Arc<ConnectionHandle>,
    auth: &mut Option<Arc<Session>>,
    envelope: Envelope,
) {
    match envelope.payload {
        Payload::Ping(_) => {
            let _ = conn.send(&env(Payload::Pong(Empty))).await;
        }
        Payload::Pong(_) => {}
        Payload::Register(req) => handle_register(state, conn, req).await,
        Payload::Login(req) => handle_login(state, conn, auth, req).await,
        Payload::Logout(_) => {
            if let Some(session) = auth.take() {
                state.disconnect(&session.username, &session.session_id).await;
            }
        }
        payload => {
            let Some(session) = auth.clone() else {
                deny_unauthenticated(conn).await;
                return;
            };
            dispatch_authenticated(state, &session, payload).await;
        }
    }
}

async fn deny_unauthenticated(conn: &Arc<ConnectionHandle>) {
    let _ = conn
        .send(&env(Payload::Error(ErrorPayload {
            code: ErrorCode::AuthRequired,
            message: "log in first".to_string(),
        })))
        .await;
}

async fn handle_register(state: &Arc<AppState>, conn: &Arc<ConnectionHandle>, req: RegisterRequest) {
    let (success, message) = match state
        .identity
        .register(&req.username, &req.password, &req.display_name, &req.email)
    {
        RegisterOutcome::Ok => (true, "registered".to_string()),
        RegisterOutcome::UsernameTaken => (false, "username already taken".to_string()),
        RegisterOutcome::UsernameTooShort => (false, "username must be at least 3 characters".to_string()),
        RegisterOutcome::PasswordTooShort => (false, "password must be at least 4 characters".to_string()),
    };
    let _ = conn.send(&env(Payload::RegisterAck(RegisterAck { success, message }))).await;
}

async fn handle_login(
    state: &Arc<AppState>,
    conn: &Arc<ConnectionHandle>,
    auth: &mut Option<Arc<Session>>,
    req: LoginRequest,
) {
    let Some(user) = state.identity.verify_login(&req.username, &req.password) else {
        let _ = conn
            .send(&env(Payload::LoginAck(LoginAck {
                success: false,
                message: "invalid username or password".to_string(),
                session_id: None,
                user: None,
                online_users: Vec::new(),
                offline_contacts: Vec::new(),
            })))
            .await;
        return;
    };

    let session = Arc::new(Session {
        username: user.username.clone(),
        session_id: ids::session_id(),
        conn: conn.clone(),
        state: RwLock::new(SessionState {
            display_name: user.display_name.clone(),
            presence: PresenceState::Online,
            personal_message: String::new(),
            avatar_token: user.avatar_token.clone(),
        }),
        shutdown: tokio::sync::Notify::new(),
    });

    // "Last writer wins": a prior live session for this username is told it
    // was kicked and signaled to stop reading (§4.2 step 2, §7).
    if let Some(displaced) = state.registry.displace_and_insert(session.clone()).await {
        displaced
            .send(&env(Payload::Error(ErrorPayload {
                code: ErrorCode::Kicked,
                message: "logged in from another connection".to_string(),
            })))
            .await;
        displaced.close();
    }

    let online_users = state.presence.online_snapshot().await;
    let mut offline_contacts = Vec::new();
    for contact in state.identity.contacts_of(&user.username) {
        if state.registry.get(&contact.username).await.is_none() {
            offline_contacts.push(contact);
        }
    }

    session
        .send(&env(Payload::LoginAck(LoginAck {
            success: true,
            message: "ok".to_string(),
            session_id: Some(session.session_id.clone()),
            user: Some(user.clone()),
            online_users,
            offline_contacts,
        })))
        .await;

    state.presence.broadcast_presence(&user.username, None).await;
    *auth = Some(session);
}

fn display_of(state: &AppState, username: &str) -> String {
    state
        .identity
        .public_user(username)
        .map(|u| u.display_name)
        .unwrap_or_else(|| username.to_string())
}

async fn dispatch_authenticated(state: &Arc<AppState>, session: &Arc<Session>, payload: Payload) {
    let username = session.username.as_str();
    match payload {
        Payload::PresenceUpdate(update) => {
            {
                let mut s = session.state.write().await;
                s.presence = update.state;
                s.personal_message = update.personal_message;
            }
            state.presence.broadcast_presence(username, None).await;
        }
        Payload::ChatMessage(msg) => state.messaging.send_chat_message(username, msg).await,
        Payload::ChatTyping(msg) => state.messaging.send_typing(username, &msg.to, msg.is_typing).await,
        Payload::Nudge(msg) => state.messaging.send_nudge(username, &msg.to).await,
        Payload::StickerSend(msg) => state.messaging.send_sticker(username, msg).await,
        Payload::CreateGroup(req) => state.messaging.create_group(username, req).await,
        Payload::InviteToGroup(req) => state.messaging.invite_to_group(username, req).await,
        Payload::JoinGroup(req) => state.messaging.join_group(username, req).await,
        Payload::LeaveGroup(req) => state.messaging.leave_group(username, req).await,
        Payload::GroupMessage(msg) => state.messaging.send_group_message(username, msg).await,
        Payload::AddContact(req) => state.messaging.add_contact(username, &req.username).await,
        Payload::RemoveContact(req) => state.messaging.remove_contact(username, req).await,
        Payload::FileSend(req) => state.file_service.send_file(username, req).await,
        Payload::FileRequest(req) => state.file_service.request_file(username, req).await,
        Payload::ProfilePictureUpdate(update) => state.file_service.update_profile_picture(username, update).await,
        Payload::RequestProfilePic(req) => state.file_service.request_profile_pic(username, req).await,
        Payload::TicTacToe(msg) => dispatch_tictactoe(state, username, msg).await,
        Payload::DrawGuess(msg) => dispatch_draw_guess(state, username, msg).await,
        Payload::Telephone(msg) => dispatch_telephone(state, username, msg).await,
        Payload::CardHand(msg) => dispatch_card_hand(state, username, msg).await,
        Payload::CardBetting(msg) => dispatch_card_betting(state, username, msg).await,
        Payload::Rps(msg) => dispatch_rps(state, username, msg).await,
        Payload::Arena(msg) => dispatch_arena(state, username, msg).await,
        _ => {}
    }
}

/// `InviteAccepted`/`InviteDeclined` double as both the client's reply to an
/// invite and the server's confirmation to the inviter; the manager looks the
/// pending invite up by invitee, so the client-sent `game_id` is ignored.
async fn dispatch_tictactoe(state: &Arc<AppState>, username: &str, msg: TicTacToeMessage) {
    match msg {
        TicTacToeMessage::Invite { to } => state.tictactoe.invite(username, &to).await,
        TicTacToeMessage::InviteAccepted { .. } => state.tictactoe.accept(username).await,
        TicTacToeMessage::InviteDeclined { .. } => state.tictactoe.decline(username).await,
        TicTacToeMessage::Spectate { game_id } => state.tictactoe.spectate(username, &game_id).await,
        TicTacToeMessage::Move { game_id, cell } => state.tictactoe.play_move(username, &game_id, cell).await,
        _ => {}
    }
}

async fn dispatch_draw_guess(state: &Arc<AppState>, username: &str, msg: DrawGuessMessage) {
    match msg {
        DrawGuessMessage::Create { name, max_players, language, round_secs } => {
            let display = display_of(state, username);
            state.draw_guess.create(username, &display, name, max_players, language, round_secs).await
        }
        DrawGuessMessage::Join { lobby_id } => {
            let display = display_of(state, username);
            state.draw_guess.join(username, &display, &lobby_id).await
        }
        DrawGuessMessage::Leave => state.draw_guess.leave(username).await,
        DrawGuessMessage::Start => state.draw_guess.start(username).await,
        DrawGuessMessage::ChatGuess { game_id, text } => state.draw_guess.submit_guess(username, &game_id, &text).await,
        DrawGuessMessage::DrawData { game_id, stroke } => state.draw_guess.relay_draw_data(username, &game_id, stroke).await,
        DrawGuessMessage::ClearCanvas { game_id } => state.draw_guess.relay_clear_canvas(username, &game_id).await,
        _ => {}
    }
}

async fn dispatch_telephone(state: &Arc<AppState>, username: &str, msg: TelephoneMessage) {
    match msg {
        TelephoneMessage::Create { name, max_players } => {
            let display = display_of(state, username);
            state.telephone.create(username, &display, name, max_players).await
        }
        TelephoneMessage::Join { lobby_id } => {
            let display = display_of(state, username);
            state.telephone.join(username, &display, &lobby_id).await
        }
        TelephoneMessage::Leave => state.telephone.leave(username).await,
        TelephoneMessage::Start => state.telephone.start(username).await,
        TelephoneMessage::SubmitPhrase { game_id, text } => state.telephone.submit_phrase(username, &game_id, text).await,
        TelephoneMessage::SubmitDrawing { game_id, data_base64 } => {
            state.telephone.submit_drawing(username, &game_id, data_base64).await
        }
        TelephoneMessage::SubmitDescription { game_id, text } => {
            state.telephone.submit_description(username, &game_id, text).await
        }
        TelephoneMessage::AdvanceReveal { game_id } => state.telephone.advance_reveal(username, &game_id).await,
        _ => {}
    }
}

async fn dispatch_card_hand(state: &Arc<AppState>, username: &str, msg: CardHandMessage) {
    match msg {
        CardHandMessage::Create { name, max_players } => {
            let display = display_of(state, username);
            state.card_hand.create(username, &display, name, max_players).await
        }
        CardHandMessage::Join { lobby_id } => {
            let display = display_of(state, username);
            state.card_hand.join(username, &display, &lobby_id).await
        }
        CardHandMessage::Leave => state.card_hand.leave(username).await,
        CardHandMessage::Start => state.card_hand.start(username).await,
        CardHandMessage::PlayCard { game_id, card_id } => state.card_hand.play_card(username, &game_id, card_id).await,
        CardHandMessage::ChooseColor { game_id, color } => state.card_hand.choose_color(username, &game_id, color).await,
        CardHandMessage::DrawCard { game_id } => state.card_hand.draw_card(username, &game_id).await,
        _ => {}
    }
}

async fn dispatch_card_betting(state: &Arc<AppState>, username: &str, msg: CardBettingMessage) {
    match msg {
        CardBettingMessage::Create { name, max_players } => {
            let display = display_of(state, username);
            state.card_betting.create(username, &display, name, max_players).await
        }
        CardBettingMessage::Join { lobby_id } => {
            let display = display_of(state, username);
            state.card_betting.join(username, &display, &lobby_id).await
        }
        CardBettingMessage::Leave => state.card_betting.leave(username).await,
        CardBettingMessage::Start => state.card_betting.start(username).await,
        CardBettingMessage::PlaceBet { game_id, amount } => state.card_betting.place_bet(username, &game_id, amount).await,
        CardBettingMessage::Action { game_id, action } => state.card_betting.action(username, &game_id, action).await,
        CardBettingMessage::NextRound { game_id } => state.card_betting.next_round(username, &game_id).await,
        _ => {}
    }
}

async fn dispatch_rps(state: &Arc<AppState>, username: &str, msg: RpsMessage) {
    match msg {
        RpsMessage::Invite { to } => state.rps.invite(username, &to).await,
        RpsMessage::InviteAccepted { .. } => state.rps.accept(username).await,
        RpsMessage::InviteDeclined { .. } => state.rps.decline(username).await,
        RpsMessage::SubmitMove { game_id, mv } => state.rps.submit_move(username, &game_id, mv).await,
        _ => {}
    }
}

async fn dispatch_arena(state: &Arc<AppState>, username: &str, msg: ArenaMessage) {
    match msg {
        ArenaMessage::Join => state.arena.join(username).await,
        ArenaMessage::Leave => state.arena.leave(username).await,
        ArenaMessage::Input { direction } => state.arena.input(username, direction).await,
        _ => {}
    }
}
