//! Realtime duplex socket: the primary transport. One task reads client
//! frames and dispatches them to the addressed session; any number of
//! per-game forwarder tasks drain that session's event bus (and its chat
//! relay) into a single outgoing queue this connection owns.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chess_wire::{ClientCommandKind, ClientFrame, ServerEventKind, ServerFrame};

use crate::identity::Identity;
use crate::session::{SessionEventKind, SessionHandle};

use super::chat::ChatMessage;
use super::converters::snapshot_to_dto;
use super::AppState;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let credential = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.token);

    let identity = credential.and_then(|credential| state.identity.authenticate(&credential).ok());

    match identity {
        Some(identity) => ws.on_upgrade(move |socket| handle_socket(socket, state, identity)).into_response(),
        None => (StatusCode::UNAUTHORIZED, "missing or invalid bearer token").into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(128);

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<String, (SessionHandle, JoinHandle<()>)> = HashMap::new();

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            if matches!(message, Message::Close(_)) {
                break;
            }
            continue;
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(err) => {
                let reply = ServerFrame::error(None, "invalid-arg", &err.to_string());
                let _ = out_tx.send(to_ws_message(&reply)).await;
                continue;
            }
        };

        dispatch(&state, &identity, frame, &out_tx, &mut subscriptions).await;
    }

    for (_, (session, task)) in subscriptions.drain() {
        session.mark_disconnected(identity.user_id.clone()).await;
        task.abort();
    }
    writer.abort();
}

async fn dispatch(
    state: &AppState,
    identity: &Identity,
    frame: ClientFrame,
    out_tx: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<String, (SessionHandle, JoinHandle<()>)>,
) {
    let reply = match frame.cmd {
        ClientCommandKind::Ping => ServerFrame::reply(&frame.id, ServerEventKind::Pong, serde_json::json!({})),
        ClientCommandKind::JoinGame => handle_join(state, identity, &frame).await,
        ClientCommandKind::Subscribe => {
            handle_subscribe(state, identity, &frame, out_tx, subscriptions).await
        }
        ClientCommandKind::Unsubscribe => {
            if let Some(game) = &frame.game {
                if let Some((session, task)) = subscriptions.remove(game) {
                    session.mark_disconnected(identity.user_id.clone()).await;
                    task.abort();
                }
            }
            ServerFrame::reply(&frame.id, ServerEventKind::Pong, serde_json::json!({ "unsubscribed": true }))
        }
        ClientCommandKind::MakeMove => handle_make_move(state, identity, &frame).await,
        ClientCommandKind::Resign => {
            handle_seated_command(state, identity, &frame, SeatedOp::Resign).await
        }
        ClientCommandKind::OfferDraw => {
            handle_seated_command(state, identity, &frame, SeatedOp::OfferDraw).await
        }
        ClientCommandKind::AcceptDraw => {
            handle_seated_command(state, identity, &frame, SeatedOp::AcceptDraw).await
        }
        ClientCommandKind::DeclineDraw => {
            handle_seated_command(state, identity, &frame, SeatedOp::DeclineDraw).await
        }
        ClientCommandKind::Chat => handle_chat(state, identity, &frame),
        ClientCommandKind::LeaveGame => {
            if let Some(game) = &frame.game {
                if let Some((session, task)) = subscriptions.remove(game) {
                    session.mark_disconnected(identity.user_id.clone()).await;
                    task.abort();
                }
            }
            ServerFrame::reply(&frame.id, ServerEventKind::Pong, serde_json::json!({ "left": true }))
        }
    };

    let _ = out_tx.send(to_ws_message(&reply)).await;
}

async fn handle_join(state: &AppState, identity: &Identity, frame: &ClientFrame) -> ServerFrame {
    let Some(game_id) = &frame.game else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `game`");
    };
    match state.matchmaker.join(game_id, identity.user_id.clone()).await {
        Ok(handle) => match handle.snapshot().await {
            Ok(snapshot) => {
                state.lobby_cache.invalidate();
                ServerFrame::reply(&frame.id, ServerEventKind::Seated, snapshot_to_dto(&snapshot))
            }
            Err(err) => ServerFrame::error(Some(&frame.id), "internal", &err.to_string()),
        },
        Err(err) => ServerFrame::error(Some(&frame.id), "no-such-game", &err.to_string()),
    }
}

async fn handle_subscribe(
    state: &AppState,
    identity: &Identity,
    frame: &ClientFrame,
    out_tx: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<String, (SessionHandle, JoinHandle<()>)>,
) -> ServerFrame {
    let Some(game_id) = &frame.game else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `game`");
    };

    let handle = match state.registry.lookup(game_id).await {
        Ok(handle) => handle,
        Err(err) => return ServerFrame::error(Some(&frame.id), "no-such-game", &err.to_string()),
    };

    let outcome = match handle.subscribe(identity.user_id.clone(), frame.last_seq).await {
        Ok(result) => result,
        Err(err) => return ServerFrame::error(Some(&frame.id), "internal", &err.to_string()),
    };
    let resumed = outcome.resumed;
    let snapshot = outcome.snapshot;

    let mut chat = state.chat_relay.subscribe(game_id);
    let game_id_owned = game_id.clone();
    let forward_tx = out_tx.clone();

    let task = tokio::spawn(async move {
        let mut events = outcome.events;
        for missed in outcome.backlog {
            let kind = session_event_kind_to_wire(missed.kind);
            let payload = snapshot_to_dto(&missed.snapshot);
            let frame = ServerFrame::event(&game_id_owned, missed.seq, kind, payload);
            if forward_tx.send(to_ws_message(&frame)).await.is_err() {
                return;
            }
        }
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Ok(event) = event else { break };
                    let kind = session_event_kind_to_wire(event.kind);
                    let payload = snapshot_to_dto(&event.snapshot);
                    let frame = ServerFrame::event(&game_id_owned, event.seq, kind, payload);
                    if forward_tx.send(to_ws_message(&frame)).await.is_err() {
                        break;
                    }
                }
                message = chat.recv() => {
                    let Ok(ChatMessage { from, text }) = message else { continue };
                    let frame = ServerFrame {
                        v: 1,
                        seq: None,
                        kind: ServerEventKind::Chat,
                        game: Some(game_id_owned.clone()),
                        payload: serde_json::json!({ "from": from, "text": text }),
                        in_reply_to: None,
                    };
                    if forward_tx.send(to_ws_message(&frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    if let Some((_, previous)) = subscriptions.insert(game_id.clone(), (handle, task)) {
        previous.abort();
    }

    if resumed {
        // Client's lastSeq was within the bus's buffered tail: the
        // forwarder task above already replays the missed events, so the
        // reply itself carries no snapshot (spec §6 reconnect protocol).
        ServerFrame::reply(&frame.id, ServerEventKind::Seated, serde_json::json!({ "resumed": true }))
    } else {
        ServerFrame::reply(&frame.id, ServerEventKind::Seated, snapshot_to_dto(&snapshot))
    }
}

async fn handle_make_move(state: &AppState, identity: &Identity, frame: &ClientFrame) -> ServerFrame {
    let Some(game_id) = &frame.game else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `game`");
    };
    if !state.move_limiter.try_acquire(&format!("{}:{game_id}", identity.user_id)) {
        return ServerFrame::error(Some(&frame.id), "rate-limited", "too many moves");
    }

    let from = frame.args.get("from").and_then(|v| v.as_str()).and_then(chess::parse_square);
    let to = frame.args.get("to").and_then(|v| v.as_str()).and_then(chess::parse_square);
    let (Some(from), Some(to)) = (from, to) else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing or invalid `from`/`to`");
    };
    let promotion = frame
        .args
        .get("promotion")
        .and_then(|v| v.as_str())
        .and_then(|p| p.chars().next())
        .and_then(chess::PieceKind::from_char);

    let handle = match state.registry.lookup(game_id).await {
        Ok(handle) => handle,
        Err(err) => return ServerFrame::error(Some(&frame.id), "no-such-game", &err.to_string()),
    };

    match handle.make_move(identity.user_id.clone(), from, to, promotion).await {
        Ok(snapshot) => ServerFrame::reply(&frame.id, ServerEventKind::Move, snapshot_to_dto(&snapshot)),
        Err(err) => ServerFrame::error(Some(&frame.id), session_error_code(&err), &err.to_string()),
    }
}

enum SeatedOp {
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
}

async fn handle_seated_command(
    state: &AppState,
    identity: &Identity,
    frame: &ClientFrame,
    op: SeatedOp,
) -> ServerFrame {
    let Some(game_id) = &frame.game else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `game`");
    };
    let handle = match state.registry.lookup(game_id).await {
        Ok(handle) => handle,
        Err(err) => return ServerFrame::error(Some(&frame.id), "no-such-game", &err.to_string()),
    };

    let user_id = identity.user_id.clone();
    let (result, kind) = match op {
        SeatedOp::Resign => (handle.resign(user_id).await, ServerEventKind::Resigned),
        SeatedOp::OfferDraw => (handle.offer_draw(user_id).await, ServerEventKind::DrawOffered),
        SeatedOp::AcceptDraw => (handle.accept_draw(user_id).await, ServerEventKind::DrawAccepted),
        SeatedOp::DeclineDraw => (handle.decline_draw(user_id).await, ServerEventKind::DrawDeclined),
    };

    match result {
        Ok(snapshot) => ServerFrame::reply(&frame.id, kind, snapshot_to_dto(&snapshot)),
        Err(err) => ServerFrame::error(Some(&frame.id), session_error_code(&err), &err.to_string()),
    }
}

fn handle_chat(state: &AppState, identity: &Identity, frame: &ClientFrame) -> ServerFrame {
    let Some(game_id) = &frame.game else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `game`");
    };
    if !state.chat_limiter.try_acquire(&format!("{}:{game_id}", identity.user_id)) {
        return ServerFrame::error(Some(&frame.id), "rate-limited", "too many chat messages");
    }
    let Some(text) = frame.args.get("text").and_then(|v| v.as_str()) else {
        return ServerFrame::error(Some(&frame.id), "invalid-arg", "missing `text`");
    };

    state.chat_relay.publish(
        game_id,
        ChatMessage {
            from: identity.username.clone(),
            text: text.to_string(),
        },
    );
    ServerFrame::reply(&frame.id, ServerEventKind::Chat, serde_json::json!({ "sent": true }))
}

fn session_event_kind_to_wire(kind: SessionEventKind) -> ServerEventKind {
    match kind {
        SessionEventKind::Seated => ServerEventKind::Seated,
        SessionEventKind::Move => ServerEventKind::Move,
        SessionEventKind::DrawOffered => ServerEventKind::DrawOffered,
        SessionEventKind::DrawAccepted => ServerEventKind::DrawAccepted,
        SessionEventKind::DrawDeclined => ServerEventKind::DrawDeclined,
        SessionEventKind::Resigned => ServerEventKind::Resigned,
        SessionEventKind::Completed => ServerEventKind::Completed,
        SessionEventKind::ClockTick => ServerEventKind::ClockTick,
        SessionEventKind::Abandoned => ServerEventKind::Abandoned,
    }
}

fn session_error_code(err: &crate::session::SessionError) -> &'static str {
    use crate::session::SessionError;
    match err {
        SessionError::IllegalMove | SessionError::FlagFell => "illegal-move",
        SessionError::NotYourTurn => "not-your-turn",
        SessionError::WrongFsmState => "wrong-fsm-state",
        SessionError::NotAPlayer => "not-a-player",
        SessionError::AlreadySeated => "already-seated",
        SessionError::NoDrawOffer => "invalid-arg",
        SessionError::Internal(_) => "internal",
    }
}

fn to_ws_message(frame: &ServerFrame) -> Message {
    Message::Text(serde_json::to_string(frame).unwrap_or_default().into())
}
