//! WebSocket connection handler and event dispatch.
//!
//! The handshake authenticates the bearer token, the upgrade wires one
//! mpsc channel per connection (acks and pushes share it, so each client
//! observes events in the server's serialization order), and every
//! inbound frame is routed through the dispatch table below. Each
//! ack-bearing frame is answered exactly once; client-induced errors
//! never tear the connection down.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::SessionError;
use crate::infrastructure::auth::{AuthVerifier, AuthenticatedUser};
use crate::infrastructure::dto::ws::{
    AckEnvelope, ClientEnvelope, InviteSendPayload, MovePayload, RespondPayload,
    RoomCreatePayload, RoomJoinPayload, event,
};
use crate::ui::state::{AppState, ConnectQuery};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let token = query.token.clone().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(AuthVerifier::bearer)
            .map(str::to_string)
    });
    let Some(token) = token else {
        tracing::warn!("Rejecting connection without token");
        return Err(StatusCode::UNAUTHORIZED);
    };
    let user = match state.auth.verify(&token) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Rejecting connection with invalid token: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    tracing::info!("User '{}' authenticated for WebSocket upgrade", user.user_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Spawns a task that drains the connection's channel into the socket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: AuthenticatedUser) {
    let connection_id = state.next_connection_id();
    let (tx, rx) = mpsc::unbounded_channel();

    state
        .connect_user
        .execute(user.as_player(), connection_id, tx.clone())
        .await;
    tracing::info!(
        "User '{}' connected (connection {})",
        user.user_id,
        connection_id
    );

    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);

    let state_clone = state.clone();
    let user_clone = user.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let reply = dispatch(&state_clone, &user_clone, &text).await;
                    let reply_json =
                        serde_json::to_string(&reply).expect("ack envelope serializes");
                    // a closed connection simply drops the ack
                    if tx.send(reply_json).is_err() {
                        break;
                    }
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection {} requested close", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state
        .disconnect_user
        .execute(&user.user_id, connection_id)
        .await;
    tracing::info!(
        "User '{}' disconnected (connection {})",
        user.user_id,
        connection_id
    );
}

/// Route one inbound frame to its use case and build the single ack.
pub(crate) async fn dispatch(
    state: &AppState,
    user: &AuthenticatedUser,
    text: &str,
) -> AckEnvelope {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!("Unparseable frame from '{}': {}", user.user_id, e);
            return AckEnvelope::err(None, format!("Invalid message: {e}"));
        }
    };
    tracing::debug!("Event '{}' from '{}'", envelope.event, user.user_id);

    let ack = envelope.ack;
    let payload = envelope.payload.unwrap_or(Value::Null);
    let player = user.as_player();

    let result: Result<Option<Value>, SessionError> = match envelope.event.as_str() {
        event::ROOM_CREATE => {
            let p: RoomCreatePayload = from_payload_or_default(payload);
            state
                .room_lifecycle
                .create(player, p.room_id)
                .await
                .map(to_data)
        }
        event::ROOM_JOIN => match serde_json::from_value::<RoomJoinPayload>(payload) {
            Ok(p) => state
                .room_lifecycle
                .join(player, &p.room_id)
                .await
                .map(to_data),
            Err(_) => Err(SessionError::RoomNotFound),
        },
        event::ROOM_LEAVE => state
            .room_lifecycle
            .leave(&user.user_id)
            .await
            .map(|_| None),
        event::ROOM_STATE => state.room_lifecycle.state(&user.user_id).await.map(to_data),
        event::GAME_STATE => state.play_move.game_state(&user.user_id).await.map(to_data),
        event::CHESS_MOVE => {
            let p: MovePayload = from_payload_or_default(payload);
            let promotion = p.promotion.as_deref().and_then(|s| s.trim().chars().next());
            state
                .play_move
                .execute(&player, p.room_id.as_deref(), &p.from, &p.to, promotion)
                .await
                .map(to_data)
        }
        event::INVITE_SEND => {
            let p: InviteSendPayload = from_payload_or_default(payload);
            state
                .send_invite
                .execute(&player, &p.to_user_id, p.room_id.as_deref())
                .await
                .map(to_data)
        }
        event::REMATCH_REQUEST => state.rematch.request(&player).await.map(to_data),
        event::REMATCH_RESPOND => {
            let p: RespondPayload = from_payload_or_default(payload);
            state.rematch.respond(&player, p.accept).await.map(to_data)
        }
        event::DRAW_REQUEST => state.draw_offer.request(&player).await.map(to_data),
        event::DRAW_RESPOND => {
            let p: RespondPayload = from_payload_or_default(payload);
            state
                .draw_offer
                .respond(&player, p.accept)
                .await
                .map(to_data)
        }
        unknown => {
            tracing::warn!("Unknown event '{}' from '{}'", unknown, user.user_id);
            return AckEnvelope::err(ack, format!("Unknown event: {unknown}"));
        }
    };

    match result {
        Ok(data) => AckEnvelope::ok(ack, data),
        Err(e) => AckEnvelope::err(ack, e.to_string()),
    }
}

fn to_data<T: serde::Serialize>(dto: T) -> Option<Value> {
    Some(serde_json::to_value(dto).expect("ack data serializes"))
}

/// Payloads whose fields all carry defaults tolerate absent or
/// malformed payload objects.
fn from_payload_or_default<T: serde::de::DeserializeOwned + Default>(payload: Value) -> T {
    if payload.is_null() {
        return T::default();
    }
    serde_json::from_value(payload).unwrap_or_default()
}
