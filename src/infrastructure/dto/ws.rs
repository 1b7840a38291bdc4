//! WebSocket wire DTOs.
//!
//! Every frame is a JSON envelope. Clients send
//! `{ "event": <name>, "ack": <n?>, "payload": <object?> }`; the server
//! answers each ack-bearing frame exactly once with an [`AckEnvelope`]
//! and pushes state deltas as [`PushEnvelope`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{GameStatus, RoomPhase, Side};

/// Event names, shared between the dispatch table and the emitters.
pub mod event {
    // client -> server
    pub const ROOM_CREATE: &str = "room:create";
    pub const ROOM_JOIN: &str = "room:join";
    pub const ROOM_LEAVE: &str = "room:leave";
    pub const ROOM_STATE: &str = "room:state";
    pub const GAME_STATE: &str = "game:state";
    pub const CHESS_MOVE: &str = "chess:move";
    pub const INVITE_SEND: &str = "invite:send";
    pub const REMATCH_REQUEST: &str = "game:rematch:request";
    pub const REMATCH_RESPOND: &str = "game:rematch:respond";
    pub const DRAW_REQUEST: &str = "game:draw:request";
    pub const DRAW_RESPOND: &str = "game:draw:respond";

    // server -> client
    pub const ACK: &str = "ack";
    pub const PRESENCE_ONLINE: &str = "presence:online";
    pub const ROOM_ERROR: &str = "room:error";
    pub const GAME_START: &str = "game:start";
    pub const GAME_OVER: &str = "game:over";
    pub const REMATCH_REQUESTED: &str = "game:rematch:requested";
    pub const REMATCH_STATUS: &str = "game:rematch:status";
    pub const DRAW_REQUESTED: &str = "game:draw:requested";
    pub const DRAW_STATUS: &str = "game:draw:status";
    pub const INVITE_RECEIVED: &str = "invite:received";
}

// ========================================
// Envelopes
// ========================================

/// Inbound client frame
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub event: String,
    #[serde(default)]
    pub ack: Option<u64>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Reply to an ack-bearing client frame
#[derive(Debug, Clone, Serialize)]
pub struct AckEnvelope {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckEnvelope {
    pub fn ok(ack: Option<u64>, data: Option<Value>) -> Self {
        Self {
            event: event::ACK,
            ack,
            ok: true,
            data,
            error: None,
        }
    }

    pub fn err(ack: Option<u64>, message: String) -> Self {
        Self {
            event: event::ACK,
            ack,
            ok: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Server push frame
#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    pub event: &'static str,
    pub payload: Value,
}

// ========================================
// Client -> server payloads
// ========================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatePayload {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondPayload {
    #[serde(default)]
    pub accept: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSendPayload {
    #[serde(default)]
    pub to_user_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

// ========================================
// Server -> client payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerDto {
    pub user_id: String,
    pub username: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateDto {
    pub room_id: String,
    pub players: Vec<RoomPlayerDto>,
    pub status: RoomPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockMsDto {
    pub w: i64,
    pub b: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatsDto {
    pub white: PlayerDto,
    pub black: PlayerDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshotDto {
    pub room_id: String,
    pub fen: String,
    pub turn: Side,
    pub is_check: bool,
    pub status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_color: Option<Side>,
    pub clock_ms: ClockMsDto,
    pub players: SeatsDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartDto {
    pub room_id: String,
    pub white: PlayerDto,
    pub black: PlayerDto,
    pub fen: String,
    pub turn: Side,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResultDto {
    pub room_id: String,
    pub from: String,
    pub to: String,
    pub san: String,
    pub fen: String,
    pub turn: Side,
    pub by: PlayerDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomErrorDto {
    pub message: String,
}

/// `game:draw:requested` / `game:rematch:requested`, sent only to the
/// opponent's connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequestedDto {
    pub from: PlayerDto,
}

/// `game:draw:status` / `game:rematch:status`, broadcast to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStatusDto {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<PlayerDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteReceivedDto {
    pub from: PlayerDto,
    pub room_id: String,
    pub invite_link: String,
}

// ========================================
// Ack data payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteAckDto {
    pub room_id: String,
    pub invite_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RematchAckDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawAckDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}
