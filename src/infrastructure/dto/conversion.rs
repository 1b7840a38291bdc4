//! Conversion logic from domain models to wire DTOs.

use std::collections::HashSet;

use crate::domain::{GameSnapshot, GameStart, MoveRecord, Player, Room, RoomId, Side};

use super::ws::{
    ClockMsDto, GameSnapshotDto, GameStartDto, MoveResultDto, PlayerDto, RoomPlayerDto,
    RoomStateDto, SeatsDto,
};

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            user_id: player.user_id.as_str().to_string(),
            username: player.username.as_str().to_string(),
        }
    }
}

/// Build the client-facing room state.
///
/// `online_ids` is the presence snapshot at emission time; the room does
/// not track connections itself.
pub fn room_state_dto(room: &Room, online_ids: &HashSet<String>) -> RoomStateDto {
    let players = room
        .players()
        .iter()
        .map(|p| RoomPlayerDto {
            user_id: p.user_id.as_str().to_string(),
            username: p.username.as_str().to_string(),
            online: online_ids.contains(p.user_id.as_str()),
            color: room.seat_of(&p.user_id),
        })
        .collect();
    RoomStateDto {
        room_id: room.id().as_str().to_string(),
        players,
        status: room.phase(),
    }
}

pub fn snapshot_dto(room_id: &RoomId, snapshot: &GameSnapshot) -> GameSnapshotDto {
    GameSnapshotDto {
        room_id: room_id.as_str().to_string(),
        fen: snapshot.fen.clone(),
        turn: snapshot.turn,
        is_check: snapshot.is_check,
        status: snapshot.status,
        winner_color: snapshot.winner,
        clock_ms: ClockMsDto {
            w: snapshot.white_ms,
            b: snapshot.black_ms,
        },
        players: SeatsDto {
            white: PlayerDto::from(&snapshot.white),
            black: PlayerDto::from(&snapshot.black),
        },
    }
}

pub fn game_start_dto(room_id: &RoomId, start: &GameStart) -> GameStartDto {
    GameStartDto {
        room_id: room_id.as_str().to_string(),
        white: PlayerDto::from(&start.white),
        black: PlayerDto::from(&start.black),
        fen: start.fen.clone(),
        turn: start.turn,
    }
}

pub fn move_result_dto(
    room_id: &RoomId,
    record: &MoveRecord,
    fen: &str,
    turn: Side,
    by: &Player,
) -> MoveResultDto {
    MoveResultDto {
        room_id: room_id.as_str().to_string(),
        from: record.from.clone(),
        to: record.to.clone(),
        san: record.san.clone(),
        fen: fen.to_string(),
        turn,
        by: PlayerDto::from(by),
    }
}
