//! Emission helpers shared by the use cases.
//!
//! All of these may be called while a room lock is held; they only ever
//! take the pusher's internal lock, which is a leaf in the lock order.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{MessagePusher, Room, RoomId, UserId};
use crate::infrastructure::dto::conversion::{room_state_dto, snapshot_dto};
use crate::infrastructure::dto::ws::{PlayerDto, PushEnvelope, event};

/// Serialize a server push frame.
pub(crate) fn push_frame(event: &'static str, payload: impl Serialize) -> String {
    let envelope = PushEnvelope {
        event,
        payload: serde_json::to_value(payload).expect("push payload serializes"),
    };
    serde_json::to_string(&envelope).expect("push envelope serializes")
}

/// User ids of everyone seated in the room (the fan-out set).
pub(crate) fn room_targets(room: &Room) -> Vec<UserId> {
    room.players().iter().map(|p| p.user_id.clone()).collect()
}

/// Presence snapshot as a set of user-id strings.
pub(crate) async fn online_id_set(pusher: &dyn MessagePusher) -> HashSet<String> {
    pusher
        .online_users()
        .await
        .into_iter()
        .map(|p| p.user_id.into_string())
        .collect()
}

/// Broadcast the room's current `room:state` to its occupants.
pub(crate) async fn broadcast_room_state(pusher: &dyn MessagePusher, room: &Room) {
    let online = online_id_set(pusher).await;
    let dto = room_state_dto(room, &online);
    pusher
        .broadcast_users(&room_targets(room), &push_frame(event::ROOM_STATE, dto))
        .await;
}

/// Broadcast the global online list to every connection.
pub(crate) async fn broadcast_presence(pusher: &dyn MessagePusher) {
    let online: Vec<PlayerDto> = pusher.online_users().await.iter().map(PlayerDto::from).collect();
    pusher
        .broadcast_all(&push_frame(event::PRESENCE_ONLINE, online))
        .await;
}

/// Broadcast `game:over` iff this call is the first to observe the end.
pub(crate) async fn broadcast_game_over_once(
    pusher: &dyn MessagePusher,
    room_id: &RoomId,
    room: &mut Room,
    now: i64,
) {
    if let Some(snapshot) = room.announce_over_once(now) {
        let dto = snapshot_dto(room_id, &snapshot);
        pusher
            .broadcast_users(&room_targets(room), &push_frame(event::GAME_OVER, dto))
            .await;
    }
}
