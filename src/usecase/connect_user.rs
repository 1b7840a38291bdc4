//! UseCase: user connection (presence attach + state replay).
//!
//! Runs once per accepted socket. Registers the connection with the
//! pusher, replays the user's current room and game state to the new
//! connection (reconnect path), then announces the updated global
//! online list to everyone.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{ConnectionId, MessagePusher, Player, PusherChannel};
use crate::infrastructure::dto::conversion::{room_state_dto, snapshot_dto};
use crate::infrastructure::dto::ws::event;
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_presence, online_id_set, push_frame};

/// 参加者接続のユースケース
pub struct ConnectUserUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectUserUseCase {
    pub fn new(
        registry: Arc<InMemoryRoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            clock,
        }
    }

    /// Attach a fresh connection for `player`.
    pub async fn execute(
        &self,
        player: Player,
        connection_id: ConnectionId,
        sender: PusherChannel,
    ) {
        self.message_pusher
            .register_connection(player.clone(), connection_id, sender)
            .await;

        // Replay current room + game state to this connection only; a
        // disconnect does not evict the user from their room.
        if let Some((room_id, room)) = self.registry.room_of_user(&player.user_id).await {
            let now = self.clock.now_millis();
            let mut guard = room.lock().await;
            let online = online_id_set(self.message_pusher.as_ref()).await;
            let state = push_frame(event::ROOM_STATE, room_state_dto(&guard, &online));
            if let Err(e) = self
                .message_pusher
                .push_to_connection(&player.user_id, connection_id, &state)
                .await
            {
                tracing::warn!("Failed to replay room state to '{}': {}", player.user_id, e);
            }
            if let Some(snapshot) = guard.snapshot(now) {
                let frame = push_frame(event::GAME_STATE, snapshot_dto(&room_id, &snapshot));
                if let Err(e) = self
                    .message_pusher
                    .push_to_connection(&player.user_id, connection_id, &frame)
                    .await
                {
                    tracing::warn!(
                        "Failed to replay game state to '{}': {}",
                        player.user_id,
                        e
                    );
                }
            }
            tracing::info!(
                "Re-subscribed '{}' to room {} on reconnect",
                player.user_id,
                room_id
            );
        }

        broadcast_presence(self.message_pusher.as_ref()).await;
    }
}
