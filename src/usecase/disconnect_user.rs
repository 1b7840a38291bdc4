//! UseCase: user disconnection.
//!
//! Removes one connection. Only when the user's last connection goes
//! does anything become visible: the room (if any) learns the occupant
//! is offline, and the global online list is re-broadcast. The user is
//! never evicted from their room here; reconnection is permitted.

use std::sync::Arc;

use crate::domain::{ConnectionId, MessagePusher, UserId};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_presence, broadcast_room_state};

/// 参加者切断のユースケース
pub struct DisconnectUserUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectUserUseCase {
    pub fn new(registry: Arc<InMemoryRoomRegistry>, message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            registry,
            message_pusher,
        }
    }

    /// Detach `connection_id` of `user_id`.
    pub async fn execute(&self, user_id: &UserId, connection_id: ConnectionId) {
        let went_offline = self
            .message_pusher
            .unregister_connection(user_id, connection_id)
            .await;
        if !went_offline {
            return;
        }
        tracing::info!("User '{}' went offline", user_id);

        if let Some((_, room)) = self.registry.room_of_user(user_id).await {
            let guard = room.lock().await;
            broadcast_room_state(self.message_pusher.as_ref(), &guard).await;
        }
        broadcast_presence(self.message_pusher.as_ref()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, Username};
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn player(id: &str) -> Player {
        Player {
            user_id: UserId::new(id.to_string()).unwrap(),
            username: Username::new(format!("{id}-name")).unwrap(),
        }
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn test_disconnect_last_connection_marks_offline_in_room() {
        // テスト項目: 最後の接続が切れると同室者が online:false を見る
        // given (前提条件): u1 と u2 が同室、両者接続中
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = DisconnectUserUseCase::new(registry.clone(), pusher.clone());

        let (room_id, _) = registry.create(player("u1"), None).await.unwrap();
        registry.join(player("u2"), &room_id).await.unwrap();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("u1"), 1, tx1).await;
        pusher.register_connection(player("u2"), 2, tx2).await;

        // when (操作):
        usecase.execute(&uid("u1"), 1).await;

        // then (期待する結果): room:state で u1 が offline、その後 presence:online
        let state = parse(&rx2.recv().await.unwrap());
        assert_eq!(state["event"], "room:state");
        let u1 = state["payload"]["players"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["userId"] == "u1")
            .unwrap()
            .clone();
        assert_eq!(u1["online"], false);
        let presence = parse(&rx2.recv().await.unwrap());
        assert_eq!(presence["event"], "presence:online");
        assert_eq!(presence["payload"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_one_of_two_tabs_is_silent() {
        // テスト項目: 残る接続がある切断では何も配信されない
        // given (前提条件): u1 が 2 接続、u2 が観測者
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = DisconnectUserUseCase::new(registry.clone(), pusher.clone());

        let (tx1a, _rx1a) = mpsc::unbounded_channel();
        let (tx1b, _rx1b) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("u1"), 1, tx1a).await;
        pusher.register_connection(player("u1"), 2, tx1b).await;
        pusher.register_connection(player("u2"), 3, tx2).await;

        // when (操作):
        usecase.execute(&uid("u1"), 1).await;

        // then (期待する結果):
        assert!(rx2.try_recv().is_err());
        assert!(pusher.is_online(&uid("u1")).await);
    }

    #[tokio::test]
    async fn test_disconnect_does_not_evict_from_room() {
        // テスト項目: 切断してもユーザーは部屋に残る
        // given (前提条件):
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = DisconnectUserUseCase::new(registry.clone(), pusher.clone());
        registry.create(player("u1"), None).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register_connection(player("u1"), 1, tx).await;

        // when (操作):
        usecase.execute(&uid("u1"), 1).await;

        // then (期待する結果):
        assert!(registry.room_of_user(&uid("u1")).await.is_some());
    }
}
