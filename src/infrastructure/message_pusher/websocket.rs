//! WebSocket-backed MessagePusher implementation.
//!
//! Owns the `userId -> connections` map: each connection is the
//! `UnboundedSender` feeding that socket's pusher loop. A user with
//! several tabs has several senders, and every user-targeted push goes
//! to all of them. Broadcasts tolerate partial failure; a dead sender is
//! logged and skipped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, Player, PusherChannel, UserId};

struct UserConnections {
    player: Player,
    senders: HashMap<ConnectionId, PusherChannel>,
}

/// In-process connection registry and push fan-out.
pub struct WebSocketMessagePusher {
    users: Arc<Mutex<HashMap<String, UserConnections>>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop every registered connection (test hook).
    pub async fn reset(&self) {
        self.users.lock().await.clear();
    }

    fn send_or_warn(user_id: &str, connection_id: ConnectionId, sender: &PusherChannel, content: &str) {
        if sender.send(content.to_string()).is_err() {
            tracing::warn!(
                "Failed to push message to connection {} of user '{}'",
                connection_id,
                user_id
            );
        }
    }
}

impl Default for WebSocketMessagePusher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(
        &self,
        player: Player,
        connection_id: ConnectionId,
        sender: PusherChannel,
    ) {
        let mut users = self.users.lock().await;
        let entry = users
            .entry(player.user_id.as_str().to_string())
            .or_insert_with(|| UserConnections {
                player: player.clone(),
                senders: HashMap::new(),
            });
        // a reconnect may carry a fresher username
        entry.player = player;
        entry.senders.insert(connection_id, sender);
        tracing::debug!(
            "Connection {} registered for user '{}'",
            connection_id,
            entry.player.user_id
        );
    }

    async fn unregister_connection(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let mut users = self.users.lock().await;
        let Some(entry) = users.get_mut(user_id.as_str()) else {
            return false;
        };
        entry.senders.remove(&connection_id);
        tracing::debug!(
            "Connection {} unregistered for user '{}'",
            connection_id,
            user_id
        );
        if entry.senders.is_empty() {
            users.remove(user_id.as_str());
            return true;
        }
        false
    }

    async fn push_to_connection(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let users = self.users.lock().await;
        let sender = users
            .get(user_id.as_str())
            .and_then(|entry| entry.senders.get(&connection_id))
            .ok_or(MessagePushError::ConnectionNotFound(connection_id))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    async fn push_to_user(&self, user_id: &UserId, content: &str) {
        let users = self.users.lock().await;
        if let Some(entry) = users.get(user_id.as_str()) {
            for (connection_id, sender) in &entry.senders {
                Self::send_or_warn(user_id.as_str(), *connection_id, sender, content);
            }
        }
    }

    async fn broadcast_users(&self, targets: &[UserId], content: &str) {
        let users = self.users.lock().await;
        for target in targets {
            if let Some(entry) = users.get(target.as_str()) {
                for (connection_id, sender) in &entry.senders {
                    Self::send_or_warn(target.as_str(), *connection_id, sender, content);
                }
            } else {
                tracing::debug!("User '{}' not connected during broadcast, skipping", target);
            }
        }
    }

    async fn broadcast_all(&self, content: &str) {
        let users = self.users.lock().await;
        for (user_id, entry) in users.iter() {
            for (connection_id, sender) in &entry.senders {
                Self::send_or_warn(user_id, *connection_id, sender, content);
            }
        }
    }

    async fn is_online(&self, user_id: &UserId) -> bool {
        self.users.lock().await.contains_key(user_id.as_str())
    }

    async fn online_users(&self) -> Vec<Player> {
        let users = self.users.lock().await;
        let mut online: Vec<Player> = users.values().map(|entry| entry.player.clone()).collect();
        online.sort_by(|a, b| a.user_id.as_str().cmp(b.user_id.as_str()));
        online
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserId, Username};
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

    #[tokio::test]
    async fn test_push_to_user_reaches_all_tabs() {
        // テスト項目: 同一ユーザーの全接続にメッセージが届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx1).await;
        pusher.register_connection(player("alice"), 2, tx2).await;

        // when (操作):
        pusher.push_to_user(&uid("alice"), "Hello").await;

        // then (期待する結果):
        assert_eq!(rx1.recv().await, Some("Hello".to_string()));
        assert_eq!(rx2.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_connection_targets_one_tab() {
        // テスト項目: 接続単位の push は指定した接続だけに届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx1).await;
        pusher.register_connection(player("alice"), 2, tx2).await;

        // when (操作):
        pusher
            .push_to_connection(&uid("alice"), 2, "Hello")
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(rx2.recv().await, Some("Hello".to_string()));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_to_unknown_connection_fails() {
        // テスト項目: 未登録の接続への push はエラーになる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher.push_to_connection(&uid("alice"), 1, "Hello").await;

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            MessagePushError::ConnectionNotFound(1)
        );
    }

    #[tokio::test]
    async fn test_unregister_reports_offline_on_last_connection() {
        // テスト項目: 最後の接続を外したときだけオフライン扱いになる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx1).await;
        pusher.register_connection(player("alice"), 2, tx2).await;

        // when (操作) / then (期待する結果):
        assert!(!pusher.unregister_connection(&uid("alice"), 1).await);
        assert!(pusher.is_online(&uid("alice")).await);
        assert!(pusher.unregister_connection(&uid("alice"), 2).await);
        assert!(!pusher.is_online(&uid("alice")).await);
    }

    #[tokio::test]
    async fn test_broadcast_users_skips_offline_targets() {
        // テスト項目: ブロードキャストは未接続ユーザーを読み飛ばす
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx).await;

        // when (操作):
        pusher
            .broadcast_users(&[uid("alice"), uid("ghost")], "Broadcast message")
            .await;

        // then (期待する結果):
        assert_eq!(rx.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_all_reaches_everyone() {
        // テスト項目: broadcast_all が全ユーザーの全接続に届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx1).await;
        pusher.register_connection(player("bob"), 2, tx2).await;

        // when (操作):
        pusher.broadcast_all("presence").await;

        // then (期待する結果):
        assert_eq!(rx1.recv().await, Some("presence".to_string()));
        assert_eq!(rx2.recv().await, Some("presence".to_string()));
    }

    #[tokio::test]
    async fn test_online_users_snapshot() {
        // テスト項目: オンライン一覧が接続中ユーザーのみを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        pusher.register_connection(player("bob"), 1, tx1).await;
        pusher.register_connection(player("alice"), 2, tx2).await;
        pusher.unregister_connection(&uid("bob"), 1).await;

        // when (操作):
        let online = pusher.online_users().await;

        // then (期待する結果):
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].user_id.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_reset_clears_registry() {
        // テスト項目: reset で全接続が破棄される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register_connection(player("alice"), 1, tx).await;

        // when (操作):
        pusher.reset().await;

        // then (期待する結果):
        assert!(!pusher.is_online(&uid("alice")).await);
        assert!(pusher.online_users().await.is_empty());
    }
}
