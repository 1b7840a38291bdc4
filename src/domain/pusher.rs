//! Message push port.
//!
//! The domain and use-case layers talk to connected clients through this
//! trait; the infrastructure layer provides the WebSocket-backed
//! implementation. A user may hold several connections at once
//! (multi-tab), so targets are either a single connection or every
//! connection of a user.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::room::Player;
use super::value_object::UserId;

/// Channel used to push messages to one connection
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Identifier of a single connection (one socket of one user)
pub type ConnectionId = u64;

/// Errors related to message push
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagePushError {
    /// Target connection is not registered
    #[error("Connection '{0}' is not registered")]
    ConnectionNotFound(ConnectionId),

    /// Sending on the connection channel failed
    #[error("Failed to push message: {0}")]
    PushFailed(String),
}

/// Push port: connection registration, presence snapshot and delivery.
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register a connection for `player`.
    async fn register_connection(
        &self,
        player: Player,
        connection_id: ConnectionId,
        sender: PusherChannel,
    );

    /// Remove a connection. Returns `true` when this was the user's last
    /// connection (the user just went offline).
    async fn unregister_connection(&self, user_id: &UserId, connection_id: ConnectionId) -> bool;

    /// Push to exactly one connection of `user_id`.
    async fn push_to_connection(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// Push to every connection of `user_id`. Absent users are skipped.
    async fn push_to_user(&self, user_id: &UserId, content: &str);

    /// Push to every connection of each target user.
    async fn broadcast_users(&self, targets: &[UserId], content: &str);

    /// Push to every registered connection.
    async fn broadcast_all(&self, content: &str);

    /// A user is online iff it has at least one registered connection.
    async fn is_online(&self, user_id: &UserId) -> bool;

    /// Snapshot of all online users.
    async fn online_users(&self) -> Vec<Player>;
}
