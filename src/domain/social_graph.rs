//! Social graph port.
//!
//! Friendships live in an external service; the invite flow only needs
//! to ask one question about them. The lookup may suspend (it is a
//! remote call in production), so callers must never hold a room lock
//! across it.

use async_trait::async_trait;

use super::value_object::UserId;

/// Friendship state between two users as the external service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    /// Mutually accepted friendship
    Accepted,
    /// Request sent but not yet accepted
    Pending,
    /// No relationship
    None,
}

/// Query port to the external social-graph service.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Friendship state between `a` and `b` (symmetric).
    async fn friendship(&self, a: &UserId, b: &UserId) -> FriendshipStatus;
}
