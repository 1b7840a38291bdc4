//! In-memory social graph.
//!
//! Stand-in for the external social-graph service: an unordered-pair set
//! of relationships, queried symmetrically. Production deployments
//! replace this with a client for the real service behind the same port.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{FriendshipStatus, SocialGraph, UserId};

/// Pair-keyed friendship store.
pub struct InMemorySocialGraph {
    pairs: Mutex<HashMap<(String, String), FriendshipStatus>>,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self {
            pairs: Mutex::new(HashMap::new()),
        }
    }

    fn key(a: &UserId, b: &UserId) -> (String, String) {
        let (x, y) = (a.as_str().to_string(), b.as_str().to_string());
        if x <= y { (x, y) } else { (y, x) }
    }

    /// Record a mutually accepted friendship.
    pub async fn add_accepted(&self, a: &UserId, b: &UserId) {
        self.pairs
            .lock()
            .await
            .insert(Self::key(a, b), FriendshipStatus::Accepted);
    }

    /// Record a friend request that has not been accepted yet.
    pub async fn add_pending(&self, a: &UserId, b: &UserId) {
        self.pairs
            .lock()
            .await
            .insert(Self::key(a, b), FriendshipStatus::Pending);
    }

    /// Forget every relationship (test hook).
    pub async fn reset(&self) {
        self.pairs.lock().await.clear();
    }
}

impl Default for InMemorySocialGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn friendship(&self, a: &UserId, b: &UserId) -> FriendshipStatus {
        self.pairs
            .lock()
            .await
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(FriendshipStatus::None)
    }
}
