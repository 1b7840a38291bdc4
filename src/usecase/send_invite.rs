//! UseCase: friend invites into a room.
//!
//! Gated in order: self-invite, room resolution, seating, friendship and
//! target presence. The friendship lookup goes to the external social
//! graph and is issued after the room lock has been released.

use std::sync::Arc;

use crate::domain::{
    FriendshipStatus, MessagePusher, Player, RoomId, SessionError, SocialGraph, UserId,
};
use crate::infrastructure::dto::ws::{InviteAckDto, InviteReceivedDto, PlayerDto, event};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::push_frame;

/// 友人招待のユースケース
pub struct SendInviteUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    social_graph: Arc<dyn SocialGraph>,
    /// Base URL of the web client, used to compose invite links.
    origin: String,
}

impl SendInviteUseCase {
    pub fn new(
        registry: Arc<InMemoryRoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        social_graph: Arc<dyn SocialGraph>,
        origin: String,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            social_graph,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// Invite `to_user_id` into the sender's room (or an explicit one).
    pub async fn execute(
        &self,
        from: &Player,
        to_user_id: &str,
        room_id: Option<&str>,
    ) -> Result<InviteAckDto, SessionError> {
        let to_user_id = to_user_id.trim();
        if to_user_id.is_empty() {
            return Err(SessionError::MissingInviteTarget);
        }
        if to_user_id == from.user_id.as_str() {
            return Err(SessionError::SelfInvite);
        }
        let target =
            UserId::new(to_user_id.to_string()).map_err(|_| SessionError::MissingInviteTarget)?;

        // resolve the target room: explicit (normalized) or current
        let (room_id, room) = match room_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let id = RoomId::parse(raw).map_err(|_| SessionError::NoRoomForInvite)?;
                let room = self
                    .registry
                    .resolve(&id)
                    .await
                    .ok_or(SessionError::NoRoomForInvite)?;
                (id, room)
            }
            None => self
                .registry
                .room_of_user(&from.user_id)
                .await
                .ok_or(SessionError::NoRoomForInvite)?,
        };
        {
            let guard = room.lock().await;
            if !guard.is_occupant(&from.user_id) {
                return Err(SessionError::NotInThatRoom);
            }
        }
        // room lock released; the graph lookup may suspend on I/O
        if self.social_graph.friendship(&from.user_id, &target).await != FriendshipStatus::Accepted
        {
            return Err(SessionError::NotFriends);
        }
        if !self.message_pusher.is_online(&target).await {
            return Err(SessionError::FriendOffline);
        }

        // room ids are upper-case alphanumerics, URL-safe as-is
        let invite_link = format!("{}/?room={}", self.origin, room_id);
        let received = InviteReceivedDto {
            from: PlayerDto::from(from),
            room_id: room_id.as_str().to_string(),
            invite_link: invite_link.clone(),
        };
        self.message_pusher
            .push_to_user(&target, &push_frame(event::INVITE_RECEIVED, received))
            .await;
        tracing::info!("Invite sent from '{}' to '{}' for room {}", from.user_id, target, room_id);

        Ok(InviteAckDto {
            room_id: room_id.into_string(),
            invite_link,
        })
    }
}
