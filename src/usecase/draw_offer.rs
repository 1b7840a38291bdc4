//! UseCase: draw offer protocol.
//!
//! Symmetric two-party agreement: the offer goes point-to-point to the
//! opponent's connections, the status update goes to the whole room, and
//! acceptance ends the game through the ordinary snapshot path.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::room::DrawRespondOutcome;
use crate::domain::{MessagePusher, Player, SessionError};
use crate::infrastructure::dto::ws::{DrawAckDto, OfferRequestedDto, OfferStatusDto, PlayerDto, event};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_game_over_once, push_frame, room_targets};

/// ドロー提案のユースケース
pub struct DrawOfferUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl DrawOfferUseCase {
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

    /// Offer a draw to the opponent.
    pub async fn request(&self, player: &Player) -> Result<DrawAckDto, SessionError> {
        let (_, room) = self
            .registry
            .room_of_user(&player.user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        let outcome = guard.request_draw(&player.user_id, now)?;

        let requested = OfferRequestedDto {
            from: PlayerDto::from(player),
        };
        self.message_pusher
            .push_to_user(
                &outcome.opponent.user_id,
                &push_frame(event::DRAW_REQUESTED, requested),
            )
            .await;
        let status = OfferStatusDto {
            status: "requested".to_string(),
            message: format!("{} offered a draw", player.username),
            by: Some(PlayerDto::from(player)),
        };
        self.message_pusher
            .broadcast_users(&room_targets(&guard), &push_frame(event::DRAW_STATUS, status))
            .await;

        Ok(DrawAckDto {
            waiting_for: Some(outcome.opponent.user_id.into_string()),
            accepted: None,
        })
    }

    /// Answer the opponent's draw offer.
    pub async fn respond(&self, player: &Player, accept: bool) -> Result<DrawAckDto, SessionError> {
        let (room_id, room) = self
            .registry
            .room_of_user(&player.user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        let outcome = guard.respond_draw(&player.user_id, accept, now)?;

        match outcome {
            DrawRespondOutcome::Accepted => {
                let status = OfferStatusDto {
                    status: "accepted".to_string(),
                    message: format!("{} accepted the draw", player.username),
                    by: Some(PlayerDto::from(player)),
                };
                self.message_pusher
                    .broadcast_users(
                        &room_targets(&guard),
                        &push_frame(event::DRAW_STATUS, status),
                    )
                    .await;
                broadcast_game_over_once(self.message_pusher.as_ref(), &room_id, &mut guard, now)
                    .await;
                Ok(DrawAckDto {
                    waiting_for: None,
                    accepted: Some(true),
                })
            }
            DrawRespondOutcome::Declined => {
                let status = OfferStatusDto {
                    status: "declined".to_string(),
                    message: format!("{} declined the draw", player.username),
                    by: Some(PlayerDto::from(player)),
                };
                self.message_pusher
                    .broadcast_users(
                        &room_targets(&guard),
                        &push_frame(event::DRAW_STATUS, status),
                    )
                    .await;
                Ok(DrawAckDto {
                    waiting_for: None,
                    accepted: Some(false),
                })
            }
        }
    }
}
