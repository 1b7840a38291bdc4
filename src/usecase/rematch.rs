//! UseCase: rematch protocol.
//!
//! Mirrors the draw offer flow but runs only after game over; mutual
//! agreement replaces the finished game with a fresh one, colors
//! re-randomized, and replays the start fan-out.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::room::{RematchRequestOutcome, RematchRespondOutcome};
use crate::domain::{GameStart, MessagePusher, Player, Room, RoomId, SessionError};
use crate::infrastructure::dto::conversion::{game_start_dto, snapshot_dto};
use crate::infrastructure::dto::ws::{
    OfferRequestedDto, OfferStatusDto, PlayerDto, RematchAckDto, event,
};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_room_state, push_frame, room_targets};

/// 再戦提案のユースケース
pub struct RematchUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl RematchUseCase {
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

    /// Request a rematch; starts immediately if the opponent already asked.
    pub async fn request(&self, player: &Player) -> Result<RematchAckDto, SessionError> {
        let (room_id, room) = self
            .registry
            .room_of_user(&player.user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        let outcome = guard.request_rematch(&player.user_id, now)?;

        match outcome {
            RematchRequestOutcome::Waiting { opponent } => {
                let requested = OfferRequestedDto {
                    from: PlayerDto::from(player),
                };
                self.message_pusher
                    .push_to_user(
                        &opponent.user_id,
                        &push_frame(event::REMATCH_REQUESTED, requested),
                    )
                    .await;
                let status = OfferStatusDto {
                    status: "requested".to_string(),
                    message: format!("{} wants a rematch", player.username),
                    by: Some(PlayerDto::from(player)),
                };
                self.message_pusher
                    .broadcast_users(
                        &room_targets(&guard),
                        &push_frame(event::REMATCH_STATUS, status),
                    )
                    .await;
                Ok(RematchAckDto {
                    waiting_for: Some(opponent.user_id.into_string()),
                    started: None,
                })
            }
            RematchRequestOutcome::Started(start) => {
                self.fan_out_started(&room_id, &mut guard, &start, now).await;
                Ok(RematchAckDto {
                    waiting_for: None,
                    started: Some(true),
                })
            }
        }
    }

    /// Answer the opponent's rematch request.
    pub async fn respond(
        &self,
        player: &Player,
        accept: bool,
    ) -> Result<RematchAckDto, SessionError> {
        let (room_id, room) = self
            .registry
            .room_of_user(&player.user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        let outcome = guard.respond_rematch(&player.user_id, accept, now)?;

        match outcome {
            RematchRespondOutcome::Declined => {
                let status = OfferStatusDto {
                    status: "declined".to_string(),
                    message: format!("{} declined the rematch", player.username),
                    by: Some(PlayerDto::from(player)),
                };
                self.message_pusher
                    .broadcast_users(
                        &room_targets(&guard),
                        &push_frame(event::REMATCH_STATUS, status),
                    )
                    .await;
                Ok(RematchAckDto::default())
            }
            RematchRespondOutcome::Started(start) => {
                self.fan_out_started(&room_id, &mut guard, &start, now).await;
                Ok(RematchAckDto {
                    waiting_for: None,
                    started: Some(true),
                })
            }
        }
    }

    /// `rematch:status{started}`, then `game:start`, a fresh snapshot
    /// and the re-colored room state.
    async fn fan_out_started(&self, room_id: &RoomId, room: &mut Room, start: &GameStart, now: i64) {
        tracing::info!(
            "Rematch started in room {}: {} (w) vs {} (b)",
            room_id,
            start.white.user_id,
            start.black.user_id
        );
        let targets = room_targets(room);
        let status = OfferStatusDto {
            status: "started".to_string(),
            message: "Rematch accepted".to_string(),
            by: None,
        };
        self.message_pusher
            .broadcast_users(&targets, &push_frame(event::REMATCH_STATUS, status))
            .await;
        self.message_pusher
            .broadcast_users(
                &targets,
                &push_frame(event::GAME_START, game_start_dto(room_id, start)),
            )
            .await;
        if let Some(snapshot) = room.snapshot(now) {
            self.message_pusher
                .broadcast_users(
                    &targets,
                    &push_frame(event::GAME_STATE, snapshot_dto(room_id, &snapshot)),
                )
                .await;
        }
        broadcast_room_state(self.message_pusher.as_ref(), room).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::domain::{UserId, Username};
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use serde_json::Value;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn player(id: &str) -> Player {
        Player {
            user_id: UserId::new(id.to_string()).unwrap(),
            username: Username::new(format!("{id}-name")).unwrap(),
        }
    }

    struct Fixture {
        usecase: RematchUseCase,
        registry: Arc<InMemoryRoomRegistry>,
        pusher: Arc<WebSocketMessagePusher>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let clock = Arc::new(FixedClock::new(1_000_000));
        Fixture {
            usecase: RematchUseCase::new(registry.clone(), pusher.clone(), clock.clone()),
            registry,
            pusher,
            clock,
        }
    }

    /// u1/u2 で対局を開始し、タイムアウトで終了させる
    async fn finished_game(f: &Fixture) {
        let (room_id, room) = f.registry.create(player("u1"), None).await.unwrap();
        f.registry.join(player("u2"), &room_id).await.unwrap();
        room.lock().await.maybe_start(f.clock.now_millis()).unwrap();
        f.clock.advance(181_000);
        room.lock().await.snapshot(f.clock.now_millis()).unwrap();
    }

    async fn connect(f: &Fixture, id: &str, conn: u64) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        f.pusher.register_connection(player(id), conn, tx).await;
        rx
    }

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    async fn next_event(rx: &mut UnboundedReceiver<String>, event: &str) -> Value {
        loop {
            let frame = parse(&rx.recv().await.expect("expected another frame"));
            if frame["event"] == event {
                return frame;
            }
        }
    }

    #[tokio::test]
    async fn test_request_notifies_opponent() {
        // テスト項目: 再戦要求が相手に game:rematch:requested を届ける
        // given (前提条件):
        let f = fixture();
        finished_game(&f).await;
        let mut rx2 = connect(&f, "u2", 2).await;

        // when (操作):
        let ack = f.usecase.request(&player("u1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(ack.waiting_for.as_deref(), Some("u2"));
        assert_eq!(ack.started, None);
        let requested = next_event(&mut rx2, "game:rematch:requested").await;
        assert_eq!(requested["payload"]["from"]["userId"], "u1");
        let status = next_event(&mut rx2, "game:rematch:status").await;
        assert_eq!(status["payload"]["status"], "requested");
    }

    #[tokio::test]
    async fn test_accept_starts_fresh_game() {
        // テスト項目: 承諾で started ステータスと新規 game:start が配信される
        // given (前提条件):
        let f = fixture();
        finished_game(&f).await;
        f.usecase.request(&player("u1")).await.unwrap();
        let mut rx1 = connect(&f, "u1", 1).await;

        // when (操作):
        let ack = f.usecase.respond(&player("u2"), true).await.unwrap();

        // then (期待する結果):
        assert_eq!(ack.started, Some(true));
        let status = next_event(&mut rx1, "game:rematch:status").await;
        assert_eq!(status["payload"]["status"], "started");
        let start = next_event(&mut rx1, "game:start").await;
        assert_eq!(
            start["payload"]["fen"],
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        let state = next_event(&mut rx1, "game:state").await;
        assert_eq!(state["payload"]["status"], "active");
        assert_eq!(state["payload"]["clockMs"]["w"], 180_000);
    }

    #[tokio::test]
    async fn test_mutual_request_starts_game() {
        // テスト項目: 双方の request で即座に再戦が始まる
        // given (前提条件):
        let f = fixture();
        finished_game(&f).await;
        f.usecase.request(&player("u1")).await.unwrap();

        // when (操作):
        let ack = f.usecase.request(&player("u2")).await.unwrap();

        // then (期待する結果):
        assert_eq!(ack.started, Some(true));
    }

    #[tokio::test]
    async fn test_decline_broadcasts_status() {
        // テスト項目: 拒否で declined ステータスが配信され保留が消える
        // given (前提条件):
        let f = fixture();
        finished_game(&f).await;
        f.usecase.request(&player("u1")).await.unwrap();
        let mut rx1 = connect(&f, "u1", 1).await;

        // when (操作):
        let ack = f.usecase.respond(&player("u2"), false).await.unwrap();

        // then (期待する結果):
        assert_eq!(ack.started, None);
        let status = next_event(&mut rx1, "game:rematch:status").await;
        assert_eq!(status["payload"]["status"], "declined");
        assert_eq!(
            f.usecase.respond(&player("u2"), true).await.unwrap_err(),
            SessionError::NoRematchRequest
        );
    }

    #[tokio::test]
    async fn test_request_during_active_game() {
        // テスト項目: 対局中の再戦要求は拒否される
        // given (前提条件):
        let f = fixture();
        let (room_id, room) = f.registry.create(player("u1"), None).await.unwrap();
        f.registry.join(player("u2"), &room_id).await.unwrap();
        room.lock().await.maybe_start(f.clock.now_millis()).unwrap();

        // when (操作):
        let result = f.usecase.request(&player("u1")).await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::RematchBeforeGameOver);
    }

    #[tokio::test]
    async fn test_request_without_game() {
        // テスト項目: ゲームの無い部屋での再戦要求は Game not started になる
        // given (前提条件):
        let f = fixture();
        f.registry.create(player("u1"), None).await.unwrap();

        // when (操作):
        let result = f.usecase.request(&player("u1")).await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::GameNotStarted);
    }
}
