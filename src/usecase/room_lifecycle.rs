//! UseCase: room lifecycle (create / join / leave / state query).
//!
//! A room auto-starts its game the moment the second seat is taken, so
//! `join` is also where `game:start` fan-out happens.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{MessagePusher, Player, RoomId, SessionError, UserId};
use crate::infrastructure::dto::conversion::{game_start_dto, room_state_dto, snapshot_dto};
use crate::infrastructure::dto::ws::{RoomErrorDto, RoomStateDto, event};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_room_state, online_id_set, push_frame, room_targets};

/// ルームライフサイクルのユースケース
pub struct RoomLifecycleUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl RoomLifecycleUseCase {
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

    /// Create a room, optionally around a client-supplied id seed.
    pub async fn create(
        &self,
        player: Player,
        seed: Option<String>,
    ) -> Result<RoomStateDto, SessionError> {
        let seed = match seed {
            Some(raw) if !raw.trim().is_empty() => {
                Some(RoomId::parse(&raw).map_err(|_| SessionError::InvalidRoom)?)
            }
            _ => None,
        };
        let (_, room) = self.registry.create(player, seed).await?;
        let guard = room.lock().await;
        let online = online_id_set(self.message_pusher.as_ref()).await;
        Ok(room_state_dto(&guard, &online))
    }

    /// Join a room by id; starts the game when the room fills up.
    pub async fn join(&self, player: Player, room_id: &str) -> Result<RoomStateDto, SessionError> {
        let room_id = RoomId::parse(room_id).map_err(|_| SessionError::RoomNotFound)?;
        let room = self.registry.join(player, &room_id).await?;

        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        if let Some(start) = guard.maybe_start(now) {
            tracing::info!(
                "Game started in room {}: {} (w) vs {} (b)",
                room_id,
                start.white.user_id,
                start.black.user_id
            );
            let frame = push_frame(event::GAME_START, game_start_dto(&room_id, &start));
            self.message_pusher
                .broadcast_users(&room_targets(&guard), &frame)
                .await;
            if let Some(snapshot) = guard.snapshot(now) {
                let frame = push_frame(event::GAME_STATE, snapshot_dto(&room_id, &snapshot));
                self.message_pusher
                    .broadcast_users(&room_targets(&guard), &frame)
                    .await;
            }
        }
        broadcast_room_state(self.message_pusher.as_ref(), &guard).await;

        let online = online_id_set(self.message_pusher.as_ref()).await;
        Ok(room_state_dto(&guard, &online))
    }

    /// Leave the current room; an active game is abandoned with it.
    pub async fn leave(&self, user_id: &UserId) -> Result<(), SessionError> {
        let now = self.clock.now_millis();
        let (room_id, outcome, remaining) = self.registry.leave(user_id, now).await?;
        tracing::info!("User '{}' left room {}", user_id, room_id);

        if remaining.is_empty() {
            return Ok(());
        }
        // no forfeit is recorded: survivors get a room:error and the
        // rolled-back room state
        let targets: Vec<UserId> = remaining.iter().map(|p| p.user_id.clone()).collect();
        let message = format!("{} left the room", outcome.player.username);
        self.message_pusher
            .broadcast_users(&targets, &push_frame(event::ROOM_ERROR, RoomErrorDto { message }))
            .await;
        if let Some(room) = self.registry.resolve(&room_id).await {
            let guard = room.lock().await;
            broadcast_room_state(self.message_pusher.as_ref(), &guard).await;
        }
        Ok(())
    }

    /// Current room state for the requesting user.
    pub async fn state(&self, user_id: &UserId) -> Result<RoomStateDto, SessionError> {
        let (_, room) = self
            .registry
            .room_of_user(user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let guard = room.lock().await;
        let online = online_id_set(self.message_pusher.as_ref()).await;
        Ok(room_state_dto(&guard, &online))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::domain::{RoomPhase, Username};
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use serde_json::Value;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn player(id: &str) -> Player {
        Player {
            user_id: UserId::new(id.to_string()).unwrap(),
            username: Username::new(format!("{id}-name")).unwrap(),
        }
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    struct Fixture {
        usecase: RoomLifecycleUseCase,
        registry: Arc<InMemoryRoomRegistry>,
        pusher: Arc<WebSocketMessagePusher>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let clock = Arc::new(FixedClock::new(1_000_000));
        Fixture {
            usecase: RoomLifecycleUseCase::new(registry.clone(), pusher.clone(), clock),
            registry,
            pusher,
        }
    }

    async fn connect(fixture: &Fixture, id: &str, conn: u64) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        fixture.pusher.register_connection(player(id), conn, tx).await;
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
    async fn test_create_returns_waiting_room_state() {
        // テスト項目: room:create の ack に waiting 状態の RoomState が入る
        // given (前提条件):
        let f = fixture();
        let _rx = connect(&f, "u1", 1).await;

        // when (操作):
        let state = f.usecase.create(player("u1"), None).await.unwrap();

        // then (期待する結果):
        assert_eq!(state.status, RoomPhase::Waiting);
        assert_eq!(state.players.len(), 1);
        assert!(state.players[0].online);
        assert!(state.room_id.len() >= 6);
    }

    #[tokio::test]
    async fn test_create_with_seed_uses_seed() {
        // テスト項目: シード付き room:create は正規化されたシード ID を使う
        // given (前提条件):
        let f = fixture();

        // when (操作):
        let state = f
            .usecase
            .create(player("u1"), Some("abc12345".to_string()))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(state.room_id, "ABC12345");
    }

    #[tokio::test]
    async fn test_create_with_malformed_seed_rejected() {
        // テスト項目: 不正なシード ID は Invalid room になる
        // given (前提条件):
        let f = fixture();

        // when (操作):
        let result = f
            .usecase
            .create(player("u1"), Some("ab!".to_string()))
            .await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::InvalidRoom);
    }

    #[tokio::test]
    async fn test_second_join_starts_game_and_broadcasts() {
        // テスト項目: 2 人目の join で両者に game:start が配信される
        // given (前提条件):
        let f = fixture();
        let mut rx1 = connect(&f, "u1", 1).await;
        let mut rx2 = connect(&f, "u2", 2).await;
        let created = f.usecase.create(player("u1"), None).await.unwrap();

        // when (操作):
        let state = f
            .usecase
            .join(player("u2"), &created.room_id)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(state.status, RoomPhase::Playing);
        let start1 = next_event(&mut rx1, "game:start").await;
        let start2 = next_event(&mut rx2, "game:start").await;
        assert_eq!(start1["payload"], start2["payload"]);
        assert_eq!(
            start1["payload"]["fen"],
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(start1["payload"]["turn"], "w");
        let white = start1["payload"]["white"]["userId"].as_str().unwrap();
        let black = start1["payload"]["black"]["userId"].as_str().unwrap();
        assert_ne!(white, black);
        assert!(["u1", "u2"].contains(&white));
        assert!(["u1", "u2"].contains(&black));
    }

    #[tokio::test]
    async fn test_join_lowercased_id_is_normalized() {
        // テスト項目: 小文字で指定した部屋 ID でも join できる
        // given (前提条件):
        let f = fixture();
        let created = f
            .usecase
            .create(player("u1"), Some("ABC12345".to_string()))
            .await
            .unwrap();
        assert_eq!(created.room_id, "ABC12345");

        // when (操作):
        let state = f.usecase.join(player("u2"), "abc12345").await.unwrap();

        // then (期待する結果):
        assert_eq!(state.room_id, "ABC12345");
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        // テスト項目: 存在しない部屋への join は Room not found になる
        // given (前提条件):
        let f = fixture();

        // when (操作):
        let result = f.usecase.join(player("u1"), "NOPE01").await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::RoomNotFound);
    }

    #[tokio::test]
    async fn test_state_is_idempotent() {
        // テスト項目: 間にイベントのない room:state 2 回は同じ結果を返す
        // given (前提条件):
        let f = fixture();
        f.usecase.create(player("u1"), None).await.unwrap();

        // when (操作):
        let first = f.usecase.state(&uid("u1")).await.unwrap();
        let second = f.usecase.state(&uid("u1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_state_without_room() {
        // テスト項目: 未入室での room:state は You are not in a room になる
        // given (前提条件):
        let f = fixture();

        // when (操作):
        let result = f.usecase.state(&uid("u1")).await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::NotInRoom);
    }

    #[tokio::test]
    async fn test_leave_mid_game_notifies_survivor() {
        // テスト項目: 対局中の退室で残者に room:error と waiting 状態が届く
        // given (前提条件):
        let f = fixture();
        let _rx1 = connect(&f, "u1", 1).await;
        let mut rx2 = connect(&f, "u2", 2).await;
        let created = f.usecase.create(player("u1"), None).await.unwrap();
        f.usecase.join(player("u2"), &created.room_id).await.unwrap();

        // when (操作):
        f.usecase.leave(&uid("u1")).await.unwrap();

        // then (期待する結果):
        let error = next_event(&mut rx2, "room:error").await;
        assert_eq!(error["payload"]["message"], "u1-name left the room");
        let state = next_event(&mut rx2, "room:state").await;
        assert_eq!(state["payload"]["status"], "waiting");
        assert_eq!(state["payload"]["players"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_frees_user_for_new_room() {
        // テスト項目: 退室後は別の部屋を作成できる
        // given (前提条件):
        let f = fixture();
        f.usecase.create(player("u1"), None).await.unwrap();
        f.usecase.leave(&uid("u1")).await.unwrap();

        // when (操作):
        let result = f.usecase.create(player("u1"), None).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(f.registry.room_of_user(&uid("u1")).await.is_some());
    }
}
