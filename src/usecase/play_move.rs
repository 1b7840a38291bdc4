//! UseCase: move application and game-state queries.
//!
//! Both paths recompute the authoritative snapshot, so clock expiry is
//! discovered here — whichever event observes the end first triggers the
//! one-shot `game:over` broadcast.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{MessagePusher, Player, RoomId, SessionError, UserId};
use crate::infrastructure::dto::conversion::{move_result_dto, snapshot_dto};
use crate::infrastructure::dto::ws::{GameSnapshotDto, MoveResultDto, event};
use crate::infrastructure::repository::InMemoryRoomRegistry;

use super::support::{broadcast_game_over_once, push_frame, room_targets};

/// 着手適用のユースケース
pub struct PlayMoveUseCase {
    registry: Arc<InMemoryRoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl PlayMoveUseCase {
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

    /// Apply a move for `player` and fan out the result.
    ///
    /// The payload's `roomId` (when present) must name the player's
    /// current room; moves cannot be routed into foreign rooms.
    pub async fn execute(
        &self,
        player: &Player,
        payload_room_id: Option<&str>,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> Result<MoveResultDto, SessionError> {
        let (room_id, room) = self
            .registry
            .room_of_user(&player.user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        if let Some(raw) = payload_room_id {
            if !raw.trim().is_empty() {
                let named = RoomId::parse(raw).map_err(|_| SessionError::InvalidRoom)?;
                if named != room_id {
                    return Err(SessionError::InvalidRoom);
                }
            }
        }

        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        match guard.apply_move(&player.user_id, from, to, promotion, now) {
            Ok((record, snapshot)) => {
                tracing::debug!(
                    "Move {} in room {} by '{}'",
                    record.san,
                    room_id,
                    player.user_id
                );
                let result =
                    move_result_dto(&room_id, &record, &snapshot.fen, snapshot.turn, player);
                let targets = room_targets(&guard);
                self.message_pusher
                    .broadcast_users(&targets, &push_frame(event::CHESS_MOVE, result.clone()))
                    .await;
                self.message_pusher
                    .broadcast_users(
                        &targets,
                        &push_frame(event::GAME_STATE, snapshot_dto(&room_id, &snapshot)),
                    )
                    .await;
                broadcast_game_over_once(self.message_pusher.as_ref(), &room_id, &mut guard, now)
                    .await;
                Ok(result)
            }
            Err(SessionError::GameAlreadyOver) => {
                // the rejected move may be the first observer of the end
                broadcast_game_over_once(self.message_pusher.as_ref(), &room_id, &mut guard, now)
                    .await;
                Err(SessionError::GameAlreadyOver)
            }
            Err(e) => Err(e),
        }
    }

    /// Authoritative snapshot for the requesting user's room.
    pub async fn game_state(&self, user_id: &UserId) -> Result<GameSnapshotDto, SessionError> {
        let (room_id, room) = self
            .registry
            .room_of_user(user_id)
            .await
            .ok_or(SessionError::NotInRoom)?;
        let now = self.clock.now_millis();
        let mut guard = room.lock().await;
        let snapshot = guard.snapshot(now).ok_or(SessionError::GameNotStarted)?;
        broadcast_game_over_once(self.message_pusher.as_ref(), &room_id, &mut guard, now).await;
        Ok(snapshot_dto(&room_id, &snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::domain::{GameStatus, Side, Username};
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
        usecase: PlayMoveUseCase,
        registry: Arc<InMemoryRoomRegistry>,
        pusher: Arc<WebSocketMessagePusher>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let clock = Arc::new(FixedClock::new(1_000_000));
        Fixture {
            usecase: PlayMoveUseCase::new(registry.clone(), pusher.clone(), clock.clone()),
            registry,
            pusher,
            clock,
        }
    }

    /// u1/u2 を同室で対局開始させ、白番のユーザー ID を返す
    async fn start_game(f: &Fixture) -> (UserId, UserId) {
        let (room_id, room) = f.registry.create(player("u1"), None).await.unwrap();
        f.registry.join(player("u2"), &room_id).await.unwrap();
        let mut guard = room.lock().await;
        let start = guard.maybe_start(f.clock.now_millis()).unwrap();
        (start.white.user_id, start.black.user_id)
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
    async fn test_move_broadcasts_result_and_snapshot() {
        // テスト項目: 着手で chess:move と game:state が両者に配信される
        // given (前提条件):
        let f = fixture();
        let (white, _) = start_game(&f).await;
        let mut rx1 = connect(&f, "u1", 1).await;
        let white_player = player(white.as_str());

        // when (操作):
        let result = f
            .usecase
            .execute(&white_player, None, "e2", "e4", None)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(result.san, "e4");
        assert_eq!(result.turn, Side::Black);
        assert_eq!(result.by.user_id, white.as_str());
        let move_frame = next_event(&mut rx1, "chess:move").await;
        assert_eq!(move_frame["payload"]["san"], "e4");
        let state_frame = next_event(&mut rx1, "game:state").await;
        assert_eq!(state_frame["payload"]["turn"], "b");
    }

    #[tokio::test]
    async fn test_move_with_foreign_room_id_rejected() {
        // テスト項目: 自室以外を指す roomId 付き着手は Invalid room になる
        // given (前提条件):
        let f = fixture();
        let (white, _) = start_game(&f).await;

        // when (操作):
        let result = f
            .usecase
            .execute(&player(white.as_str()), Some("ZZZ999"), "e2", "e4", None)
            .await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::InvalidRoom);
    }

    #[tokio::test]
    async fn test_move_without_room() {
        // テスト項目: 未入室での着手は You are not in a room になる
        // given (前提条件):
        let f = fixture();

        // when (操作):
        let result = f
            .usecase
            .execute(&player("u9"), None, "e2", "e4", None)
            .await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::NotInRoom);
    }

    #[tokio::test]
    async fn test_game_state_discovers_timeout_and_announces_once() {
        // テスト項目: game:state がタイムアウトを検出し game:over を一度だけ配信する
        // given (前提条件):
        let f = fixture();
        start_game(&f).await;
        let mut rx2 = connect(&f, "u2", 2).await;
        f.clock.advance(181_000);

        // when (操作):
        let first = f.usecase.game_state(&uid("u1")).await.unwrap();
        let second = f.usecase.game_state(&uid("u2")).await.unwrap();

        // then (期待する結果):
        assert_eq!(first.status, GameStatus::Timeout);
        assert_eq!(first.winner_color, Some(Side::Black));
        assert_eq!(second.status, GameStatus::Timeout);
        let over = next_event(&mut rx2, "game:over").await;
        assert_eq!(over["payload"]["status"], "timeout");
        // 2 回目の game:state では再配信されない
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_move_after_timeout_gets_game_over_ack() {
        // テスト項目: タイムアウト後の着手は Game is already over の ack になる
        // given (前提条件):
        let f = fixture();
        let (white, _) = start_game(&f).await;
        f.clock.advance(181_000);

        // when (操作):
        let result = f
            .usecase
            .execute(&player(white.as_str()), None, "e2", "e4", None)
            .await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::GameAlreadyOver);
    }

    #[tokio::test]
    async fn test_checkmate_move_broadcasts_game_over() {
        // テスト項目: チェックメイトの着手で game:over が配信される
        // given (前提条件): フールズメイト直前まで進める
        let f = fixture();
        let (white, black) = start_game(&f).await;
        let white_p = player(white.as_str());
        let black_p = player(black.as_str());
        let mut rx1 = connect(&f, "u1", 1).await;
        f.usecase.execute(&white_p, None, "f2", "f3", None).await.unwrap();
        f.usecase.execute(&black_p, None, "e7", "e5", None).await.unwrap();
        f.usecase.execute(&white_p, None, "g2", "g4", None).await.unwrap();

        // when (操作):
        let result = f
            .usecase
            .execute(&black_p, None, "d8", "h4", None)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(result.san, "Qh4#");
        let over = next_event(&mut rx1, "game:over").await;
        assert_eq!(over["payload"]["status"], "checkmate");
        assert_eq!(over["payload"]["winnerColor"], "b");
    }

    #[tokio::test]
    async fn test_game_state_before_start() {
        // テスト項目: ゲーム未開始の game:state は Game not started になる
        // given (前提条件):
        let f = fixture();
        f.registry.create(player("u1"), None).await.unwrap();

        // when (操作):
        let result = f.usecase.game_state(&uid("u1")).await;

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), SessionError::GameNotStarted);
    }
}
