//! Domain layer: value objects, the chess board adapter, the game clock,
//! the room aggregate, and the ports the infrastructure layer implements.

pub mod board;
pub mod clock;
pub mod error;
pub mod pusher;
pub mod room;
pub mod social_graph;
pub mod value_object;

pub use board::{AppliedMove, BoardEngine, BoardTermination, IllegalMove, Side};
pub use clock::{GameClock, INITIAL_BUDGET_MS};
pub use error::{SessionError, ValueObjectError};
pub use pusher::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};
pub use room::{
    GameSnapshot, GameStart, GameStatus, LeaveOutcome, MoveRecord, Player, Room, RoomPhase,
};
pub use social_graph::{FriendshipStatus, SocialGraph};
pub use value_object::{RoomId, RoomIdFactory, UserId, Username};
