//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// UserId validation error
    #[error("UserId cannot be empty")]
    UserIdEmpty,

    /// UserId too long error
    #[error("UserId cannot exceed {max} characters (got {actual})")]
    UserIdTooLong { max: usize, actual: usize },

    /// Username validation error
    #[error("Username cannot be empty")]
    UsernameEmpty,

    /// Username too long error
    #[error("Username cannot exceed {max} characters (got {actual})")]
    UsernameTooLong { max: usize, actual: usize },

    /// RoomId too short error
    #[error("RoomId must be at least {min} characters (got {actual})")]
    RoomIdTooShort { min: usize, actual: usize },

    /// RoomId too long error
    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    /// RoomId character set error
    #[error("RoomId must consist of A-Z and 0-9 only (got: {0})")]
    RoomIdInvalidChar(String),
}

/// Ack-facing session errors.
///
/// The `#[error]` strings are part of the client contract; clients match
/// on them verbatim, so they must not be reworded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    // authentication
    #[error("Unauthorized")]
    Unauthorized,

    // room membership
    #[error("You are not in a room")]
    NotInRoom,
    #[error("You are already in a room")]
    AlreadyInRoom,
    #[error("Leave your current room first")]
    LeaveCurrentRoomFirst,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Room no longer exists")]
    RoomGone,
    #[error("Invalid room")]
    InvalidRoom,

    // game state
    #[error("Game not started")]
    GameNotStarted,
    #[error("Game is already over")]
    GameAlreadyOver,
    #[error("You are not a player in this game")]
    NotAPlayer,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Illegal move")]
    IllegalMove,
    #[error("Move must include from and to squares")]
    MissingSquares,

    // side protocols
    #[error("Rematch is only available after game over")]
    RematchBeforeGameOver,
    #[error("No rematch request to respond to")]
    NoRematchRequest,
    #[error("Only players can request rematch")]
    RematchRequestNotPlayer,
    #[error("Only players can respond to rematch")]
    RematchRespondNotPlayer,
    #[error("Opponent is no longer in the room")]
    OpponentGone,
    #[error("No draw request to respond to")]
    NoDrawRequest,

    // invites
    #[error("Missing target user")]
    MissingInviteTarget,
    #[error("You cannot invite yourself")]
    SelfInvite,
    #[error("Create or join a room first")]
    NoRoomForInvite,
    #[error("You are not in that room")]
    NotInThatRoom,
    #[error("You can only invite users from your friend list")]
    NotFriends,
    #[error("Friend is offline")]
    FriendOffline,
}
