//! UseCase layer: one struct per event family, orchestrating the room
//! registry, the message pusher and the domain aggregates.

mod support;

pub mod connect_user;
pub mod disconnect_user;
pub mod draw_offer;
pub mod play_move;
pub mod rematch;
pub mod room_lifecycle;
pub mod send_invite;

pub use connect_user::ConnectUserUseCase;
pub use disconnect_user::DisconnectUserUseCase;
pub use draw_offer::DrawOfferUseCase;
pub use play_move::PlayMoveUseCase;
pub use rematch::RematchUseCase;
pub use room_lifecycle::RoomLifecycleUseCase;
pub use send_invite::SendInviteUseCase;
