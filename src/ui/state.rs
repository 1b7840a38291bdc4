//! Server state shared across connection handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use crate::domain::ConnectionId;
use crate::infrastructure::auth::AuthVerifier;
use crate::usecase::{
    ConnectUserUseCase, DisconnectUserUseCase, DrawOfferUseCase, PlayMoveUseCase, RematchUseCase,
    RoomLifecycleUseCase, SendInviteUseCase,
};

/// Query parameters for the WebSocket handshake.
///
/// The token may arrive here or in the `Authorization` header.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Shared application state: the auth verifier plus one use case per
/// event family.
pub struct AppState {
    pub auth: AuthVerifier,
    pub connect_user: Arc<ConnectUserUseCase>,
    pub disconnect_user: Arc<DisconnectUserUseCase>,
    pub room_lifecycle: Arc<RoomLifecycleUseCase>,
    pub play_move: Arc<PlayMoveUseCase>,
    pub draw_offer: Arc<DrawOfferUseCase>,
    pub rematch: Arc<RematchUseCase>,
    pub send_invite: Arc<SendInviteUseCase>,
    next_connection_id: AtomicU64,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: AuthVerifier,
        connect_user: Arc<ConnectUserUseCase>,
        disconnect_user: Arc<DisconnectUserUseCase>,
        room_lifecycle: Arc<RoomLifecycleUseCase>,
        play_move: Arc<PlayMoveUseCase>,
        draw_offer: Arc<DrawOfferUseCase>,
        rematch: Arc<RematchUseCase>,
        send_invite: Arc<SendInviteUseCase>,
    ) -> Self {
        Self {
            auth,
            connect_user,
            disconnect_user,
            room_lifecycle,
            play_move,
            draw_offer,
            rematch,
            send_invite,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Allocate a process-unique connection id.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}
