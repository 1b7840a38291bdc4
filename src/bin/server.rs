//! Real-time chess session server.
//!
//! Authenticates WebSocket clients by JWT, seats them in rooms and runs
//! the move/clock/draw/rematch protocols between the two players.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;
use oute::{
    common::{logger::setup_logger, time::SystemClock},
    infrastructure::{
        auth::AuthVerifier, message_pusher::WebSocketMessagePusher,
        repository::InMemoryRoomRegistry, social_graph::InMemorySocialGraph,
    },
    ui::{AppState, Server},
    usecase::{
        ConnectUserUseCase, DisconnectUserUseCase, DrawOfferUseCase, PlayMoveUseCase,
        RematchUseCase, RoomLifecycleUseCase, SendInviteUseCase,
    },
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "WebSocket chess session server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Origin used to compose invite links
    #[arg(long, default_value = "http://localhost:5173")]
    origin: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Registries (rooms + connections) and the social graph
    // 2. Clock and auth
    // 3. UseCases
    // 4. AppState
    // 5. Server

    // 1. Create the shared registries
    let registry = Arc::new(InMemoryRoomRegistry::new());
    let message_pusher = Arc::new(WebSocketMessagePusher::new());
    let social_graph = Arc::new(InMemorySocialGraph::new());

    // 2. Wall clock and token verification (JWT_SECRET env)
    let clock = Arc::new(SystemClock);
    let auth = AuthVerifier::from_env();

    // 3. Create UseCases
    let connect_user = Arc::new(ConnectUserUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let disconnect_user = Arc::new(DisconnectUserUseCase::new(
        registry.clone(),
        message_pusher.clone(),
    ));
    let room_lifecycle = Arc::new(RoomLifecycleUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let play_move = Arc::new(PlayMoveUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let draw_offer = Arc::new(DrawOfferUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let rematch = Arc::new(RematchUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let send_invite = Arc::new(SendInviteUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        social_graph.clone(),
        args.origin.clone(),
    ));

    // 4. Assemble shared state
    let state = Arc::new(AppState::new(
        auth,
        connect_user,
        disconnect_user,
        room_lifecycle,
        play_move,
        draw_offer,
        rematch,
        send_invite,
    ));

    // 5. Run the server
    let server = Server::new(state);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
