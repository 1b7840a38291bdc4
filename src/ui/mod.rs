//! UI layer: the axum server, shared state and protocol handlers.

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
pub use state::AppState;
