//! Concrete implementations of the `MessagePusher` port.

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
