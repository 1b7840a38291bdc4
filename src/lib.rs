//! WebSocket chess session server library.
//!
//! This library implements the stateful core of a real-time two-player
//! chess service: socket authentication, presence tracking, room state
//! machines with per-player countdown clocks, and the draw/rematch/invite
//! agreement protocols.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// shared library
pub mod common;
