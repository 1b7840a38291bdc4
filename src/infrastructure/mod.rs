//! Infrastructure layer: concrete adapters behind the domain ports.

pub mod auth;
pub mod dto;
pub mod message_pusher;
pub mod repository;
pub mod social_graph;
