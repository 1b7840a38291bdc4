//! Concrete implementations of the `SocialGraph` port.

pub mod inmemory;

pub use inmemory::InMemorySocialGraph;
