//! Client side of the harness
//!
//! - Deferred stop scheduling
//! - Per-client lifecycle observers
//! - Client construction and start-up
//! - The manager driving one benchmark wave

pub mod manager;
pub mod observer;
pub mod orchestrator;
pub mod scheduler;

pub use manager::ClientManager;
