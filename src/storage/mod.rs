//! Storage collaborator for event archival.
//!
//! The bus persists published events for audit/replay through the
//! `EventStore` trait. The in-memory backend covers embedded use and tests;
//! production deployments can plug in anything durable.

mod memory;
mod traits;

pub use memory::InMemoryEventStore;
pub use traits::EventStore;
