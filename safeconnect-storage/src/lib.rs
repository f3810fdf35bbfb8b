//! SafeConnect Storage - Journey Store Contract and Implementations
//!
//! Defines the async storage abstraction for users, contacts, journeys and
//! alerts, with an in-memory implementation for development and tests and a
//! PostgreSQL implementation for deployments.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::InMemoryStore;
pub use postgres::{DbConfig, PgStore, SCHEMA_SQL};
pub use store::{JourneyStore, TransitionResult};
