//! Core types and trait definitions for agentsync.
//!
//! No HTTP or database dependencies. The registry client, the relational
//! store, and the engine all depend on it.

pub mod agent;
pub mod client;
pub mod error;
pub mod event;
pub mod identifier;
pub mod outcome;
pub mod record;

pub use error::{Error, RegistryError, Result, StoreError, SyncError};
pub use identifier::{Identifier, ResourceKey};
pub use record::{Category, CategoryState, UpdateRecord};
