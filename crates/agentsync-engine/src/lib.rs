//! The synchronization engine: change detection and the orchestrator that
//! commits desired state to the relational store first and the registry
//! second.

pub mod config;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod worker;

pub use config::{EngineConfig, StoreRequirement};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use worker::{BatchHandle, CancelFlag, ChannelSink, spawn_batch};
