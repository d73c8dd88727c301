//! HTTP client for the remote metadata registry.
//!
//! The registry speaks JSON:API. One document per identifier holds the
//! `creators`, `contributors` and `publisher` categories as sibling keys of
//! `data.attributes`; writes are full-document `PUT`s, so every write merges
//! into the most recently fetched document.

mod client;
mod document;

pub mod error;

pub use client::{PRODUCTION_URL, RegistryClient, RegistryConfig, TEST_URL};
pub use error::{Error, Result};
