//! The two client traits the orchestrator drives.
//!
//! Implemented by `agentsync-registry` and `agentsync-store-sqlite`. The
//! engine depends on these abstractions only, so tests can substitute
//! in-memory fakes.

use std::future::Future;

use crate::{
  error::{RegistryError, StoreError},
  identifier::{Identifier, ResourceKey},
  record::{Category, CategoryState},
};

// ─── Registry ────────────────────────────────────────────────────────────────

/// Typed operations against the external metadata registry. The registry has
/// no rollback; every successful `replace_all` is final.
pub trait MetadataRegistry: Send + Sync {
  /// Fetch the current content of `category` for `identifier`.
  ///
  /// Implementations keep the full fetched document so a following
  /// [`replace_all`](Self::replace_all) for the same identifier can merge
  /// into it.
  fn fetch_current(
    &self,
    identifier: Identifier,
    category: Category,
  ) -> impl Future<Output = Result<CategoryState, RegistryError>> + Send + '_;

  /// Replace the whole category with `desired`. Sibling categories and other
  /// document fields are preserved.
  fn replace_all(
    &self,
    identifier: Identifier,
    desired: CategoryState,
  ) -> impl Future<Output = Result<(), RegistryError>> + Send + '_;

  /// One reachability check with a short timeout and no retry.
  fn probe(&self) -> impl Future<Output = bool> + Send + '_;
}

// ─── Relational store ────────────────────────────────────────────────────────

/// Typed operations against the internal relational schema.
pub trait RelationalStore: Send + Sync {
  fn resolve_resource(
    &self,
    identifier: Identifier,
  ) -> impl Future<Output = Result<ResourceKey, StoreError>> + Send + '_;

  /// Agents of `category`, ordered by their stored order, each carrying its
  /// full role set and contact info where applicable.
  fn fetch_category(
    &self,
    key: ResourceKey,
    category: Category,
  ) -> impl Future<Output = Result<CategoryState, StoreError>> + Send + '_;

  /// Rewrite the category as one atomic unit. On failure the store is left
  /// exactly as it was and [`StoreError::Transaction`] is returned.
  fn write_category_transactional(
    &self,
    key: ResourceKey,
    desired: CategoryState,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + '_;

  fn probe(&self) -> impl Future<Output = bool> + Send + '_;
}
