//! Storage port for quote records.
//!
//! # Responsibility
//! - Define the capability the handlers persist through ([`QuoteStore`]).
//! - Keep SQL and driver errors behind this boundary.
//!
//! # Invariants
//! - Values reach the engine only as bound parameters.
//! - `update` and `delete` return exactly the rows they touched; touching
//!   none is [`StoreError::NotFound`], never an empty success.
//! - Ids arrive as untyped strings; rejecting a malformed one is the
//!   store's job ([`StoreError::InvalidId`]).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::quote::Quote;

mod sqlite;

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle injected into every handler.
pub type SharedStore = Arc<dyn QuoteStore>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid quote id `{0}`")]
    InvalidId(String),

    #[error("no quote with id {0}")]
    NotFound(String),

    /// A row came back but does not fit the [`Quote`] shape.
    #[error("row does not map onto a quote: {0}")]
    Mapping(#[source] rusqlite::Error),

    #[error("storage task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything the quote handlers need from persistence.
///
/// Implementations must be safe to call from many requests at once.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn insert(&self, quote: &Quote) -> StoreResult<()>;

    /// Every stored quote, in whatever order the engine yields them.
    async fn all(&self) -> StoreResult<Vec<Quote>>;

    /// Replaces the text of `id` and stamps `updated_at` with `at`, or with
    /// a time just past the row's current stamps if `at` is not later.
    /// `updated_at` never moves backwards and never precedes `inserted_at`.
    async fn update(&self, id: &str, text: &str, at: DateTime<Utc>) -> StoreResult<Vec<Quote>>;

    /// Physically removes `id`, returning what was removed.
    async fn delete(&self, id: &str) -> StoreResult<Vec<Quote>>;

    async fn ping(&self) -> StoreResult<()>;
}
