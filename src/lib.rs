//! # quotes
//!
//! A JSON service for book quotes, backed by SQLite, that shuts down
//! gracefully.
//!
//! ## Surface
//!
//! | Method | Path | Query | Body | Success |
//! |---|---|---|---|---|
//! | `GET` | `/` | — | — | 200 `healthchecked` |
//! | `POST` | `/quote` | — | `{book, quote}` | 201 created quote |
//! | `GET` | `/quote` | — | — | 200 every quote |
//! | `PATCH` | `/quote` | `id` | `{quote}` | 202 updated quote(s) |
//! | `DELETE` | `/quote` | `id` | — | 202 deleted quote(s) |
//!
//! Every failure answers `{"error": "<message>"}` with a message that never
//! contains the underlying error; the detail goes to the log.
//!
//! Cross-origin requests from any `http://` or `https://` origin are
//! allowed, and each client IP may make 100 requests per minute (see
//! [`Server::rate_limit`]).
//!
//! ## What is left to the reverse proxy
//!
//! TLS, body-size limits and slow-client protection.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quotes::{api, Server, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), quotes::Error> {
//!     let store = Arc::new(SqliteStore::open("quotes.db")?);
//!     let outcome = Server::bind("0.0.0.0:3000")
//!         .await?
//!         .serve(api::routes(store))
//!         .await?;
//!     assert!(outcome.is_clean());
//!     Ok(())
//! }
//! ```

mod error;
mod handler;
mod method;
mod middleware;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod api;
pub mod codec;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod quote;
pub mod store;

pub use error::Error;
pub use handler::Handler;
pub use lifecycle::{Outcome, Phase};
pub use middleware::rate_limit::RateLimit;
pub use method::Method;
pub use quote::Quote;
pub use request::Request;
pub use response::{IntoResponse, Response};
pub use router::Router;
pub use server::Server;
pub use status::Status;
pub use store::{QuoteStore, SharedStore, SqliteStore};
