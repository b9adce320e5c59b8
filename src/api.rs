//! The `/quote` resource.
//!
//! Each operation is a single shot against the store:
//! receive → validate → execute → respond. Handlers are built by the
//! functions below, each capturing the [`SharedStore`] it will use.
//!
//! | Method | Query | Body | Success |
//! |---|---|---|---|
//! | `POST` | — | `{book, quote}` | 201, the created quote |
//! | `GET` | — | — | 200, every quote |
//! | `PATCH` | `id` | `{quote}` | 202, the updated quote(s) |
//! | `DELETE` | `id` | — | 202, the removed quote(s) |

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::codec;
use crate::handler::Handler;
use crate::health;
use crate::method::Method;
use crate::quote::{NewQuote, Quote, QuoteEdit};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use crate::status::Status;
use crate::store::{SharedStore, StoreError};

/// The operation a storage failure happened in. Picks the public message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    fn failure_message(self) -> &'static str {
        match self {
            Self::Create => "could not create quote",
            Self::Read   => "could not retrieve quotes",
            Self::Update => "probably no quote with this id",
            Self::Delete => "couldn't delete the quote",
        }
    }
}

/// Everything that can go wrong while serving a quote request.
///
/// `Display` carries the internal detail for the log; the client only ever
/// sees [`ApiError::public_message`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request body is not a valid payload: {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("required query parameter `{0}` is missing")]
    MissingParameter(&'static str),

    #[error("{op:?} failed in storage: {source}")]
    StorageFailure {
        op: Operation,
        #[source]
        source: StoreError,
    },

    #[error("stored rows do not match the quote shape: {0}")]
    InternalMismatch(#[source] StoreError),
}

impl ApiError {
    /// Sorts a store error into the taxonomy. "No such id" stays a storage
    /// failure; only an unmappable row is an internal mismatch.
    pub fn from_store(op: Operation, source: StoreError) -> Self {
        match source {
            StoreError::Mapping(_) => Self::InternalMismatch(source),
            source => Self::StorageFailure { op, source },
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::MalformedInput(_) | Self::MissingParameter(_) => Status::BadRequest,
            Self::StorageFailure { .. } | Self::InternalMismatch(_) => Status::InternalServerError,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "bad json, probably a wrong schema",
            Self::MissingParameter(_) => "no id provided",
            Self::StorageFailure { op, .. } => op.failure_message(),
            Self::InternalMismatch(_) => "the developer messed up",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        codec::write_error(&self, self.status(), self.public_message())
    }
}

type ApiResult = Result<Response, ApiError>;

// ── Routes ────────────────────────────────────────────────────────────────────

/// The full route table: health check plus the four quote operations.
pub fn routes(store: SharedStore) -> Router {
    Router::new()
        .on(Method::Get,    "/",      health::healthcheck)
        .on(Method::Post,   "/quote", create(Arc::clone(&store)))
        .on(Method::Get,    "/quote", read(Arc::clone(&store)))
        .on(Method::Patch,  "/quote", update(Arc::clone(&store)))
        .on(Method::Delete, "/quote", delete(store))
}

pub fn create(store: SharedStore) -> impl Handler {
    move |req: Request| create_quote(Arc::clone(&store), req)
}

pub fn read(store: SharedStore) -> impl Handler {
    move |_req: Request| read_quotes(Arc::clone(&store))
}

pub fn update(store: SharedStore) -> impl Handler {
    move |req: Request| update_quote(Arc::clone(&store), req)
}

pub fn delete(store: SharedStore) -> impl Handler {
    move |req: Request| delete_quote(Arc::clone(&store), req)
}

// ── Operations ────────────────────────────────────────────────────────────────

async fn create_quote(store: SharedStore, req: Request) -> ApiResult {
    let args: NewQuote = codec::decode(req.into_body()).map_err(ApiError::MalformedInput)?;
    let quote = Quote::new(args.book, args.quote);

    store
        .insert(&quote)
        .await
        .map_err(|e| ApiError::from_store(Operation::Create, e))?;

    info!(id = %quote.id, book = %quote.book, "quote created");
    Ok(codec::encode(&quote, Status::Created))
}

async fn read_quotes(store: SharedStore) -> ApiResult {
    let quotes = store
        .all()
        .await
        .map_err(|e| ApiError::from_store(Operation::Read, e))?;

    info!(count = quotes.len(), "quotes listed");
    Ok(codec::encode(&quotes, Status::Ok))
}

async fn update_quote(store: SharedStore, req: Request) -> ApiResult {
    let id = required_id(&req)?;
    let edit: QuoteEdit = codec::decode(req.into_body()).map_err(ApiError::MalformedInput)?;

    let updated = store
        .update(&id, &edit.quote, Utc::now())
        .await
        .map_err(|e| ApiError::from_store(Operation::Update, e))?;

    info!(%id, "quote updated");
    Ok(codec::encode(&updated, Status::Accepted))
}

async fn delete_quote(store: SharedStore, req: Request) -> ApiResult {
    let id = required_id(&req)?;

    let removed = store
        .delete(&id)
        .await
        .map_err(|e| ApiError::from_store(Operation::Delete, e))?;

    info!(%id, "quote deleted");
    Ok(codec::encode(&removed, Status::Accepted))
}

fn required_id(req: &Request) -> Result<String, ApiError> {
    req.query("id")
        .map(str::to_owned)
        .ok_or(ApiError::MissingParameter("id"))
}
