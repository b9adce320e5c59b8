//! Handler trait and type erasure.
//!
//! The router holds handlers of different concrete types in one map, so each
//! is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! api::create(store)                        ← closure capturing Arc<dyn QuoteStore>
//!        ↓ router.on(Method::Post, "/quote", …)
//! handler.into_boxed_handler()              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(closure))              ← stored as BoxedHandler
//!        ↓
//! handler.call(req) at request time         ← one vtable dispatch
//! ```
//!
//! Dependencies reach a handler by being captured when the closure is built,
//! never through globals.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A boxed, `Send` future resolving to a [`Response`].
///
/// Each handler returns its own anonymous future type; boxing gives them
/// one nameable type. The pin keeps the future in place once polled, and
/// `Send + 'static` lets the connection task move it between worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe call interface behind [`BoxedHandler`].
///
/// Public only because it shows up in [`Handler::into_boxed_handler`]'s
/// return type; hidden from the docs since nothing outside this crate can
/// use it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Connection tasks clone the `Arc` out of the routing table, so a request
/// costs one reference-count bump and one virtual call.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler: any
/// `Fn(Request) -> impl Future<Output = impl IntoResponse>` that is
/// `Send + Sync + 'static`, including closures that own their dependencies.
///
/// Sealed; only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

// `Sealed` lives in a private module, so no downstream type can name it,
// let alone implement it.
mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype so the erased impl applies to the closure without clashing with
/// the blanket `Handler` impl.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // Call outside the async block so only the future, not `&self`, is
        // captured; the box must be `'static`.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
