//! Middleware pipeline: composable logic around the route handler.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; [`Next::run`] advances it.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] into a [`MiddlewareHandler`].
//!
//! ## Built-ins
//!
//! - [`RequestIdMiddleware`] — assigns the request id and opens the request span.
//! - [`LoggerMiddleware`] — one access line per successful request.
//! - [`FaviconMiddleware`] — answers `/favicon.ico` with an empty `204`.
//!
//! Key authentication lives in [`crate::security`].

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{Instrument, info, info_span};

use crate::{Response, StatusCode, context::Context, error::ApiError};

/// Boxed, sendable future returned by middleware and handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so each middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    index: usize,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture<Response> + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a cursor positioned at the start of `middlewares`.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// An exhausted chain means no layer produced a response; that is answered
    /// with a mapped `500`.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => ApiError::Internal {
                detail: "middleware chain produced no response".to_owned(),
            }
            .into_response(ctx.meta()),
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass through (`next.run(ctx).await`), short-circuit by
/// returning a [`Response`] without calling `next`, or decorate the downstream
/// response. Middleware is shared across tasks, so it must be `Send + Sync`
/// and must not hold borrows of `self` inside the returned future.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Response>;
}

/// Header carrying the request id, inbound and outbound.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest inbound request id that is reused as-is.
const MAX_INBOUND_ID_LEN: usize = 128;

/// Assigns a request id and runs the rest of the chain inside a request span.
///
/// A well-formed inbound `X-Request-Id` (visible ASCII, at most 128 bytes) is
/// reused; otherwise a UUID v4 is generated. The id is echoed in the response.
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    fn resolve(ctx: &Context) -> String {
        ctx.request()
            .headers()
            .get(REQUEST_ID_HEADER)
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_INBOUND_ID_LEN
                    && id.bytes().all(|b| b.is_ascii_graphic())
            })
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

impl Middleware for RequestIdMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxFuture<Response> {
        let id = Self::resolve(&ctx);
        ctx.set_request_id(id.clone());
        let span = info_span!(
            "request",
            request_id = %id,
            method = %ctx.meta().method,
            path = %ctx.meta().path,
        );

        Box::pin(
            async move {
                let mut response = next.run(ctx).await;
                response.set_header(REQUEST_ID_HEADER, id);
                response
            }
            .instrument(span),
        )
    }
}

/// Logs each successful request's method, path, status and duration.
///
/// Failed requests are logged once by the error mapper, so they are skipped
/// here.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Response> {
        Box::pin(async move {
            let started_at = ctx.started_at();
            let method = ctx.meta().method.clone();
            let path = ctx.meta().path.clone();

            let response = next.run(ctx).await;

            let status = response.status();
            if status.is_success() {
                info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    elapsed = ?started_at.elapsed(),
                    "request processed"
                );
            }
            response
        })
    }
}

/// Answers `GET /favicon.ico` with an empty `204` before authentication runs.
pub struct FaviconMiddleware;

impl Middleware for FaviconMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Response> {
        Box::pin(async move {
            if ctx.request().path() == "/favicon.ico" {
                return Response::new(StatusCode::NoContent);
            }
            next.run(ctx).await
        })
    }
}
