//! Application wiring: the middleware chain and the quote routes.
//!
//! Every request passes through, in order:
//!
//! 1. [`RequestIdMiddleware`] (request id + span)
//! 2. [`LoggerMiddleware`] (access line for successes)
//! 3. [`FaviconMiddleware`]
//! 4. [`KeyAuthMiddleware`] (skipped for `/swagger` paths)
//! 5. the router: `/swagger/*`, `/`, `/random`, `/:id`

use std::sync::Arc;

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::context::Context;
use crate::database::StoreError;
use crate::docs::{DOCS_PREFIX, DocsHandler};
use crate::error::{ApiError, ErrorRecord};
use crate::http::{Request, Response, StatusCode};
use crate::middleware::{
    FaviconMiddleware, LoggerMiddleware, MiddlewareHandler, Next, RequestIdMiddleware,
    from_middleware,
};
use crate::quotes::{Quote, QuoteService};
use crate::router::{HandlerResult, Router};
use crate::security::{AccessValidator, KeyAuthMiddleware};
use crate::server::ServerError;

/// Anything that stops the service from starting.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open the quote store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to open the cache: {0}")]
    Cache(#[from] CacheError),

    #[error("{kind} backend selected but citaty was built without the `{feature}` feature")]
    BackendDisabled {
        kind: &'static str,
        feature: &'static str,
    },

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// The assembled service. Cheap to share behind an [`Arc`].
pub struct App {
    chain: Arc<[MiddlewareHandler]>,
}

impl App {
    /// Wires `service` behind key authentication on `key_param`.
    pub fn new(service: QuoteService, validator: AccessValidator, key_param: &str) -> Self {
        let auth = KeyAuthMiddleware::new(Arc::new(validator))
            .key_param(key_param)
            .allow_path("swagger");

        let chain: Vec<MiddlewareHandler> = vec![
            from_middleware(Arc::new(RequestIdMiddleware)),
            from_middleware(Arc::new(LoggerMiddleware)),
            from_middleware(Arc::new(FaviconMiddleware)),
            from_middleware(Arc::new(auth)),
            routes(service, key_param).into_middleware(),
        ];

        Self {
            chain: chain.into(),
        }
    }

    /// Runs one request through the whole chain.
    pub async fn handle(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.chain))
            .run(Context::new(request))
            .await
    }
}

fn routes(service: QuoteService, key_param: &str) -> Router {
    let mut router = Router::new();

    let docs = Arc::new(DocsHandler::new(key_param));
    router.get(&format!("{DOCS_PREFIX}/*"), move |ctx: Context| {
        let docs = Arc::clone(&docs);
        async move { docs.respond(&ctx) }
    });

    let svc = service.clone();
    router.get("/", move |_ctx: Context| {
        let svc = svc.clone();
        async move { list_all(svc).await }
    });

    let svc = service.clone();
    router.get("/random", move |_ctx: Context| {
        let svc = svc.clone();
        async move { random_quote(svc).await }
    });

    router.get("/:id", move |ctx: Context| {
        let svc = service.clone();
        async move { quote_by_id(svc, ctx).await }
    });

    router
}

#[utoipa::path(
    get,
    path = "/",
    operation_id = "list-all",
    tag = "Quotes",
    summary = "Returns every quote",
    responses(
        (status = 200, description = "All quotes in ascending id order", body = [Quote]),
        (status = 401, description = "Missing or invalid API key", body = ErrorRecord),
        (status = 404, description = "The store is empty", body = ErrorRecord),
        (status = 500, description = "Unexpected failure", body = ErrorRecord),
    )
)]
pub(crate) async fn list_all(svc: QuoteService) -> HandlerResult {
    let quotes = svc.list_all().await?;
    Ok(Response::json(StatusCode::Ok, &quotes))
}

#[utoipa::path(
    get,
    path = "/random",
    operation_id = "random-quote",
    tag = "Quotes",
    summary = "Returns a random quote",
    responses(
        (status = 200, description = "A randomly chosen quote", body = Quote),
        (status = 401, description = "Missing or invalid API key", body = ErrorRecord),
        (status = 404, description = "The store is empty or the drawn id has no quote", body = ErrorRecord),
        (status = 500, description = "Unexpected failure", body = ErrorRecord),
    )
)]
pub(crate) async fn random_quote(svc: QuoteService) -> HandlerResult {
    let quote = svc.random_quote().await?;
    Ok(Response::json(StatusCode::Ok, &quote))
}

#[utoipa::path(
    get,
    path = "/{id}",
    operation_id = "quote-id",
    tag = "Quotes",
    summary = "Returns the quote with the given id",
    params(("id" = String, Path, description = "Decimal quote id", example = "105")),
    responses(
        (status = 200, description = "The requested quote", body = Quote),
        (status = 401, description = "Missing or invalid API key", body = ErrorRecord),
        (status = 404, description = "No quote with this id, or the id is not a non-negative integer", body = ErrorRecord),
        (status = 500, description = "Unexpected failure", body = ErrorRecord),
    )
)]
pub(crate) async fn quote_by_id(svc: QuoteService, ctx: Context) -> HandlerResult {
    let id = ctx.params().get("id").ok_or_else(|| ApiError::Internal {
        detail: "route matched without an id parameter".to_owned(),
    })?;
    let quote = svc.quote_by_id(id).await?;
    Ok(Response::json(StatusCode::Ok, &quote))
}
