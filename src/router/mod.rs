//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! | Pattern      | Example match              | Captured params                 |
//! |--------------|----------------------------|---------------------------------|
//! | `/random`    | `/random`                  | *(none)*                        |
//! | `/:id`       | `/42`                      | `id → "42"`                     |
//! | `/swagger/*` | `/swagger/doc.json`        | `wildcard → "/doc.json"`        |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order and the first route whose method
//! and pattern both match wins. A path that matches some route only under a
//! different method is answered with `405`, anything else unmatched with `404`.

use std::future::Future;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::error::ApiError;
use crate::middleware::{BoxFuture, MiddlewareHandler, Next};
use crate::{Method, Response};

/// What a route handler produces. Errors are rendered by the error mapper.
pub type HandlerResult = Result<Response, ApiError>;

/// Type-erased async route handler.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<HandlerResult> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = HandlerResult> + Send` that is
/// also `Send + Sync + 'static` implements it through the blanket impl.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult> {
        Box::pin((self)(ctx))
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    /// Compiles a pattern: a `/*` suffix makes a wildcard, a `:` makes a
    /// parameterized pattern, anything else is an exact match.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_owned());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_owned()),
                    None => Segment::Static(s.to_owned()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_owned())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.clone(), path_seg),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = PathParams::new();
                params.insert("wildcard", suffix);
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust
/// use citaty::context::Context;
/// use citaty::router::{HandlerResult, Router};
/// use citaty::{Response, StatusCode};
///
/// async fn random(_ctx: Context) -> HandlerResult {
///     Ok(Response::new(StatusCode::Ok))
/// }
///
/// async fn by_id(ctx: Context) -> HandlerResult {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Ok(Response::new(StatusCode::Ok).body(id))
/// }
///
/// let mut router = Router::new();
/// router.get("/random", random);
/// router.get("/:id", by_id);
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Registers a handler for any method.
    pub fn route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.add_route(method, path, handler);
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx: Context| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches to the first route matching both method and path.
    ///
    /// # Errors
    ///
    /// [`ApiError::MethodNotAllowed`] when the path matches only under other
    /// methods, [`ApiError::NotFound`] when it matches nothing; otherwise
    /// whatever the handler returns.
    pub async fn dispatch(&self, mut ctx: Context) -> HandlerResult {
        let mut path_known = false;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(ctx.request().path()) else {
                continue;
            };
            if &route.method == ctx.request().method() {
                ctx.set_params(params);
                return (route.handler)(ctx).await;
            }
            path_known = true;
        }

        if path_known {
            Err(ApiError::MethodNotAllowed {
                method: ctx.request().method().to_string(),
            })
        } else {
            Err(ApiError::NotFound {
                reason: "no route matches the path".to_owned(),
            })
        }
    }

    /// Turns the router into the terminal layer of a middleware chain.
    ///
    /// Handler errors are rendered here, so each failed request passes
    /// through the error mapper exactly once.
    pub fn into_middleware(self) -> MiddlewareHandler {
        let router = Arc::new(self);
        Arc::new(move |ctx: Context, _next: Next| -> BoxFuture<Response> {
            let router = Arc::clone(&router);
            Box::pin(async move {
                let meta = ctx.meta().clone();
                match router.dispatch(ctx).await {
                    Ok(response) => response,
                    Err(e) => e.into_response(&meta),
                }
            })
        })
    }
}
