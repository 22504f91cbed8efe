//! Key authentication middleware.

use std::sync::Arc;

use tracing::debug;

use super::AccessValidator;
use crate::{
    Response,
    context::Context,
    error::ApiError,
    middleware::{BoxFuture, Middleware, Next},
};

/// Query parameter carrying the credential unless configured otherwise.
pub const DEFAULT_KEY_PARAM: &str = "citaty-key";

/// Rejects requests whose credential query parameter fails the
/// [`AccessValidator`].
///
/// Paths containing any allowlisted pattern skip the check. Rejections are
/// rendered through the error mapper and the downstream handler is not run.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use citaty::security::{AccessValidator, KeyAuthMiddleware};
///
/// let auth = KeyAuthMiddleware::new(Arc::new(AccessValidator::new("secret")))
///     .key_param("api-key")
///     .allow_path("swagger");
/// assert!(auth.is_allowlisted("/swagger/doc.json"));
/// ```
pub struct KeyAuthMiddleware {
    validator: Arc<AccessValidator>,
    key_param: String,
    allowlist: Vec<String>,
}

impl KeyAuthMiddleware {
    pub fn new(validator: Arc<AccessValidator>) -> Self {
        Self {
            validator,
            key_param: DEFAULT_KEY_PARAM.to_owned(),
            allowlist: Vec::new(),
        }
    }

    /// Sets the query parameter that carries the credential.
    #[must_use]
    pub fn key_param(mut self, name: impl Into<String>) -> Self {
        self.key_param = name.into();
        self
    }

    /// Adds a path pattern that bypasses validation. Matching is by substring.
    #[must_use]
    pub fn allow_path(mut self, pattern: impl Into<String>) -> Self {
        self.allowlist.push(pattern.into());
        self
    }

    pub fn is_allowlisted(&self, path: &str) -> bool {
        self.allowlist.iter().any(|p| path.contains(p.as_str()))
    }
}

impl Middleware for KeyAuthMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<Response> {
        if self.is_allowlisted(ctx.request().path()) {
            debug!("path is allowlisted, skipping key check");
            return Box::pin(next.run(ctx));
        }

        let verdict = self
            .validator
            .validate(ctx.request().query_param(&self.key_param));

        Box::pin(async move {
            match verdict {
                Ok(()) => next.run(ctx).await,
                Err(e) => ApiError::from(e).into_response(ctx.meta()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;
    use crate::http::Request;
    use crate::middleware::{MiddlewareHandler, from_middleware};

    fn ctx(path_and_query: &str) -> Context {
        let raw = format!("GET {path_and_query} HTTP/1.1\r\nHost: h\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    fn ok_handler() -> MiddlewareHandler {
        Arc::new(|_ctx: Context, _next: Next| -> BoxFuture<Response> {
            Box::pin(async { Response::new(StatusCode::Ok) })
        })
    }

    fn run(auth: KeyAuthMiddleware, path: &str) -> impl std::future::Future<Output = Response> {
        let chain: Vec<MiddlewareHandler> = vec![from_middleware(Arc::new(auth)), ok_handler()];
        Next::new(chain.into()).run(ctx(path))
    }

    fn auth() -> KeyAuthMiddleware {
        KeyAuthMiddleware::new(Arc::new(AccessValidator::new("secret"))).allow_path("swagger")
    }

    #[tokio::test]
    async fn valid_key_passes() {
        let res = run(auth(), "/random?citaty-key=secret").await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let res = run(auth(), "/random").await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
        assert_eq!(res.payload(), br#"{"code":401,"message":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let res = run(auth(), "/random?citaty-key=secreT").await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
    }

    #[tokio::test]
    async fn key_in_other_param_is_ignored() {
        let res = run(auth(), "/random?api-key=secret").await;
        assert_eq!(res.status(), StatusCode::Unauthorized);

        let res = run(auth().key_param("api-key"), "/random?api-key=secret").await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn allowlisted_path_skips_check() {
        let res = run(auth(), "/swagger/index.html").await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[test]
    fn allowlist_is_substring_match() {
        let auth = auth();
        assert!(auth.is_allowlisted("/swagger"));
        assert!(auth.is_allowlisted("/docs/swagger/ui"));
        assert!(!auth.is_allowlisted("/random"));
    }
}
