//! Per-request context handed through the middleware chain to a handler.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::http::{Method, Request};

/// Path parameters captured by the matched route.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// What every log line about a request carries.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
    pub method: Method,
    pub path: String,
}

pub struct Context {
    request: Request,
    params: PathParams,
    meta: RequestMeta,
    started_at: Instant,
}

impl Context {
    /// Wraps a request. The request id stays empty until
    /// [`RequestIdMiddleware`](crate::middleware::RequestIdMiddleware) assigns one.
    pub fn new(request: Request) -> Self {
        let meta = RequestMeta {
            request_id: String::new(),
            method: request.method().clone(),
            path: request.path().to_owned(),
        };
        Self {
            request,
            params: PathParams::new(),
            meta,
            started_at: Instant::now(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    pub fn request_id(&self) -> &str {
        &self.meta.request_id
    }

    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.meta.request_id = id.into();
    }

    /// When the context was created, i.e. when the request was dispatched.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
