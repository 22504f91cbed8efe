//! # citaty
//!
//! A small read-only quote service over a from-scratch async HTTP/1.1 server.
//!
//! Quotes live in a store port and are read through a cache port
//! (cache-aside). Every route except the API docs requires a shared key in a
//! query parameter, compared in constant time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use citaty::app::App;
//! use citaty::cache::MemoryCache;
//! use citaty::database::MemoryStore;
//! use citaty::quotes::{Quote, QuoteService};
//! use citaty::security::{AccessValidator, DEFAULT_KEY_PARAM};
//! use citaty::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new([Quote::new(0, "Hello, World!")])?;
//!     let service = QuoteService::new(Arc::new(store), Arc::new(MemoryCache::new()));
//!     let app = Arc::new(App::new(service, AccessValidator::new("secret"), DEFAULT_KEY_PARAM));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run(move |req| {
//!             let app = Arc::clone(&app);
//!             async move { app.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod docs;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod quotes;
pub mod router;
pub mod security;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use error::ApiError;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
