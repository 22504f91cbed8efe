//! Access control: the credential validator and the middleware applying it.

pub mod middleware;
pub mod validator;

pub use middleware::{DEFAULT_KEY_PARAM, KeyAuthMiddleware};
pub use validator::{AccessError, AccessValidator};
