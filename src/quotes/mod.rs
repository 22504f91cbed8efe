//! Quote records and the retrieval engine that serves them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod service;

pub use service::{IdSampler, QuoteError, QuoteService, ThreadRngSampler};

/// A single quote. Immutable once seeded.
///
/// Serializes as `{"id": 2, "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    #[schema(example = 105)]
    pub id: u64,
    #[schema(example = "Well begun is half done.")]
    pub text: String,
}

impl Quote {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}
