//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camelCase.
//! - References to other documents are populated where the client needs them.

use serde::{Deserialize, Serialize};

pub mod answer;
pub mod auth;
pub mod id;
pub mod question;
pub mod user;

pub use id::ApiId;

/// A human-readable message; the body of every error response and of some
/// bodiless successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
