//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Cross-document references are stored as bare IDs.

pub mod answer;
pub mod question;
pub mod user;
