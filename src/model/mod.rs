//! Data models: how documents are stored, and how they cross the API boundary.

pub mod api;
pub mod db;
pub mod mongodb;
