//! Database access layer for tunelog-catalog

pub mod cache;
pub mod follows;
pub mod schema;
pub mod sessions;
