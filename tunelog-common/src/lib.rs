//! # Tunelog Common Library
//!
//! Shared code for Tunelog services including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Database connection helpers
//! - API authentication primitives

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
