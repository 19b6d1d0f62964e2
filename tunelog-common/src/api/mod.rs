//! Shared API primitives for Tunelog services

pub mod auth;
