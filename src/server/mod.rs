//! HTTP service surface.
//!
//! This module provides:
//! - Configuration types and loading (`config`)
//! - The axum router (`routes`)

pub mod config;
pub mod routes;

pub use routes::router;
