//! Bloglist Common Library
//!
//! Data model of the bloglist application as observed through its REST API,
//! shared by the E2E harness and its test doubles.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Frontend served by the development server
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Backend REST API
pub const DEFAULT_API_URL: &str = "http://localhost:3003";
