//! RavenHost Common - Shared error types and utilities
//!
//! This crate provides the foundational pieces used across all RavenHost
//! components:
//! - Error types and the crate-wide `Result` alias
//! - Utility functions (local address discovery, path helpers)

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{RavenHostError, Result};
pub use utils::{ensure_trailing_separator, local_ip};
