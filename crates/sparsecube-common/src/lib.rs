//! sparsecube Common - Shared types and utilities
//!
//! This crate provides the identifier types, error definitions and
//! configuration structures used by the dataset container and its tools.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LoggingConfig, StoreConfig};
pub use error::{Error, Result};
pub use types::*;
