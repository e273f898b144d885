//! Tutor Common - Shared configuration, errors, and logging for the Tutor client.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.tutor/config.json` + `TUTOR_*` env)
//! - Configuration validation
//! - The shared error type
//! - Logging setup
//! - String helpers for log output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    BackendConfig, HistoryConfig, ImageConfig, ObservabilityConfig, RetryPolicy, StorageBackend,
    StorageConfig, TutorConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
