//! PHAMA Common - Shared types and utilities for the PHAMA chat client.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{BackendConfig, Config, ObservabilityConfig, SpeechConfig, StorageConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
