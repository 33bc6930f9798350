//! Error Types
//!
//! This module defines the error types used throughout the animation runtime.
//!
//! # Overview
//!
//! The main error type [`MarionetteError`] covers the hard failure modes:
//! - Binary asset format errors (signature, version, inconsistent tables)
//! - Load errors (missing files, empty required fields)
//! - Arena sizing and allocation failures
//! - Binding mismatches between animation and model assets
//!
//! Soft failures (a clip or parameter referenced by a controller but absent
//! from a particular data variant) are never errors. They are logged with
//! `log::warn!` and evaluation degrades around them.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, MarionetteError>`.
//!
//! ```rust,ignore
//! use marionette_core::errors::{MarionetteError, Result};
//!
//! fn load_reel() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the animation runtime.
#[derive(Error, Debug)]
pub enum MarionetteError {
    // ========================================================================
    // Asset Format Errors
    // ========================================================================
    /// The binary asset has a bad signature, version or type tag, or its
    /// tables are inconsistent.
    #[error("Invalid asset format '{path}': {reason}")]
    Format {
        /// Path (or name) of the offending asset
        path: String,
        /// What was wrong with it
        reason: String,
    },

    // ========================================================================
    // Load Errors
    // ========================================================================
    /// The asset could not be loaded (missing file, empty required field).
    #[error("Loading '{path}' failed: {reason}")]
    Load {
        /// Path (or name) of the asset being loaded
        path: String,
        /// Why loading failed
        reason: String,
    },

    // ========================================================================
    // Memory Errors
    // ========================================================================
    /// The exact arena size computed for an asset or instance could not be
    /// reserved, or exceeds the configured budget.
    #[error("Out of memory: {context} requires {requested} bytes")]
    OutOfMemory {
        /// What was being allocated
        context: String,
        /// Bytes requested
        requested: usize,
    },

    // ========================================================================
    // Binding Errors
    // ========================================================================
    /// A pose-binding name has no match in the target skeleton/hierarchy, or
    /// the reel an instance needs cannot be resolved.
    #[error("Bind error: {0}")]
    Bind(String),

    // ========================================================================
    // I/O & Parsing Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MarionetteError {
    pub fn format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_memory(context: impl Into<String>, requested: usize) -> Self {
        Self::OutOfMemory {
            context: context.into(),
            requested,
        }
    }
}

/// Alias for `Result<T, MarionetteError>`.
pub type Result<T> = std::result::Result<T, MarionetteError>;
