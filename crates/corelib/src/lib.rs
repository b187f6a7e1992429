//! Core shared types and errors (codec-agnostic).
//! Importer flags/features, string configuration and the diagnostics sink.

use thiserror::Error;

pub mod config;
pub mod diagnostics;
pub mod flags;

pub use config::Configuration;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use flags::{ImporterFeatures, ImporterFlags};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Malformed option '{0}', expected key=value")]
    MalformedOption(String),
    #[error("Empty option key in '{0}'")]
    EmptyOptionKey(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
