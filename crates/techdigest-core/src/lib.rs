//! Core types, configuration, and error handling for techdigest.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`DigestError`]: unified error type using `thiserror`
//! - [`DigestConfig`]: configuration loaded from `.techdigest.toml`
//! - [`CategoryRegistry`]: the validated, ordered category list
//! - Shared types: [`Article`], [`Category`], [`ClassificationResult`],
//!   [`AssignmentSource`], [`ClassificationStats`], [`OutputFormat`]

mod config;
mod error;
mod registry;
mod types;

pub use config::{ClassifierConfig, DigestConfig, LlmConfig, ProviderKind};
pub use error::{DigestError, ProviderErrorKind};
pub use registry::CategoryRegistry;
pub use types::{
    Article, AssignmentSource, Category, ClassificationResult, ClassificationStats, OutputFormat,
};

/// A convenience `Result` type for techdigest operations.
pub type Result<T> = std::result::Result<T, DigestError>;
