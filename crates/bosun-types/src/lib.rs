//! # bosun-types
//!
//! Core type definitions for the bosun SSH command broker.
//!
//! This crate is the foundation of the dependency graph -- every other
//! bosun crate depends on it. It contains:
//!
//! - **[`error`]** -- [`ErrorKind`] (the wire-visible error taxonomy) and
//!   [`BosunError`] (the process-level error type)
//! - **[`config`]** -- Configuration schema, environment variable names,
//!   and the env + YAML layering logic
//! - **[`secret`]** -- [`SecretString`], a redacting wrapper for passwords
//! - **[`outcome`]** -- Execution outcomes, session summaries, and pending
//!   password prompt records

pub mod config;
pub mod error;
pub mod outcome;
pub mod secret;

pub use config::{AuthConfig, AuthMaterial, Config, Limits, PermissibilityLevel, SudoSecret};
pub use error::{BosunError, ErrorKind, Result};
pub use outcome::{ExecutionOutcome, PromptKind, PromptRequest, SessionSummary};
pub use secret::SecretString;
