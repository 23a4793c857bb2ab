//! Core domain types, errors, and constants for the execution service.
//!
//! This crate establishes the foundational data structures and error handling
//! used throughout the service.
//!
//! - **`errors`**: the primary `Error` enum, its machine-readable `ErrorCode`,
//!   and the `Result` alias used everywhere else.
//! - **`types`**: request/response data model — `ExecutionRequest`,
//!   `CommandStep`, `FilePayload`, `Environment`, `ExecutionResult`,
//!   `Fingerprint`.
//! - **`constants`**: shared defaults (timeouts, grace periods).

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, ErrorCode, Result, ResultExt},
    types::*,
};
