//! Core types and error handling for Updraft.
//!
//! This module hosts the error taxonomy shared by every pipeline stage and
//! the user-facing error presentation used by the CLI.

pub mod error;

pub use error::{ErrorContext, UpdraftError, user_friendly_error};
