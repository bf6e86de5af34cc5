//! Integration test suite for updraft.
//!
//! End-to-end scenarios run the full pipeline against a local-directory feed
//! of real zip packages, exercising the public `UpdateManager` operations the
//! way an embedding application would.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! Test organization:
//! - **pipeline**: check/download/apply end-to-end scenarios
//! - **locking**: mutual exclusion between concurrent updaters
//! - **cli**: `updraft` binary smoke tests

mod common;

mod cli;
mod locking;
mod pipeline;
