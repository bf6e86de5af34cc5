//! Cross-platform utilities shared by the pipeline stages.
//!
//! - [`fs`] - Safe filesystem operations (atomic writes, directory copies,
//!   chunked hashing)
//! - [`progress`] - The monotonic progress sink used by every public
//!   operation, plus terminal progress bars for the CLI

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir, hash_file, hash_file_chunked};
pub use progress::ProgressHandle;
