//! Error handling for Updraft
//!
//! The error system is built around two types:
//! - [`UpdraftError`] - one strongly-typed variant per failure condition the
//!   pipeline can surface, so callers can match on the exact outcome
//! - [`ErrorContext`] - a wrapper that adds user-friendly suggestions and
//!   details for CLI display
//!
//! Every public pipeline operation fails with a distinct, inspectable error:
//! manifest problems ([`UpdraftError::ManifestParse`],
//! [`UpdraftError::NoReleasesFound`]), download problems
//! ([`UpdraftError::ArtifactTransport`], [`UpdraftError::ArtifactIntegrity`]),
//! apply problems ([`UpdraftError::DestinationExists`],
//! [`UpdraftError::DeltaApplication`]), and contention
//! ([`UpdraftError::LockWaitTimeout`]).
//!
//! Errors cross the crate as [`anyhow::Error`]; use `downcast_ref` to inspect
//! the typed variant, or [`user_friendly_error`] to turn any failure into a
//! displayable [`ErrorContext`] with actionable suggestions.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for Updraft operations.
///
/// Each variant represents a specific failure mode with enough context to act
/// on it. The only built-in automatic recovery in the pipeline is the
/// delta-to-full fallback during planning; everything else terminates the
/// calling operation and surfaces here.
#[derive(Error, Debug)]
pub enum UpdraftError {
    /// A line in the `RELEASES` manifest could not be parsed.
    ///
    /// The whole manifest fetch fails atomically; no partial manifest is
    /// ever accepted.
    #[error("Invalid manifest line {line_number}: {reason}")]
    ManifestParse {
        /// 1-based line number of the offending line
        line_number: usize,
        /// The offending line text
        line: String,
        /// Why the line was rejected
        reason: String,
    },

    /// The manifest contains no full release for the application at all.
    #[error("No releases found for package '{package}'")]
    NoReleasesFound {
        /// Package id the feed was searched for
        package: String,
    },

    /// Fetching an artifact's bytes failed.
    #[error("Failed to download release '{filename}'")]
    ArtifactTransport {
        /// Filename of the failing release entry
        filename: String,
        /// Transport-level reason
        reason: String,
    },

    /// A downloaded artifact did not match its manifest-declared hash.
    #[error("Checksum mismatch for release '{filename}': expected {expected}, got {actual}")]
    ArtifactIntegrity {
        /// Filename of the failing release entry
        filename: String,
        /// Hash declared by the manifest
        expected: String,
        /// Hash actually computed
        actual: String,
    },

    /// The target version directory already exists.
    ///
    /// Updraft never silently overwrites an installed version.
    #[error("Install destination already exists: {path}")]
    DestinationExists {
        /// The colliding version directory
        path: String,
    },

    /// Applying a delta patch failed at a specific chain link.
    ///
    /// The caller is expected to retry the apply with
    /// `ignore_delta_updates = true` to force a full-release fallback.
    #[error("Failed to apply delta '{filename}' (target version {version})")]
    DeltaApplication {
        /// Filename of the failing delta package
        filename: String,
        /// Target version of the failing link
        version: String,
        /// What went wrong at this link
        reason: String,
    },

    /// Another updater instance holds the update lock.
    ///
    /// This signals an update already in progress; treat it as "try again
    /// later", never as corruption.
    #[error("Timed out waiting for update lock on installation '{installation}' after {waited_secs}s")]
    LockWaitTimeout {
        /// Installation id the lock is scoped to
        installation: String,
        /// How long acquisition waited before giving up
        waited_secs: u64,
    },

    /// A delta chain needs the currently installed version's file tree, but
    /// it is missing from the install root.
    #[error("Installed version {version} not found in install root")]
    MissingInstalledVersion {
        /// Version the `.current` pointer names
        version: String,
    },

    /// A downloaded package is structurally invalid (bad archive, metadata
    /// mismatch, unsafe entry path).
    #[error("Invalid package '{filename}': {reason}")]
    InvalidPackage {
        /// Filename of the offending package
        filename: String,
        /// Why the package was rejected
        reason: String,
    },

    /// An operation was called with arguments that fail its preconditions.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Which precondition failed
        reason: String,
    },

    /// The operation was cancelled before completion.
    ///
    /// Cancellation before the pointer swap is always safe; the previously
    /// current version remains fully intact and selectable.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration file problem.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Version parsing error
    #[error("Version parsing error: {0}")]
    SemverError(#[from] semver::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for UpdraftError {
    fn clone(&self) -> Self {
        match self {
            Self::ManifestParse {
                line_number,
                line,
                reason,
            } => Self::ManifestParse {
                line_number: *line_number,
                line: line.clone(),
                reason: reason.clone(),
            },
            Self::NoReleasesFound {
                package,
            } => Self::NoReleasesFound {
                package: package.clone(),
            },
            Self::ArtifactTransport {
                filename,
                reason,
            } => Self::ArtifactTransport {
                filename: filename.clone(),
                reason: reason.clone(),
            },
            Self::ArtifactIntegrity {
                filename,
                expected,
                actual,
            } => Self::ArtifactIntegrity {
                filename: filename.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::DestinationExists {
                path,
            } => Self::DestinationExists {
                path: path.clone(),
            },
            Self::DeltaApplication {
                filename,
                version,
                reason,
            } => Self::DeltaApplication {
                filename: filename.clone(),
                version: version.clone(),
                reason: reason.clone(),
            },
            Self::LockWaitTimeout {
                installation,
                waited_secs,
            } => Self::LockWaitTimeout {
                installation: installation.clone(),
                waited_secs: *waited_secs,
            },
            Self::MissingInstalledVersion {
                version,
            } => Self::MissingInstalledVersion {
                version: version.clone(),
            },
            Self::InvalidPackage {
                filename,
                reason,
            } => Self::InvalidPackage {
                filename: filename.clone(),
                reason: reason.clone(),
            },
            Self::InvalidInput {
                reason,
            } => Self::InvalidInput {
                reason: reason.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // Errors that don't implement Clone degrade to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::SemverError(e) => Self::Other {
                message: format!("Version parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Wraps an [`UpdraftError`] with an optional suggestion (actionable steps,
/// shown green) and optional details (why it happened, shown yellow). This is
/// how the CLI presents every failure.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdraftError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdraftError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error occurred.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`] for CLI display.
///
/// Recognizes [`UpdraftError`] variants and common [`std::io::Error`] kinds
/// and attaches tailored suggestions; everything else is rendered with its
/// full `anyhow` cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updraft_error) = error.downcast_ref::<UpdraftError>() {
        return create_error_context(updraft_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpdraftError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion(
                    "Check ownership of the install root, or run with elevated permissions",
                )
                .with_details(
                    "Updraft needs write access to the install root to stage and apply releases",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpdraftError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the install root and feed URL are correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full cause chain for diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdraftError::Other {
        message,
    })
}

/// Map each [`UpdraftError`] variant to a context with tailored suggestions.
fn create_error_context(error: UpdraftError) -> ErrorContext {
    match &error {
        UpdraftError::ManifestParse { line_number, line, .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion(
                    "Verify the feed publishes a RELEASES file with one '<hash> <filename> <size>' entry per line",
                )
                .with_details(format!("Offending line {line_number}: {line}"))
        }

        UpdraftError::NoReleasesFound { package } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check that the feed URL is correct and publishes full releases for '{package}'"
            ))
            .with_details(
                "At least one full release entry is required; delta entries alone cannot be applied",
            ),

        UpdraftError::ArtifactTransport { filename, reason } => ErrorContext::new(error.clone())
            .with_suggestion("Check your network connection and the feed URL, then retry")
            .with_details(format!("Transport failure for {filename}: {reason}")),

        UpdraftError::ArtifactIntegrity { filename, .. } => ErrorContext::new(error.clone())
            .with_suggestion(
                "Delete the staged package and retry; if the mismatch persists the feed is publishing corrupt artifacts",
            )
            .with_details(format!(
                "The downloaded bytes of {filename} do not match the hash declared in the manifest"
            )),

        UpdraftError::DestinationExists { path } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Remove the stale directory {path} if it is a leftover from a failed install"
            ))
            .with_details("Updraft refuses to overwrite an existing version directory"),

        UpdraftError::DeltaApplication { .. } => ErrorContext::new(error.clone())
            .with_suggestion(
                "Retry with delta updates disabled (--ignore-deltas) to fall back to the full release",
            )
            .with_details(
                "Delta patches require the exact base file tree; a modified or partial install breaks the chain",
            ),

        UpdraftError::LockWaitTimeout { installation, .. } => ErrorContext::new(error.clone())
            .with_suggestion("Another update is already in progress; try again later")
            .with_details(format!(
                "The update lock for installation '{installation}' is held by another updater instance"
            )),

        _ => ErrorContext::new(error.clone()),
    }
}
