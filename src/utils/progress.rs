//! Progress reporting for pipeline operations.
//!
//! Every public operation accepts a [`ProgressHandle`]: a cheap, cloneable
//! sink that forwards integer percentages (0..=100) to an optional callback.
//! The handle enforces the pipeline's ordering guarantee on the caller's
//! behalf: values are clamped to 100 and strictly non-decreasing per handle,
//! regardless of how the stages interleave their reports. A given operation
//! reaches 100 only on full success.
//!
//! The [`TerminalBar`] type wraps `indicatif` for CLI use and disables itself
//! in non-interactive environments or when `UPDRAFT_NO_PROGRESS` is set.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// Checks if terminal progress bars should be disabled.
fn is_progress_disabled() -> bool {
    std::env::var("UPDRAFT_NO_PROGRESS").is_ok()
}

struct ProgressInner {
    sink: Option<Box<dyn Fn(u8) + Send + Sync>>,
    last: AtomicU8,
}

/// A monotonic percentage sink shared across a single pipeline operation.
///
/// Clones share the same high-water mark, so concurrent workers can report
/// through clones without ever emitting a decreasing value.
///
/// # Examples
///
/// ```rust
/// use updraft::utils::progress::ProgressHandle;
///
/// let progress = ProgressHandle::new(|pct| println!("{pct}%"));
/// progress.report(40);
/// progress.report(25); // swallowed: lower than the high-water mark
/// progress.complete(); // emits 100
/// ```
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<ProgressInner>,
}

impl ProgressHandle {
    /// Create a handle that forwards percentages to `sink`.
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                sink: Some(Box::new(sink)),
                last: AtomicU8::new(0),
            }),
        }
    }

    /// Create a handle that discards all reports.
    #[must_use]
    pub fn none() -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                sink: None,
                last: AtomicU8::new(0),
            }),
        }
    }

    /// Report a percentage, clamped to 100.
    ///
    /// Values at or below the current high-water mark are swallowed, keeping
    /// emissions strictly increasing.
    pub fn report(&self, pct: u8) {
        let pct = pct.min(100);
        let prev = self.inner.last.fetch_max(pct, Ordering::SeqCst);
        if pct > prev
            && let Some(sink) = &self.inner.sink
        {
            sink(pct);
        }
    }

    /// Report progress as a completed fraction of a byte total.
    ///
    /// A zero `total` reports nothing; the terminal 100 is left to
    /// [`complete`](Self::complete) so it is only reached on success.
    pub fn report_bytes(&self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let pct = ((done.saturating_mul(100)) / total).min(99) as u8;
        self.report(pct);
    }

    /// Report terminal success (100%).
    pub fn complete(&self) {
        self.report(100);
    }

    /// The highest percentage reported so far.
    #[must_use]
    pub fn current(&self) -> u8 {
        self.inner.last.load(Ordering::SeqCst)
    }
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::none()
    }
}

/// A terminal progress bar with consistent styling.
///
/// Hidden automatically when `UPDRAFT_NO_PROGRESS` is set so CI logs stay
/// clean. The CLI bridges one of these into a [`ProgressHandle`] via
/// [`TerminalBar::as_progress_handle`].
pub struct TerminalBar {
    bar: IndicatifBar,
}

impl TerminalBar {
    /// Create a percentage bar (0..=100).
    #[must_use]
    pub fn percent() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(100);
            bar.set_style(
                IndicatifStyle::default_bar()
                    .template("{msg:24} [{bar:40.cyan/blue}] {pos:>3}%")
                    .unwrap_or_else(|_| IndicatifStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        };
        Self {
            bar,
        }
    }

    /// Create a spinner for indeterminate work.
    #[must_use]
    pub fn spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            bar,
        }
    }

    /// Set the message shown next to the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Finish the bar, leaving a final message.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.finish_with_message(msg.into());
    }

    /// Clear the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }

    /// Bridge this bar into a pipeline [`ProgressHandle`].
    #[must_use]
    pub fn as_progress_handle(&self) -> ProgressHandle {
        let bar = self.bar.clone();
        ProgressHandle::new(move |pct| bar.set_position(u64::from(pct)))
    }
}
