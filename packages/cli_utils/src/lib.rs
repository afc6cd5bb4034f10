#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the Data Coyote toolchain.
//!
//! [`init_logger`] sets up `pretty_env_logger` behind `indicatif-log-bridge`
//! so that `log::info!` and friends are suspended while progress bars
//! redraw. It returns a [`LogHandle`] that owns the progress surface and
//! flushes the logger when dropped.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Owns the process logger's progress-bar surface.
///
/// Keep it alive for the lifetime of `main`. Dropping it flushes any
/// buffered log output.
pub struct LogHandle {
    multi: MultiProgress,
}

impl LogHandle {
    /// Creates a step-level progress bar (e.g. pipeline stages 3/9).
    #[must_use]
    pub fn steps_bar(&self, message: &str, total: u64) -> StepProgress {
        StepProgress::new(&self.multi, message, total)
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        log::logger().flush();
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Filtering follows `RUST_LOG`. Calling this more than once is harmless;
/// later calls keep the first logger.
#[must_use]
pub fn init_logger() -> LogHandle {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    LogHandle { multi }
}

/// A progress bar that advances one named step at a time.
pub struct StepProgress {
    bar: ProgressBar,
}

impl StepProgress {
    fn new(multi: &MultiProgress, message: &str, total: u64) -> Self {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.enable_steady_tick(Duration::from_millis(250));
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Creates a bar that never draws, for non-interactive use.
    #[must_use]
    pub fn hidden(total: u64) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden()),
        }
    }

    /// Shows `label` as the step now running.
    pub fn start(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    /// Marks the running step as done.
    pub fn complete(&self) {
        self.bar.inc(1);
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finishes the bar with a final message.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Removes the bar from the terminal, e.g. after a failure.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}
