//! Cleanup when the process is signalled.
//!
//! The handler fires on SIGINT, SIGTERM and SIGHUP (Ctrl-C and Ctrl-Break on
//! Windows). It drains the [`CleanupRegistry`] so mounts and scratch
//! directories held by the interrupted inspection do not outlive the run.

use super::resource::CleanupRegistry;
use crate::command::CommandExecutor;
use crate::output::write_line;
use std::io::Write;
use std::sync::Arc;

/// Exit status used when the run is interrupted.
pub const INTERRUPTED: i32 = 130;

/// Releases a run's pending resources when the process is signalled.
#[derive(Debug)]
pub struct InterruptCleanup<E> {
    registry: Arc<CleanupRegistry>,
    executor: E,
}

impl<E: CommandExecutor> InterruptCleanup<E> {
    /// Creates a handler draining `registry` with `executor`.
    #[must_use]
    pub const fn new(registry: Arc<CleanupRegistry>, executor: E) -> Self {
        Self { registry, executor }
    }

    /// Releases every pending resource, reports how many to `out` and
    /// returns the exit status for the interrupted run.
    pub fn handle(&self, out: &mut dyn Write) -> i32 {
        let released = self.registry.release_all(&self.executor);
        write_line(
            out,
            format!("\nInterrupted; released {released} pending resource(s)."),
        );
        INTERRUPTED
    }

    /// Installs the process-wide handler. Once signalled, the process exits
    /// with [`INTERRUPTED`] after cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`ctrlc::Error`] when a handler is already installed or the
    /// signals cannot be trapped.
    pub fn install(self) -> Result<(), ctrlc::Error>
    where
        E: Send + 'static,
    {
        ctrlc::set_handler(move || {
            let status = self.handle(&mut std::io::stderr());
            std::process::exit(status);
        })
    }
}
