//! Background worker running reload passes off the commit path.
//!
//! Committing transactions only record a request; the worker picks pending
//! requests up on its next poll, so bursts of schema writes collapse into a
//! single pass when coalescing is enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::{SchemaChange, SchemaCompiler};

/// Background worker that runs pending reload passes.
pub struct ReloadWorker {
    compiler: Arc<SchemaCompiler>,
    /// Shutdown signal.
    shutdown: Arc<AtomicBool>,
    /// Worker thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReloadWorker {
    /// Start a worker polling `compiler` at its configured interval.
    pub fn start(compiler: Arc<SchemaCompiler>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let worker_compiler = Arc::clone(&compiler);

        let handle = thread::spawn(move || {
            Self::worker_loop(worker_compiler, shutdown_clone);
        });

        Self {
            compiler,
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Record the changes of a committed transaction. Returns whether a
    /// reload was requested.
    pub fn notify(&self, changes: &[SchemaChange]) -> bool {
        self.compiler.request_for(changes)
    }

    /// Request a reload unconditionally.
    pub fn request(&self) {
        self.compiler.request_reload();
    }

    /// The compiler driven by this worker.
    pub fn compiler(&self) -> &Arc<SchemaCompiler> {
        &self.compiler
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Check if the worker is still running.
    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn worker_loop(compiler: Arc<SchemaCompiler>, shutdown: Arc<AtomicBool>) {
        let poll_interval = compiler.config().reload_poll_interval;

        loop {
            if shutdown.load(Ordering::SeqCst) {
                // Run whatever was requested before shutting down
                compiler.process_pending();
                break;
            }

            if !compiler.has_pending() {
                thread::sleep(poll_interval);
                continue;
            }

            if let Some(report) = compiler.process_pending() {
                if !report.diagnostics.is_empty() {
                    tracing::warn!(
                        version = report.version,
                        diagnostics = report.diagnostics.len(),
                        "background reload finished with diagnostics"
                    );
                }
            }
        }
    }
}

impl Drop for ReloadWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
