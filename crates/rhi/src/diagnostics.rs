//! Injectable sink for graphics API diagnostics.
//!
//! Validation layer messages are delivered to a [`DiagnosticSink`] supplied
//! when the [`Instance`](crate::instance::Instance) is created. The instance
//! keeps the sink alive until after the debug messenger is destroyed, so the
//! sink outlives the device and every object created from it.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

/// Receives diagnostic messages from the graphics API.
///
/// Called from inside the Vulkan driver, possibly on any thread. Implementations
/// must not panic and must not call back into Vulkan.
pub trait DiagnosticSink: Send + Sync {
    fn message(&self, severity: Severity, message: &str);
}

/// Default sink: logs through `tracing` and counts errors and warnings.
///
/// Warnings and errors are logged and execution continues. Callers that want
/// to abort on validation errors poll [`TracingSink::error_count`].
#[derive(Debug, Default)]
pub struct TracingSink {
    errors: AtomicU64,
    warnings: AtomicU64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of error-severity messages received so far.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Number of warning-severity messages received so far.
    pub fn warning_count(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for TracingSink {
    fn message(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                error!(target: "vkpresent::vulkan", "{}", message);
            }
            Severity::Warning => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
                warn!(target: "vkpresent::vulkan", "{}", message);
            }
            Severity::Info => info!(target: "vkpresent::vulkan", "{}", message),
            Severity::Verbose => debug!(target: "vkpresent::vulkan", "{}", message),
        }
    }
}
