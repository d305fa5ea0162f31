//! Diagnostics logging seam for dispatch instrumentation

use tracing::debug;

/// Sink for the three per-listener dispatch diagnostics.
///
/// The instrumentation layer never logs above debug level; failures are
/// propagated as errors, not logged here.
pub trait DiagnosticLogger: Send + Sync {
    /// A listener ran to completion without stopping propagation
    fn notified(&self, event: &str, listener: &str);

    /// A listener stopped propagation of the event
    fn stopped_propagation(&self, event: &str, listener: &str);

    /// A listener was skipped because propagation had already stopped
    fn not_called(&self, event: &str, listener: &str);
}

/// Emits diagnostics through the `tracing` ecosystem at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl DiagnosticLogger for TracingLogger {
    fn notified(&self, event: &str, listener: &str) {
        debug!(event, listener, "Notified event \"{event}\" to listener \"{listener}\".");
    }

    fn stopped_propagation(&self, event: &str, listener: &str) {
        debug!(
            event,
            listener, "Listener \"{listener}\" stopped propagation of the event \"{event}\"."
        );
    }

    fn not_called(&self, event: &str, listener: &str) {
        debug!(event, listener, "Listener \"{listener}\" was not called for event \"{event}\".");
    }
}

/// Discards every diagnostic
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl DiagnosticLogger for NullLogger {
    fn notified(&self, _event: &str, _listener: &str) {}

    fn stopped_propagation(&self, _event: &str, _listener: &str) {}

    fn not_called(&self, _event: &str, _listener: &str) {}
}
