use crate::domain::ports::DiagnosticSink;

/// Forwards diagnostics to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, namespace: &str, message: &str) {
        tracing::debug!(namespace, "[AcceptBanano-{namespace}] {message}");
    }
}

/// Discards everything. The default when no sink is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _namespace: &str, _message: &str) {}
}
