//! Diagnostics Sink
//!
//! Free-form diagnostic strings are forwarded to a host-registered sink.
//! With no sink registered, messages fall through to tracing at debug
//! level. Sending never errors and never panics.

use std::sync::Arc;

use parking_lot::RwLock;

/// Receives diagnostic messages from the recovery pipeline.
pub trait DiagnosticsSink: Send + Sync {
    fn send(&self, message: &str);
}

/// Default sink: forwards to the tracing pipeline.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn send(&self, message: &str) {
        tracing::debug!(target: "webview_recovery::diagnostics", "{}", message);
    }
}

/// Registry holding the current sink. Replaceable by the host at any time;
/// absence degrades to a silent no-op (plus a trace-level log line).
pub struct DiagnosticsHub {
    sink: RwLock<Option<Arc<dyn DiagnosticsSink>>>,
}

impl DiagnosticsHub {
    /// Create a hub with the default tracing-backed sink installed.
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(Some(Arc::new(TracingSink))),
        }
    }

    /// Create a hub with no sink at all.
    pub fn disabled() -> Self {
        Self {
            sink: RwLock::new(None),
        }
    }

    /// Replace the sink.
    pub fn set_sink(&self, sink: Arc<dyn DiagnosticsSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Remove the sink; subsequent sends become no-ops.
    pub fn clear_sink(&self) {
        *self.sink.write() = None;
    }

    /// Forward a message to the registered sink, if any.
    pub fn send(&self, message: &str) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.send(message),
            None => tracing::trace!("diagnostics (no sink): {}", message),
        }
    }
}

impl Default for DiagnosticsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CollectingSink {
        messages: Mutex<Vec<String>>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    impl DiagnosticsSink for CollectingSink {
        fn send(&self, message: &str) {
            self.messages.lock().push(message.to_string());
        }
    }

    #[test]
    fn messages_reach_registered_sink() {
        let hub = DiagnosticsHub::new();
        let sink = Arc::new(CollectingSink::new());
        hub.set_sink(sink.clone());

        hub.send("surface degraded");
        hub.send("recovery started");

        let messages = sink.messages.lock();
        assert_eq!(
            messages.as_slice(),
            ["surface degraded", "recovery started"]
        );
    }

    #[test]
    fn missing_sink_is_a_silent_no_op() {
        let hub = DiagnosticsHub::disabled();
        // Must not panic or error
        hub.send("nobody listening");

        hub.clear_sink();
        hub.send("still nobody");
    }

    #[test]
    fn sink_is_replaceable() {
        let hub = DiagnosticsHub::new();
        let first = Arc::new(CollectingSink::new());
        let second = Arc::new(CollectingSink::new());

        hub.set_sink(first.clone());
        hub.send("one");
        hub.set_sink(second.clone());
        hub.send("two");

        assert_eq!(first.messages.lock().as_slice(), ["one"]);
        assert_eq!(second.messages.lock().as_slice(), ["two"]);
    }
}
