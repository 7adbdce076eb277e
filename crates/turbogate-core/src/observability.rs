//! Observability dispatcher
//!
//! Fans a completed trace out to every observability plugin on detached
//! tasks, after the response has been written. Each plugin gets its own task,
//! so a slow or failing plugin delays nobody else. Tasks are tracked (not
//! tied to the request's cancellation) so shutdown can wait for them.

use crate::plugins::core::ObservabilityPlugin;
use crate::plugins::registry::PluginSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info_span, warn};
use turbogate_types::Trace;

#[derive(Debug, Default)]
struct Lifecycle {
    flushers: usize,
    shut_down: bool,
}

/// Detached trace delivery to observability plugins
#[derive(Debug, Clone, Default)]
pub struct ObservabilityDispatcher {
    tracker: TaskTracker,
    background: CancellationToken,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl ObservabilityDispatcher {
    /// Create a dispatcher with no tasks in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a trace to every observability plugin of a snapshot
    ///
    /// Returns the number of injection tasks spawned.
    pub fn dispatch(&self, plugins: &PluginSnapshot, trace: Trace) -> usize {
        let targets: Vec<Arc<dyn ObservabilityPlugin>> = plugins
            .iter()
            .filter_map(|entry| entry.observability().cloned())
            .collect();
        self.dispatch_to(targets, trace)
    }

    /// Deliver a trace to the given plugins, one task each
    ///
    /// Needs a Tokio runtime; without one the trace is dropped with a warning.
    pub fn dispatch_to(&self, plugins: Vec<Arc<dyn ObservabilityPlugin>>, trace: Trace) -> usize {
        if plugins.is_empty() {
            return 0;
        }
        if self.lifecycle.lock().shut_down {
            warn!(trace_id = %trace.trace_id, "Observability dispatcher is shut down, dropping trace");
            return 0;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(trace_id = %trace.trace_id, "No async runtime available, dropping trace");
            return 0;
        };

        let trace = Arc::new(trace);
        let spawned = plugins.len();
        for plugin in plugins {
            let trace = Arc::clone(&trace);
            let background = self.background.child_token();
            let span = info_span!(
                "observability.inject",
                plugin = %plugin.name(),
                trace_id = %trace.trace_id
            );
            self.tracker.spawn_on(
                async move {
                    match plugin.inject(&background, &trace).await {
                        Ok(()) => debug!("Trace injected"),
                        Err(e) => warn!(error = %e, "Trace injection failed"),
                    }
                }
                .instrument(span),
                &runtime,
            );
        }

        debug!(plugins = spawned, "Dispatched trace to observability plugins");
        spawned
    }

    /// Injection tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until no injection is in flight
    ///
    /// Traces dispatched while waiting are still accepted, and waited for.
    pub async fn flush(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.flushers += 1;
            self.tracker.close();
        }
        self.tracker.wait().await;

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.flushers -= 1;
        if lifecycle.flushers == 0 && !lifecycle.shut_down {
            self.tracker.reopen();
        }
    }

    /// Stop accepting traces and wait for every in-flight injection
    ///
    /// The token handed to running injections is cancelled first, so plugins
    /// that watch it can cut their work short.
    pub async fn shutdown(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.shut_down = true;
            self.tracker.close();
        }
        self.background.cancel();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PluginError, PluginResult};
    use crate::plugins::core::Plugin;
    use crate::plugins::registry::PluginEntry;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn as_observability(self: Arc<Self>) -> Option<Arc<dyn ObservabilityPlugin>> {
            Some(self)
        }
    }

    #[async_trait]
    impl ObservabilityPlugin for Recorder {
        async fn inject(&self, background: &CancellationToken, trace: &Trace) -> PluginResult<()> {
            if let Some(gate) = &self.gate {
                tokio::select! {
                    () = gate.notified() => {}
                    () = background.cancelled() => {
                        self.seen.lock().push(format!("{}:cancelled", self.name));
                        return Ok(());
                    }
                }
            }
            self.seen
                .lock()
                .push(format!("{}:{}", self.name, trace.trace_id));
            if self.fail {
                return Err(PluginError::injection("collector down"));
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Plain;

    #[async_trait]
    impl Plugin for Plain {
        fn name(&self) -> &str {
            "plain"
        }
    }

    #[tokio::test]
    async fn test_failure_and_slowness_are_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Notify::new());
        let snapshot: PluginSnapshot = Arc::new(vec![
            PluginEntry::new(Arc::new(Recorder {
                name: "slow",
                seen: Arc::clone(&seen),
                fail: false,
                gate: Some(Arc::clone(&gate)),
            })),
            PluginEntry::new(Arc::new(Plain)),
            PluginEntry::new(Arc::new(Recorder {
                name: "failing",
                seen: Arc::clone(&seen),
                fail: true,
                gate: None,
            })),
            PluginEntry::new(Arc::new(Recorder {
                name: "fast",
                seen: Arc::clone(&seen),
                fail: false,
                gate: None,
            })),
        ]);

        let dispatcher = ObservabilityDispatcher::new();
        assert_eq!(dispatcher.dispatch(&snapshot, Trace::new("t-1")), 3);

        // The non-blocked plugins complete while "slow" is still waiting
        for _ in 0..100 {
            if seen.lock().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        {
            let mut done = seen.lock().clone();
            done.sort();
            assert_eq!(done, vec!["failing:t-1", "fast:t-1"]);
        }
        assert_eq!(dispatcher.in_flight(), 1);

        gate.notify_one();
        dispatcher.flush().await;
        assert_eq!(seen.lock().len(), 3);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_traces() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let snapshot: PluginSnapshot = Arc::new(vec![PluginEntry::new(Arc::new(Recorder {
            name: "exporter",
            seen: Arc::clone(&seen),
            fail: false,
            gate: None,
        }))]);

        let dispatcher = ObservabilityDispatcher::new();
        dispatcher.dispatch(&snapshot, Trace::new("before"));
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.dispatch(&snapshot, Trace::new("after")), 0);
        assert_eq!(*seen.lock(), vec!["exporter:before"]);
    }

    #[test]
    fn test_no_runtime_drops_trace() {
        let snapshot: PluginSnapshot = Arc::new(vec![PluginEntry::new(Arc::new(Recorder {
            name: "exporter",
            seen: Arc::new(Mutex::new(Vec::new())),
            fail: false,
            gate: None,
        }))]);
        assert_eq!(
            ObservabilityDispatcher::new().dispatch(&snapshot, Trace::new("x")),
            0
        );
    }

    #[tokio::test]
    async fn test_dispatch_during_flush_is_delivered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Notify::new());
        let slow: PluginSnapshot = Arc::new(vec![PluginEntry::new(Arc::new(Recorder {
            name: "slow",
            seen: Arc::clone(&seen),
            fail: false,
            gate: Some(Arc::clone(&gate)),
        }))]);
        let fast: PluginSnapshot = Arc::new(vec![PluginEntry::new(Arc::new(Recorder {
            name: "fast",
            seen: Arc::clone(&seen),
            fail: false,
            gate: None,
        }))]);

        let dispatcher = ObservabilityDispatcher::new();
        assert_eq!(dispatcher.dispatch(&slow, Trace::new("first")), 1);

        let flushing = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.flush().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!flushing.is_finished());

        assert_eq!(dispatcher.dispatch(&fast, Trace::new("concurrent")), 1);

        gate.notify_one();
        flushing.await.unwrap();
        let mut delivered = seen.lock().clone();
        delivered.sort();
        assert_eq!(delivered, vec!["fast:concurrent", "slow:first"]);

        // Still open for business after the flush
        assert_eq!(dispatcher.dispatch(&fast, Trace::new("after")), 1);
        dispatcher.flush().await;
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_background_token() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let snapshot: PluginSnapshot = Arc::new(vec![PluginEntry::new(Arc::new(Recorder {
            name: "stuck",
            seen: Arc::clone(&seen),
            fail: false,
            gate: Some(Arc::new(Notify::new())),
        }))]);

        let dispatcher = ObservabilityDispatcher::new();
        dispatcher.dispatch(&snapshot, Trace::new("t"));
        dispatcher.shutdown().await;

        assert_eq!(*seen.lock(), vec!["stuck:cancelled"]);
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
