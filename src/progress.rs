//! Progress events emitted while polling
//!
//! Polling loops report each unsuccessful observation here. Observers never
//! influence control flow; a slow or dropped consumer only loses events.

use tokio::sync::mpsc;

/// What a poll loop is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// Pods of a workload to reach the expected running count
    Ready { workload: String, namespace: String },
    /// Managed pods of a namespace to terminate
    Drain { namespace: String },
}

impl std::fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitTarget::Ready { workload, namespace } => {
                write!(f, "{} containers in {} to become available", workload, namespace)
            }
            WaitTarget::Drain { namespace } => {
                write!(f, "all previous pods in {} to terminate", namespace)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub target: WaitTarget,
    /// Zero-based number of the observation that did not converge
    pub attempt: u32,
    /// Pods observed in the state being waited for
    pub observed: usize,
    pub expected: usize,
}

impl ProgressEvent {
    pub fn message(&self) -> String {
        format!("Waiting for {}", self.target)
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        tracing::info!(
            attempt = event.attempt,
            observed = event.observed,
            expected = event.expected,
            "{}",
            event.message()
        );
    }
}

/// Forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        // receiver gone: nobody is listening anymore
        let _ = self.tx.send(event.clone());
    }
}
