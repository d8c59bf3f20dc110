use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{CaptureLayer, TransportTap};
use crate::dedup::{DedupStore, InMemoryDedupStore};
use crate::dispatch::dispatcher_channel;
use crate::messages::Command;
use crate::metrics::PipelineMetrics;
use crate::notify::NotificationStream;
use crate::relay::Relay;
use crate::search::ImageSearcher;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Builder assembling the capture -> relay -> dispatch pipeline.
pub struct PipelineBuilder {
    searcher: Option<Arc<dyn ImageSearcher>>,
    dedup: Arc<dyn DedupStore>,
    metrics: PipelineMetrics,
    capacity: usize,
    taps: Vec<Box<dyn TransportTap + 'static>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            searcher: None,
            dedup: Arc::new(InMemoryDedupStore::new()),
            metrics: PipelineMetrics::new(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            taps: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_searcher(mut self, searcher: Arc<dyn ImageSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    pub fn with_dedup_store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.dedup = store;
        self
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Register one transport tap. Register one per network mechanism the
    /// observed host may use; each is drained independently.
    pub fn register_tap(mut self, tap: impl TransportTap + 'static) -> Self {
        self.taps.push(Box::new(tap));
        self
    }

    /// Spawn the capture loops and the dispatcher task.
    ///
    /// Panics if no searcher was configured; the pipeline is useless without
    /// one and this is a wiring error, not a runtime condition.
    pub fn build(self) -> Pipeline {
        let searcher = self.searcher.expect("pipeline requires a searcher");
        let (command_tx, notifications, dispatcher) =
            dispatcher_channel(searcher, self.dedup, self.metrics.clone(), self.capacity);

        let relay = Relay::new(command_tx.clone());
        let capture = CaptureLayer::new(relay.clone(), self.metrics.clone());

        let mut tasks = Vec::with_capacity(self.taps.len() + 1);
        for tap in self.taps {
            let layer = capture.clone();
            tasks.push(tokio::spawn(layer.run(tap)));
        }
        tasks.push(tokio::spawn(dispatcher.run()));

        Pipeline {
            relay,
            command_tx,
            notifications: Some(notifications),
            metrics: self.metrics,
            tasks,
        }
    }
}

/// A running pipeline: capture loops, relay, and the dispatch queue.
///
/// All state is confined to this instance; dropping it after `join` loses
/// the queue and the dedup set, matching a context restart.
pub struct Pipeline {
    relay: Relay,
    command_tx: mpsc::Sender<Command>,
    notifications: Option<NotificationStream>,
    metrics: PipelineMetrics,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Relay handle for posting captured batches and panel commands.
    pub fn relay(&self) -> Relay {
        self.relay.clone()
    }

    /// Command sender for callers that want backpressure-aware sends.
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.command_tx.clone()
    }

    /// Take the notification stream. Yields `None` on the second call; there
    /// is exactly one consumer.
    pub fn take_notifications(&mut self) -> Option<NotificationStream> {
        self.notifications.take()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Wait for every task to finish. Tasks end once all tap handles and
    /// command senders are dropped.
    pub async fn join(self) {
        drop(self.relay);
        drop(self.command_tx);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
