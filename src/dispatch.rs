use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info_span, warn, Instrument};

use crate::dedup::DedupStore;
use crate::error::PipelineError;
use crate::messages::{Command, Notification, QueueItem, SearchResult};
use crate::metrics::PipelineMetrics;
use crate::notify::{notification_channel, NotificationStream};
use crate::search::ImageSearcher;

/// Session-lifetime, deduplicated, strictly sequential dispatch queue.
///
/// Runs as a single task: commands arrive on an mpsc channel, notifications
/// leave on another. The one-at-a-time invariant for queue-driven searches
/// is carried by the worker loop itself rather than a mutex flag, so a
/// stop/start cycle can never leave two queue-driven requests in flight.
/// Forced broad retries are spawned outside the loop and run in parallel by
/// design.
pub struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    notifications: mpsc::Sender<Notification>,
    searcher: Arc<dyn ImageSearcher>,
    dedup: Arc<dyn DedupStore>,
    metrics: PipelineMetrics,
    queue: VecDeque<QueueItem>,
    running: bool,
    api_key: String,
    strict_mode: bool,
}

/// Wire up a dispatcher with its command and notification channels.
pub fn dispatcher_channel(
    searcher: Arc<dyn ImageSearcher>,
    dedup: Arc<dyn DedupStore>,
    metrics: PipelineMetrics,
    capacity: usize,
) -> (mpsc::Sender<Command>, NotificationStream, Dispatcher) {
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (notification_tx, notifications) = notification_channel(capacity);
    let dispatcher = Dispatcher {
        commands: command_rx,
        notifications: notification_tx,
        searcher,
        dedup,
        metrics,
        queue: VecDeque::new(),
        running: false,
        api_key: String::new(),
        strict_mode: false,
    };
    (command_tx, notifications, dispatcher)
}

impl Dispatcher {
    /// Drive the queue until every command sender is gone. The queue and the
    /// dedup set persist across stop/start cycles within one run.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
            self.pump().await;
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                api_key,
                strict_mode,
            } => {
                self.running = true;
                self.api_key = api_key;
                self.strict_mode = strict_mode;
                debug!(strict = strict_mode, queued = self.queue.len(), "scan started");
            }
            Command::Stop => {
                self.running = false;
                debug!(queued = self.queue.len(), "scan stopped");
                self.notify(Notification::StopComplete);
            }
            Command::BatchAdd { items } => self.enqueue(items),
            Command::RetryBroad { item } => self.spawn_broad_retry(item),
        }
    }

    /// Admit a batch. Rejected entirely while stopped; otherwise each item
    /// is enqueued at most once per dedup-set lifetime.
    fn enqueue(&mut self, items: Vec<QueueItem>) {
        if !self.running {
            return;
        }
        let mut added = 0;
        for item in items {
            if self.dedup.record(&item.image_url) {
                self.queue.push_back(item);
                added += 1;
            } else {
                self.metrics.record_duplicate();
            }
        }
        if added > 0 {
            self.notify(Notification::UrlQueued {
                queue_length: self.queue.len(),
            });
        }
    }

    /// Drain the queue one item at a time, re-checking the running gate after
    /// each unit of work. Commands that arrived while a search was in flight
    /// take effect at the next item boundary; the in-flight request itself is
    /// never cancelled.
    async fn pump(&mut self) {
        loop {
            if !self.running {
                break;
            }
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(item).await;

            while let Ok(command) = self.commands.try_recv() {
                self.handle(command);
            }
        }
    }

    async fn dispatch(&mut self, item: QueueItem) {
        let span = info_span!(
            "search.dispatch",
            image_url = %item.image_url,
            strict = self.strict_mode,
            remaining = self.queue.len()
        );
        async {
            self.metrics.record_search();
            let start = Instant::now();
            match self
                .searcher
                .search(&self.api_key, &item.image_url, self.strict_mode)
                .await
            {
                Ok(body) => {
                    self.metrics.record_result(start.elapsed());
                    let data = SearchResult::from_response(&item, body);
                    self.notify(Notification::Result { data });
                    // Length after the dequeue: remaining work only.
                    self.notify(Notification::UrlQueued {
                        queue_length: self.queue.len(),
                    });
                }
                Err(err) => {
                    self.metrics.record_failure();
                    let err = PipelineError::SearchFailed {
                        image_url: item.image_url.clone(),
                        reason: err.to_string(),
                    };
                    warn!(%err, "search failed; item discarded");
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Manual re-query bypassing the queue, the dedup set, and the running
    /// gate, always in broad mode. Not subject to the one-at-a-time
    /// guarantee.
    fn spawn_broad_retry(&self, item: QueueItem) {
        let searcher = Arc::clone(&self.searcher);
        let notifications = self.notifications.clone();
        let metrics = self.metrics.clone();
        let api_key = self.api_key.clone();
        let span = info_span!("search.retry_broad", image_url = %item.image_url);
        tokio::spawn(
            async move {
                metrics.record_search();
                let start = Instant::now();
                match searcher.search(&api_key, &item.image_url, false).await {
                    Ok(body) => {
                        metrics.record_result(start.elapsed());
                        let data = SearchResult::from_response(&item, body);
                        if notifications
                            .try_send(Notification::Result { data })
                            .is_err()
                        {
                            debug!("notification receiver gone; retry result dropped");
                        }
                    }
                    Err(err) => {
                        metrics.record_failure();
                        let err = PipelineError::SearchFailed {
                            image_url: item.image_url.clone(),
                            reason: err.to_string(),
                        };
                        warn!(%err, "broad retry failed");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Notifications are best-effort, like every other delivery in the
    /// pipeline: a full or closed channel drops the message silently.
    fn notify(&self, notification: Notification) {
        if self.notifications.try_send(notification).is_err() {
            debug!("notification receiver gone or saturated; message dropped");
        }
    }
}
