#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use lenscan::dispatch::dispatcher_channel;
use lenscan::messages::{Command, Notification, QueueItem, SearchResult};
use lenscan::metrics::PipelineMetrics;
use lenscan::notify::NotificationStream;
use lenscan::search::ImageSearcher;
use lenscan::InMemoryDedupStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub api_key: String,
    pub image_url: String,
    pub exact_only: bool,
}

/// Scriptable searcher recording every call, the peak number of concurrent
/// requests, and optionally failing or delaying specific URLs.
#[derive(Default)]
pub struct FakeSearcher {
    calls: Mutex<Vec<SearchCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    fail_urls: Mutex<HashSet<String>>,
    responses: Mutex<HashMap<String, Map<String, Value>>>,
}

impl FakeSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_on(self, image_url: &str) -> Self {
        self.fail_urls.lock().unwrap().insert(image_url.to_string());
        self
    }

    pub fn respond_with(self, image_url: &str, body: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(image_url.to_string(), body.as_object().unwrap().clone());
        self
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, image_url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.image_url == image_url)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSearcher for FakeSearcher {
    async fn search(
        &self,
        api_key: &str,
        image_url: &str,
        exact_only: bool,
    ) -> Result<Map<String, Value>> {
        self.calls.lock().unwrap().push(SearchCall {
            api_key: api_key.to_string(),
            image_url: image_url.to_string(),
            exact_only,
        });
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_urls.lock().unwrap().contains(image_url) {
            anyhow::bail!("simulated network failure");
        }
        let body = self
            .responses
            .lock()
            .unwrap()
            .get(image_url)
            .cloned()
            .unwrap_or_default();
        Ok(body)
    }
}

pub fn item(n: usize) -> QueueItem {
    QueueItem {
        post_link: format!("https://social.example.com/p/{n}"),
        image_url: format!("https://cdn.example.com/img/{n}.jpg"),
        username: "alice".into(),
    }
}

/// Spawn a dispatcher over the fake searcher and hand back its channels.
pub fn spawn_dispatcher(
    searcher: Arc<FakeSearcher>,
) -> (mpsc::Sender<Command>, NotificationStream) {
    let (commands, notifications, dispatcher) = dispatcher_channel(
        searcher,
        Arc::new(InMemoryDedupStore::new()),
        PipelineMetrics::new(),
        64,
    );
    tokio::spawn(dispatcher.run());
    (commands, notifications)
}

/// Collect the next `n` RESULT notifications, recording queue-length updates
/// seen along the way.
pub async fn collect_results(
    notifications: &mut NotificationStream,
    n: usize,
) -> (Vec<SearchResult>, Vec<usize>) {
    let mut results = Vec::new();
    let mut lengths = Vec::new();
    while results.len() < n {
        let notification = timeout(Duration::from_secs(2), notifications.next())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed");
        match notification {
            Notification::Result { data } => results.push(data),
            Notification::UrlQueued { queue_length } => lengths.push(queue_length),
            Notification::StopComplete => {}
        }
    }
    (results, lengths)
}

/// Wait for the next STOP_COMPLETE, ignoring everything else.
pub async fn await_stop(notifications: &mut NotificationStream) -> Vec<Notification> {
    let mut seen = Vec::new();
    loop {
        let notification = timeout(Duration::from_secs(2), notifications.next())
            .await
            .expect("timed out waiting for stop")
            .expect("notification channel closed");
        if notification == Notification::StopComplete {
            return seen;
        }
        seen.push(notification);
    }
}

pub fn start_command(strict_mode: bool) -> Command {
    Command::Start {
        api_key: "test-key".into(),
        strict_mode,
    }
}
