use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info_span, Instrument};

use crate::error::PipelineError;
use crate::extract::{extract, PayloadShape};
use crate::metrics::PipelineMetrics;
use crate::relay::Relay;

/// Marker identifying profile-feed endpoints.
pub const PROFILE_FEED_MARKER: &str = "profile_feed";
/// Marker identifying single-post endpoints.
pub const SINGLE_POST_MARKER: &str = "/backend/project_y/post/";
/// Sub-path carrying comment-thread data for a post; excluded so the root
/// post is not extracted a second time.
pub const THREAD_MARKER: &str = "/tree";

/// Classify a request URL against the known endpoint shapes.
pub fn classify(url: &str) -> Option<PayloadShape> {
    if url.contains(PROFILE_FEED_MARKER) {
        Some(PayloadShape::Collection)
    } else if url.contains(SINGLE_POST_MARKER) && !url.contains(THREAD_MARKER) {
        Some(PayloadShape::Singleton)
    } else {
        None
    }
}

/// The transport mechanism a captured call went through. Both are observed
/// identically; the tag exists for diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Fetch,
    Xhr,
}

/// A completed response observed by a transport tap. Observation is a
/// parallel read; the original response is never altered.
#[derive(Clone, Debug)]
pub struct CapturedResponse {
    pub transport: Transport,
    /// The request URL, used for endpoint classification.
    pub url: String,
    /// Address of the page that issued the request, when known. Used as the
    /// permalink fallback for posts without one.
    pub page_url: Option<String>,
    /// Raw response body.
    pub body: String,
}

/// A source of completed responses for one transport mechanism.
///
/// The host may route any given call through either transport, so the
/// pipeline registers one tap per mechanism and treats them uniformly.
#[async_trait]
pub trait TransportTap: Send {
    fn transport(&self) -> Transport;

    /// Next observed response, or `None` once the tap is exhausted.
    async fn next_response(&mut self) -> Option<CapturedResponse>;
}

#[async_trait]
impl TransportTap for Box<dyn TransportTap + 'static> {
    fn transport(&self) -> Transport {
        (**self).transport()
    }

    async fn next_response(&mut self) -> Option<CapturedResponse> {
        (**self).next_response().await
    }
}

/// Handle used by the observed side to feed responses into a tap.
#[derive(Clone)]
pub struct TapHandle {
    transport: Transport,
    tx: mpsc::Sender<CapturedResponse>,
}

impl TapHandle {
    /// Record one completed response. Best-effort: when the pipeline side is
    /// gone or saturated the observation is dropped, never the response.
    pub fn observe(&self, url: impl Into<String>, page_url: Option<String>, body: impl Into<String>) {
        let captured = CapturedResponse {
            transport: self.transport,
            url: url.into(),
            page_url,
            body: body.into(),
        };
        if self.tx.try_send(captured).is_err() {
            debug!(transport = ?self.transport, "tap observation dropped");
        }
    }
}

/// Tap over the modern fetch-style API.
pub struct FetchTap {
    rx: mpsc::Receiver<CapturedResponse>,
}

impl FetchTap {
    pub fn channel(capacity: usize) -> (TapHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            TapHandle {
                transport: Transport::Fetch,
                tx,
            },
            Self { rx },
        )
    }
}

#[async_trait]
impl TransportTap for FetchTap {
    fn transport(&self) -> Transport {
        Transport::Fetch
    }

    async fn next_response(&mut self) -> Option<CapturedResponse> {
        self.rx.recv().await
    }
}

/// Tap over the legacy request-object API.
pub struct XhrTap {
    rx: mpsc::Receiver<CapturedResponse>,
}

impl XhrTap {
    pub fn channel(capacity: usize) -> (TapHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            TapHandle {
                transport: Transport::Xhr,
                tx,
            },
            Self { rx },
        )
    }
}

#[async_trait]
impl TransportTap for XhrTap {
    fn transport(&self) -> Transport {
        Transport::Xhr
    }

    async fn next_response(&mut self) -> Option<CapturedResponse> {
        self.rx.recv().await
    }
}

/// Classifies captured responses, extracts image items, and posts batches to
/// the relay.
#[derive(Clone)]
pub struct CaptureLayer {
    relay: Relay,
    metrics: PipelineMetrics,
}

impl CaptureLayer {
    pub fn new(relay: Relay, metrics: PipelineMetrics) -> Self {
        Self { relay, metrics }
    }

    /// Process one observed response. Returns the number of items relayed;
    /// unmatched URLs and malformed JSON contribute zero.
    pub fn process(&self, response: &CapturedResponse) -> usize {
        let Some(shape) = classify(&response.url) else {
            return 0;
        };

        let payload = match parse_payload(response) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(transport = ?response.transport, %err, "swallowing unparseable payload");
                return 0;
            }
        };

        let fallback_link = response.page_url.as_deref().unwrap_or(&response.url);
        let items = extract(&payload, shape, fallback_link);
        if items.is_empty() {
            return 0;
        }

        let relayed = items.len();
        self.metrics.record_extracted(relayed as u64);
        // Delivery outcome intentionally ignored: a dropped batch is normal
        // operation, not an error.
        let _ = self.relay.send_batch(items);
        relayed
    }

    /// Drain a tap until its handles are gone.
    pub async fn run(self, mut tap: impl TransportTap) {
        let span = info_span!("capture.tap", transport = ?tap.transport());
        async {
            while let Some(response) = tap.next_response().await {
                self.process(&response);
            }
        }
        .instrument(span)
        .await
    }
}

fn parse_payload(response: &CapturedResponse) -> crate::error::Result<Value> {
    serde_json::from_str(&response.body).map_err(|err| PipelineError::MalformedPayload {
        url: response.url.clone(),
        reason: err.to_string(),
    })
}
