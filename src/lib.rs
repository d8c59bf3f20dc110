#![forbid(unsafe_code)]

pub mod capture;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod extract;
pub mod messages;
pub mod metrics;
pub mod notify;
pub mod panel;
pub mod pipeline;
pub mod relay;
pub mod search;
pub mod validate;

pub use capture::{CaptureLayer, CapturedResponse, FetchTap, TapHandle, Transport, TransportTap, XhrTap};
pub use dedup::{DedupStore, InMemoryDedupStore};
pub use dispatch::{dispatcher_channel, Dispatcher};
pub use messages::{Command, MatchRecord, Notification, QueueItem, SearchResult, UNKNOWN_USER};
pub use notify::NotificationStream;
pub use panel::ResultsPanel;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use relay::{DeliveryOutcome, Relay};
pub use search::{ImageSearcher, NoopSearcher, SerpClient};
pub use validate::{validate_start, ValidationIssue};
