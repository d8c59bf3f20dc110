use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel username assigned when a post carries no usable profile.
/// Never treated as a real username when deriving display labels.
pub const UNKNOWN_USER: &str = "Unknown_User";

/// A single extracted image post awaiting dispatch.
///
/// Identity key is `image_url`; immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueItem {
    #[serde(rename = "postLink")]
    pub post_link: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub username: String,
}

/// Inbound commands accepted by the dispatcher (UI/panel -> queue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Start {
        #[serde(rename = "apiKey")]
        api_key: String,
        #[serde(rename = "strictMode")]
        strict_mode: bool,
    },
    Stop,
    BatchAdd { items: Vec<QueueItem> },
    RetryBroad { item: QueueItem },
}

/// Outbound notifications emitted by the dispatcher (queue -> UI/panel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    StopComplete,
    UrlQueued {
        #[serde(rename = "queueLength")]
        queue_length: usize,
    },
    Result { data: SearchResult },
}

/// One record inside an `exact_matches`/`visual_matches`/`products` section
/// of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A completed search response correlated back to its originating item.
///
/// The third-party body is kept verbatim (flattened) alongside the three
/// stamped `original_*` fields. Keyed by `original_image_url`; a later
/// arrival for the same key replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub original_post_link: String,
    pub original_image_url: String,
    pub original_username: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl SearchResult {
    /// Stamp a raw API response with the fields of the item that produced it.
    pub fn from_response(item: &QueueItem, body: Map<String, Value>) -> Self {
        Self {
            original_post_link: item.post_link.clone(),
            original_image_url: item.image_url.clone(),
            original_username: item.username.clone(),
            body,
        }
    }

    fn section(&self, key: &str) -> Vec<MatchRecord> {
        self.body
            .get(key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn exact_matches(&self) -> Vec<MatchRecord> {
        self.section("exact_matches")
    }

    pub fn visual_matches(&self) -> Vec<MatchRecord> {
        self.section("visual_matches")
    }

    pub fn products(&self) -> Vec<MatchRecord> {
        self.section("products")
    }

    /// All matches in export order: exact, then visual, then products.
    pub fn all_matches(&self) -> Vec<MatchRecord> {
        let mut matches = self.exact_matches();
        matches.extend(self.visual_matches());
        matches.extend(self.products());
        matches
    }

    pub fn has_exact_matches(&self) -> bool {
        !self.exact_matches().is_empty()
    }

    /// True when the echoed parameters show this was a strict (exact-only)
    /// search.
    pub fn is_strict_search(&self) -> bool {
        self.body
            .get("search_parameters")
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .map(|t| t == "exact_matches")
            .unwrap_or(false)
    }

    /// A strict search that found nothing; the panel offers a broad retry
    /// for these.
    pub fn is_strict_empty(&self) -> bool {
        self.is_strict_search() && self.all_matches().is_empty()
    }

    /// Rebuild the originating item, e.g. for a broad retry of this result.
    pub fn to_queue_item(&self) -> QueueItem {
        QueueItem {
            post_link: self.original_post_link.clone(),
            image_url: self.original_image_url.clone(),
            username: self.original_username.clone(),
        }
    }
}
