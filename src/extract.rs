use serde_json::Value;

use crate::messages::{QueueItem, UNKNOWN_USER};

/// The two payload structures the capture layer knows how to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadShape {
    /// Profile feed: `{ items: [ { post, profile } ] }`.
    Collection,
    /// Single post: `{ post, profile }` at the root.
    Singleton,
}

/// Extract image items from a captured payload.
///
/// Malformed or partial data yields an empty (or shorter) batch, never an
/// error: feed traffic carries plenty of irrelevant material. `fallback_link`
/// stands in for posts that carry no explicit permalink.
pub fn extract(payload: &Value, shape: PayloadShape, fallback_link: &str) -> Vec<QueueItem> {
    match shape {
        PayloadShape::Collection => payload
            .get("items")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        format_item(entry.get("post")?, entry.get("profile"), fallback_link)
                    })
                    .collect()
            })
            .unwrap_or_default(),
        PayloadShape::Singleton => payload
            .get("post")
            .and_then(|post| format_item(post, payload.get("profile"), fallback_link))
            .map(|item| vec![item])
            .unwrap_or_default(),
    }
}

/// Map one post/profile pair into a queue item. Posts without any usable
/// image contribute nothing.
fn format_item(post: &Value, profile: Option<&Value>, fallback_link: &str) -> Option<QueueItem> {
    let image_url = best_image(post)?;

    let post_link = post
        .get("permalink")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback_link)
        .to_string();

    let username = profile
        .and_then(|p| p.get("username"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_USER)
        .to_string();

    Some(QueueItem {
        post_link,
        image_url,
        username,
    })
}

/// Pick the best available image URL for a post.
///
/// Priority: first attachment's `encodings` map (thumbnail, then md, then
/// source, each only when a path is present), then the legacy
/// `download_urls.thumbnail`, then the top-level `preview_image_url`.
fn best_image(post: &Value) -> Option<String> {
    if let Some(att) = post
        .get("attachments")
        .and_then(Value::as_array)
        .and_then(|atts| atts.first())
    {
        if let Some(encodings) = att.get("encodings") {
            for quality in ["thumbnail", "md", "source"] {
                let path = encodings
                    .get(quality)
                    .and_then(|e| e.get("path"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty());
                if let Some(path) = path {
                    return Some(path.to_string());
                }
            }
        }

        let download = att
            .get("download_urls")
            .and_then(|d| d.get("thumbnail"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(url) = download {
            return Some(url.to_string());
        }
    }

    post.get("preview_image_url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = "https://social.example.com/u/alice";

    fn post_with_encoding(quality: &str, path: &str) -> Value {
        json!({
            "permalink": "https://social.example.com/p/1",
            "attachments": [{"encodings": {quality: {"path": path}}}]
        })
    }

    #[test]
    fn collection_skips_entries_without_posts() {
        let payload = json!({
            "items": [
                {"post": post_with_encoding("thumbnail", "https://cdn/a.jpg"), "profile": {"username": "alice"}},
                {"post": post_with_encoding("md", "https://cdn/b.jpg"), "profile": {"username": "alice"}},
                {"profile": {"username": "ghost"}},
                {"post": post_with_encoding("source", "https://cdn/c.jpg"), "profile": {"username": "alice"}},
            ]
        });
        let items = extract(&payload, PayloadShape::Collection, PAGE);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].image_url, "https://cdn/a.jpg");
        assert_eq!(items[2].image_url, "https://cdn/c.jpg");
    }

    #[test]
    fn singleton_wraps_into_one_element_batch() {
        let payload = json!({
            "post": post_with_encoding("thumbnail", "https://cdn/a.jpg"),
            "profile": {"username": "alice"}
        });
        let items = extract(&payload, PayloadShape::Singleton, PAGE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].username, "alice");
    }

    #[test]
    fn encoding_priority_order() {
        let post = json!({
            "attachments": [{"encodings": {
                "source": {"path": "https://cdn/full.jpg"},
                "md": {"path": "https://cdn/md.jpg"},
                "thumbnail": {"path": "https://cdn/thumb.jpg"}
            }}]
        });
        assert_eq!(best_image(&post).as_deref(), Some("https://cdn/thumb.jpg"));

        // Empty paths are treated as absent.
        let post = json!({
            "attachments": [{"encodings": {
                "thumbnail": {"path": ""},
                "md": {"path": "https://cdn/md.jpg"}
            }}]
        });
        assert_eq!(best_image(&post).as_deref(), Some("https://cdn/md.jpg"));
    }

    #[test]
    fn download_urls_thumbnail_fallback() {
        let payload = json!({
            "post": {
                "attachments": [{"download_urls": {"thumbnail": "https://cdn/dl.jpg"}}]
            }
        });
        let items = extract(&payload, PayloadShape::Singleton, PAGE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].image_url, "https://cdn/dl.jpg");
    }

    #[test]
    fn preview_image_fallback_and_drop_when_imageless() {
        let post = json!({"preview_image_url": "https://cdn/preview.jpg"});
        assert_eq!(best_image(&post).as_deref(), Some("https://cdn/preview.jpg"));

        let payload = json!({"post": {"caption": "no media"}});
        assert!(extract(&payload, PayloadShape::Singleton, PAGE).is_empty());
    }

    #[test]
    fn permalink_and_username_defaults() {
        let payload = json!({
            "post": {"preview_image_url": "https://cdn/p.jpg"}
        });
        let items = extract(&payload, PayloadShape::Singleton, PAGE);
        assert_eq!(items[0].post_link, PAGE);
        assert_eq!(items[0].username, UNKNOWN_USER);
    }

    #[test]
    fn malformed_payloads_yield_nothing() {
        for payload in [
            json!(null),
            json!("string"),
            json!({"items": "not-an-array"}),
            json!({"items": [42, null]}),
            json!({"post": {"attachments": "nope"}}),
        ] {
            let shape = if payload.get("post").is_some() {
                PayloadShape::Singleton
            } else {
                PayloadShape::Collection
            };
            assert!(extract(&payload, shape, PAGE).is_empty());
        }
    }
}
