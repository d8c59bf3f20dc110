//! Full session: captured traffic in, panel-driven command loop, CSV out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use lenscan::export::{render_csv, report_filename};
use lenscan::{FetchTap, PipelineBuilder, ResultsPanel};

mod support;
use support::*;

const FEED_URL: &str = "https://social.example.com/api/v2/profile_feed?user=alice";

fn feed_body() -> String {
    json!({
        "items": [
            {
                "post": {
                    "permalink": "https://social.example.com/p/1",
                    "attachments": [{"encodings": {"thumbnail": {"path": "https://cdn/1.jpg"}}}]
                },
                "profile": {"username": "alice"}
            },
            {
                "post": {
                    "permalink": "https://social.example.com/p/2",
                    "attachments": [{"encodings": {"thumbnail": {"path": "https://cdn/2.jpg"}}}]
                },
                "profile": {"username": "alice"}
            }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn session_runs_to_auto_stop_and_exports() {
    let searcher = Arc::new(
        FakeSearcher::new()
            .respond_with(
                "https://cdn/1.jpg",
                json!({
                    "exact_matches": [{"source": "blog", "link": "https://blog/x"}],
                    "visual_matches": [{"source": "shop", "link": "https://shop/y"}]
                }),
            )
            .respond_with("https://cdn/2.jpg", json!({})),
    );
    let (fetch_handle, fetch_tap) = FetchTap::channel(16);

    let mut pipeline = PipelineBuilder::new()
        .with_searcher(Arc::clone(&searcher) as Arc<dyn lenscan::ImageSearcher>)
        .register_tap(fetch_tap)
        .build();
    let mut notifications = pipeline.take_notifications().unwrap();
    let relay = pipeline.relay();

    let mut panel = ResultsPanel::new();
    let start = panel.start("test-key", false, false).unwrap();
    relay.send(start);

    fetch_handle.observe(FEED_URL, None, feed_body());

    // Drive the panel until the dispatcher acknowledges the auto-stop.
    loop {
        let notification = timeout(Duration::from_secs(2), notifications.next())
            .await
            .expect("session stalled")
            .expect("pipeline closed early");
        let stopped = notification == lenscan::Notification::StopComplete;
        if let Some(command) = panel.handle(notification) {
            relay.send(command);
        }
        if stopped {
            break;
        }
    }

    assert!(panel.is_paused());
    assert_eq!(panel.remaining(), 0);
    assert_eq!(panel.results().len(), 2);
    assert_eq!(panel.detected_username(), "alice");
    assert_eq!(report_filename(panel.detected_username()), "alice_originality_report.csv");

    let csv = render_csv(panel.results());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    // Two match pairs in the header, driven by the widest row.
    assert!(lines[0].ends_with("Match 1 Source,Match 1 URL,Match 2 Source,Match 2 URL"));
    assert!(lines[1].contains("\"Yes\",\"2\""));
    assert!(lines[2].contains("\"\",\"0\",\"\",\"\",\"\",\"\""));

    drop(relay);
    drop(fetch_handle);
    pipeline.join().await;
}
