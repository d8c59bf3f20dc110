use crate::messages::{Command, Notification, SearchResult, UNKNOWN_USER};
use crate::validate::{validate_start, ValidationIssue};

/// Default label used for the report when no real username was detected.
pub const DEFAULT_REPORT_LABEL: &str = "scan_results";

/// Session-side consumer of dispatcher notifications.
///
/// Maintains the correlated result list (append-or-update keyed by
/// `original_image_url`, last write wins), the remaining-work count, and the
/// paused/resumable state. Produces the commands a UI would send back.
#[derive(Debug)]
pub struct ResultsPanel {
    results: Vec<SearchResult>,
    detected_username: String,
    remaining: usize,
    paused: bool,
}

impl ResultsPanel {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            detected_username: DEFAULT_REPORT_LABEL.to_string(),
            remaining: 0,
            paused: true,
        }
    }

    /// Build a start command. A fresh start clears collected results; a
    /// resume keeps them. Surfaces a missing API key before anything is
    /// dispatched.
    pub fn start(
        &mut self,
        api_key: &str,
        strict_mode: bool,
        resume: bool,
    ) -> Result<Command, ValidationIssue> {
        validate_start(api_key)?;
        if !resume {
            self.results.clear();
            self.detected_username = DEFAULT_REPORT_LABEL.to_string();
        }
        self.paused = false;
        Ok(Command::Start {
            api_key: api_key.to_string(),
            strict_mode,
        })
    }

    /// Apply one notification. Returns a command the panel wants sent back,
    /// if any: a zero queue length while running triggers an automatic stop.
    pub fn handle(&mut self, notification: Notification) -> Option<Command> {
        match notification {
            Notification::UrlQueued { queue_length } => {
                if self.paused {
                    return None;
                }
                self.remaining = queue_length;
                if queue_length == 0 {
                    self.paused = true;
                    return Some(Command::Stop);
                }
                None
            }
            Notification::Result { data } => {
                if data.original_username != UNKNOWN_USER && !data.original_username.is_empty() {
                    self.detected_username = data.original_username.clone();
                }
                self.upsert(data);
                None
            }
            Notification::StopComplete => {
                self.paused = true;
                None
            }
        }
    }

    /// Build a broad-retry command for a collected result.
    pub fn retry_broad(&self, result: &SearchResult) -> Command {
        Command::RetryBroad {
            item: result.to_queue_item(),
        }
    }

    fn upsert(&mut self, data: SearchResult) {
        match self
            .results
            .iter_mut()
            .find(|r| r.original_image_url == data.original_image_url)
        {
            Some(existing) => *existing = data,
            None => self.results.push(data),
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Username detected from results, ignoring the unknown-user sentinel.
    pub fn detected_username(&self) -> &str {
        &self.detected_username
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for ResultsPanel {
    fn default() -> Self {
        Self::new()
    }
}
