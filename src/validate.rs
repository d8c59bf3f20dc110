use crate::messages::QueueItem;

/// Aggregated validation issues encountered while checking an input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub messages: Vec<String>,
}

impl ValidationIssue {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.messages.is_empty() {
            write!(f, "no validation issues")
        } else {
            write!(f, "{}", self.messages.join("; "))
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// Validate a start request before any search is dispatched. An unusable
/// API key is surfaced here, synchronously, rather than as a failed search.
pub fn validate_start(api_key: &str) -> Result<(), ValidationIssue> {
    if api_key.trim().is_empty() {
        return Err(ValidationIssue::single("API key must not be empty"));
    }
    Ok(())
}

/// Validate an item before it is admitted to the relay.
pub fn validate_queue_item(item: &QueueItem) -> Result<(), ValidationIssue> {
    let mut errors = Vec::new();

    if item.image_url.trim().is_empty() {
        errors.push("imageUrl must not be empty".into());
    }

    if item.post_link.trim().is_empty() {
        errors.push("postLink must not be empty".into());
    }

    if item.username.trim().is_empty() {
        errors.push("username must not be empty".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationIssue::new(errors))
    }
}
