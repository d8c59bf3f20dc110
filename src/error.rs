use thiserror::Error;

/// Unified result type for the scan pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors emitted by the pipeline and related services.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A scan was requested without a usable API key.
    #[error("no API key configured; a key is required before dispatching searches")]
    MissingApiKey,

    /// A search request failed after being dispatched.
    #[error("search for {image_url} failed: {reason}")]
    SearchFailed { image_url: String, reason: String },

    /// A captured response body could not be parsed as JSON.
    #[error("malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    /// Catch-all for lower-level errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
