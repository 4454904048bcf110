//! Error taxonomy for the ingestion pipeline.
//!
//! Failures are grouped by the stage that produced them. Every variant
//! carries a message suitable for direct display; the state machine maps
//! them into `Error` states rather than letting them propagate out.

use thiserror::Error;

/// Failure while resolving a share payload into decoded content.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The payload advertises no representation at all.
    #[error("shared payload contains no usable data")]
    NoValidData,

    /// Representations were present but none of them decoded. Read
    /// failures and renderer failures fold into this as failed attempts.
    #[error("could not decode shared content (tried: {})", .attempted.join(", "))]
    UnsupportedOrCorrupt { attempted: Vec<String> },
}

impl ResolutionError {
    /// Whether a user-triggered retry of the whole pipeline is offered.
    ///
    /// Re-resolving an unchanged payload is cheap, so every resolution
    /// failure is presented as retryable even when a retry is unlikely to
    /// succeed without a different payload.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Failure while extracting text from decoded content.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The OCR engine is not installed or not usable.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but reported a failure.
    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure while persisting a committed record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while fetching a credential from a provider chain.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A single provider had nothing to offer.
    #[error("credential not found: {0}")]
    NotFound(String),

    /// Every provider in the chain failed.
    #[error("no credential available (tried: {})", .attempted.join(", "))]
    Exhausted { attempted: Vec<String> },
}
