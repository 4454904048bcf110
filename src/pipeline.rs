//! Ingestion state machine.
//!
//! Orchestrates resolution, extraction and classification into a
//! `processing -> reviewing -> (success | error)` flow. The original
//! payload is held for the pipeline's whole lifetime so a retry always
//! re-runs from unmodified input, never from a mix of stale and fresh
//! state. Completion is signaled only after the store write has been
//! acknowledged; cancellation is terminal and is not a failure.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::classify::{self, SourceLabel};
use crate::dates;
use crate::ocr::TextExtractor;
use crate::payload::SharePayload;
use crate::resolver::AttachmentResolver;
use crate::store::{CommittedRecord, RecordStore};

/// User-correctable draft produced by a successful processing run.
/// Replaced wholesale on each edit; no aliasing.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    pub image_bytes: Option<Vec<u8>>,
    pub text: Option<String>,
    pub source: SourceLabel,
    pub occurred_at: DateTime<Utc>,
}

/// Pipeline state. `Success` and `Cancelled` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestState {
    Processing { status: String },
    Reviewing(DraftRecord),
    Error { message: String, retryable: bool },
    Success { record_id: Uuid },
    Cancelled,
}

impl IngestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Cancelled)
    }
}

/// Progress notifications for whatever invoked the pipeline (e.g. a
/// transient share UI that closes on completion).
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    StatusChanged { status: String },
    ReadyForReview,
    /// Sent strictly after the record is durably persisted.
    Committed { record_id: Uuid },
    Failed { message: String, retryable: bool },
    Cancelled,
}

/// One ingestion run over a single shared payload.
///
/// Instances are independent; concurrent pipelines share nothing but the
/// record store, whose keys are globally unique.
pub struct IngestPipeline<S: RecordStore> {
    payload: SharePayload,
    resolver: AttachmentResolver,
    extractor: TextExtractor,
    store: S,
    state: IngestState,
    /// Draft retained across a failed store write, so a retry commits the
    /// same reviewed values instead of re-running extraction.
    retained_draft: Option<DraftRecord>,
    events: Option<mpsc::Sender<IngestEvent>>,
}

impl<S: RecordStore> IngestPipeline<S> {
    pub fn new(payload: SharePayload, extractor: TextExtractor, store: S) -> Self {
        Self {
            payload,
            resolver: AttachmentResolver::default(),
            extractor,
            store,
            state: IngestState::Processing {
                status: "Preparing".to_string(),
            },
            retained_draft: None,
            events: None,
        }
    }

    pub fn with_resolver(mut self, resolver: AttachmentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<IngestEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Run the full pipeline from the original payload:
    /// `Processing -> Reviewing` on success, `Processing -> Error`
    /// otherwise. Only callable from `Processing` or `Error`; once a
    /// draft is under review the only ways forward are edit, commit or
    /// cancel, so a stray re-run can never discard the user's edits.
    pub async fn run(&mut self) -> &IngestState {
        if !matches!(
            self.state,
            IngestState::Processing { .. } | IngestState::Error { .. }
        ) {
            return &self.state;
        }

        self.set_status("Resolving shared content").await;
        let content = match self.resolver.resolve(&self.payload).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("resolution failed: {}", e);
                return self.fail(e.to_string(), e.is_retryable()).await;
            }
        };

        self.set_status("Reading text").await;
        let extracted = match self.extractor.extract(&content).await {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!("text extraction failed: {}", e);
                return self.fail(e.to_string(), true).await;
            }
        };

        // Empty text is "no information", not a failure: the draft goes to
        // review with an Unknown source and a now-default date.
        let text = extracted.joined();
        let draft = DraftRecord {
            image_bytes: content.encoded_image_bytes(),
            text: (!text.is_empty()).then_some(text.clone()),
            source: classify::classify(&text),
            occurred_at: dates::infer_date(&text),
        };

        tracing::info!(source = %draft.source, "draft ready for review");
        self.state = IngestState::Reviewing(draft);
        self.emit(IngestEvent::ReadyForReview).await;
        &self.state
    }

    /// Replace the draft's source label during review. Pure field
    /// replacement; no re-extraction. Returns false outside `Reviewing`.
    pub fn edit_source(&mut self, source: SourceLabel) -> bool {
        match &self.state {
            IngestState::Reviewing(draft) => {
                let updated = DraftRecord {
                    source,
                    ..draft.clone()
                };
                self.state = IngestState::Reviewing(updated);
                true
            }
            _ => false,
        }
    }

    /// Replace the draft's date during review.
    pub fn edit_date(&mut self, occurred_at: DateTime<Utc>) -> bool {
        match &self.state {
            IngestState::Reviewing(draft) => {
                let updated = DraftRecord {
                    occurred_at,
                    ..draft.clone()
                };
                self.state = IngestState::Reviewing(updated);
                true
            }
            _ => false,
        }
    }

    /// Commit the reviewed draft: re-enters a transient `Processing`
    /// state while writing, then `Success` once the write is acknowledged.
    /// On write failure the draft is retained and the state becomes a
    /// retryable `Error`. Commit is never blocked by an `Unknown` source.
    pub async fn commit(&mut self) -> &IngestState {
        let draft = match &self.state {
            IngestState::Reviewing(draft) => draft.clone(),
            _ => return &self.state,
        };

        self.set_status("Saving record").await;

        let record = CommittedRecord::new(
            draft.image_bytes.clone(),
            draft.text.clone(),
            draft.source,
            draft.occurred_at,
        );

        match self.store.write(&record).await {
            Ok(()) => {
                self.retained_draft = None;
                self.state = IngestState::Success {
                    record_id: record.id,
                };
                // Completion only after persistence is acknowledged.
                self.emit(IngestEvent::Committed {
                    record_id: record.id,
                })
                .await;
                tracing::info!(id = %record.id, "record committed");
            }
            Err(e) => {
                tracing::warn!("store write failed: {}", e);
                self.retained_draft = Some(draft);
                self.fail(e.to_string(), true).await;
            }
        }

        &self.state
    }

    /// User-triggered retry from an `Error` state.
    ///
    /// A draft retained across a failed store write is committed again
    /// as-is; any other failure re-invokes the whole pipeline from the
    /// original unmodified payload.
    pub async fn retry(&mut self) -> &IngestState {
        if !matches!(self.state, IngestState::Error { .. }) {
            return &self.state;
        }

        match self.retained_draft.take() {
            Some(draft) => {
                self.state = IngestState::Reviewing(draft);
                self.commit().await
            }
            None => {
                self.state = IngestState::Processing {
                    status: "Retrying".to_string(),
                };
                self.run().await
            }
        }
    }

    /// Explicit user cancellation: terminal from any non-terminal state,
    /// discards the draft without side effects. Not modeled as an error.
    pub async fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.retained_draft = None;
        self.state = IngestState::Cancelled;
        self.emit(IngestEvent::Cancelled).await;
    }

    async fn set_status(&mut self, status: &str) {
        self.state = IngestState::Processing {
            status: status.to_string(),
        };
        self.emit(IngestEvent::StatusChanged {
            status: status.to_string(),
        })
        .await;
    }

    async fn fail(&mut self, message: String, retryable: bool) -> &IngestState {
        self.state = IngestState::Error {
            message: message.clone(),
            retryable,
        };
        self.emit(IngestEvent::Failed { message, retryable }).await;
        &self.state
    }

    async fn emit(&self, event: IngestEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}
