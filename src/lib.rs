//! receiptdrop - shared receipt ingestion and classification pipeline.
//!
//! Takes an arbitrary shared payload (image, file reference, document or
//! raw bytes), resolves it to decoded content, extracts text with OCR,
//! classifies the originating store and purchase date, and hands a
//! user-correctable draft to a review stage before committing an immutable
//! record that a separate host process discovers and imports.

pub mod classify;
pub mod config;
pub mod credentials;
pub mod dates;
pub mod error;
pub mod ocr;
pub mod payload;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use classify::SourceLabel;
pub use error::{ExtractionError, ResolutionError, StoreError};
pub use payload::{Representation, RepresentationKind, SharePayload};
pub use pipeline::{DraftRecord, IngestPipeline, IngestState};
pub use resolver::{AttachmentResolver, DecodedContent};
pub use store::{CommittedRecord, DirRecordStore, RecordStore};
