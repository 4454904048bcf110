//! Shared record store: the cross-process handoff area.
//!
//! Each committed record is one self-contained JSON unit at
//! `<uuid>.record` under a well-known root directory. The host process
//! discovers records by enumerating that directory. Units are immutable
//! once published and uniquely named, so concurrent writers never need
//! locks; atomicity comes from writing to a hidden temp name and renaming
//! into place, which keeps partially written records invisible to readers
//! filtering on the extension.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::classify::SourceLabel;
use crate::error::StoreError;

/// Filename extension of a published record unit.
pub const RECORD_EXTENSION: &str = "record";

/// Immutable snapshot written on successful commit. Never updated in
/// place; corrections require a new record plus deletion of the old one by
/// the consuming host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedRecord {
    /// Globally unique storage key.
    pub id: Uuid,
    /// Original encoded image bytes, when the share was visual.
    #[serde(with = "base64_bytes", default, skip_serializing_if = "Option::is_none")]
    pub image_bytes: Option<Vec<u8>>,
    /// SHA-256 of the image bytes, for consumer-side de-duplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Extracted text, when recognition produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub source: SourceLabel,
    /// When the purchase happened (inferred or user-corrected).
    pub occurred_at: DateTime<Utc>,
    /// When this record was committed.
    pub committed_at: DateTime<Utc>,
}

impl CommittedRecord {
    pub fn new(
        image_bytes: Option<Vec<u8>>,
        text: Option<String>,
        source: SourceLabel,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let content_hash = image_bytes.as_deref().map(compute_hash);
        Self {
            id: Uuid::new_v4(),
            image_bytes,
            content_hash,
            text,
            source,
            occurred_at,
            committed_at: Utc::now(),
        }
    }
}

/// Compute the SHA-256 hex digest of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Writer side of the shared storage area.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record atomically. Returns only once the record is
    /// durably published under its unique key.
    async fn write(&self, record: &CommittedRecord) -> Result<(), StoreError>;
}

/// Directory-backed record store.
#[derive(Debug, Clone)]
pub struct DirRecordStore {
    root: PathBuf,
}

impl DirRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Published record paths, in no particular order. Hidden temp files
    /// are never listed.
    pub async fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Parse one published record unit.
    pub async fn read(&self, path: &Path) -> Result<CommittedRecord, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RecordStore for DirRecordStore {
    async fn write(&self, record: &CommittedRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let encoded = serde_json::to_vec_pretty(record)?;
        let final_path = self.record_path(record.id);
        // Dot prefix keeps the staging file out of extension-filtered
        // reader enumeration on every platform.
        let temp_path = self.root.join(format!(".{}.tmp", record.id));

        tokio::fs::write(&temp_path, &encoded).await?;
        tokio::fs::rename(&temp_path, &final_path).await?;

        tracing::debug!(id = %record.id, path = %final_path.display(), "record published");
        Ok(())
    }
}

/// Base64 (de)serialization for optional byte fields inside JSON units.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> CommittedRecord {
        CommittedRecord::new(
            Some(vec![1, 2, 3, 4]),
            Some("ALDI\nTotal 5.70".to_string()),
            SourceLabel::Aldi,
            Utc::now(),
        )
    }

    #[test]
    fn test_record_hash_present_only_with_image() {
        let with_image = sample_record();
        assert!(with_image.content_hash.is_some());

        let text_only =
            CommittedRecord::new(None, Some("x".into()), SourceLabel::Unknown, Utc::now());
        assert!(text_only.content_hash.is_none());
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        // Timestamp must serialize as ISO-8601, image bytes as base64.
        assert!(json.contains("occurred_at"));
        assert!(json.contains("AQIDBA=="));

        let parsed: CommittedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.image_bytes, record.image_bytes);
        assert_eq!(parsed.source, SourceLabel::Aldi);
    }

    #[tokio::test]
    async fn test_write_publishes_single_unit() {
        let dir = tempdir().unwrap();
        let store = DirRecordStore::new(dir.path());
        let record = sample_record();

        store.write(&record).await.unwrap();

        let paths = store.list().await.unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(".record"));

        let read_back = store.read(&paths[0]).await.unwrap();
        assert_eq!(read_back.id, record.id);
        assert_eq!(read_back.text.as_deref(), Some("ALDI\nTotal 5.70"));
    }

    #[tokio::test]
    async fn test_no_temp_files_remain_after_write() {
        let dir = tempdir().unwrap();
        let store = DirRecordStore::new(dir.path());
        store.write(&sample_record()).await.unwrap();

        let leftover: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn test_list_on_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = DirRecordStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_never_collide() {
        let dir = tempdir().unwrap();
        let store = DirRecordStore::new(dir.path());

        let a = sample_record();
        let mut b = sample_record();
        b.source = SourceLabel::Lidl;

        let (ra, rb) = tokio::join!(store.write(&a), store.write(&b));
        ra.unwrap();
        rb.unwrap();

        let paths = store.list().await.unwrap();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            // Each unit parses independently with no interleaved bytes.
            store.read(path).await.unwrap();
        }
    }
}
