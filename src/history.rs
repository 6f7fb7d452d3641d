//! Persisted history of completed generations.
//!
//! The whole sequence lives in one named slot as a single JSON blob, newest
//! first. There is no schema versioning and no per-item access.

use crate::error::{GenStudioError, Result};
use crate::image::{ImageCategory, ImagePayload, ImageSize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Filename prefix for downloaded images.
pub const DOWNLOAD_PREFIX: &str = "genstudio";

/// One completed generation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResult {
    /// Unique token assigned at creation.
    pub id: String,
    /// The generated image.
    #[serde(rename = "url")]
    pub payload: ImagePayload,
    /// The prompt as the user wrote it, without style decoration.
    #[serde(rename = "prompt")]
    pub prompt_text: String,
    /// Requested size.
    pub size: ImageSize,
    /// Requested style category.
    #[serde(default)]
    pub category: ImageCategory,
    /// Completion time.
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl GeneratedResult {
    /// Creates a record with a fresh id, stamped with the current time.
    pub fn new(
        payload: ImagePayload,
        prompt_text: impl Into<String>,
        size: ImageSize,
        category: ImageCategory,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().simple().to_string(),
            payload,
            prompt_text: prompt_text.into(),
            size,
            category,
            created_at: Utc::now(),
        }
    }

    /// Filename used when saving this image locally.
    pub fn download_filename(&self) -> String {
        format!("{DOWNLOAD_PREFIX}-{}.jpg", self.id)
    }
}

/// Persistent storage for the history sequence.
pub trait HistoryStore: Send + Sync {
    /// Reads the stored sequence. An empty slot yields an empty sequence.
    fn load(&self) -> Result<Vec<GeneratedResult>>;

    /// Replaces the stored sequence.
    fn save(&self, history: &[GeneratedResult]) -> Result<()>;

    /// Reads the stored sequence, falling back to empty on any failure.
    fn load_or_default(&self) -> Vec<GeneratedResult> {
        match self.load() {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history, starting empty");
                Vec::new()
            }
        }
    }
}

fn decode_blob(blob: &str) -> Result<Vec<GeneratedResult>> {
    if blob.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(blob)?)
}

/// History kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<GeneratedResult>> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => decode_blob(&blob),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, history: &[GeneratedResult]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_vec(history)?;

        // Replace the slot in one step so readers never see a partial blob.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), items = history.len(), "saved history");
        Ok(())
    }
}

/// History kept in memory as a serialized blob.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose slot already holds `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    /// Returns the raw stored blob.
    pub fn blob(&self) -> Option<String> {
        self.lock().ok().and_then(|slot| slot.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.blob
            .lock()
            .map_err(|_| GenStudioError::Io(std::io::Error::other("history slot poisoned")))
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<GeneratedResult>> {
        match self.lock()?.as_deref() {
            Some(blob) => decode_blob(blob),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, history: &[GeneratedResult]) -> Result<()> {
        let blob = serde_json::to_string(history)?;
        *self.lock()? = Some(blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, prompt: &str) -> GeneratedResult {
        GeneratedResult {
            id: id.into(),
            payload: ImagePayload::new(format!("data:image/jpeg;base64,{id}")),
            prompt_text: prompt.into(),
            size: ImageSize::Banner,
            category: ImageCategory::Fantasy,
            created_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        }
    }

    #[test]
    fn test_new_records_get_distinct_ids() {
        let payload = ImagePayload::new("IMG_A");
        let a = GeneratedResult::new(payload.clone(), "a", ImageSize::Small, ImageCategory::General);
        let b = GeneratedResult::new(payload, "b", ImageSize::Small, ImageCategory::General);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(record("abc123", "x").download_filename(), "genstudio-abc123.jpg");
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(record("1", "castle")).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["url"], "data:image/jpeg;base64,1");
        assert_eq!(json["prompt"], "castle");
        assert_eq!(json["size"], "1920x1080 (Banner)");
        assert_eq!(json["category"], "Fantasy");
        assert_eq!(json["timestamp"], 1_700_000_000_123_i64);
    }

    #[test]
    fn test_missing_category_defaults_to_general() {
        let blob = r#"[{"id":"1700000000000","url":"data:image/jpeg;base64,AA==","prompt":"old","size":"512x512","timestamp":1700000000000}]"#;
        let history = MemoryStore::with_blob(blob).load().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].category, ImageCategory::General);
        assert_eq!(history[0].size, ImageSize::Small);
    }

    #[test]
    fn test_memory_store_preserves_order_and_fields() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());

        let history = vec![record("2", "newer"), record("1", "older")];
        store.save(&history).unwrap();
        assert_eq!(store.load().unwrap(), history);
    }

    #[test]
    fn test_corrupt_blob_fails_soft() {
        let store = MemoryStore::with_blob("{not json");
        assert!(store.load().is_err());
        assert!(store.load_or_default().is_empty());

        let store = MemoryStore::with_blob(r#"[{"id":"1","size":"huge"}]"#);
        assert!(store.load_or_default().is_empty());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("history.json"));

        let first = vec![record("1", "first")];
        store.save(&first).unwrap();
        assert_eq!(store.load().unwrap(), first);

        let second = vec![record("2", "second"), record("1", "first")];
        store.save(&second).unwrap();
        assert_eq!(JsonFileStore::new(store.path()).load().unwrap(), second);

        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(GenStudioError::Json(_))));
        assert!(store.load_or_default().is_empty());
    }
}
