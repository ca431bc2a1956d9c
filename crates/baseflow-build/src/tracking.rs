//! Build/publish tracking
//!
//! The tracking file is a flat JSON object keyed by image tag:
//!
//! ```json
//! {
//!   "gigantum/python3-minimal:0123456789-2024-01-01": {
//!     "isBuilt": true,
//!     "isPublished": false,
//!     "builtOn": "2024-01-01T10:00:00Z"
//!   }
//! }
//! ```
//!
//! It is read before every operation and rewritten wholesale after each change.

use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// State of one built tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub is_built: bool,
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_on: Option<DateTime<Utc>>,
}

impl TrackingRecord {
    pub fn built(at: DateTime<Utc>) -> Self {
        Self {
            is_built: true,
            is_published: false,
            built_on: Some(at),
        }
    }
}

/// All tracked tags, ordered by tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingData {
    records: BTreeMap<String, TrackingRecord>,
}

impl TrackingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, tag: &str) -> Option<&TrackingRecord> {
        self.records.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TrackingRecord)> {
        self.records.iter()
    }

    /// Record a successful build. A rebuilt tag starts over as unpublished.
    pub fn record_build(&mut self, tag: impl Into<String>, at: DateTime<Utc>) {
        self.records.insert(tag.into(), TrackingRecord::built(at));
    }

    /// Flip a tag to published. Fails for unknown or already published tags.
    pub fn mark_published(&mut self, tag: &str) -> BuildResult<()> {
        match self.records.get_mut(tag) {
            Some(record) if !record.is_published => {
                record.is_published = true;
                Ok(())
            }
            _ => Err(BuildError::TagNotFound(tag.to_string())),
        }
    }

    /// Tags still waiting to be published, in tag order
    pub fn unpublished(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, r)| !r.is_published)
            .map(|(tag, _)| tag.clone())
            .collect()
    }
}

impl FromIterator<(String, TrackingRecord)> for TrackingData {
    fn from_iter<I: IntoIterator<Item = (String, TrackingRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Persistence for [`TrackingData`]
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// `None` when nothing has been stored yet
    async fn load(&self) -> BuildResult<Option<TrackingData>>;

    async fn save(&self, data: &TrackingData) -> BuildResult<()>;
}

/// Tracking data in a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TrackingStore for JsonFileStore {
    async fn load(&self) -> BuildResult<Option<TrackingData>> {
        if !self.path.is_file() {
            tracing::debug!("Tracking file not found: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let data: TrackingData = serde_json::from_str(&content)?;

        tracing::debug!("Loaded {} tracking records", data.len());
        Ok(Some(data))
    }

    async fn save(&self, data: &TrackingData) -> BuildResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content).await?;

        tracing::debug!("Saved {} tracking records", data.len());
        Ok(())
    }
}

/// Tracking data held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<TrackingData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing data, as if a tracking file were present
    pub fn with_data(data: TrackingData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    pub fn snapshot(&self) -> Option<TrackingData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn load(&self) -> BuildResult<Option<TrackingData>> {
        Ok(self.snapshot())
    }

    async fn save(&self, data: &TrackingData) -> BuildResult<()> {
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_record_build() {
        let mut data = TrackingData::new();
        data.record_build("org/x:abc-2024-01-01", at());

        let record = data.get("org/x:abc-2024-01-01").unwrap();
        assert!(record.is_built);
        assert!(!record.is_published);
        assert_eq!(record.built_on, Some(at()));
    }

    #[test]
    fn test_mark_published_once() {
        let mut data = TrackingData::new();
        data.record_build("org/x:abc-2024-01-01", at());

        data.mark_published("org/x:abc-2024-01-01").unwrap();
        assert!(data.get("org/x:abc-2024-01-01").unwrap().is_published);

        let err = data.mark_published("org/x:abc-2024-01-01").unwrap_err();
        assert!(err.is_not_found());
        assert!(data.get("org/x:abc-2024-01-01").unwrap().is_published);

        assert!(data.mark_published("org/y:abc-2024-01-01").is_err());
    }

    #[test]
    fn test_unpublished_in_tag_order() {
        let mut data = TrackingData::new();
        data.record_build("org/b:1", at());
        data.record_build("org/a:1", at());
        data.record_build("org/c:1", at());
        data.mark_published("org/c:1").unwrap();

        assert_eq!(data.unpublished(), ["org/a:1", "org/b:1"]);
    }

    #[test]
    fn test_json_schema() {
        let mut data = TrackingData::new();
        data.record_build("org/x:abc-2024-01-01", at());

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "org/x:abc-2024-01-01": {
                    "isBuilt": true,
                    "isPublished": false,
                    "builtOn": "2024-01-01T10:00:00Z"
                }
            })
        );
    }

    #[test]
    fn test_parse_without_built_on() {
        let data: TrackingData = serde_json::from_str(
            r#"{"org/x:abc-2024-01-01": {"isBuilt": true, "isPublished": false}}"#,
        )
        .unwrap();

        let record = data.get("org/x:abc-2024-01-01").unwrap();
        assert!(record.is_built);
        assert!(record.built_on.is_none());
        assert_eq!(data.unpublished(), ["org/x:abc-2024-01-01"]);
    }

    #[tokio::test]
    async fn test_file_store_missing() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join(".image-build-status.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_save_load() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state").join("status.json"));

        let mut data = TrackingData::new();
        data.record_build("org/x:abc-2024-01-01", at());
        store.save(&data).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn test_file_store_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::new(&path).load().await;
        assert!(matches!(result, Err(BuildError::Tracking(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut data = TrackingData::new();
        data.record_build("org/x:1", at());
        store.save(&data).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(data));
    }
}
