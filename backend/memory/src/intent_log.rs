//! New-intent training log.
//!
//! A JSON array of `{"Intention", "Message", "Id"}` records collected when a
//! reviewer disagrees with the classifier. Ids are `1 + max(existing, 0)`:
//! monotonic, never reused, gaps tolerated.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    #[serde(rename = "Intention")]
    pub intention: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Id", default)]
    pub id: u64,
}

pub struct IntentLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl IntentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return the id it was assigned.
    pub async fn append(&self, intention: &str, message: &str) -> Result<u64> {
        let ids = self
            .append_many(&[(intention.to_string(), message.to_string())])
            .await?;
        Ok(ids[0])
    }

    /// Append records in order, assigning consecutive ids after the current maximum.
    pub async fn append_many(&self, items: &[(String, String)]) -> Result<Vec<u64>> {
        let _guard = self.write_lock.lock().await;

        let mut data = self.load_raw().await?;
        let mut next_id = data
            .iter()
            .filter_map(|item| item.get("Id").and_then(Value::as_u64))
            .max()
            .unwrap_or(0);

        let mut ids = Vec::with_capacity(items.len());
        for (intention, message) in items {
            next_id += 1;
            let record = IntentRecord {
                intention: intention.clone(),
                message: message.clone(),
                id: next_id,
            };
            data.push(serde_json::to_value(&record)?);
            ids.push(next_id);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&data)?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write intent log {}", self.path.display()))?;

        info!(path = %self.path.display(), ids = ?ids, "Recorded new intent candidates");
        Ok(ids)
    }

    /// All records currently in the log.
    pub async fn records(&self) -> Result<Vec<IntentRecord>> {
        self.load_raw()
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).context("Malformed intent record"))
            .collect()
    }

    async fn load_raw(&self) -> Result<Vec<Value>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read intent log {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to decode JSON from {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_record_gets_id_one() {
        let dir = tempfile::tempdir().unwrap();
        let log = IntentLog::new(dir.path().join("new_intentions.json"));

        assert_eq!(log.append("create_order", "buy two tvs").await.unwrap(), 1);
        assert_eq!(log.append("order_status", "where is it").await.unwrap(), 2);

        let records = log.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].intention, "order_status");
        assert_eq!(records[1].id, 2);
    }

    #[tokio::test]
    async fn test_ids_follow_max_with_gaps_and_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(
            &path,
            r#"[
                {"Intention": "a", "Message": "x", "Id": 7},
                {"Intention": "b", "Message": "y"},
                {"Intention": "c", "Message": "z", "Id": 3}
            ]"#,
        )
        .unwrap();

        let log = IntentLog::new(&path);
        let ids = log
            .append_many(&[
                ("product_information".into(), "tell me about tvs".into()),
                ("chitchat".into(), "hi".into()),
            ])
            .await
            .unwrap();
        assert_eq!(ids, vec![8, 9]);

        let written: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 5);
        assert_eq!(written[1].get("Id"), None);
        assert_eq!(written[4]["Message"], "hi");
    }

    #[tokio::test]
    async fn test_empty_file_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "[]").unwrap();

        let log = IntentLog::new(&path);
        assert_eq!(log.append("a", "b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{not json").unwrap();

        let log = IntentLog::new(&path);
        assert!(log.append("a", "b").await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }
}
