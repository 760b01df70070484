//! JSON-backed counter store for agent invocations.
//!
//! One file, serialized writes, temp-file + rename so a crashed write never
//! corrupts the counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siembra_core::error::SiembraError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// How many raw records are retained alongside the counters.
const MAX_RECORDS: usize = 500;

/// One agent invocation. Only the phone tail is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub phone_tail: String,
    pub agent_label: String,
    pub prompt_summary: String,
    pub reply_summary: String,
    pub elapsed_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TelemetryData {
    /// Invocation count per agent label.
    counters: HashMap<String, u64>,
    records: Vec<TelemetryRecord>,
}

/// Process-wide telemetry store backed by a single JSON file.
#[derive(Clone)]
pub struct TelemetryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl TelemetryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one record and bump its label counter.
    pub async fn append(&self, record: TelemetryRecord) -> Result<(), SiembraError> {
        let _guard = self.lock.lock().await;

        let mut data = self.read_unlocked().await;
        *data.counters.entry(record.agent_label.clone()).or_insert(0) += 1;
        data.records.push(record);
        if data.records.len() > MAX_RECORDS {
            let excess = data.records.len() - MAX_RECORDS;
            data.records.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(&data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("telemetry appended, {} labels tracked", data.counters.len());
        Ok(())
    }

    /// Current counter per agent label.
    pub async fn counters(&self) -> HashMap<String, u64> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await.counters
    }

    async fn read_unlocked(&self) -> TelemetryData {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => TelemetryData::default(),
        }
    }
}

/// Truncate a summary to a fixed character budget.
pub fn summarize(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_CHARS).collect();
        format!("{truncated}…")
    }
}
