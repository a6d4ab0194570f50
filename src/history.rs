//! Append-only log of completed runs, newest first

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::RunConfig;
use crate::error::Result;
use crate::models::{RunMode, RunResult, RunStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub ts: DateTime<Utc>,
    pub mode: RunMode,
    pub query: String,
    pub max: usize,
    pub prefix: String,
    pub stats: RunStats,
}

impl HistoryEntry {
    pub fn new(run: &RunConfig, result: &RunResult) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now(),
            mode: run.mode(),
            query: run.query.clone(),
            max: run.max_results,
            prefix: run.label_prefix.clone(),
            stats: result.stats(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHistory {
    entries: Vec<HistoryEntry>,
}

impl RunHistory {
    /// Load history from disk. A missing file is an empty history.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No history file at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let json = tokio::fs::read_to_string(path).await?;
        let history: Self = serde_json::from_str(&json)?;
        tracing::debug!("Loaded {} history entries from {:?}", history.len(), path);
        Ok(history)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        tracing::debug!("Saved {} history entries to {:?}", self.len(), path);
        Ok(())
    }

    /// Insert at the front, dropping the oldest entries beyond `max_entries`
    pub fn record(&mut self, entry: HistoryEntry, max_entries: usize) {
        self.entries.insert(0, entry);
        self.entries.truncate(max_entries);
    }

    /// Load, record one entry, and save back
    pub async fn append(path: &Path, entry: HistoryEntry, max_entries: usize) -> Result<()> {
        let mut history = Self::load(path).await?;
        history.record(entry, max_entries);
        history.save(path).await?;
        tracing::info!("Recorded run in history ({} entries)", history.len());
        Ok(())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
