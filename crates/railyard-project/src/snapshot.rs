//! Full-state project snapshot: the serialized form of a pipeline.
//!
//! Every optional field carries a serde default so that snapshots written by
//! older versions (or trimmed by hand) still load; loading never partially
//! applies a file — it either yields a complete snapshot or an error.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use railyard_types::{Dialect, RailyardError, Result, StepKind, TestCategory};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub pipeline: PipelineDef,
    #[serde(default)]
    pub jobs: Vec<JobDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    /// Monotonic counter used for default job slugs (`job_<n>`, `ext_<n>`).
    #[serde(default = "default_next_id")]
    pub next_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_true")]
    pub on_push: bool,
    #[serde(default)]
    pub on_pull_request: bool,
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_runner")]
    pub runner: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub category: TestCategory,
    #[serde(default)]
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub external_path: String,
    #[serde(default)]
    pub env: Vec<EnvVarDef>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<IndexMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Canvas placement. Presentation-only, except that the ordering engine
    /// breaks ties by the vertical coordinate.
    #[serde(default)]
    pub position: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub kind: StepKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarDef {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_next_id() -> u32 {
    1
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

fn default_stages() -> Vec<String> {
    vec!["build".to_string(), "test".to_string(), "deploy".to_string()]
}

fn default_runner() -> String {
    "ubuntu-latest".to_string()
}

impl Default for PipelineDef {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            on_push: true,
            on_pull_request: false,
            stages: default_stages(),
        }
    }
}

impl Default for ProjectSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            dialect: Dialect::default(),
            pipeline: PipelineDef::default(),
            jobs: Vec::new(),
            edges: Vec::new(),
            next_id: default_next_id(),
            saved_at: None,
        }
    }
}

impl ProjectSnapshot {
    /// Parse a snapshot from a JSON string.
    pub fn from_json(data: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(data)?;
        if snapshot.pipeline.stages.is_empty() {
            return Err(RailyardError::Snapshot(
                "pipeline must declare at least one stage".into(),
            ));
        }
        Ok(snapshot)
    }

    /// Serialize this snapshot (stamped with the current time) and write it to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut doc = self.clone();
        doc.saved_at = Some(chrono::Utc::now());
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "project snapshot saved");
        Ok(())
    }

    /// Read a snapshot from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}
