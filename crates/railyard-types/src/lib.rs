//! Shared types, errors, and closed vocabularies for the railyard pipeline designer.
//!
//! This crate provides the foundational types used across all other railyard crates:
//! - `RailyardError` — unified error taxonomy
//! - `Severity` — severity scale for validation issues
//! - `StepKind`, `TestCategory`, `Dialect` — the model's closed enumerations

use serde::{Deserialize, Serialize};

/// Unified error type for all railyard subsystems.
///
/// The graph model itself never produces errors — its mutators are total and
/// treat invalid input as a no-op. Errors exist only at the external-input
/// boundary: project snapshots and pipeline documents that fail to parse.
#[derive(Debug, thiserror::Error)]
pub enum RailyardError {
    // === Project file errors ===
    #[error("Invalid project snapshot: {0}")]
    Snapshot(String),

    // === Pipeline document errors ===
    #[error("Could not import pipeline document: {0}")]
    Import(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl RailyardError {
    /// Returns `true` if the error was caused by malformed external input
    /// (as opposed to an environment failure such as a missing file).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RailyardError::Snapshot(_)
                | RailyardError::Import(_)
                | RailyardError::Json(_)
                | RailyardError::Yaml(_)
        )
    }
}

/// A convenience alias for `Result<T, RailyardError>`.
pub type Result<T> = std::result::Result<T, RailyardError>;

/// Stable identifier of a job. Opaque, assigned at creation, never derived
/// from the display name.
pub type JobId = String;

// ---------------------------------------------------------------------------
// Severity — severity scale for validation issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Short label used by the CLI report.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Success => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

// ---------------------------------------------------------------------------
// StepKind — what a single step inside a job does
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Retrieve the repository contents. Carries no payload.
    Checkout,
    /// Execute a shell command line.
    Run,
    /// Invoke a reusable action/plugin by reference.
    Action,
}

// ---------------------------------------------------------------------------
// TestCategory — optional test classification of a job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCategory {
    #[default]
    None,
    Unit,
    Integration,
    E2e,
}

impl TestCategory {
    pub fn is_test(&self) -> bool {
        !matches!(self, TestCategory::None)
    }
}

// ---------------------------------------------------------------------------
// Dialect — target configuration document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    #[serde(rename = "github")]
    GithubActions,
    #[serde(rename = "gitlab")]
    GitlabCi,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::GithubActions => write!(f, "github"),
            Dialect::GitlabCi => write!(f, "gitlab"),
        }
    }
}
