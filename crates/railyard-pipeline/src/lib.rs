//! Pipeline graph model, ordering engine, lint rules, auto-fixes, and the
//! dialect compiler.
//!
//! This crate implements the railyard core: the canonical in-memory pipeline
//! graph, deterministic topological ordering with cycle extraction, the rule
//! engine that turns graph defects into actionable issues, the remediation
//! engine that applies their fixes, and the compiler that renders the graph
//! into GitHub Actions or GitLab CI configuration trees.

pub mod autofix;
pub mod compile;
pub mod graph;
pub mod ordering;
pub mod probe;
pub mod validation;

pub use autofix::{apply_action, apply_all_fixes, apply_fix, Fallback, FixAction, Placement, Probe};
pub use compile::{compile, CompiledDocument};
pub use graph::{Edge, EnvVar, Job, PipelineGraph, PipelineSettings, Step};
pub use ordering::{execution_order, ordered_jobs, ExecutionOrder};
pub use validation::{validate, Issue, Rule};

pub use railyard_types::{Dialect, JobId, Severity, StepKind, TestCategory};
