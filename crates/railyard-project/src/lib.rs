//! Persistence and input layer for railyard projects.
//!
//! A project file is a JSON [`ProjectSnapshot`]: a deep, self-contained copy of
//! the whole pipeline (settings, jobs, edges). Snapshots are the only way state
//! enters or leaves the graph model — the persistence layer saves them, the
//! undo layer stacks them, and import replaces the model wholesale.
//!
//! The [`import`] module additionally accepts a hand-written CI configuration
//! document (GitHub Actions or GitLab CI YAML) and converts it into a snapshot,
//! and [`templates`] holds the built-in starter pipelines.

pub mod import;
pub mod snapshot;
pub mod templates;

pub use import::import_yaml;
pub use snapshot::{
    EdgeDef, EnvVarDef, JobDef, PipelineDef, ProjectSnapshot, StepDef, SNAPSHOT_VERSION,
};
pub use templates::{template, template_names};
