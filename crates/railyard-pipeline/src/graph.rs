//! The canonical in-memory pipeline graph.
//!
//! Owns all jobs, edges, stages, and pipeline-wide settings. Every mutator is
//! total: invalid input (unknown job id, unknown stage, duplicate edge) is a
//! silent no-op, never an error. Defects this permits — duplicate slugs, step
//! mistakes, even cycles — stay representable on purpose; the rule engine
//! detects them, it does not prevent them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use railyard_project::{EdgeDef, EnvVarDef, JobDef, PipelineDef, ProjectSnapshot, StepDef};
use railyard_types::{Dialect, JobId, StepKind, TestCategory};

/// Derive the serialized short identifier from a display name: lowercase,
/// with every non-alphanumeric byte collapsed to `_`. An empty result means
/// the caller should fall back to the job's internal id.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// One action inside a job. Order within the job is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub name: String,
    /// Meaning depends on `kind`: empty for checkout, a command line for run,
    /// an action reference for action.
    pub value: String,
}

impl Step {
    pub fn checkout() -> Self {
        Self {
            kind: StepKind::Checkout,
            name: "Checkout Code".into(),
            value: String::new(),
        }
    }

    pub fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Run,
            name: name.into(),
            value: command.into(),
        }
    }

    pub fn action(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Action,
            name: name.into(),
            value: reference.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// A directed must-complete-before dependency between two jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: JobId,
    pub to: JobId,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Derived short identifier used in serialized output. Recomputed from the
    /// display name on rename; uniqueness is validated, not enforced.
    pub slug: String,
    pub name: String,
    /// Execution environment: a runner label or container image reference.
    pub runner: String,
    pub stage: String,
    pub category: TestCategory,
    pub steps: Vec<Step>,
    pub external: bool,
    pub external_path: String,
    pub env: Vec<EnvVar>,
    pub artifacts: Vec<String>,
    pub matrix: Option<IndexMap<String, Vec<String>>>,
    pub retry: Option<u32>,
    /// Canvas placement. Presentation-only, except that the ordering engine
    /// breaks ties by the vertical coordinate.
    pub position: (f64, f64),
}

/// Pipeline-wide settings for the current document.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub branch: String,
    pub on_push: bool,
    pub on_pull_request: bool,
    pub stages: Vec<String>,
    pub dialect: Dialect,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            branch: "main".into(),
            on_push: true,
            on_pull_request: false,
            stages: vec!["build".into(), "test".into(), "deploy".into()],
            dialect: Dialect::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineGraph {
    settings: PipelineSettings,
    jobs: Vec<Job>,
    edges: Vec<Edge>,
    next_id: u32,
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self {
            settings: PipelineSettings::default(),
            jobs: Vec::new(),
            edges: Vec::new(),
            next_id: 1,
        }
    }

    /// Reinitialize to defaults: empty job and edge sets, standard settings.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub(crate) fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Direct predecessors of `id`, in edge insertion order.
    pub fn predecessors(&self, id: &str) -> Vec<&Job> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .filter_map(|e| self.job(&e.from))
            .collect()
    }

    /// Direct successors of `id`, in edge insertion order.
    pub fn successors(&self, id: &str) -> Vec<&Job> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .filter_map(|e| self.job(&e.to))
            .collect()
    }

    // ------------------------------------------------------------------
    // Job operations
    // ------------------------------------------------------------------

    /// Create a standard job with a single checkout step and return its id.
    pub fn add_job(&mut self) -> JobId {
        let slug = format!("job_{}", self.next_id);
        self.next_id += 1;
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            slug,
            name: "New Job".into(),
            runner: "ubuntu-latest".into(),
            stage: self.settings.stages[0].clone(),
            category: TestCategory::None,
            steps: vec![Step::checkout()],
            external: false,
            external_path: String::new(),
            env: Vec::new(),
            artifacts: Vec::new(),
            matrix: None,
            retry: None,
            position: (0.0, 0.0),
        };
        let id = job.id.clone();
        self.jobs.push(job);
        id
    }

    /// Create an external-reference job (no steps of its own) and return its id.
    pub fn add_external_job(&mut self) -> JobId {
        let slug = format!("ext_{}", self.next_id);
        self.next_id += 1;
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            slug,
            name: "External Pipeline".into(),
            runner: "ubuntu-latest".into(),
            stage: self.settings.stages[0].clone(),
            category: TestCategory::None,
            steps: Vec::new(),
            external: true,
            external_path: "./templates/build-template.yml".into(),
            env: Vec::new(),
            artifacts: Vec::new(),
            matrix: None,
            retry: None,
            position: (0.0, 0.0),
        };
        let id = job.id.clone();
        self.jobs.push(job);
        id
    }

    /// Remove a job and every edge incident to it.
    pub fn remove_job(&mut self, id: &str) {
        self.jobs.retain(|j| j.id != id);
        self.edges.retain(|e| e.from != id && e.to != id);
    }

    pub fn set_job_name(&mut self, id: &str, name: &str) {
        if let Some(job) = self.job_mut(id) {
            job.name = name.to_string();
            let slug = slugify(name);
            job.slug = if slug.is_empty() { job.id.clone() } else { slug };
        }
    }

    pub fn set_job_runner(&mut self, id: &str, runner: &str) {
        if let Some(job) = self.job_mut(id) {
            job.runner = runner.to_string();
        }
    }

    /// Assign the job to a stage. Unknown stages are ignored.
    pub fn set_job_stage(&mut self, id: &str, stage: &str) {
        if !self.settings.stages.iter().any(|s| s == stage) {
            return;
        }
        if let Some(job) = self.job_mut(id) {
            job.stage = stage.to_string();
        }
    }

    pub fn set_job_category(&mut self, id: &str, category: TestCategory) {
        if let Some(job) = self.job_mut(id) {
            job.category = category;
        }
    }

    pub fn set_job_external_path(&mut self, id: &str, path: &str) {
        if let Some(job) = self.job_mut(id) {
            job.external_path = path.to_string();
        }
    }

    pub fn set_job_position(&mut self, id: &str, x: f64, y: f64) {
        if let Some(job) = self.job_mut(id) {
            job.position = (x, y);
        }
    }

    // ------------------------------------------------------------------
    // Step operations
    // ------------------------------------------------------------------

    pub fn push_step(&mut self, id: &str, step: Step) {
        if let Some(job) = self.job_mut(id) {
            job.steps.push(step);
        }
    }

    pub fn set_job_steps(&mut self, id: &str, steps: Vec<Step>) {
        if let Some(job) = self.job_mut(id) {
            job.steps = steps;
        }
    }

    pub fn remove_step(&mut self, id: &str, index: usize) {
        if let Some(job) = self.job_mut(id) {
            if index < job.steps.len() {
                job.steps.remove(index);
            }
        }
    }

    pub fn set_step_name(&mut self, id: &str, index: usize, name: &str) {
        if let Some(step) = self.job_mut(id).and_then(|j| j.steps.get_mut(index)) {
            step.name = name.to_string();
        }
    }

    pub fn set_step_value(&mut self, id: &str, index: usize, value: &str) {
        if let Some(step) = self.job_mut(id).and_then(|j| j.steps.get_mut(index)) {
            step.value = value.to_string();
        }
    }

    /// Change a step's kind. Switching to checkout clears the payload, since
    /// checkout steps carry none.
    pub fn set_step_kind(&mut self, id: &str, index: usize, kind: StepKind) {
        if let Some(step) = self.job_mut(id).and_then(|j| j.steps.get_mut(index)) {
            step.kind = kind;
            if kind == StepKind::Checkout {
                step.value.clear();
            }
        }
    }

    // ------------------------------------------------------------------
    // Environment, artifacts, matrix, retry
    // ------------------------------------------------------------------

    pub fn add_env_var(&mut self, id: &str, key: &str, value: &str) {
        if let Some(job) = self.job_mut(id) {
            job.env.push(EnvVar {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn remove_env_var(&mut self, id: &str, index: usize) {
        if let Some(job) = self.job_mut(id) {
            if index < job.env.len() {
                job.env.remove(index);
            }
        }
    }

    pub fn add_artifact(&mut self, id: &str, pattern: &str) {
        if let Some(job) = self.job_mut(id) {
            job.artifacts.push(pattern.to_string());
        }
    }

    pub fn remove_artifact(&mut self, id: &str, index: usize) {
        if let Some(job) = self.job_mut(id) {
            if index < job.artifacts.len() {
                job.artifacts.remove(index);
            }
        }
    }

    pub fn set_matrix(&mut self, id: &str, matrix: IndexMap<String, Vec<String>>) {
        if let Some(job) = self.job_mut(id) {
            job.matrix = Some(matrix);
        }
    }

    pub fn clear_matrix(&mut self, id: &str) {
        if let Some(job) = self.job_mut(id) {
            job.matrix = None;
        }
    }

    /// Set the retry attempt count. Zero is not a meaningful count and is ignored.
    pub fn set_retry(&mut self, id: &str, attempts: u32) {
        if attempts == 0 {
            return;
        }
        if let Some(job) = self.job_mut(id) {
            job.retry = Some(attempts);
        }
    }

    pub fn clear_retry(&mut self, id: &str) {
        if let Some(job) = self.job_mut(id) {
            job.retry = None;
        }
    }

    // ------------------------------------------------------------------
    // Edge operations
    // ------------------------------------------------------------------

    /// Add a dependency edge. Returns `false` without effect when the edge
    /// already exists or either endpoint is unknown. Self-loops are accepted;
    /// the ordering engine reports them as a degenerate cycle.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if self.job(from).is_none() || self.job(to).is_none() {
            return false;
        }
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return false;
        }
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
        true
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) {
        self.edges.retain(|e| !(e.from == from && e.to == to));
    }

    // ------------------------------------------------------------------
    // Stage operations
    // ------------------------------------------------------------------

    /// Append a stage. Returns `false` for blank or duplicate names.
    pub fn add_stage(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() || self.settings.stages.contains(&name) {
            return false;
        }
        self.settings.stages.push(name);
        true
    }

    /// Remove a stage. Refuses to remove the last remaining stage; jobs left
    /// orphaned are reassigned to the first remaining stage.
    pub fn remove_stage(&mut self, name: &str) -> bool {
        if self.settings.stages.len() <= 1 {
            return false;
        }
        let Some(index) = self.settings.stages.iter().position(|s| s == name) else {
            return false;
        };
        self.settings.stages.remove(index);
        let fallback = self.settings.stages[0].clone();
        for job in &mut self.jobs {
            if job.stage == name {
                job.stage = fallback.clone();
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Settings operations
    // ------------------------------------------------------------------

    pub fn set_branch(&mut self, branch: &str) {
        self.settings.branch = if branch.trim().is_empty() {
            "main".into()
        } else {
            branch.to_string()
        };
    }

    pub fn set_triggers(&mut self, on_push: bool, on_pull_request: bool) {
        self.settings.on_push = on_push;
        self.settings.on_pull_request = on_pull_request;
    }

    pub fn set_dialect(&mut self, dialect: Dialect) {
        self.settings.dialect = dialect;
    }

    // ------------------------------------------------------------------
    // Snapshot conversion
    // ------------------------------------------------------------------

    /// Build a graph from a parsed snapshot, defaulting anything the file left
    /// out. Never fails: parse errors belong to the snapshot layer, and the
    /// model repairs referential gaps (unknown stages, dangling edges) rather
    /// than rejecting them.
    pub fn from_snapshot(snapshot: &ProjectSnapshot) -> Self {
        let mut settings = PipelineSettings {
            branch: snapshot.pipeline.branch.clone(),
            on_push: snapshot.pipeline.on_push,
            on_pull_request: snapshot.pipeline.on_pull_request,
            stages: snapshot.pipeline.stages.clone(),
            dialect: snapshot.dialect,
        };
        if settings.stages.is_empty() {
            settings.stages = PipelineSettings::default().stages;
        }
        if settings.branch.trim().is_empty() {
            settings.branch = "main".into();
        }
        let first_stage = settings.stages[0].clone();

        let jobs: Vec<Job> = snapshot
            .jobs
            .iter()
            .map(|def| {
                let id = if def.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    def.id.clone()
                };
                let slug = if def.slug.is_empty() {
                    let derived = slugify(&def.name);
                    if derived.is_empty() { id.clone() } else { derived }
                } else {
                    def.slug.clone()
                };
                let stage = if settings.stages.contains(&def.stage) {
                    def.stage.clone()
                } else {
                    first_stage.clone()
                };
                Job {
                    id,
                    slug,
                    name: def.name.clone(),
                    runner: def.runner.clone(),
                    stage,
                    category: def.category,
                    steps: def
                        .steps
                        .iter()
                        .map(|s| Step {
                            kind: s.kind,
                            name: s.name.clone(),
                            value: s.value.clone(),
                        })
                        .collect(),
                    external: def.external,
                    external_path: def.external_path.clone(),
                    env: def
                        .env
                        .iter()
                        .map(|e| EnvVar {
                            key: e.key.clone(),
                            value: e.value.clone(),
                        })
                        .collect(),
                    artifacts: def.artifacts.clone(),
                    matrix: def.matrix.clone(),
                    retry: def.retry,
                    position: def.position,
                }
            })
            .collect();

        let mut graph = Self {
            settings,
            jobs,
            edges: Vec::new(),
            next_id: snapshot.next_id.max(1),
        };
        for edge in &snapshot.edges {
            graph.add_edge(&edge.from, &edge.to);
        }
        tracing::debug!(
            jobs = graph.jobs.len(),
            edges = graph.edges.len(),
            "graph loaded from snapshot"
        );
        graph
    }

    /// Deep, self-contained copy of the whole pipeline.
    pub fn to_snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            version: railyard_project::SNAPSHOT_VERSION,
            dialect: self.settings.dialect,
            pipeline: PipelineDef {
                branch: self.settings.branch.clone(),
                on_push: self.settings.on_push,
                on_pull_request: self.settings.on_pull_request,
                stages: self.settings.stages.clone(),
            },
            jobs: self
                .jobs
                .iter()
                .map(|job| JobDef {
                    id: job.id.clone(),
                    slug: job.slug.clone(),
                    name: job.name.clone(),
                    runner: job.runner.clone(),
                    stage: job.stage.clone(),
                    category: job.category,
                    steps: job
                        .steps
                        .iter()
                        .map(|s| StepDef {
                            kind: s.kind,
                            name: s.name.clone(),
                            value: s.value.clone(),
                        })
                        .collect(),
                    external: job.external,
                    external_path: job.external_path.clone(),
                    env: job
                        .env
                        .iter()
                        .map(|e| EnvVarDef {
                            key: e.key.clone(),
                            value: e.value.clone(),
                        })
                        .collect(),
                    artifacts: job.artifacts.clone(),
                    matrix: job.matrix.clone(),
                    retry: job.retry,
                    position: job.position,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| EdgeDef {
                    from: e.from.clone(),
                    to: e.to.clone(),
                })
                .collect(),
            next_id: self.next_id,
            saved_at: None,
        }
    }
}
