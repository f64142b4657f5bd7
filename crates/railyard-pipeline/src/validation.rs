//! Rule engine: graph inspection rules and the issues they produce.
//!
//! Every rule reads the whole graph and returns zero or more [`Issue`]s.
//! Rules never mutate and must tolerate partially-invalid graphs — a cyclic
//! graph still gets its step-level rules evaluated. The engine concatenates
//! rule output in a fixed registration order: structural rules first, then
//! semantic rules, then advisories. Issues are value objects, recomputed from
//! scratch on every pass.

use globset::Glob;

use railyard_types::{JobId, Severity, StepKind};

use crate::autofix::{
    artifact_download_step, docker_login_step, docker_pull_step, docker_push_step, install_step,
    Fallback, FixAction, Placement, Probe,
};
use crate::graph::{Job, PipelineGraph};
use crate::ordering::{execution_order, ExecutionOrder};
use crate::probe;

/// One diagnostic finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    /// Human guidance for resolving the finding by hand.
    pub hint: Option<String>,
    pub job_id: Option<JobId>,
    pub fix: Option<FixAction>,
    /// Whether `fix` can be applied automatically. A descriptor can exist and
    /// still require the user (e.g. drawing a new edge).
    pub auto_fixable: bool,
}

impl Issue {
    fn new(severity: Severity, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            detail: detail.into(),
            hint: None,
            job_id: None,
            fix: None,
            auto_fixable: false,
        }
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, detail)
    }

    pub fn warning(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, detail)
    }

    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, detail)
    }

    pub fn success(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, detail)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_job(mut self, id: &str) -> Self {
        self.job_id = Some(id.to_string());
        self
    }

    /// Attach an automatically applicable remediation.
    pub fn with_fix(mut self, fix: FixAction) -> Self {
        self.fix = Some(fix);
        self.auto_fixable = true;
        self
    }

    /// Attach a remediation descriptor that only the user can carry out.
    pub fn with_advisory_fix(mut self, fix: FixAction) -> Self {
        self.fix = Some(fix);
        self.auto_fixable = false;
        self
    }
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue>;
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn has_test_job(graph: &PipelineGraph) -> bool {
    graph.jobs().iter().any(|j| {
        j.category.is_test()
            || j.steps.iter().any(|s| {
                ["test", "jest", "pytest", "mocha"]
                    .iter()
                    .any(|needle| s.value.contains(needle))
            })
    })
}

fn is_deploy_job(job: &Job) -> bool {
    job.stage == "deploy" || job.steps.iter().any(probe::is_deploy_command)
}

fn has_test_predecessor(graph: &PipelineGraph, job: &Job) -> bool {
    graph
        .predecessors(&job.id)
        .iter()
        .any(|p| p.category.is_test() || p.stage == "test")
}

// ---------------------------------------------------------------------------
// Structural rules
// ---------------------------------------------------------------------------

struct StructureRule;
impl Rule for StructureRule {
    fn name(&self) -> &str {
        "structure"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        match execution_order(graph) {
            ExecutionOrder::Cycle(cycle) => vec![Issue::error(
                "Circular dependency detected",
                cycle.join(" -> "),
            )
            .with_hint("Remove one of the connections in the cycle to break the loop")],
            ExecutionOrder::Ordered(_) => vec![Issue::success(
                "Pipeline structure valid",
                format!(
                    "{} job(s) configured with valid dependencies",
                    graph.jobs().len()
                ),
            )],
        }
    }
}

struct DuplicateSlugRule;
impl Rule for DuplicateSlugRule {
    fn name(&self) -> &str {
        "duplicate_slug"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut groups: indexmap::IndexMap<&str, Vec<&Job>> = indexmap::IndexMap::new();
        for job in graph.jobs() {
            groups.entry(job.slug.as_str()).or_default().push(job);
        }
        groups
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(slug, members)| {
                let names: Vec<&str> = members.iter().map(|j| j.name.as_str()).collect();
                Issue::error(
                    format!("Duplicate job identifier \"{slug}\""),
                    format!(
                        "{} jobs serialize to the same identifier: {}",
                        members.len(),
                        names.join(", ")
                    ),
                )
                .with_hint("Rename the jobs so each has a unique identifier")
            })
            .collect()
    }
}

struct EmptyStepRule;
impl Rule for EmptyStepRule {
    fn name(&self) -> &str {
        "empty_step"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs().iter().filter(|j| !j.external) {
            for (index, step) in job.steps.iter().enumerate() {
                if !probe::is_empty_command(step) {
                    continue;
                }
                let what = match step.kind {
                    StepKind::Action => "no action reference",
                    _ => "no command",
                };
                let detail = format!("Step {} \"{}\" has {}", index + 1, step.name, what);
                let issue = if probe::has_checkout_like_name(step) {
                    Issue::error(format!("Empty command in \"{}\"", job.name), format!(
                        "{detail}. This looks like a checkout step with the wrong kind."
                    ))
                    .with_job(&job.id)
                    .with_fix(FixAction::ConvertStepKind {
                        job_id: job.id.clone(),
                        into: StepKind::Checkout,
                    })
                    .with_hint("Convert the step to a checkout step")
                } else {
                    Issue::error(format!("Empty command in \"{}\"", job.name), detail)
                        .with_job(&job.id)
                        .with_fix(FixAction::DeleteStep {
                            job_id: job.id.clone(),
                        })
                        .with_hint("Give the step a command, or remove it")
                };
                issues.push(issue);
            }
        }
        issues
    }
}

struct NoStepsRule;
impl Rule for NoStepsRule {
    fn name(&self) -> &str {
        "no_steps"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        graph
            .jobs()
            .iter()
            .filter(|j| !j.external && j.steps.is_empty())
            .map(|job| {
                Issue::error(
                    format!("Job \"{}\" has no steps", job.name),
                    "A job with no steps does nothing and fails on most platforms",
                )
                .with_job(&job.id)
                .with_hint("Add at least one step to the job")
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Semantic rules
// ---------------------------------------------------------------------------

struct ContainerLifecycleRule;
impl Rule for ContainerLifecycleRule {
    fn name(&self) -> &str {
        "container_lifecycle"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();

        for job in graph.jobs() {
            let build = job.steps.iter().position(probe::is_image_build);
            let push = job.steps.iter().position(probe::is_image_push);
            let login = job.steps.iter().position(probe::is_image_login);

            if build.is_some() {
                if push.is_none() {
                    issues.push(
                        Issue::error(
                            format!("Image built but never pushed in \"{}\"", job.name),
                            "The image is built but not pushed to a registry, so no other job can use it",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::InsertStep {
                            job_id: job.id.clone(),
                            step: docker_push_step(),
                            placement: Placement::After {
                                anchor: Probe::ImageBuild,
                                fallback: Fallback::End,
                            },
                            skip_if: Some(Probe::ImagePush),
                        })
                        .with_hint("Push the image right after building it"),
                    );
                } else if login.is_none() {
                    issues.push(
                        Issue::error(
                            format!("Missing registry login in \"{}\"", job.name),
                            "The image is pushed without logging in to the registry first",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::InsertStep {
                            job_id: job.id.clone(),
                            step: docker_login_step(),
                            placement: Placement::Front,
                            skip_if: Some(Probe::ImageLogin),
                        })
                        .with_hint("Log in to the registry as the very first step"),
                    );
                } else if login > push {
                    issues.push(
                        Issue::error(
                            format!("Registry login after push in \"{}\"", job.name),
                            "The login step runs after the push it is supposed to authorize",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::ReorderStep {
                            job_id: job.id.clone(),
                            moving: Probe::ImageLogin,
                            before: Probe::ImagePush,
                        })
                        .with_hint("Move the login step before the push step"),
                    );
                }
                continue;
            }

            // Jobs that consume an image they never build.
            let uses = job.steps.iter().any(probe::is_image_use);
            if uses {
                let pull = job.steps.iter().position(probe::is_image_pull);
                if pull.is_none() {
                    issues.push(
                        Issue::error(
                            format!("Image used but never pulled in \"{}\"", job.name),
                            "The image is scanned or run without being pulled; it does not exist on this runner",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::InsertStep {
                            job_id: job.id.clone(),
                            step: docker_pull_step(),
                            placement: Placement::Before {
                                anchor: Probe::ImageUse,
                                fallback: Fallback::Front,
                            },
                            skip_if: Some(Probe::ImagePull),
                        })
                        .with_hint("Pull the image before using it"),
                    );
                } else if login.is_none() {
                    issues.push(
                        Issue::warning(
                            format!("Registry login may be required in \"{}\"", job.name),
                            "Pulling from a private registry requires logging in first",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::InsertStep {
                            job_id: job.id.clone(),
                            step: docker_login_step(),
                            placement: Placement::Front,
                            skip_if: Some(Probe::ImageLogin),
                        })
                        .with_hint("Log in to the registry as the very first step"),
                    );
                }
            }
        }
        issues
    }
}

struct ArtifactFlowRule;
impl Rule for ArtifactFlowRule {
    fn name(&self) -> &str {
        "artifact_flow"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        // Only direct successors are inspected, not transitive ones.
        for job in graph.jobs().iter().filter(|j| !j.artifacts.is_empty()) {
            for successor in graph.successors(&job.id) {
                if successor.external
                    || successor.steps.iter().any(probe::is_artifact_download)
                {
                    continue;
                }
                issues.push(
                    Issue::warning(
                        format!("Artifacts not downloaded in \"{}\"", successor.name),
                        format!(
                            "\"{}\" publishes artifacts, but \"{}\" never downloads them",
                            job.name, successor.name
                        ),
                    )
                    .with_job(&successor.id)
                    .with_fix(FixAction::InsertStep {
                        job_id: successor.id.clone(),
                        step: artifact_download_step(),
                        placement: Placement::After {
                            anchor: Probe::Checkout,
                            fallback: Fallback::Front,
                        },
                        skip_if: Some(Probe::ArtifactDownload),
                    })
                    .with_hint("Download the artifacts after checking out the code"),
                );
            }
        }
        issues
    }
}

struct MatrixRule;
impl Rule for MatrixRule {
    fn name(&self) -> &str {
        "matrix"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs() {
            let Some(matrix) = &job.matrix else { continue };
            let used = matrix
                .keys()
                .any(|key| job.steps.iter().any(|s| probe::references_matrix_var(s, key)));
            if used {
                continue;
            }

            let keys: Vec<&str> = matrix.keys().map(String::as_str).collect();
            // Escalates to an error on image scans: the expansion repeats an
            // identical scan.
            let scans = job.steps.iter().any(probe::is_image_scan);
            let issue = if scans {
                Issue::error(
                    format!("Pointless matrix on image scan in \"{}\"", job.name),
                    format!(
                        "The matrix ({}) never varies the scan; the same image is scanned once per expansion",
                        keys.join(", ")
                    ),
                )
            } else {
                Issue::warning(
                    format!("Unused matrix in \"{}\"", job.name),
                    format!(
                        "The matrix ({}) is not referenced by any step; every expansion runs identically",
                        keys.join(", ")
                    ),
                )
            };
            issues.push(
                issue
                    .with_job(&job.id)
                    .with_fix(FixAction::ClearMatrix {
                        job_id: job.id.clone(),
                    })
                    .with_hint(format!(
                        "Reference ${{{{ matrix.{} }}}} in a step, or remove the matrix",
                        keys.first().unwrap_or(&"var")
                    )),
            );
        }
        issues
    }
}

struct InstallOrderRule;
impl Rule for InstallOrderRule {
    fn name(&self) -> &str {
        "install_order"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs().iter().filter(|j| !j.external) {
            let Some(test) = job.steps.iter().position(probe::is_test_command) else {
                continue;
            };
            let install = job.steps.iter().position(probe::is_install_command);
            match install {
                None => {
                    let python = job
                        .steps
                        .iter()
                        .any(|s| s.value.contains("pytest") || s.value.contains("python"));
                    let command = if python {
                        "pip install -r requirements.txt"
                    } else {
                        "npm ci"
                    };
                    issues.push(
                        Issue::error(
                            format!("Tests run without installing dependencies in \"{}\"", job.name),
                            "No dependency installation precedes the test command; the tests will fail",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::InsertStep {
                            job_id: job.id.clone(),
                            step: install_step(command),
                            placement: Placement::Before {
                                anchor: Probe::TestCommand,
                                fallback: Fallback::Skip,
                            },
                            skip_if: Some(Probe::InstallCommand),
                        })
                        .with_hint("Install dependencies immediately before the tests"),
                    );
                }
                Some(index) if index > test => {
                    issues.push(
                        Issue::error(
                            format!("Dependencies installed after tests in \"{}\"", job.name),
                            "The install step runs after the test command it is supposed to prepare",
                        )
                        .with_job(&job.id)
                        .with_fix(FixAction::ReorderStep {
                            job_id: job.id.clone(),
                            moving: Probe::InstallCommand,
                            before: Probe::TestCommand,
                        })
                        .with_hint("Move the install step before the first test step"),
                    );
                }
                Some(_) => {}
            }
        }
        issues
    }
}

struct TestCommandRule;
impl Rule for TestCommandRule {
    fn name(&self) -> &str {
        "test_command"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        graph
            .jobs()
            .iter()
            .filter(|j| j.category.is_test() && !j.external)
            .filter(|j| !j.steps.iter().any(probe::is_test_command))
            .map(|job| {
                Issue::warning(
                    format!("Test job without a test command in \"{}\"", job.name),
                    format!(
                        "The job is classified as a {:?} test but never invokes a test runner",
                        job.category
                    ),
                )
                .with_job(&job.id)
                .with_hint("Add a step that runs the test suite, e.g. npm test or pytest")
            })
            .collect()
    }
}

struct DeployGateRule;
impl Rule for DeployGateRule {
    fn name(&self) -> &str {
        "deploy_gate"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs().iter().filter(|j| is_deploy_job(j)) {
            if !has_test_predecessor(graph, job) {
                issues.push(
                    Issue::error(
                        format!("Deployment without preceding tests in \"{}\"", job.name),
                        "No test job is connected before this deployment; broken code could ship",
                    )
                    .with_job(&job.id)
                    .with_advisory_fix(FixAction::ConnectTestJob {
                        job_id: job.id.clone(),
                    })
                    .with_hint("Draw a dependency from a test job to this deployment"),
                );
            }

            let kubectl = job.steps.iter().any(|s| s.value.contains("kubectl"));
            let pinned = job.steps.iter().any(|s| {
                s.value.contains("${{ github.sha }}")
                    || s.value.contains("${{ github.run_number }}")
                    || s.value.contains(":latest")
            });
            if kubectl && !pinned {
                issues.push(
                    Issue::warning(
                        format!("Deployment does not pin an image version in \"{}\"", job.name),
                        "The kubectl command does not say which image version to roll out",
                    )
                    .with_job(&job.id)
                    .with_hint("Reference an explicit tag such as ${{ github.sha }}"),
                );
            }
        }
        issues
    }
}

struct SecretsRule;
impl Rule for SecretsRule {
    fn name(&self) -> &str {
        "secrets"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs() {
            for (index, step) in job.steps.iter().enumerate() {
                if let Some(what) = probe::hardcoded_credential(&step.value) {
                    issues.push(
                        Issue::error(
                            format!("Hardcoded {} in \"{}\"", what, job.name),
                            format!(
                                "Step {} \"{}\" assigns a literal {}; never commit credentials",
                                index + 1,
                                step.name,
                                what
                            ),
                        )
                        .with_job(&job.id)
                        .with_hint("Replace the literal with a ${{ secrets.* }} reference"),
                    );
                }
            }
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Advisory rules
// ---------------------------------------------------------------------------

struct TestPresenceRule;
impl Rule for TestPresenceRule {
    fn name(&self) -> &str {
        "test_presence"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        if has_test_job(graph) {
            vec![Issue::success(
                "Test jobs configured",
                "The pipeline includes automated tests",
            )]
        } else {
            vec![Issue::warning(
                "No test jobs detected",
                "The pipeline should include automated tests",
            )
            .with_hint("Add a test job, or classify an existing job as unit/integration/e2e")]
        }
    }
}

struct CoverageRule;
impl Rule for CoverageRule {
    fn name(&self) -> &str {
        "coverage"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        if !has_test_job(graph) {
            return vec![];
        }
        let has_coverage = graph
            .jobs()
            .iter()
            .any(|j| j.artifacts.iter().any(|a| a.contains("cov")));
        if has_coverage {
            vec![]
        } else {
            vec![Issue::info(
                "Consider collecting coverage reports",
                "Saving test coverage helps track code quality over time",
            )
            .with_hint("Add \"coverage/**\" to the artifacts of a test job")]
        }
    }
}

struct ArtifactPatternRule;
impl Rule for ArtifactPatternRule {
    fn name(&self) -> &str {
        "artifact_pattern"
    }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Issue> {
        let mut issues = Vec::new();
        for job in graph.jobs() {
            for pattern in &job.artifacts {
                if let Err(err) = Glob::new(pattern) {
                    issues.push(
                        Issue::warning(
                            format!("Invalid artifact pattern in \"{}\"", job.name),
                            format!("\"{pattern}\" is not a valid glob: {err}"),
                        )
                        .with_job(&job.id)
                        .with_hint("Use glob syntax such as coverage/** or dist/*.tar.gz"),
                    );
                }
            }
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run every rule against the graph, in registration order.
pub fn validate(graph: &PipelineGraph) -> Vec<Issue> {
    if graph.jobs().is_empty() {
        return vec![Issue::info(
            "No jobs defined",
            "The pipeline is empty",
        )
        .with_hint("Add a job, or start from a template with `railyard new`")];
    }

    let rules: Vec<Box<dyn Rule>> = vec![
        // Structural
        Box::new(StructureRule),
        Box::new(DuplicateSlugRule),
        Box::new(EmptyStepRule),
        Box::new(NoStepsRule),
        // Semantic
        Box::new(ContainerLifecycleRule),
        Box::new(ArtifactFlowRule),
        Box::new(MatrixRule),
        Box::new(InstallOrderRule),
        Box::new(TestCommandRule),
        Box::new(DeployGateRule),
        Box::new(SecretsRule),
        // Advisory
        Box::new(TestPresenceRule),
        Box::new(CoverageRule),
        Box::new(ArtifactPatternRule),
    ];

    let mut issues = Vec::new();
    for rule in &rules {
        issues.extend(rule.apply(graph));
    }
    issues
}
