//! Remediation engine: a closed set of bounded, idempotent graph edits.
//!
//! Each [`FixAction`] is a tagged descriptor (kind plus typed parameters),
//! never executable payload. Dispatch re-resolves every anchor through
//! [`Probe`] predicates at apply time, so a descriptor computed against an
//! older graph state degrades to a no-op when the anchor is gone or the
//! problem is already fixed. The engine never re-validates; callers re-run
//! the rule engine after a successful application.

use serde::{Deserialize, Serialize};

use railyard_types::{JobId, StepKind};

use crate::graph::{PipelineGraph, Step};
use crate::probe;
use crate::validation::Issue;

/// Anchor/predicate used to locate steps at apply time. Matches the exact
/// textual predicates the rule engine detects issues with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Probe {
    ImageBuild,
    ImagePush,
    ImagePull,
    ImageLogin,
    ImageUse,
    Checkout,
    TestCommand,
    InstallCommand,
    ArtifactDownload,
    EmptyCommand,
    CheckoutLikeEmpty,
}

impl Probe {
    pub fn matches(&self, step: &Step) -> bool {
        match self {
            Probe::ImageBuild => probe::is_image_build(step),
            Probe::ImagePush => probe::is_image_push(step),
            Probe::ImagePull => probe::is_image_pull(step),
            Probe::ImageLogin => probe::is_image_login(step),
            Probe::ImageUse => probe::is_image_use(step),
            Probe::Checkout => step.kind == StepKind::Checkout,
            Probe::TestCommand => probe::is_test_command(step),
            Probe::InstallCommand => probe::is_install_command(step),
            Probe::ArtifactDownload => probe::is_artifact_download(step),
            Probe::EmptyCommand => probe::is_empty_command(step),
            Probe::CheckoutLikeEmpty => {
                probe::is_empty_command(step) && probe::has_checkout_like_name(step)
            }
        }
    }

    pub fn position(&self, steps: &[Step]) -> Option<usize> {
        steps.iter().position(|s| self.matches(s))
    }
}

/// Where an inserted step lands when its anchor cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fallback {
    Front,
    End,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    Front,
    End,
    Before { anchor: Probe, fallback: Fallback },
    After { anchor: Probe, fallback: Fallback },
}

/// One remediation descriptor attached to an [`Issue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FixAction {
    /// Convert the first empty checkout-like step to the given kind.
    ConvertStepKind { job_id: JobId, into: StepKind },
    /// Delete the first step with an empty payload.
    DeleteStep { job_id: JobId },
    /// Insert a step at the given placement, unless `skip_if` already matches
    /// some step of the job.
    InsertStep {
        job_id: JobId,
        step: Step,
        placement: Placement,
        skip_if: Option<Probe>,
    },
    /// Move the first `moving` step to sit before the first `before` step.
    ReorderStep {
        job_id: JobId,
        moving: Probe,
        before: Probe,
    },
    /// Remove the job's matrix specification.
    ClearMatrix { job_id: JobId },
    /// Advisory only: the user must draw a dependency edge from a test job.
    /// Never applied automatically.
    ConnectTestJob { job_id: JobId },
}

impl FixAction {
    pub fn job_id(&self) -> &JobId {
        match self {
            FixAction::ConvertStepKind { job_id, .. }
            | FixAction::DeleteStep { job_id }
            | FixAction::InsertStep { job_id, .. }
            | FixAction::ReorderStep { job_id, .. }
            | FixAction::ClearMatrix { job_id }
            | FixAction::ConnectTestJob { job_id } => job_id,
        }
    }
}

// Step payloads the rules hand out with their fixes. Secret references are
// opaque substitution tokens, passed through untouched.

pub(crate) fn docker_login_step() -> Step {
    Step::run(
        "Docker Login",
        "echo \"${{ secrets.DOCKER_PASSWORD }}\" | docker login -u \"${{ secrets.DOCKER_USERNAME }}\" --password-stdin",
    )
}

pub(crate) fn docker_push_step() -> Step {
    Step::run(
        "Push Docker Image",
        "docker push ${{ secrets.DOCKER_USERNAME }}/myapp:${{ github.sha }}",
    )
}

pub(crate) fn docker_pull_step() -> Step {
    Step::run(
        "Pull Docker Image",
        "docker pull ${{ secrets.DOCKER_USERNAME }}/myapp:${{ github.sha }}",
    )
}

pub(crate) fn artifact_download_step() -> Step {
    Step::action("Download Artifacts", "actions/download-artifact@v3")
}

pub(crate) fn install_step(command: &str) -> Step {
    Step::run("Install Dependencies", command)
}

/// Apply the remediation attached to `issue`. Returns `true` iff the graph
/// changed. Issues without an applicable remediation are a silent no-op.
pub fn apply_fix(graph: &mut PipelineGraph, issue: &Issue) -> bool {
    let Some(action) = &issue.fix else {
        return false;
    };
    if !issue.auto_fixable {
        return false;
    }
    apply_action(graph, action)
}

/// Apply a single remediation descriptor. Returns `true` iff the graph changed.
pub fn apply_action(graph: &mut PipelineGraph, action: &FixAction) -> bool {
    let Some(job) = graph.job_mut(action.job_id()) else {
        return false;
    };

    let changed = match action {
        FixAction::ConvertStepKind { into, .. } => {
            match Probe::CheckoutLikeEmpty.position(&job.steps) {
                Some(index) => {
                    let step = &mut job.steps[index];
                    step.kind = *into;
                    if *into == StepKind::Checkout {
                        step.name = "Checkout Code".into();
                        step.value.clear();
                    }
                    true
                }
                None => false,
            }
        }

        FixAction::DeleteStep { .. } => match Probe::EmptyCommand.position(&job.steps) {
            Some(index) => {
                job.steps.remove(index);
                true
            }
            None => false,
        },

        FixAction::InsertStep {
            step,
            placement,
            skip_if,
            ..
        } => {
            if skip_if
                .as_ref()
                .is_some_and(|probe| probe.position(&job.steps).is_some())
            {
                false
            } else {
                let index = match placement {
                    Placement::Front => Some(0),
                    Placement::End => Some(job.steps.len()),
                    Placement::Before { anchor, fallback } => anchor
                        .position(&job.steps)
                        .or(match fallback {
                            Fallback::Front => Some(0),
                            Fallback::End => Some(job.steps.len()),
                            Fallback::Skip => None,
                        }),
                    Placement::After { anchor, fallback } => anchor
                        .position(&job.steps)
                        .map(|i| i + 1)
                        .or(match fallback {
                            Fallback::Front => Some(0),
                            Fallback::End => Some(job.steps.len()),
                            Fallback::Skip => None,
                        }),
                };
                match index {
                    Some(index) => {
                        job.steps.insert(index, step.clone());
                        true
                    }
                    None => false,
                }
            }
        }

        FixAction::ReorderStep { moving, before, .. } => {
            match (moving.position(&job.steps), before.position(&job.steps)) {
                (Some(from), Some(to)) if from > to => {
                    let step = job.steps.remove(from);
                    job.steps.insert(to, step);
                    true
                }
                _ => false,
            }
        }

        FixAction::ClearMatrix { .. } => {
            if job.matrix.is_some() {
                job.matrix = None;
                true
            } else {
                false
            }
        }

        FixAction::ConnectTestJob { .. } => false,
    };

    if changed {
        tracing::debug!(job = %action.job_id(), ?action, "remediation applied");
    }
    changed
}

/// Repeatedly validate and apply auto-fixable remediations until the issue
/// set is clean of them. Returns how many fixes were applied. Bounded so a
/// misbehaving rule/fix pair cannot loop forever.
pub fn apply_all_fixes(graph: &mut PipelineGraph) -> usize {
    let mut applied = 0;
    for _ in 0..64 {
        let issues = crate::validation::validate(graph);
        let mut progressed = false;
        for issue in issues.iter().filter(|i| i.auto_fixable) {
            if apply_fix(graph, issue) {
                applied += 1;
                progressed = true;
                break;
            }
        }
        if !progressed {
            break;
        }
    }
    applied
}
