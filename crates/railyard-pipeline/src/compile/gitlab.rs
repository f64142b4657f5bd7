//! GitLab CI dialect: a flat document keyed by job identifier plus a
//! `stages` header.
//!
//! GitLab has no first-class checkout (the runner clones implicitly) and no
//! reusable-action construct, so checkout steps vanish and action steps
//! degrade to a commented placeholder inside one flat `script` list. The
//! matrix becomes `parallel.matrix` as a list of single-key mappings, and
//! retry is a native field.

use indexmap::IndexMap;
use serde::Serialize;

use railyard_types::StepKind;

use crate::graph::{Job, PipelineGraph};
use crate::ordering::ordered_jobs;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GitlabConfig {
    pub stages: Vec<String>,
    #[serde(flatten)]
    pub jobs: IndexMap<String, GitlabJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GitlabJob {
    /// External reference: a trigger that includes another pipeline file.
    External { stage: String, trigger: Trigger },
    Standard(Box<StandardJob>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub include: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardJob {
    pub stage: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Parallel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<IndexMap<String, String>>,
    pub script: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parallel {
    /// One single-key mapping per matrix variable.
    pub matrix: Vec<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifacts {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleClause {
    #[serde(rename = "if")]
    pub when: String,
}

/// Map the execution environment onto a container image reference.
fn image_for(runner: &str) -> String {
    if runner == "ubuntu-latest" {
        "ubuntu:latest".to_string()
    } else if runner.contains(':') {
        runner.to_string()
    } else {
        "node:latest".to_string()
    }
}

pub fn compile(graph: &PipelineGraph) -> GitlabConfig {
    let mut jobs = IndexMap::new();
    for job in ordered_jobs(graph) {
        let compiled = if job.external {
            GitlabJob::External {
                stage: job.stage.clone(),
                trigger: Trigger {
                    include: job.external_path.clone(),
                },
            }
        } else {
            GitlabJob::Standard(Box::new(compile_job(graph, job)))
        };
        jobs.insert(job.slug.clone(), compiled);
    }

    GitlabConfig {
        stages: graph.settings().stages.clone(),
        jobs,
    }
}

fn compile_job(graph: &PipelineGraph, job: &Job) -> StandardJob {
    let settings = graph.settings();

    let parallel = job.matrix.as_ref().map(|matrix| Parallel {
        matrix: matrix
            .iter()
            .map(|(key, values)| IndexMap::from([(key.clone(), values.clone())]))
            .collect(),
    });

    let variables: IndexMap<String, String> = job
        .env
        .iter()
        .filter(|e| !e.key.is_empty())
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect();

    let mut script: Vec<String> = job
        .steps
        .iter()
        .filter_map(|step| match step.kind {
            // The runner clones the repository implicitly.
            StepKind::Checkout => None,
            StepKind::Action => Some(format!("# Plugin: {}", step.value)),
            StepKind::Run => Some(step.value.clone()),
        })
        .collect();
    if script.is_empty() {
        script.push("echo 'Done'".to_string());
    }

    let needs: Vec<String> = graph
        .predecessors(&job.id)
        .iter()
        .map(|p| p.slug.clone())
        .collect();

    // Branch filtering only has a job-level shape: emit a rules clause when
    // the pipeline runs on pushes alone.
    let rules = if settings.on_push && !settings.on_pull_request {
        vec![RuleClause {
            when: format!("$CI_COMMIT_BRANCH == \"{}\"", settings.branch),
        }]
    } else {
        vec![]
    };

    StandardJob {
        stage: job.stage.clone(),
        image: image_for(&job.runner),
        parallel,
        variables: if variables.is_empty() {
            None
        } else {
            Some(variables)
        },
        script,
        artifacts: if job.artifacts.is_empty() {
            None
        } else {
            Some(Artifacts {
                paths: job.artifacts.clone(),
            })
        },
        needs,
        retry: job.retry,
        rules,
    }
}
