//! GitHub Actions dialect: one workflow document with a `jobs` map.
//!
//! Steps keep their three distinct shapes (`uses: actions/checkout@v3`,
//! `uses: <action>`, `run: <command>`), the matrix stays one multi-key
//! mapping under `strategy`, artifacts become a trailing upload step, and
//! retry becomes `continue-on-error` plus a marker step exporting the
//! attempt count.

use indexmap::IndexMap;
use serde::Serialize;

use railyard_types::StepKind;

use crate::graph::{Job, PipelineGraph};
use crate::ordering::ordered_jobs;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    pub name: String,
    pub on: Triggers,
    pub jobs: IndexMap<String, WorkflowJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Triggers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<BranchFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<BranchFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchFilter {
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowJob {
    /// External reference: the whole job is an included reusable workflow.
    External { uses: String },
    Standard(Box<StandardJob>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardJob {
    pub name: String,
    #[serde(rename = "runs-on")]
    pub runs_on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, String>>,
    pub steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(rename = "continue-on-error", skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub matrix: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<UploadSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSpec {
    pub name: String,
    pub path: String,
}

impl WorkflowStep {
    fn uses(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses: Some(reference.into()),
            run: None,
            with: None,
        }
    }

    fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses: None,
            run: Some(command.into()),
            with: None,
        }
    }
}

pub fn compile(graph: &PipelineGraph) -> Workflow {
    let settings = graph.settings();

    let mut on = Triggers::default();
    if settings.on_push {
        on.push = Some(BranchFilter {
            branches: vec![settings.branch.clone()],
        });
    }
    if settings.on_pull_request {
        on.pull_request = Some(BranchFilter {
            branches: vec![settings.branch.clone()],
        });
    }

    let mut jobs = IndexMap::new();
    for job in ordered_jobs(graph) {
        let compiled = if job.external {
            WorkflowJob::External {
                uses: job.external_path.clone(),
            }
        } else {
            WorkflowJob::Standard(Box::new(compile_job(graph, job)))
        };
        jobs.insert(job.slug.clone(), compiled);
    }

    Workflow {
        name: "Pipeline".into(),
        on,
        jobs,
    }
}

fn compile_job(graph: &PipelineGraph, job: &Job) -> StandardJob {
    let strategy = job.matrix.as_ref().map(|matrix| Strategy {
        matrix: matrix.clone(),
    });

    let env: IndexMap<String, String> = job
        .env
        .iter()
        .filter(|e| !e.key.is_empty())
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect();

    let mut steps: Vec<WorkflowStep> = job
        .steps
        .iter()
        .map(|step| match step.kind {
            StepKind::Checkout => WorkflowStep::uses(step.name.clone(), "actions/checkout@v3"),
            StepKind::Action => WorkflowStep::uses(step.name.clone(), step.value.clone()),
            StepKind::Run => WorkflowStep::run(step.name.clone(), step.value.clone()),
        })
        .collect();

    if !job.artifacts.is_empty() {
        steps.push(WorkflowStep {
            name: "Upload Artifacts".into(),
            uses: Some("actions/upload-artifact@v3".into()),
            run: None,
            with: Some(UploadSpec {
                name: format!("{}-artifacts", job.slug),
                path: job.artifacts.join("\n"),
            }),
        });
    }

    let needs: Vec<String> = graph
        .predecessors(&job.id)
        .iter()
        .map(|p| p.slug.clone())
        .collect();

    let mut compiled = StandardJob {
        name: job.name.clone(),
        runs_on: job.runner.clone(),
        strategy,
        env: if env.is_empty() { None } else { Some(env) },
        steps,
        needs,
        continue_on_error: None,
    };

    if let Some(attempts) = job.retry {
        compiled.continue_on_error = Some(true);
        compiled.steps.insert(
            0,
            WorkflowStep::run(
                "Set retry count",
                format!("echo \"RETRY_COUNT={attempts}\" >> $GITHUB_ENV"),
            ),
        );
    }

    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PipelineGraph, Step};
    use railyard_types::Dialect;

    fn sample_graph() -> (PipelineGraph, String, String) {
        let mut graph = PipelineGraph::new();
        let build = graph.add_job();
        let test = graph.add_job();
        graph.set_job_name(&build, "Build");
        graph.set_job_name(&test, "Test");
        graph.set_job_position(&build, 0.0, 0.0);
        graph.set_job_position(&test, 0.0, 100.0);
        graph.push_step(&build, Step::run("Compile", "make"));
        graph.push_step(&test, Step::run("Run Tests", "npm test"));
        graph.add_edge(&build, &test);
        (graph, build, test)
    }

    #[test]
    fn triggers_follow_settings() {
        let (mut graph, _, _) = sample_graph();
        graph.set_branch("develop");
        graph.set_triggers(true, true);
        let workflow = compile(&graph);
        assert_eq!(workflow.on.push.as_ref().unwrap().branches, vec!["develop"]);
        assert_eq!(
            workflow.on.pull_request.as_ref().unwrap().branches,
            vec!["develop"]
        );

        graph.set_triggers(false, true);
        let workflow = compile(&graph);
        assert!(workflow.on.push.is_none());
    }

    #[test]
    fn dependencies_become_needs() {
        let (graph, _, _) = sample_graph();
        let workflow = compile(&graph);
        let WorkflowJob::Standard(test) = &workflow.jobs["test"] else {
            panic!("expected standard job");
        };
        assert_eq!(test.needs, vec!["build"]);
        let WorkflowJob::Standard(build) = &workflow.jobs["build"] else {
            panic!("expected standard job");
        };
        assert!(build.needs.is_empty());
    }

    #[test]
    fn step_kinds_take_three_shapes() {
        let mut graph = PipelineGraph::new();
        let id = graph.add_job();
        graph.set_job_name(&id, "Mixed");
        graph.push_step(&id, Step::action("Setup Node.js", "actions/setup-node@v3"));
        graph.push_step(&id, Step::run("Tests", "npm test"));
        let workflow = compile(&graph);
        let WorkflowJob::Standard(job) = &workflow.jobs["mixed"] else {
            panic!("expected standard job");
        };
        assert_eq!(job.steps[0].uses.as_deref(), Some("actions/checkout@v3"));
        assert!(job.steps[0].run.is_none());
        assert_eq!(job.steps[1].uses.as_deref(), Some("actions/setup-node@v3"));
        assert_eq!(job.steps[2].run.as_deref(), Some("npm test"));
        assert!(job.steps[2].uses.is_none());
    }

    #[test]
    fn artifacts_become_trailing_upload_step() {
        let (mut graph, build, _) = sample_graph();
        graph.add_artifact(&build, "dist/**");
        graph.add_artifact(&build, "build/**");
        let workflow = compile(&graph);
        let WorkflowJob::Standard(job) = &workflow.jobs["build"] else {
            panic!("expected standard job");
        };
        let upload = job.steps.last().unwrap();
        assert_eq!(upload.uses.as_deref(), Some("actions/upload-artifact@v3"));
        let with = upload.with.as_ref().unwrap();
        assert_eq!(with.name, "build-artifacts");
        assert_eq!(with.path, "dist/**\nbuild/**");
    }

    #[test]
    fn retry_becomes_continue_on_error_and_marker_step() {
        let (mut graph, build, _) = sample_graph();
        graph.set_retry(&build, 3);
        let workflow = compile(&graph);
        let WorkflowJob::Standard(job) = &workflow.jobs["build"] else {
            panic!("expected standard job");
        };
        assert_eq!(job.continue_on_error, Some(true));
        assert_eq!(job.steps[0].name, "Set retry count");
        assert!(job.steps[0]
            .run
            .as_deref()
            .unwrap()
            .contains("RETRY_COUNT=3"));
    }

    #[test]
    fn matrix_is_one_multi_key_mapping() {
        let (mut graph, build, _) = sample_graph();
        graph.set_matrix(
            &build,
            IndexMap::from([
                ("version".to_string(), vec!["14".to_string(), "16".to_string()]),
                ("os".to_string(), vec!["linux".to_string()]),
            ]),
        );
        let workflow = compile(&graph);
        let WorkflowJob::Standard(job) = &workflow.jobs["build"] else {
            panic!("expected standard job");
        };
        let matrix = &job.strategy.as_ref().unwrap().matrix;
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix["version"], vec!["14", "16"]);
    }

    #[test]
    fn external_job_is_a_bare_include() {
        let mut graph = PipelineGraph::new();
        let id = graph.add_external_job();
        graph.set_job_external_path(&id, "./shared/build.yml");
        let workflow = compile(&graph);
        let job = workflow.jobs.values().next().unwrap();
        assert_eq!(
            job,
            &WorkflowJob::External {
                uses: "./shared/build.yml".into()
            }
        );
    }

    #[test]
    fn env_vars_with_blank_keys_are_dropped() {
        let (mut graph, build, _) = sample_graph();
        graph.add_env_var(&build, "CI", "true");
        graph.add_env_var(&build, "", "ignored");
        let workflow = compile(&graph);
        let WorkflowJob::Standard(job) = &workflow.jobs["build"] else {
            panic!("expected standard job");
        };
        let env = job.env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env["CI"], "true");
    }

    #[test]
    fn yaml_output_uses_dialect_field_names() {
        let (mut graph, build, _) = sample_graph();
        graph.set_retry(&build, 2);
        let yaml = crate::compile::compile(&graph, Dialect::GithubActions)
            .to_yaml()
            .unwrap();
        assert!(yaml.contains("runs-on: ubuntu-latest"));
        assert!(yaml.contains("continue-on-error: true"));
        assert!(yaml.contains("needs:"));
        assert!(yaml.contains("uses: actions/checkout@v3"));
    }
}
