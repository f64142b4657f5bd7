//! End-to-end passes over the core: validate, fix, re-validate, compile both
//! dialects, and check the dialects agree after decoding.

use pretty_assertions::assert_eq;

use railyard_pipeline::compile::github::{self, WorkflowJob};
use railyard_pipeline::compile::gitlab::{self, GitlabJob};
use railyard_pipeline::{
    apply_all_fixes, apply_fix, compile, execution_order, validate, CompiledDocument, Dialect,
    ExecutionOrder, PipelineGraph, Severity, Step,
};

fn named_job(graph: &mut PipelineGraph, name: &str, y: f64) -> String {
    let id = graph.add_job();
    graph.set_job_name(&id, name);
    graph.set_job_position(&id, 0.0, y);
    id
}

// ---------------------------------------------------------------------------
// Scenario A: duplicate short identifiers
// ---------------------------------------------------------------------------

#[test]
fn duplicate_slugs_are_detected_not_prevented() {
    let mut graph = PipelineGraph::new();
    let a = named_job(&mut graph, "Build", 0.0);
    let b = named_job(&mut graph, "build", 100.0);
    let c = named_job(&mut graph, "Test", 200.0);
    graph.push_step(&a, Step::run("Compile", "make"));
    graph.push_step(&b, Step::run("Compile", "make"));
    graph.push_step(&c, Step::run("Tests", "npm ci && npm test"));
    graph.add_edge(&a, &c);

    let issues = validate(&graph);
    let dup = issues
        .iter()
        .find(|i| i.title.contains("Duplicate job identifier \"build\""))
        .expect("duplicate-slug issue");
    assert_eq!(dup.severity, Severity::Error);
    assert_eq!(dup.detail.matches("uild").count(), 2, "both members cited");
}

// ---------------------------------------------------------------------------
// Scenario B: missing login before push, fixed automatically
// ---------------------------------------------------------------------------

#[test]
fn missing_login_is_fixed_at_index_zero_and_clears() {
    let mut graph = PipelineGraph::new();
    let id = named_job(&mut graph, "Release Image", 0.0);
    graph.set_job_steps(
        &id,
        vec![
            Step::run("Build Image", "docker build -t app ."),
            Step::run("Push Image", "docker push app"),
        ],
    );

    let issues = validate(&graph);
    let login = issues
        .iter()
        .find(|i| i.title.contains("Missing registry login"))
        .expect("login issue");
    assert!(login.auto_fixable);

    assert!(apply_fix(&mut graph, login));
    let steps = &graph.job(&id).unwrap().steps;
    assert!(steps[0].value.contains("docker login"), "login is first");
    assert_eq!(steps.len(), 3);

    let issues = validate(&graph);
    assert!(
        !issues.iter().any(|i| i.title.contains("registry login")),
        "issue gone after re-validation"
    );

    // Re-applying the same remediation is a no-op.
    assert!(!apply_fix(&mut graph, login));
    assert_eq!(graph.job(&id).unwrap().steps.len(), 3);
}

// ---------------------------------------------------------------------------
// Scenario C: one cycle, reported once
// ---------------------------------------------------------------------------

#[test]
fn three_job_cycle_reported_exactly_once() {
    let mut graph = PipelineGraph::new();
    let a = named_job(&mut graph, "A", 0.0);
    let b = named_job(&mut graph, "B", 100.0);
    let c = named_job(&mut graph, "C", 200.0);
    graph.add_edge(&a, &b);
    graph.add_edge(&b, &c);
    graph.add_edge(&c, &a);

    let ExecutionOrder::Cycle(cycle) = execution_order(&graph) else {
        panic!("expected a cycle");
    };
    assert_eq!(cycle.len(), 4);
    assert_eq!(cycle.first(), cycle.last());
    let mut members = cycle[..3].to_vec();
    members.sort();
    assert_eq!(members, vec!["A", "B", "C"]);

    let issues = validate(&graph);
    let cycle_issues: Vec<_> = issues
        .iter()
        .filter(|i| i.title.contains("Circular dependency"))
        .collect();
    assert_eq!(cycle_issues.len(), 1, "rotations are not separate findings");
}

// ---------------------------------------------------------------------------
// Scenario D: unused matrix cleared by its remediation
// ---------------------------------------------------------------------------

#[test]
fn unused_matrix_warning_and_clear() {
    let mut graph = PipelineGraph::new();
    let id = named_job(&mut graph, "Tests", 0.0);
    graph.push_step(&id, Step::run("Install", "npm ci"));
    graph.push_step(&id, Step::run("Run Tests", "npm test"));
    graph.set_matrix(
        &id,
        indexmap::IndexMap::from([(
            "version".to_string(),
            vec!["14".to_string(), "16".to_string(), "18".to_string()],
        )]),
    );

    let issues = validate(&graph);
    let matrix = issues
        .iter()
        .find(|i| i.title.contains("Unused matrix"))
        .expect("matrix issue");
    assert_eq!(matrix.severity, Severity::Warning);

    assert!(apply_fix(&mut graph, matrix));
    assert!(graph.job(&id).unwrap().matrix.is_none());

    let issues = validate(&graph);
    assert!(!issues.iter().any(|i| i.title.contains("matrix")));
}

// ---------------------------------------------------------------------------
// Scenario E: empty graph
// ---------------------------------------------------------------------------

#[test]
fn empty_graph_validates_and_compiles() {
    let graph = PipelineGraph::new();

    let issues = validate(&graph);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Info);

    for dialect in [Dialect::GithubActions, Dialect::GitlabCi] {
        let yaml = compile(&graph, dialect).to_yaml().unwrap();
        assert!(!yaml.trim().is_empty());
        // The document parses back as YAML.
        let _: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Fix loop drains every automatic remediation
// ---------------------------------------------------------------------------

#[test]
fn fix_loop_converges_on_a_messy_pipeline() {
    let mut graph = PipelineGraph::new();
    let build = named_job(&mut graph, "Build Image", 0.0);
    let scan = named_job(&mut graph, "Scan Image", 100.0);
    let test = named_job(&mut graph, "Unit Tests", 200.0);
    graph.set_job_steps(
        &build,
        vec![Step::run("Build", "docker build -t app .")],
    );
    graph.set_job_steps(&scan, vec![Step::run("Scan", "docker scan app")]);
    graph.set_job_steps(
        &test,
        vec![
            Step::run("Checkout code", ""),
            Step::run("Run Tests", "npm test"),
            Step::run("Install", "npm ci"),
        ],
    );
    graph.add_edge(&build, &scan);
    graph.add_edge(&build, &test);

    let applied = apply_all_fixes(&mut graph);
    assert!(applied >= 4, "expected several fixes, applied {applied}");

    let remaining: Vec<_> = validate(&graph)
        .into_iter()
        .filter(|i| i.auto_fixable)
        .collect();
    assert!(remaining.is_empty(), "left fixable issues: {remaining:?}");

    // The fixes composed correctly.
    let build_steps = &graph.job(&build).unwrap().steps;
    assert!(build_steps.iter().any(|s| s.value.contains("docker push")));
    assert!(build_steps[0].value.contains("docker login"));
    let scan_steps = &graph.job(&scan).unwrap().steps;
    let pull = scan_steps.iter().position(|s| s.value.contains("docker pull"));
    let use_idx = scan_steps.iter().position(|s| s.value.contains("docker scan"));
    assert!(pull.unwrap() < use_idx.unwrap());
    let test_steps = &graph.job(&test).unwrap().steps;
    assert_eq!(test_steps[0].kind, railyard_pipeline::StepKind::Checkout);
    let install = test_steps.iter().position(|s| s.value.contains("npm ci"));
    let run = test_steps.iter().position(|s| s.value.contains("npm test"));
    assert!(install.unwrap() < run.unwrap());
}

// ---------------------------------------------------------------------------
// Dialect equivalence
// ---------------------------------------------------------------------------

fn rich_graph() -> PipelineGraph {
    let mut graph = PipelineGraph::new();
    let build = named_job(&mut graph, "Build", 0.0);
    let test = named_job(&mut graph, "Test", 100.0);
    let deploy = named_job(&mut graph, "Deploy", 200.0);
    let external = graph.add_external_job();
    graph.set_job_position(&external, 0.0, 300.0);

    graph.push_step(&build, Step::run("Compile", "make"));
    graph.add_artifact(&build, "dist/**");

    graph.set_job_stage(&test, "test");
    graph.set_job_category(&test, railyard_pipeline::TestCategory::Unit);
    graph.push_step(&test, Step::action("Download Artifacts", "actions/download-artifact@v3"));
    graph.push_step(&test, Step::run("Install", "npm ci"));
    graph.push_step(&test, Step::run("Run Tests", "npm test -- --node=${{ matrix.version }}"));
    graph.set_matrix(
        &test,
        indexmap::IndexMap::from([
            ("version".to_string(), vec!["14".to_string(), "16".to_string(), "18".to_string()]),
            ("flavor".to_string(), vec!["lts".to_string(), "current".to_string()]),
        ]),
    );
    graph.set_retry(&test, 2);
    graph.add_env_var(&test, "CI", "true");
    graph.add_artifact(&test, "coverage/**");

    graph.set_job_stage(&deploy, "deploy");
    graph.push_step(
        &deploy,
        Step::run("Roll Out", "kubectl set image deployment/app app=app:${{ github.sha }}"),
    );

    graph.add_edge(&build, &test);
    graph.add_edge(&test, &deploy);
    graph.add_edge(&build, &external);
    graph
}

/// Decode a compiled GitHub document into a dialect-neutral view.
fn decode_github(
    workflow: &github::Workflow,
) -> (
    Vec<(String, String)>,
    Vec<(String, usize, Vec<String>, usize, Option<u32>)>,
) {
    let mut edges = Vec::new();
    let mut jobs = Vec::new();
    for (slug, job) in &workflow.jobs {
        let WorkflowJob::Standard(job) = job else {
            continue;
        };
        for need in &job.needs {
            edges.push((need.clone(), slug.clone()));
        }
        let mut artifacts = Vec::new();
        let mut retry = None;
        let mut steps = 0usize;
        for step in &job.steps {
            if step.uses.as_deref() == Some("actions/checkout@v3") {
                continue;
            }
            if step.uses.as_deref() == Some("actions/upload-artifact@v3") {
                if let Some(with) = &step.with {
                    artifacts.extend(with.path.lines().map(String::from));
                }
                continue;
            }
            if let Some(run) = &step.run {
                if let Some(rest) = run.strip_prefix("echo \"RETRY_COUNT=") {
                    retry = rest
                        .split('"')
                        .next()
                        .and_then(|n| n.parse::<u32>().ok());
                    continue;
                }
            }
            steps += 1;
        }
        let cardinality = job
            .strategy
            .as_ref()
            .map(|s| s.matrix.values().map(Vec::len).product())
            .unwrap_or(1);
        jobs.push((slug.clone(), steps, artifacts, cardinality, retry));
    }
    (edges, jobs)
}

/// Decode a compiled GitLab document into the same dialect-neutral view.
fn decode_gitlab(
    config: &gitlab::GitlabConfig,
) -> (
    Vec<(String, String)>,
    Vec<(String, usize, Vec<String>, usize, Option<u32>)>,
) {
    let mut edges = Vec::new();
    let mut jobs = Vec::new();
    for (slug, job) in &config.jobs {
        let GitlabJob::Standard(job) = job else {
            continue;
        };
        for need in &job.needs {
            edges.push((need.clone(), slug.clone()));
        }
        let steps = job
            .script
            .iter()
            .filter(|line| line.as_str() != "echo 'Done'")
            .count();
        let artifacts = job
            .artifacts
            .as_ref()
            .map(|a| a.paths.clone())
            .unwrap_or_default();
        let cardinality = job
            .parallel
            .as_ref()
            .map(|p| {
                p.matrix
                    .iter()
                    .flat_map(|entry| entry.values())
                    .map(Vec::len)
                    .product()
            })
            .unwrap_or(1);
        jobs.push((slug.clone(), steps, artifacts, cardinality, job.retry));
    }
    (edges, jobs)
}

#[test]
fn both_dialects_preserve_the_same_pipeline() {
    let graph = rich_graph();

    let CompiledDocument::Github(workflow) = compile(&graph, Dialect::GithubActions) else {
        panic!("expected github document");
    };
    let CompiledDocument::Gitlab(config) = compile(&graph, Dialect::GitlabCi) else {
        panic!("expected gitlab document");
    };

    let (mut gh_edges, gh_jobs) = decode_github(&workflow);
    let (mut gl_edges, gl_jobs) = decode_gitlab(&config);
    gh_edges.sort();
    gl_edges.sort();
    assert_eq!(gh_edges, gl_edges);
    assert_eq!(gh_jobs, gl_jobs);

    // External jobs render as includes in both dialects.
    let external_slug = graph
        .jobs()
        .iter()
        .find(|j| j.external)
        .map(|j| j.slug.clone())
        .unwrap();
    assert!(matches!(
        workflow.jobs[&external_slug],
        WorkflowJob::External { .. }
    ));
    assert!(matches!(
        config.jobs[&external_slug],
        GitlabJob::External { .. }
    ));
}

#[test]
fn compiled_jobs_come_out_in_execution_order() {
    let graph = rich_graph();
    let ExecutionOrder::Ordered(order) = execution_order(&graph) else {
        panic!("expected a DAG");
    };
    let expected: Vec<String> = order
        .iter()
        .filter_map(|id| graph.job(id))
        .map(|j| j.slug.clone())
        .collect();

    let CompiledDocument::Github(workflow) = compile(&graph, Dialect::GithubActions) else {
        panic!("expected github document");
    };
    let slugs: Vec<String> = workflow.jobs.keys().cloned().collect();
    assert_eq!(slugs, expected);
}

// ---------------------------------------------------------------------------
// Round trip: compiled documents import back losslessly enough
// ---------------------------------------------------------------------------

#[test]
fn compiled_documents_survive_reimport() {
    let graph = rich_graph();

    // Edges into external jobs are not expressible in either dialect (an
    // include has no `needs`), so only edges between standard jobs round-trip.
    let expressible_edges = graph
        .edges()
        .iter()
        .filter(|e| {
            graph.job(&e.from).is_some_and(|j| !j.external)
                && graph.job(&e.to).is_some_and(|j| !j.external)
        })
        .count();

    for dialect in [Dialect::GithubActions, Dialect::GitlabCi] {
        let yaml = compile(&graph, dialect).to_yaml().unwrap();
        let snapshot = railyard_project::import_yaml(&yaml)
            .unwrap_or_else(|e| panic!("reimport of {dialect} failed: {e}"));
        assert_eq!(snapshot.dialect, dialect);

        let reimported = PipelineGraph::from_snapshot(&snapshot);
        assert_eq!(reimported.jobs().len(), graph.jobs().len());
        assert_eq!(reimported.edges().len(), expressible_edges);

        // Recompiling the reimported graph preserves dependency identity.
        let recompiled = compile(&reimported, dialect).to_yaml().unwrap();
        let reimported_again = railyard_project::import_yaml(&recompiled).unwrap();
        assert_eq!(reimported_again.jobs.len(), snapshot.jobs.len());
        assert_eq!(reimported_again.edges.len(), snapshot.edges.len());
    }
}

// ---------------------------------------------------------------------------
// Snapshot pass-through keeps validation stable
// ---------------------------------------------------------------------------

#[test]
fn issue_set_is_stable_across_snapshot_round_trip() {
    let graph = rich_graph();
    let before = validate(&graph);

    let restored = PipelineGraph::from_snapshot(&graph.to_snapshot());
    let after = validate(&restored);

    assert_eq!(before, after);
}
