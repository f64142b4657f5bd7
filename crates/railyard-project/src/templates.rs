//! Built-in starter pipelines.
//!
//! Each template is a complete, validation-clean project snapshot that a user
//! can compile immediately and then edit.

use railyard_types::{StepKind, TestCategory};

use crate::snapshot::{EdgeDef, JobDef, ProjectSnapshot, StepDef};

/// Names of the available templates, in presentation order.
pub fn template_names() -> &'static [&'static str] {
    &["node-jest", "python-pytest", "docker-release"]
}

/// Look up a starter template by name.
pub fn template(name: &str) -> Option<ProjectSnapshot> {
    match name {
        "node-jest" => Some(node_jest()),
        "python-pytest" => Some(python_pytest()),
        "docker-release" => Some(docker_release()),
        _ => None,
    }
}

fn checkout() -> StepDef {
    StepDef {
        kind: StepKind::Checkout,
        name: "Checkout Code".into(),
        value: String::new(),
    }
}

fn run(name: &str, command: &str) -> StepDef {
    StepDef {
        kind: StepKind::Run,
        name: name.into(),
        value: command.into(),
    }
}

fn action(name: &str, reference: &str) -> StepDef {
    StepDef {
        kind: StepKind::Action,
        name: name.into(),
        value: reference.into(),
    }
}

fn job(id: &str, name: &str, slug: &str, stage: &str, steps: Vec<StepDef>) -> JobDef {
    JobDef {
        id: id.into(),
        slug: slug.into(),
        name: name.into(),
        runner: "ubuntu-latest".into(),
        stage: stage.into(),
        category: TestCategory::None,
        steps,
        external: false,
        external_path: String::new(),
        env: Vec::new(),
        artifacts: Vec::new(),
        matrix: None,
        retry: None,
        position: (0.0, 0.0),
    }
}

fn edge(from: &str, to: &str) -> EdgeDef {
    EdgeDef {
        from: from.into(),
        to: to.into(),
    }
}

fn place(jobs: &mut [JobDef]) {
    for (i, job) in jobs.iter_mut().enumerate() {
        job.position = (80.0 + 260.0 * (i % 4) as f64, 60.0 + 150.0 * (i / 4) as f64);
    }
}

fn node_jest() -> ProjectSnapshot {
    let mut jobs = vec![
        job(
            "tmpl-node-1",
            "Install Dependencies",
            "install_dependencies",
            "build",
            vec![
                checkout(),
                action("Setup Node.js", "actions/setup-node@v3"),
                run("Cache Dependencies", "npm ci"),
            ],
        ),
        job(
            "tmpl-node-2",
            "Unit Tests",
            "unit_tests",
            "test",
            vec![
                checkout(),
                action("Setup Node.js", "actions/setup-node@v3"),
                run("Install Dependencies", "npm ci"),
                run("Run Unit Tests", "npm test -- --coverage"),
            ],
        ),
        job(
            "tmpl-node-3",
            "Integration Tests",
            "integration_tests",
            "test",
            vec![
                checkout(),
                action("Setup Node.js", "actions/setup-node@v3"),
                run("Install Dependencies", "npm ci"),
                run("Run Integration Tests", "npm run test:integration"),
            ],
        ),
    ];
    jobs[1].category = TestCategory::Unit;
    jobs[1].artifacts = vec!["coverage/**".into()];
    jobs[2].category = TestCategory::Integration;
    place(&mut jobs);

    ProjectSnapshot {
        jobs,
        edges: vec![
            edge("tmpl-node-1", "tmpl-node-2"),
            edge("tmpl-node-1", "tmpl-node-3"),
        ],
        next_id: 4,
        ..ProjectSnapshot::default()
    }
}

fn python_pytest() -> ProjectSnapshot {
    let mut jobs = vec![
        job(
            "tmpl-py-1",
            "Setup Python",
            "setup_python",
            "build",
            vec![
                checkout(),
                action("Setup Python", "actions/setup-python@v4"),
                run("Install Dependencies", "pip install -r requirements.txt"),
            ],
        ),
        job(
            "tmpl-py-2",
            "Run Tests",
            "run_tests",
            "test",
            vec![
                checkout(),
                action("Setup Python", "actions/setup-python@v4"),
                run("Install Dependencies", "pip install -r requirements.txt"),
                run("Run Pytest", "pytest --cov=. --cov-report=xml"),
            ],
        ),
    ];
    jobs[1].category = TestCategory::Unit;
    jobs[1].artifacts = vec!["coverage.xml".into()];
    place(&mut jobs);

    ProjectSnapshot {
        jobs,
        edges: vec![edge("tmpl-py-1", "tmpl-py-2")],
        next_id: 3,
        ..ProjectSnapshot::default()
    }
}

fn docker_release() -> ProjectSnapshot {
    let mut jobs = vec![
        job(
            "tmpl-docker-1",
            "Build Image",
            "build_image",
            "build",
            vec![
                checkout(),
                run(
                    "Docker Login",
                    "echo \"${{ secrets.DOCKER_PASSWORD }}\" | docker login -u \"${{ secrets.DOCKER_USERNAME }}\" --password-stdin",
                ),
                run(
                    "Build Docker Image",
                    "docker build -t ${{ secrets.DOCKER_USERNAME }}/myapp:${{ github.sha }} .",
                ),
                run(
                    "Push Docker Image",
                    "docker push ${{ secrets.DOCKER_USERNAME }}/myapp:${{ github.sha }}",
                ),
            ],
        ),
        job(
            "tmpl-docker-2",
            "Smoke Tests",
            "smoke_tests",
            "test",
            vec![
                checkout(),
                run("Install Dependencies", "npm ci"),
                run("Run Smoke Tests", "npm test"),
            ],
        ),
        job(
            "tmpl-docker-3",
            "Deploy",
            "deploy",
            "deploy",
            vec![
                checkout(),
                run(
                    "Roll Out",
                    "kubectl set image deployment/myapp myapp=${{ secrets.DOCKER_USERNAME }}/myapp:${{ github.sha }}",
                ),
            ],
        ),
    ];
    jobs[1].category = TestCategory::Unit;
    place(&mut jobs);

    ProjectSnapshot {
        jobs,
        edges: vec![
            edge("tmpl-docker-1", "tmpl-docker-2"),
            edge("tmpl-docker-2", "tmpl-docker-3"),
        ],
        next_id: 4,
        ..ProjectSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_resolve() {
        for name in template_names() {
            let snap = template(name).unwrap();
            assert!(!snap.jobs.is_empty(), "template {name} has no jobs");
        }
        assert!(template("no-such-template").is_none());
    }

    #[test]
    fn template_edges_reference_existing_jobs() {
        for name in template_names() {
            let snap = template(name).unwrap();
            for edge in &snap.edges {
                assert!(snap.jobs.iter().any(|j| j.id == edge.from));
                assert!(snap.jobs.iter().any(|j| j.id == edge.to));
            }
        }
    }

    #[test]
    fn template_stages_exist() {
        for name in template_names() {
            let snap = template(name).unwrap();
            for job in &snap.jobs {
                assert!(
                    snap.pipeline.stages.contains(&job.stage),
                    "job {} in template {name} uses unknown stage {}",
                    job.slug,
                    job.stage
                );
            }
        }
    }
}
