//! Import a hand-written CI configuration document into a project snapshot.
//!
//! Accepts either dialect. The dialect is sniffed from the document shape:
//! a top-level `stages` list, a top-level `image`, or per-job `stage` keys
//! mean GitLab CI; anything else is treated as a GitHub Actions workflow.
//!
//! Import is lossy where the dialects themselves are lossy (GitLab has no
//! first-class checkout or action steps), but preserves dependency edges and
//! step semantics so that recompiling reproduces an equivalent pipeline.

use indexmap::IndexMap;
use serde_yaml::Value;

use railyard_types::{Dialect, RailyardError, Result, StepKind};

use crate::snapshot::{EdgeDef, EnvVarDef, JobDef, ProjectSnapshot, StepDef};

/// Top-level GitLab keys that are configuration, not job definitions.
const RESERVED_KEYS: &[&str] = &[
    "stages",
    "variables",
    "on",
    "name",
    "workflow",
    "default",
    "image",
    "include",
    "before_script",
    "after_script",
];

/// Parse a pipeline document of either dialect into a [`ProjectSnapshot`].
pub fn import_yaml(source: &str) -> Result<ProjectSnapshot> {
    let doc: Value = serde_yaml::from_str(source)?;
    let root = doc
        .as_mapping()
        .ok_or_else(|| RailyardError::Import("document is not a mapping".into()))?;

    let dialect = sniff_dialect(root);
    let mut snap = ProjectSnapshot {
        dialect,
        ..ProjectSnapshot::default()
    };

    if let Some(stages) = root.get("stages").and_then(Value::as_sequence) {
        let stages: Vec<String> = stages
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        if !stages.is_empty() {
            snap.pipeline.stages = stages;
        }
    }

    if dialect == Dialect::GithubActions {
        import_github_triggers(root, &mut snap);
    }

    let entries = job_entries(root, dialect);
    let mut slug_to_id: IndexMap<String, String> = IndexMap::new();

    let mut x = 50.0;
    let mut y = 50.0;
    for (idx, (key, value)) in entries.iter().enumerate() {
        let id = format!("job-{}", idx + 1);
        let mut job = import_job(key, value, &snap, &id)?;
        job.position = (x, y);
        x += 260.0;
        if x > 1000.0 {
            x = 50.0;
            y += 150.0;
        }
        slug_to_id.insert(key.clone(), id);
        snap.jobs.push(job);
    }

    // Dependencies: `needs` lists reference other jobs by key.
    for (key, value) in &entries {
        let Some(needs) = value.get("needs") else {
            continue;
        };
        let parents: Vec<&str> = match needs {
            Value::String(s) => vec![s.as_str()],
            Value::Sequence(seq) => seq.iter().filter_map(Value::as_str).collect(),
            _ => vec![],
        };
        let Some(to) = slug_to_id.get(key.as_str()) else {
            continue;
        };
        for parent in parents {
            if let Some(from) = slug_to_id.get(parent) {
                snap.edges.push(EdgeDef {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
    }

    snap.next_id = snap.jobs.len() as u32 + 1;
    tracing::info!(
        dialect = %dialect,
        jobs = snap.jobs.len(),
        edges = snap.edges.len(),
        "imported pipeline document"
    );
    Ok(snap)
}

fn sniff_dialect(root: &serde_yaml::Mapping) -> Dialect {
    if root.get("stages").is_some() || root.get("image").is_some() {
        return Dialect::GitlabCi;
    }
    let per_job_stage = root
        .iter()
        .any(|(_, v)| v.as_mapping().is_some_and(|m| m.get("stage").is_some()));
    if per_job_stage {
        Dialect::GitlabCi
    } else {
        Dialect::GithubActions
    }
}

fn job_entries(root: &serde_yaml::Mapping, dialect: Dialect) -> Vec<(String, Value)> {
    let source: Vec<(String, Value)> = match dialect {
        Dialect::GithubActions => {
            if let Some(jobs) = root.get("jobs").and_then(Value::as_mapping) {
                jobs.iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect()
            } else {
                root.iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect()
            }
        }
        Dialect::GitlabCi => root
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
            .collect(),
    };

    source
        .into_iter()
        .filter(|(k, v)| {
            !RESERVED_KEYS.contains(&k.as_str())
                && (v.is_mapping() || v.is_string())
        })
        .collect()
}

fn import_github_triggers(root: &serde_yaml::Mapping, snap: &mut ProjectSnapshot) {
    let Some(on) = root.get("on").and_then(Value::as_mapping) else {
        return;
    };
    snap.pipeline.on_push = on.get("push").is_some();
    snap.pipeline.on_pull_request = on.get("pull_request").is_some();
    for trigger in ["push", "pull_request"] {
        let branch = on
            .get(trigger)
            .and_then(|t| t.get("branches"))
            .and_then(Value::as_sequence)
            .and_then(|b| b.first())
            .and_then(Value::as_str);
        if let Some(branch) = branch {
            snap.pipeline.branch = branch.to_string();
            break;
        }
    }
}

fn import_job(key: &str, value: &Value, snap: &ProjectSnapshot, id: &str) -> Result<JobDef> {
    let first_stage = snap.pipeline.stages[0].clone();
    let mut job = JobDef {
        id: id.to_string(),
        slug: key.to_string(),
        name: key.to_string(),
        runner: "ubuntu-latest".to_string(),
        stage: first_stage,
        category: railyard_types::TestCategory::None,
        steps: Vec::new(),
        external: false,
        external_path: String::new(),
        env: Vec::new(),
        artifacts: Vec::new(),
        matrix: None,
        retry: None,
        position: (0.0, 0.0),
    };

    // A bare string is an external include (reusable workflow shorthand).
    if let Some(path) = value.as_str() {
        job.external = true;
        job.external_path = path.to_string();
        return Ok(job);
    }

    let map = value
        .as_mapping()
        .ok_or_else(|| RailyardError::Import(format!("job '{key}' is not a mapping")))?;

    if let Some(name) = map.get("name").and_then(Value::as_str) {
        job.name = name.to_string();
    }
    if let Some(runner) = map
        .get("runs-on")
        .or_else(|| map.get("image"))
        .and_then(Value::as_str)
    {
        job.runner = runner.to_string();
    }
    if let Some(stage) = map.get("stage").and_then(Value::as_str) {
        job.stage = stage.to_string();
    }

    // External references: GitHub `uses:` at job level, GitLab `trigger.include`.
    if let Some(uses) = map.get("uses").and_then(Value::as_str) {
        job.external = true;
        job.external_path = uses.to_string();
        return Ok(job);
    }
    if let Some(include) = map
        .get("trigger")
        .and_then(|t| t.get("include"))
        .and_then(Value::as_str)
    {
        job.external = true;
        job.external_path = include.to_string();
        return Ok(job);
    }

    if let Some(steps) = map.get("steps").and_then(Value::as_sequence) {
        import_github_steps(steps, &mut job);
    } else if let Some(script) = map.get("script") {
        import_gitlab_script(script, &mut job);
    }

    import_matrix(map, &mut job);
    import_env(map, &mut job);

    if let Some(paths) = map
        .get("artifacts")
        .and_then(|a| a.get("paths"))
        .and_then(Value::as_sequence)
    {
        job.artifacts
            .extend(paths.iter().filter_map(|v| v.as_str().map(String::from)));
    }

    if let Some(retry) = map.get("retry").and_then(Value::as_u64) {
        job.retry = Some(retry as u32);
    }

    Ok(job)
}

fn import_github_steps(steps: &[Value], job: &mut JobDef) {
    let retry_re = regex::Regex::new(r"RETRY_COUNT=(\d+)").expect("static regex");

    for step in steps {
        let name = step
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Step")
            .to_string();

        if let Some(uses) = step.get("uses").and_then(Value::as_str) {
            if uses.contains("checkout") {
                job.steps.push(StepDef {
                    kind: StepKind::Checkout,
                    name,
                    value: String::new(),
                });
            } else if uses.contains("upload-artifact") {
                // Artifact uploads were synthesized at compile time; fold them
                // back into the artifact list instead of keeping the step.
                if let Some(path) = step
                    .get("with")
                    .and_then(|w| w.get("path"))
                    .and_then(Value::as_str)
                {
                    job.artifacts.extend(path.lines().map(String::from));
                }
            } else {
                job.steps.push(StepDef {
                    kind: StepKind::Action,
                    name,
                    value: uses.to_string(),
                });
            }
            continue;
        }

        let run = step.get("run").and_then(Value::as_str).unwrap_or("");
        if let Some(cap) = retry_re.captures(run) {
            // The synthetic retry marker step, not a user command.
            if let Ok(attempts) = cap[1].parse::<u32>() {
                job.retry = Some(attempts);
            }
            continue;
        }
        job.steps.push(StepDef {
            kind: StepKind::Run,
            name,
            value: run.to_string(),
        });
    }
}

fn import_gitlab_script(script: &Value, job: &mut JobDef) {
    let lines: Vec<String> = match script {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => vec![],
    };

    for line in lines {
        if let Some(reference) = line.strip_prefix("# Plugin: ") {
            job.steps.push(StepDef {
                kind: StepKind::Action,
                name: "Plugin".to_string(),
                value: reference.to_string(),
            });
        } else {
            job.steps.push(StepDef {
                kind: StepKind::Run,
                name: "Script".to_string(),
                value: line,
            });
        }
    }
}

fn import_matrix(map: &serde_yaml::Mapping, job: &mut JobDef) {
    // GitHub: strategy.matrix is one multi-key mapping.
    if let Some(matrix) = map
        .get("strategy")
        .and_then(|s| s.get("matrix"))
        .and_then(Value::as_mapping)
    {
        let decoded = decode_matrix_entries(matrix.iter());
        if !decoded.is_empty() {
            job.matrix = Some(decoded);
        }
        return;
    }

    // GitLab: parallel.matrix is a list of single-key mappings.
    if let Some(entries) = map
        .get("parallel")
        .and_then(|p| p.get("matrix"))
        .and_then(Value::as_sequence)
    {
        let mut decoded = IndexMap::new();
        for entry in entries {
            if let Some(m) = entry.as_mapping() {
                decoded.extend(decode_matrix_entries(m.iter()));
            }
        }
        if !decoded.is_empty() {
            job.matrix = Some(decoded);
        }
    }
}

fn decode_matrix_entries<'a>(
    entries: impl Iterator<Item = (&'a Value, &'a Value)>,
) -> IndexMap<String, Vec<String>> {
    let mut decoded = IndexMap::new();
    for (k, v) in entries {
        let Some(key) = k.as_str() else { continue };
        let values: Vec<String> = match v {
            Value::Sequence(seq) => seq.iter().map(scalar_to_string).collect(),
            other => vec![scalar_to_string(other)],
        };
        decoded.insert(key.to_string(), values);
    }
    decoded
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn import_env(map: &serde_yaml::Mapping, job: &mut JobDef) {
    let env = map
        .get("env")
        .or_else(|| map.get("variables"))
        .and_then(Value::as_mapping);
    let Some(env) = env else { return };
    for (k, v) in env {
        if let Some(key) = k.as_str() {
            job.env.push(EnvVarDef {
                key: key.to_string(),
                value: scalar_to_string(v),
            });
        }
    }
}
