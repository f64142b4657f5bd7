//! Textual step predicates shared by the rule engine and the remediation
//! engine.
//!
//! Remediations re-locate their anchors with the same predicates the rules
//! used for detection, so a fix applied to a graph that changed in between
//! degrades to a no-op instead of editing the wrong step.

use std::sync::OnceLock;

use regex::Regex;

use railyard_types::StepKind;

use crate::graph::Step;

/// Step names that suggest the step was meant to retrieve source code.
pub const CHECKOUT_NAME_HINTS: &[&str] = &["checkout", "clone", "pull code", "get code"];

/// Recognized test invocation commands.
pub const TEST_COMMANDS: &[&str] = &[
    "npm test",
    "npm run test",
    "jest",
    "pytest",
    "mvn test",
    "gradle test",
    "go test",
    "dotnet test",
    "php artisan test",
    "rspec",
];

/// Recognized dependency installation commands.
pub const INSTALL_COMMANDS: &[&str] = &[
    "npm ci",
    "npm install",
    "pip install",
    "yarn install",
    "bundle install",
];

/// Commands that indicate a deployment job.
pub const DEPLOY_COMMANDS: &[&str] = &["deploy", "kubectl", "heroku", "aws ", "gcloud "];

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_image_build(step: &Step) -> bool {
    step.value.contains("docker build")
}

pub fn is_image_push(step: &Step) -> bool {
    step.value.contains("docker push")
}

pub fn is_image_pull(step: &Step) -> bool {
    step.value.contains("docker pull")
}

pub fn is_image_login(step: &Step) -> bool {
    step.value.contains("docker login")
}

/// A step that consumes an image: scanning or running it.
pub fn is_image_use(step: &Step) -> bool {
    step.value.contains("docker scan") || step.value.contains("docker run")
}

pub fn is_image_scan(step: &Step) -> bool {
    step.value.contains("docker scan")
}

pub fn is_test_command(step: &Step) -> bool {
    TEST_COMMANDS.iter().any(|cmd| step.value.contains(cmd))
}

pub fn is_install_command(step: &Step) -> bool {
    INSTALL_COMMANDS.iter().any(|cmd| step.value.contains(cmd))
}

pub fn is_deploy_command(step: &Step) -> bool {
    DEPLOY_COMMANDS.iter().any(|cmd| step.value.contains(cmd))
}

pub fn is_artifact_download(step: &Step) -> bool {
    step.kind == StepKind::Action && step.value.contains("download-artifact")
}

/// A run or action step whose payload is blank.
pub fn is_empty_command(step: &Step) -> bool {
    matches!(step.kind, StepKind::Run | StepKind::Action) && is_blank(&step.value)
}

pub fn has_checkout_like_name(step: &Step) -> bool {
    let name = step.name.to_lowercase();
    CHECKOUT_NAME_HINTS.iter().any(|hint| name.contains(hint))
}

/// `${{ matrix.<key> }}` reference in a step payload.
pub fn references_matrix_var(step: &Step, key: &str) -> bool {
    step.value.contains(&format!("${{{{ matrix.{key} }}}}"))
}

/// The opaque secret-substitution syntax; payloads using it are passed through.
pub fn has_secret_reference(value: &str) -> bool {
    value.to_lowercase().contains("secrets.")
}

fn password_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)password\s*[:=]\s*['"]"#).expect("static regex"))
}

fn api_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)api_?key\s*[:=]\s*['"]"#).expect("static regex"))
}

/// Detect a hardcoded credential assignment. Returns what kind of credential
/// the payload appears to assign.
pub fn hardcoded_credential(value: &str) -> Option<&'static str> {
    if has_secret_reference(value) {
        return None;
    }
    if password_re().is_match(value) {
        return Some("password");
    }
    if api_key_re().is_match(value) {
        return Some("API key");
    }
    None
}
