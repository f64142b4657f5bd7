//! Configuration compiler: render the ordered graph into a target dialect.
//!
//! Compilation never fails on defective graphs. A cyclic graph compiles in
//! insertion order; diagnostics are the rule engine's job, not ours. Both
//! dialects preserve the same observable pipeline — dependency edges, step
//! meaning, artifact globs, matrix cardinality, retry attempts — under
//! different surface shapes.

pub mod github;
pub mod gitlab;

use railyard_types::{Dialect, Result};

use crate::graph::PipelineGraph;

/// A compiled document tree, ready for YAML serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledDocument {
    Github(github::Workflow),
    Gitlab(gitlab::GitlabConfig),
}

impl CompiledDocument {
    pub fn to_yaml(&self) -> Result<String> {
        let yaml = match self {
            CompiledDocument::Github(doc) => serde_yaml::to_string(doc)?,
            CompiledDocument::Gitlab(doc) => serde_yaml::to_string(doc)?,
        };
        Ok(yaml)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            CompiledDocument::Github(_) => Dialect::GithubActions,
            CompiledDocument::Gitlab(_) => Dialect::GitlabCi,
        }
    }
}

/// Compile the graph into the given dialect.
pub fn compile(graph: &PipelineGraph, dialect: Dialect) -> CompiledDocument {
    match dialect {
        Dialect::GithubActions => CompiledDocument::Github(github::compile(graph)),
        Dialect::GitlabCi => CompiledDocument::Gitlab(gitlab::compile(graph)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PipelineGraph, Step};

    #[test]
    fn empty_graph_compiles_to_valid_documents() {
        let graph = PipelineGraph::new();

        let CompiledDocument::Github(workflow) = compile(&graph, Dialect::GithubActions) else {
            panic!("expected github document");
        };
        assert!(workflow.jobs.is_empty());
        assert!(workflow.on.push.is_some());

        let CompiledDocument::Gitlab(config) = compile(&graph, Dialect::GitlabCi) else {
            panic!("expected gitlab document");
        };
        assert!(config.jobs.is_empty());
        assert_eq!(config.stages, vec!["build", "test", "deploy"]);

        // Both serialize without error.
        compile(&graph, Dialect::GithubActions).to_yaml().unwrap();
        compile(&graph, Dialect::GitlabCi).to_yaml().unwrap();
    }

    #[test]
    fn cyclic_graph_still_compiles() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_job();
        let b = graph.add_job();
        graph.set_job_name(&a, "A");
        graph.set_job_name(&b, "B");
        graph.push_step(&a, Step::run("Go", "make"));
        graph.push_step(&b, Step::run("Go", "make"));
        graph.add_edge(&a, &b);
        graph.add_edge(&b, &a);

        let CompiledDocument::Github(workflow) = compile(&graph, Dialect::GithubActions) else {
            panic!("expected github document");
        };
        // Insertion order, both jobs present, both with their needs intact.
        let slugs: Vec<&String> = workflow.jobs.keys().collect();
        assert_eq!(slugs, vec!["a", "b"]);
    }

    #[test]
    fn dialect_accessor_matches_request() {
        let graph = PipelineGraph::new();
        assert_eq!(
            compile(&graph, Dialect::GithubActions).dialect(),
            Dialect::GithubActions
        );
        assert_eq!(
            compile(&graph, Dialect::GitlabCi).dialect(),
            Dialect::GitlabCi
        );
    }
}
