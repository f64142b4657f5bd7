//! Deterministic execution ordering and cycle detection.
//!
//! Kahn's algorithm over the job/edge sets. Ties among simultaneously-ready
//! jobs are broken by ascending vertical canvas position so that compiled
//! output is stable across runs. When the graph is not a DAG, a single
//! concrete cycle is extracted from the unordered residue for reporting.

use std::collections::HashMap;

use railyard_types::JobId;

use crate::graph::{Job, PipelineGraph};

/// Outcome of an ordering pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOrder {
    /// A total order consistent with every edge.
    Ordered(Vec<JobId>),
    /// Display names of one cycle, the first repeated at the end.
    Cycle(Vec<String>),
}

/// Compute a total order over the jobs, or report one cycle.
pub fn execution_order(graph: &PipelineGraph) -> ExecutionOrder {
    let jobs = graph.jobs();
    let index_of: HashMap<&str, usize> = jobs
        .iter()
        .enumerate()
        .map(|(i, j)| (j.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; jobs.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
    for edge in graph.edges() {
        let (Some(&from), Some(&to)) = (index_of.get(edge.from.as_str()), index_of.get(edge.to.as_str()))
        else {
            continue;
        };
        children[from].push(to);
        in_degree[to] += 1;
    }

    // Tie-break key: vertical position, then insertion order.
    let key = |i: usize| (jobs[i].position.1, i);
    let mut ready: Vec<usize> = (0..jobs.len()).filter(|&i| in_degree[i] == 0).collect();
    ready.sort_by(|&a, &b| key(a).0.total_cmp(&key(b).0).then(key(a).1.cmp(&key(b).1)));

    let mut order = Vec::with_capacity(jobs.len());
    while !ready.is_empty() {
        let next = ready.remove(0);
        order.push(next);
        for &child in &children[next] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                let pos = ready
                    .binary_search_by(|&other| {
                        key(other)
                            .0
                            .total_cmp(&key(child).0)
                            .then(key(other).1.cmp(&key(child).1))
                    })
                    .unwrap_or_else(|p| p);
                ready.insert(pos, child);
            }
        }
    }

    if order.len() == jobs.len() {
        return ExecutionOrder::Ordered(order.into_iter().map(|i| jobs[i].id.clone()).collect());
    }

    // The residue all sits on or behind at least one cycle; extract one.
    let residual: Vec<usize> = (0..jobs.len()).filter(|&i| in_degree[i] > 0).collect();
    ExecutionOrder::Cycle(find_cycle(jobs, &children, &residual))
}

/// Jobs in execution order when the graph is a DAG, insertion order otherwise.
/// The compiler uses this so that cyclic graphs still compile.
pub fn ordered_jobs(graph: &PipelineGraph) -> Vec<&Job> {
    match execution_order(graph) {
        ExecutionOrder::Ordered(ids) => ids.iter().filter_map(|id| graph.job(id)).collect(),
        ExecutionOrder::Cycle(_) => graph.jobs().iter().collect(),
    }
}

/// Iterative DFS over the residual subgraph; returns the display names of the
/// first cycle found, with the entry node repeated at the end.
fn find_cycle(jobs: &[Job], children: &[Vec<usize>], residual: &[usize]) -> Vec<String> {
    let in_residual: Vec<bool> = {
        let mut v = vec![false; jobs.len()];
        for &i in residual {
            v[i] = true;
        }
        v
    };
    let mut visited = vec![false; jobs.len()];

    for &start in residual {
        if visited[start] {
            continue;
        }
        // Explicit DFS stack: (node, next child index to explore).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path: Vec<usize> = vec![start];
        let mut on_path = vec![false; jobs.len()];
        on_path[start] = true;

        while let Some(&(node, cursor)) = stack.last() {
            if cursor >= children[node].len() {
                stack.pop();
                path.pop();
                on_path[node] = false;
                visited[node] = true;
                continue;
            }
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            let child = children[node][cursor];
            if !in_residual[child] {
                continue;
            }
            if on_path[child] {
                let entry = path.iter().position(|&n| n == child).unwrap_or(0);
                let mut names: Vec<String> =
                    path[entry..].iter().map(|&i| jobs[i].name.clone()).collect();
                names.push(jobs[child].name.clone());
                return names;
            }
            if !visited[child] {
                stack.push((child, 0));
                path.push(child);
                on_path[child] = true;
            }
        }
    }

    Vec::new()
}
