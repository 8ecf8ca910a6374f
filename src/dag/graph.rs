// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task_info::{Task, TaskPayload};
use crate::engine::TaskName;
use crate::errors::{DagrunError, Result};

/// Internal node structure: stores the task plus immediate neighbours.
#[derive(Debug, Clone)]
struct DagNode {
    task: Task,
    /// Direct predecessors: tasks that must succeed before this one can run.
    deps: Vec<TaskName>,
    /// Direct successors: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// Incrementally builds a [`DependencyGraph`].
///
/// Structural errors (duplicate names, unknown endpoints, self-loops,
/// duplicate edges) are reported as soon as they are introduced. Cycles can
/// only be detected once all edges are known, so they are reported by
/// [`DagBuilder::validate`] / [`DagBuilder::build`].
#[derive(Debug, Default)]
pub struct DagBuilder {
    /// Task names in declaration order.
    order: Vec<TaskName>,
    nodes: HashMap<TaskName, DagNode>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Fails with [`DagrunError::DuplicateTask`] if the name
    /// is already taken.
    pub fn add_task(
        &mut self,
        name: impl Into<TaskName>,
        payload: TaskPayload,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(DagrunError::DuplicateTask(name));
        }

        self.order.push(name.clone());
        self.nodes.insert(
            name.clone(),
            DagNode {
                task: Task { name, payload },
                deps: Vec::new(),
                dependents: Vec::new(),
            },
        );
        Ok(self)
    }

    /// Declare that `predecessor` must succeed before `successor` may run.
    pub fn add_edge(&mut self, predecessor: &str, successor: &str) -> Result<&mut Self> {
        for endpoint in [predecessor, successor] {
            if !self.nodes.contains_key(endpoint) {
                return Err(DagrunError::UnknownTask(endpoint.to_string()));
            }
        }

        if predecessor == successor {
            return Err(DagrunError::SelfLoop(predecessor.to_string()));
        }

        let already_present = self
            .nodes
            .get(successor)
            .is_some_and(|n| n.deps.iter().any(|d| d == predecessor));
        if already_present {
            return Err(DagrunError::DuplicateEdge {
                predecessor: predecessor.to_string(),
                successor: successor.to_string(),
            });
        }

        if let Some(node) = self.nodes.get_mut(successor) {
            node.deps.push(predecessor.to_string());
        }
        if let Some(node) = self.nodes.get_mut(predecessor) {
            node.dependents.push(successor.to_string());
        }

        debug!(%predecessor, %successor, "added edge");
        Ok(self)
    }

    /// Connect every task in `predecessors` to every task in `successors`.
    ///
    /// `fan(["pps"], ["trn_1", "trn_2"])` is a fan-out,
    /// `fan(["trn_1", "trn_2"], ["sel"])` a fan-in.
    pub fn fan<P, S>(&mut self, predecessors: P, successors: S) -> Result<&mut Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let successors: Vec<String> = successors
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        for pred in predecessors {
            let pred: &str = pred.as_ref();
            for succ in &successors {
                self.add_edge(pred, succ)?;
            }
        }
        Ok(self)
    }

    /// Connect consecutive stages with [`DagBuilder::fan`].
    ///
    /// `chain([vec!["a"], vec!["b"], vec!["c1", "c2"], vec!["d"]])` yields
    /// `a → b → {c1, c2} → d`.
    pub fn chain<I, T>(&mut self, stages: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let stages: Vec<Vec<T::Item>> = stages
            .into_iter()
            .map(|stage| stage.into_iter().collect())
            .collect();

        for pair in stages.windows(2) {
            self.fan(&pair[0], &pair[1])?;
        }
        Ok(self)
    }

    /// Check the edge set for cycles.
    ///
    /// Fails with [`DagrunError::CycleDetected`] naming a task on the cycle.
    pub fn validate(&self) -> Result<()> {
        let graph = petgraph_view(&self.order, &self.nodes);

        // A topological sort will fail if there is a cycle.
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DagrunError::CycleDetected(cycle.node_id().to_string())),
        }
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<DependencyGraph> {
        self.validate()?;

        debug!(tasks = self.order.len(), "dependency graph validated");

        Ok(DependencyGraph {
            order: self.order,
            nodes: self.nodes,
        })
    }
}

/// Validated, immutable DAG of tasks keyed by name.
///
/// A value of this type only exists if cycle detection succeeded, and it
/// never changes afterwards, so it can be shared (`Arc`) between any number
/// of concurrent runs.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<TaskName>,
    nodes: HashMap<TaskName, DagNode>,
}

impl DependencyGraph {
    pub fn builder() -> DagBuilder {
        DagBuilder::new()
    }

    /// All task names, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.nodes.get(name).map(|n| &n.task)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Immediate predecessors of a task, in the order the edges were declared.
    pub fn predecessors(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate successors of a task, in the order the edges were declared.
    pub fn successors(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without predecessors.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.tasks().filter(|name| self.predecessors(name).is_empty())
    }

    /// Every task reachable from `name` through successor edges (excluding
    /// `name` itself).
    pub fn descendants(&self, name: &str) -> Vec<TaskName> {
        let mut stack: Vec<&str> = self.successors(name).iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current.to_string());
            stack.extend(self.successors(current).iter().map(String::as_str));
        }

        out
    }

    /// A topological ordering of all tasks.
    pub fn topological_order(&self) -> Vec<TaskName> {
        let graph = petgraph_view(&self.order, &self.nodes);
        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            // Unreachable for a built graph; fall back to declaration order.
            Err(_) => self.order.clone(),
        }
    }

    /// Render the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for name in &self.order {
            out.push_str(&format!("    {name:?};\n"));
        }
        for name in &self.order {
            for succ in self.successors(name) {
                out.push_str(&format!("    {name:?} -> {succ:?};\n"));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Borrowing petgraph view of the adjacency data.
///
/// Edge direction: predecessor -> successor.
fn petgraph_view<'a>(
    order: &'a [TaskName],
    nodes: &'a HashMap<TaskName, DagNode>,
) -> DiGraphMap<&'a str, ()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in order {
        graph.add_node(name.as_str());
    }

    for name in order {
        if let Some(node) = nodes.get(name) {
            for dep in &node.deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
    }

    graph
}
