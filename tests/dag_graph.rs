// tests/dag_graph.rs

mod common;
use crate::common::builders::{pipeline_graph, tasks_only};

use dagrun::dag::{DagBuilder, DependencyGraph, TaskPayload};
use dagrun::errors::DagrunError;

fn payload() -> TaskPayload {
    TaskPayload::command(["true"])
}

#[test]
fn add_task_rejects_duplicate_names() {
    let mut builder = DagBuilder::new();
    builder.add_task("A", payload()).unwrap();

    let err = builder.add_task("A", payload()).unwrap_err();
    assert!(matches!(err, DagrunError::DuplicateTask(ref n) if n == "A"));
    assert!(err.is_definition_error());
}

#[test]
fn add_edge_rejects_unknown_endpoints() {
    let mut builder = tasks_only(&["A"]);

    let err = builder.add_edge("A", "missing").unwrap_err();
    assert!(matches!(err, DagrunError::UnknownTask(ref n) if n == "missing"));

    let err = builder.add_edge("ghost", "A").unwrap_err();
    assert!(matches!(err, DagrunError::UnknownTask(ref n) if n == "ghost"));
}

#[test]
fn add_edge_rejects_self_loops_and_duplicates() {
    let mut builder = tasks_only(&["A", "B"]);

    assert!(matches!(
        builder.add_edge("A", "A").unwrap_err(),
        DagrunError::SelfLoop(ref n) if n == "A"
    ));

    builder.add_edge("A", "B").unwrap();
    match builder.add_edge("A", "B").unwrap_err() {
        DagrunError::DuplicateEdge {
            predecessor,
            successor,
        } => {
            assert_eq!(predecessor, "A");
            assert_eq!(successor, "B");
        }
        other => panic!("expected DuplicateEdge, got {other:?}"),
    }
}

#[test]
fn validate_reports_a_task_on_the_cycle() {
    let mut builder = tasks_only(&["A", "B", "C", "outside"]);
    builder.add_edge("A", "B").unwrap();
    builder.add_edge("B", "C").unwrap();
    builder.add_edge("C", "A").unwrap();
    builder.add_edge("outside", "A").unwrap();

    let err = builder.validate().unwrap_err();
    match err {
        DagrunError::CycleDetected(name) => {
            assert!(["A", "B", "C"].contains(&name.as_str()), "got {name}");
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }

    assert!(matches!(builder.build(), Err(DagrunError::CycleDetected(_))));
}

#[test]
fn acyclic_graph_validates_and_exposes_neighbours() {
    let graph = pipeline_graph();

    assert_eq!(graph.len(), 6);
    assert!(!graph.is_empty());
    assert!(graph.contains("C2"));
    assert!(!graph.contains("E"));

    assert_eq!(graph.predecessors("D"), ["C1", "C2", "C3"]);
    assert_eq!(graph.successors("B"), ["C1", "C2", "C3"]);
    assert!(graph.predecessors("A").is_empty());
    assert!(graph.successors("D").is_empty());
    assert!(graph.predecessors("unknown").is_empty());

    assert_eq!(graph.roots().collect::<Vec<_>>(), ["A"]);
    assert_eq!(
        graph.tasks().collect::<Vec<_>>(),
        ["A", "B", "C1", "C2", "C3", "D"]
    );
}

#[test]
fn fan_connects_every_pair() {
    let mut builder = tasks_only(&["src1", "src2", "dst1", "dst2"]);
    builder.fan(["src1", "src2"], ["dst1", "dst2"]).unwrap();
    let graph = builder.build().unwrap();

    assert_eq!(graph.successors("src1"), ["dst1", "dst2"]);
    assert_eq!(graph.successors("src2"), ["dst1", "dst2"]);
    assert_eq!(graph.predecessors("dst2"), ["src1", "src2"]);
}

#[test]
fn fan_propagates_edge_errors() {
    let mut builder = tasks_only(&["a", "b"]);
    let err = builder.fan(["a"], ["b", "nope"]).unwrap_err();
    assert!(matches!(err, DagrunError::UnknownTask(ref n) if n == "nope"));
}

#[test]
fn descendants_are_transitive_and_exclude_the_start() {
    let graph = pipeline_graph();

    let mut desc = graph.descendants("B");
    desc.sort();
    assert_eq!(desc, ["C1", "C2", "C3", "D"]);

    assert!(graph.descendants("D").is_empty());
    assert_eq!(graph.descendants("A").len(), 5);
}

#[test]
fn topological_order_respects_every_edge() {
    let graph = pipeline_graph();
    let order = graph.topological_order();
    assert_eq!(order.len(), graph.len());

    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    for task in graph.tasks() {
        for succ in graph.successors(task) {
            assert!(pos(task) < pos(succ), "{task} must come before {succ}");
        }
    }
}

#[test]
fn dot_output_lists_nodes_and_edges() {
    let mut builder = DependencyGraph::builder();
    builder.add_task("build", payload()).unwrap();
    builder.add_task("test", payload()).unwrap();
    builder.add_edge("build", "test").unwrap();
    let dot = builder.build().unwrap().to_dot();

    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains("\"build\";"));
    assert!(dot.contains("\"build\" -> \"test\";"));
    assert!(dot.trim_end().ends_with('}'));
}

#[test]
fn empty_graph_is_valid() {
    let graph = DagBuilder::new().build().unwrap();
    assert!(graph.is_empty());
    assert!(graph.topological_order().is_empty());
}
