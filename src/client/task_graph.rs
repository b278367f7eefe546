//! Graph composition: `group` and `chain`.

use crate::core::TaskGraph;
use crate::error::TypeError;

use super::TaskFunction;

/// Anything `group`/`chain` accept: a task function (wrapped as a
/// single-task graph) or an existing graph (taken as a copy).
pub trait IntoTaskGraph {
    fn into_task_graph(self) -> TaskGraph;
}

impl IntoTaskGraph for TaskGraph {
    fn into_task_graph(self) -> TaskGraph {
        self
    }
}

impl IntoTaskGraph for &TaskGraph {
    fn into_task_graph(self) -> TaskGraph {
        self.clone()
    }
}

impl IntoTaskGraph for TaskFunction {
    fn into_task_graph(self) -> TaskGraph {
        (&self).into_task_graph()
    }
}

impl IntoTaskGraph for &TaskFunction {
    fn into_task_graph(self) -> TaskGraph {
        let mut graph = TaskGraph::new();
        graph.add_task(self.to_task());
        graph
    }
}

/// Groups task functions and graphs into one graph: a disjoint union with
/// every index translated past the tasks already present. No dependencies
/// are added; ordering is the concatenation of the items' orderings.
pub fn group<I>(items: I) -> TaskGraph
where
    I: IntoIterator,
    I::Item: IntoTaskGraph,
{
    let mut graph = TaskGraph::new();
    for item in items {
        graph.merge(&item.into_task_graph());
    }
    graph
}

/// Chains `child` after `parent`, wiring the child's input-root inputs to
/// the parent's output-task outputs position by position.
///
/// Fails when a wired pair's types differ, or when the two walks do not
/// exhaust together.
pub fn chain(
    parent: impl IntoTaskGraph,
    child: impl IntoTaskGraph,
) -> Result<TaskGraph, TypeError> {
    TaskGraph::chain(&parent.into_task_graph(), &child.into_task_graph())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TaskContext;
    use crate::types::Int8;

    fn add(_: &mut TaskContext, x: Int8, y: Int8) -> Int8 {
        Int8::new((i64::from(x) + i64::from(y)).clamp(Int8::MIN, Int8::MAX)).unwrap()
    }

    fn swap(_: &mut TaskContext, x: Int8, y: Int8) -> (Int8, Int8) {
        (y, x)
    }

    #[test]
    fn group_of_groups_concatenates() {
        let add_fn = TaskFunction::new("examples.tasks.add", add).unwrap();
        let graph = group([&add_fn, &add_fn]);
        let graph = group([&graph, &graph]);
        assert_eq!(graph.tasks.len(), 4);
        assert_eq!(graph.dependencies.len(), 0);
        assert_eq!(graph.input_task_indices.len(), 4);
        assert_eq!(graph.output_task_indices.len(), 4);
        assert_eq!(graph.task_input_output_refs.len(), 0);
    }

    #[test]
    fn chain_accepts_functions_and_graphs() {
        let add_fn = TaskFunction::new("examples.tasks.add", add).unwrap();
        let swap_fn = TaskFunction::new("examples.tasks.swap", swap).unwrap();

        let graph = chain(group([&add_fn, &add_fn]), &swap_fn).unwrap();
        assert_eq!(graph.tasks.len(), 3);
        assert_eq!(graph.dependencies.len(), 2);
        assert_eq!(graph.input_task_indices.len(), 2);
        assert_eq!(graph.output_task_indices.len(), 1);
        assert_eq!(graph.task_input_output_refs.len(), 2);
    }

    #[test]
    fn chain_of_mismatched_arity_fails() {
        let add_fn = TaskFunction::new("examples.tasks.add", add).unwrap();
        let err = chain(&add_fn, &add_fn).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parent outputs size and child inputs size do not match."
        );
    }
}
