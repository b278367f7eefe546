//! Index-based task DAGs and the splice underneath `chain`.

use std::collections::HashSet;

use thiserror::Error;

use super::{Task, TaskState};
use crate::error::TypeError;

/// One wired input/output pair: the consumer task's input position fed by
/// the producer task's output position. Indices address `TaskGraph::tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputOutputRef {
    pub consumer: usize,
    pub input_position: usize,
    pub producer: usize,
    pub output_position: usize,
}

/// A directed acyclic graph of tasks.
///
/// Tasks are addressed by index; insertion order is preserved across all
/// lists and is semantically significant — argument binding walks
/// `input_task_indices` in order, result collection walks
/// `output_task_indices` in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskGraph {
    pub tasks: Vec<Task>,
    /// `(parent_index, child_index)` pairs, each recorded once.
    pub dependencies: Vec<(usize, usize)>,
    /// Tasks whose inputs are not sourced from any other task in the graph.
    pub input_task_indices: Vec<usize>,
    /// Tasks whose outputs are not consumed by any other task in the graph.
    pub output_task_indices: Vec<usize>,
    pub task_input_output_refs: Vec<InputOutputRef>,
}

/// A structural invariant violation found by [`TaskGraph::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task index {index} out of range for {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("position {position} out of range for task {task}")]
    PositionOutOfRange { task: usize, position: usize },

    #[error("dependency cycle involving task {0}")]
    Cycle(usize),

    #[error("task {task} listed as {role} root but has {direction} edges")]
    NotARoot {
        task: usize,
        role: &'static str,
        direction: &'static str,
    },

    #[error("ref ({consumer}, {input_position}) <- ({producer}, {output_position}) joins `{input}` to `{output}`")]
    RefTypeMismatch {
        consumer: usize,
        input_position: usize,
        producer: usize,
        output_position: usize,
        input: String,
        output: String,
    },
}

impl TaskGraph {
    pub fn new() -> Self {
        TaskGraph::default()
    }

    /// Appends a task with no dependencies; it becomes both an input root
    /// and an output root.
    pub fn add_task(&mut self, task: Task) {
        let index = self.tasks.len();
        self.tasks.push(task);
        self.input_task_indices.push(index);
        self.output_task_indices.push(index);
    }

    /// Appends a copy of `other`, translating every task index it carries
    /// by this graph's size. Ordering in all lists is the concatenation of
    /// the two graphs' orderings.
    pub fn merge(&mut self, other: &TaskGraph) {
        let offset = self.tasks.len();
        self.tasks.extend(other.tasks.iter().cloned());
        self.dependencies.extend(
            other
                .dependencies
                .iter()
                .map(|&(parent, child)| (parent + offset, child + offset)),
        );
        self.input_task_indices
            .extend(other.input_task_indices.iter().map(|&index| index + offset));
        self.output_task_indices
            .extend(other.output_task_indices.iter().map(|&index| index + offset));
        self.task_input_output_refs
            .extend(other.task_input_output_refs.iter().map(|r| InputOutputRef {
                consumer: r.consumer + offset,
                input_position: r.input_position,
                producer: r.producer + offset,
                output_position: r.output_position,
            }));
    }

    /// Splices `child`'s input-root inputs onto `parent`'s output-task
    /// outputs, in order, producing a fresh graph.
    ///
    /// Both walks advance position by position; a parent output task rolls
    /// over to the next once its outputs are exhausted. Types must match at
    /// every wired pair, and both walks must end together.
    pub fn chain(parent: &TaskGraph, child: &TaskGraph) -> Result<TaskGraph, TypeError> {
        let mut graph = parent.clone();
        let parent_outputs = graph.output_task_indices.clone();
        let offset = graph.tasks.len();

        graph.tasks.extend(child.tasks.iter().cloned());
        graph.dependencies.extend(
            child
                .dependencies
                .iter()
                .map(|&(p, c)| (p + offset, c + offset)),
        );
        graph
            .task_input_output_refs
            .extend(child.task_input_output_refs.iter().map(|r| InputOutputRef {
                consumer: r.consumer + offset,
                input_position: r.input_position,
                producer: r.producer + offset,
                output_position: r.output_position,
            }));
        graph.output_task_indices = child
            .output_task_indices
            .iter()
            .map(|&index| index + offset)
            .collect();

        let mut output_task_cursor = 0;
        let mut output_position = 0;
        for &child_root in &child.input_task_indices {
            let consumer = child_root + offset;
            for input_position in 0..child.tasks[child_root].task_inputs.len() {
                if output_task_cursor >= parent_outputs.len() {
                    return Err(TypeError::ChainArityMismatch);
                }
                let producer = parent_outputs[output_task_cursor];
                let output = &parent.tasks[producer].task_outputs[output_position];
                let input = &child.tasks[child_root].task_inputs[input_position];
                if input.tdl_type != output.tdl_type {
                    return Err(TypeError::InputOutputMismatch {
                        input: input.tdl_type.clone(),
                        output: output.tdl_type.clone(),
                    });
                }

                if !graph.dependencies.contains(&(producer, consumer)) {
                    graph.dependencies.push((producer, consumer));
                }
                graph.task_input_output_refs.push(InputOutputRef {
                    consumer,
                    input_position,
                    producer,
                    output_position,
                });

                output_position += 1;
                if output_position >= parent.tasks[producer].task_outputs.len() {
                    output_position = 0;
                    output_task_cursor += 1;
                }
            }
        }
        if output_task_cursor < parent_outputs.len() {
            return Err(TypeError::ChainArityMismatch);
        }

        Ok(graph)
    }

    /// Indices of the tasks `index` depends on.
    pub fn parents_of(&self, index: usize) -> Vec<usize> {
        self.dependencies
            .iter()
            .filter(|&&(_, child)| child == index)
            .map(|&(parent, _)| parent)
            .collect()
    }

    /// Indices of the tasks depending on `index`.
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        self.dependencies
            .iter()
            .filter(|&&(parent, _)| parent == index)
            .map(|&(_, child)| child)
            .collect()
    }

    /// Sets every task's state; used when preparing a graph for submission.
    pub fn reset_states(&mut self, state: TaskState) {
        for task in &mut self.tasks {
            task.state = state;
        }
    }

    /// Checks the structural invariants: indices in range, no cycles,
    /// listed roots really are roots, and every cross-reference joins
    /// matching types at valid positions.
    pub fn validate(&self) -> Result<(), GraphError> {
        let len = self.tasks.len();
        let check = |index: usize| {
            if index < len {
                Ok(())
            } else {
                Err(GraphError::IndexOutOfRange { index, len })
            }
        };

        for &(parent, child) in &self.dependencies {
            check(parent)?;
            check(child)?;
        }
        for &index in self.input_task_indices.iter().chain(&self.output_task_indices) {
            check(index)?;
        }

        let parents: HashSet<usize> = self.dependencies.iter().map(|&(p, _)| p).collect();
        let children: HashSet<usize> = self.dependencies.iter().map(|&(_, c)| c).collect();
        for &index in &self.input_task_indices {
            if children.contains(&index) {
                return Err(GraphError::NotARoot {
                    task: index,
                    role: "input",
                    direction: "incoming",
                });
            }
        }
        for &index in &self.output_task_indices {
            if parents.contains(&index) {
                return Err(GraphError::NotARoot {
                    task: index,
                    role: "output",
                    direction: "outgoing",
                });
            }
        }

        for r in &self.task_input_output_refs {
            check(r.consumer)?;
            check(r.producer)?;
            let inputs = &self.tasks[r.consumer].task_inputs;
            if r.input_position >= inputs.len() {
                return Err(GraphError::PositionOutOfRange {
                    task: r.consumer,
                    position: r.input_position,
                });
            }
            let outputs = &self.tasks[r.producer].task_outputs;
            if r.output_position >= outputs.len() {
                return Err(GraphError::PositionOutOfRange {
                    task: r.producer,
                    position: r.output_position,
                });
            }
            let input = &inputs[r.input_position].tdl_type;
            let output = &outputs[r.output_position].tdl_type;
            if input != output {
                return Err(GraphError::RefTypeMismatch {
                    consumer: r.consumer,
                    input_position: r.input_position,
                    producer: r.producer,
                    output_position: r.output_position,
                    input: input.clone(),
                    output: output.clone(),
                });
            }
        }

        self.check_acyclic()
    }

    /// Kahn's algorithm; any task left with in-degree > 0 sits on a cycle.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let len = self.tasks.len();
        let mut in_degree = vec![0usize; len];
        for &(_, child) in &self.dependencies {
            in_degree[child] += 1;
        }

        let mut queue: Vec<usize> = (0..len).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;
        while let Some(task) = queue.pop() {
            visited += 1;
            for &(parent, child) in &self.dependencies {
                if parent == task {
                    in_degree[child] -= 1;
                    if in_degree[child] == 0 {
                        queue.push(child);
                    }
                }
            }
        }

        if visited == len {
            Ok(())
        } else {
            let stuck = in_degree
                .iter()
                .position(|&d| d > 0)
                .unwrap_or_default();
            Err(GraphError::Cycle(stuck))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TaskInput, TaskOutput};

    fn task(name: &str, inputs: &[&str], outputs: &[&str]) -> Task {
        let mut task = Task::new(name);
        task.task_inputs = inputs.iter().map(|t| TaskInput::unbound(*t)).collect();
        task.task_outputs = outputs.iter().map(|t| TaskOutput::inline(*t)).collect();
        task
    }

    fn single(name: &str, inputs: &[&str], outputs: &[&str]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        graph.add_task(task(name, inputs, outputs));
        graph
    }

    #[test]
    fn add_task_registers_both_roots() {
        let graph = single("t.a", &["int8"], &["int8"]);
        assert_eq!(graph.input_task_indices, vec![0]);
        assert_eq!(graph.output_task_indices, vec![0]);
        assert!(graph.dependencies.is_empty());
        graph.validate().unwrap();
    }

    #[test]
    fn merge_offsets_all_indices() {
        let mut left = single("t.a", &["int8"], &["int8"]);
        let chained = TaskGraph::chain(
            &single("t.a", &["int8"], &["int8"]),
            &single("t.b", &["int8"], &["int8"]),
        )
        .unwrap();
        left.merge(&chained);

        assert_eq!(left.tasks.len(), 3);
        assert_eq!(left.dependencies, vec![(1, 2)]);
        assert_eq!(left.input_task_indices, vec![0, 1]);
        assert_eq!(left.output_task_indices, vec![0, 2]);
        assert_eq!(left.task_input_output_refs.len(), 1);
        assert_eq!(left.task_input_output_refs[0].consumer, 2);
        assert_eq!(left.task_input_output_refs[0].producer, 1);
        left.validate().unwrap();
    }

    #[test]
    fn chain_wires_positions_in_order() {
        // Two one-output parents feeding a two-input child.
        let mut parent = single("t.a", &["int8"], &["int8"]);
        parent.merge(&single("t.a", &["int8"], &["int8"]));
        let child = single("t.swap", &["int8", "int8"], &["int8", "int8"]);

        let graph = TaskGraph::chain(&parent, &child).unwrap();
        assert_eq!(graph.tasks.len(), 3);
        assert_eq!(graph.dependencies, vec![(0, 2), (1, 2)]);
        assert_eq!(graph.input_task_indices, vec![0, 1]);
        assert_eq!(graph.output_task_indices, vec![2]);
        assert_eq!(
            graph.task_input_output_refs,
            vec![
                InputOutputRef {
                    consumer: 2,
                    input_position: 0,
                    producer: 0,
                    output_position: 0
                },
                InputOutputRef {
                    consumer: 2,
                    input_position: 1,
                    producer: 1,
                    output_position: 0
                },
            ]
        );
        graph.validate().unwrap();
    }

    #[test]
    fn chain_rolls_over_within_a_multi_output_parent() {
        // One two-output parent feeding two one-input children.
        let parent = single("t.swap", &["int8", "int8"], &["int8", "int8"]);
        let mut child = single("t.double", &["int8"], &["int8"]);
        child.merge(&single("t.double", &["int8"], &["int8"]));

        let graph = TaskGraph::chain(&parent, &child).unwrap();
        assert_eq!(graph.tasks.len(), 3);
        assert_eq!(graph.dependencies, vec![(0, 1), (0, 2)]);
        assert_eq!(graph.input_task_indices, vec![0]);
        assert_eq!(graph.output_task_indices, vec![1, 2]);
        assert_eq!(graph.task_input_output_refs.len(), 2);
        assert_eq!(graph.task_input_output_refs[1].output_position, 1);
        graph.validate().unwrap();
    }

    #[test]
    fn chain_records_repeated_dependencies_once() {
        // A two-output parent feeding one two-input child produces a single
        // dependency edge but two refs.
        let parent = single("t.swap", &["int8", "int8"], &["int8", "int8"]);
        let child = single("t.add", &["int8", "int8"], &["int8"]);

        let graph = TaskGraph::chain(&parent, &child).unwrap();
        assert_eq!(graph.dependencies, vec![(0, 1)]);
        assert_eq!(graph.task_input_output_refs.len(), 2);
        graph.validate().unwrap();
    }

    #[test]
    fn chain_fails_on_arity_imbalance() {
        let parent = single("t.add", &["int8", "int8"], &["int8"]);
        let child = single("t.add", &["int8", "int8"], &["int8"]);
        let err = TaskGraph::chain(&parent, &child).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parent outputs size and child inputs size do not match."
        );

        // The other direction: parent outputs left over.
        let wide = single("t.swap", &["int8", "int8"], &["int8", "int8"]);
        let narrow = single("t.double", &["int8"], &["int8"]);
        assert!(matches!(
            TaskGraph::chain(&wide, &narrow),
            Err(TypeError::ChainArityMismatch)
        ));
    }

    #[test]
    fn chain_fails_on_type_mismatch() {
        let parent = single("t.a", &["int8"], &["int8"]);
        let child = single("t.b", &["int16"], &["int16"]);
        assert!(matches!(
            TaskGraph::chain(&parent, &child),
            Err(TypeError::InputOutputMismatch { .. })
        ));
    }

    #[test]
    fn chain_skips_zero_input_child_roots() {
        // A child input root with no inputs consumes nothing and gains no
        // edges; it simply rides along.
        let parent = single("t.double", &["int8"], &["int8"]);
        let mut child = single("t.source", &[], &["int8"]);
        child.merge(&single("t.double", &["int8"], &["int8"]));

        let graph = TaskGraph::chain(&parent, &child).unwrap();
        assert_eq!(graph.tasks.len(), 3);
        assert_eq!(graph.dependencies, vec![(0, 2)]);
        assert_eq!(graph.task_input_output_refs.len(), 1);
        // The zero-input task (index 1) is a sink of no edges: not a listed
        // input root, but also nobody's child.
        assert_eq!(graph.input_task_indices, vec![0]);
        assert!(graph.dependencies.iter().all(|&(_, c)| c != 1));
    }

    #[test]
    fn parent_and_child_lookups_follow_dependencies() {
        let parent = single("t.swap", &["int8", "int8"], &["int8", "int8"]);
        let mut child = single("t.double", &["int8"], &["int8"]);
        child.merge(&single("t.double", &["int8"], &["int8"]));
        let graph = TaskGraph::chain(&parent, &child).unwrap();

        assert_eq!(graph.children_of(0), vec![1, 2]);
        assert_eq!(graph.parents_of(1), vec![0]);
        assert_eq!(graph.parents_of(2), vec![0]);
        assert!(graph.parents_of(0).is_empty());
        assert!(graph.children_of(2).is_empty());
    }

    #[test]
    fn validate_rejects_cycles_and_bad_indices() {
        let mut graph = single("t.a", &["int8"], &["int8"]);
        graph.add_task(task("t.b", &["int8"], &["int8"]));
        graph.dependencies.push((0, 1));
        graph.dependencies.push((1, 0));
        assert!(matches!(graph.validate(), Err(GraphError::NotARoot { .. })));

        graph.input_task_indices.clear();
        graph.output_task_indices.clear();
        assert!(matches!(graph.validate(), Err(GraphError::Cycle(_))));

        let mut oob = single("t.a", &["int8"], &["int8"]);
        oob.dependencies.push((0, 5));
        assert!(matches!(
            oob.validate(),
            Err(GraphError::IndexOutOfRange { .. })
        ));
    }
}
