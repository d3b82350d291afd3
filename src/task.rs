//! Workflow tasks and task bags.

use serde::{Deserialize, Serialize};

/// Represents a single workflow task.
///
/// The workload is the execution time on a reference node with performance 1;
/// a node with performance `p` runs the task in `workload / p`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Task {
    pub id: usize,
    pub workload: f64,
    pub memory_requirement: f64,
}

/// A group of structurally interchangeable tasks: same workload, same
/// input/output data sizes, same memory requirement. Bag ids follow the row
/// order of the task-bag input and define the level structure used by the
/// clustering algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskBag {
    pub id: usize,
    pub workload: f64,
    pub input_data_size: f64,
    pub output_data_size: f64,
    pub memory_requirement: f64,
    pub cardinality: usize,
}

/// Expands the bags into `cardinality` tasks each, with dense task ids in bag
/// order. Returns the tasks together with their input/output data sizes.
pub fn expand_task_bags(bags: &[TaskBag]) -> (Vec<Task>, Vec<f64>, Vec<f64>) {
    let mut tasks = Vec::new();
    let mut input_data_sizes = Vec::new();
    let mut output_data_sizes = Vec::new();

    for bag in bags.iter() {
        for _ in 0..bag.cardinality {
            tasks.push(Task {
                id: tasks.len(),
                workload: bag.workload,
                memory_requirement: bag.memory_requirement,
            });
            input_data_sizes.push(bag.input_data_size);
            output_data_sizes.push(bag.output_data_size);
        }
    }

    (tasks, input_data_sizes, output_data_sizes)
}

/// Task ids belonging to each bag, indexed by bag id.
pub fn expand_task_bags_into_ids(bags: &[TaskBag]) -> Vec<Vec<usize>> {
    let mut ids = Vec::with_capacity(bags.len());
    let mut first_id = 0;

    for bag in bags.iter() {
        ids.push((first_id..first_id + bag.cardinality).collect());
        first_id += bag.cardinality;
    }

    ids
}
