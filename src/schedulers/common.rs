//! Pieces shared by the clustering algorithms.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::schedule::Schedule;
use crate::workflow::Workflow;

/// Set of tasks destined for one node, with bookkeeping for the matching of
/// expensive groups to fast nodes.
#[derive(Debug, Clone, Default)]
pub struct TaskGroup {
    task_ids: BTreeSet<usize>,
    workload: f64,
}

impl TaskGroup {
    pub fn add_task(&mut self, w: &Workflow, t_id: usize) {
        if self.task_ids.insert(t_id) {
            self.workload += w.task(t_id).workload;
        }
    }

    /// Removes the given tasks. Panics when one of them is not in the group;
    /// that would mean the clustering bookkeeping went out of sync.
    pub fn remove_tasks(&mut self, w: &Workflow, move_ids: &BTreeSet<usize>) {
        for &move_id in move_ids.iter() {
            if !self.task_ids.remove(&move_id) {
                panic!("internal bug: task group does not contain task {}", move_id);
            }
            self.workload -= w.task(move_id).workload;
        }
    }

    /// Empties the group and hands out its former members.
    pub fn clear_and_return_task_ids(&mut self) -> BTreeSet<usize> {
        self.workload = 0.;
        std::mem::take(&mut self.task_ids)
    }

    pub fn contains(&self, t_id: usize) -> bool {
        self.task_ids.contains(&t_id)
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    /// Total workload of the grouped tasks.
    pub fn workload(&self) -> f64 {
        self.workload
    }

    pub fn task_ids(&self) -> &BTreeSet<usize> {
        &self.task_ids
    }

    pub fn tasks_in_topological_order(&self, w: &Workflow) -> Vec<usize> {
        let mut ordered: Vec<usize> = self.task_ids.iter().copied().collect();
        ordered.sort_by_key(|&t_id| w.topological_task_rank(t_id));
        ordered
    }
}

/// Splits `total` items into `num_groups` sizes differing by at most one;
/// the first `total % num_groups` groups get the larger size.
pub fn split_most_evenly(total: usize, num_groups: usize) -> Vec<usize> {
    let ratio = total / num_groups;
    let remainder = total % num_groups;

    (0..num_groups)
        .map(|i| if i < remainder { ratio + 1 } else { ratio })
        .collect()
}

/// Matches the most expensive group to the fastest node and so on, inserting
/// each group's tasks in the workflow's topological order.
pub fn select_good_nodes_for_expensive_groups(
    c: &Cluster,
    w: &Workflow,
    s: &mut Schedule,
    mut groups: Vec<TaskGroup>,
) {
    let node_ids = c.node_ids_sorted_by_performance_descending();

    // stable sort: equal workloads keep their group order
    groups.sort_by(|a, b| b.workload().total_cmp(&a.workload()));

    for (group, &n_id) in groups.iter().zip(node_ids.iter()) {
        for t_id in group.tasks_in_topological_order(w).into_iter() {
            s.insert_into_node_schedule(t_id, n_id, w, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_differ_by_at_most_one_and_sum_up() {
        assert_eq!(split_most_evenly(7, 3), vec![3, 2, 2]);
        assert_eq!(split_most_evenly(6, 3), vec![2, 2, 2]);
        assert_eq!(split_most_evenly(2, 5), vec![1, 1, 0, 0, 0]);

        for total in 0..40 {
            for num_groups in 1..10 {
                let sizes = split_most_evenly(total, num_groups);
                assert_eq!(sizes.iter().sum::<usize>(), total);
                let larger = sizes.iter().filter(|&&s| s == total / num_groups + 1).count();
                assert_eq!(larger, total % num_groups);
            }
        }
    }
}
