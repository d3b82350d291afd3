//! RBCA: runtime-balanced clustering.
//!
//! All tasks in a bag share one workload, so balancing the runtime within a
//! bag reduces to splitting the bag into groups of (almost) equal size.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::report::Report;
use crate::schedule::Schedule;
use crate::schedulers::common::{
    select_good_nodes_for_expensive_groups, split_most_evenly, TaskGroup,
};
use crate::workflow::Workflow;

pub fn rbca(
    c: &Cluster,
    w: &Workflow,
    use_memory_requirements: bool,
    report: &mut Report,
) -> Result<Schedule> {
    let mut s = Schedule::new(c, w.size(), use_memory_requirements);

    if use_memory_requirements {
        report.warn("memory requirements are not used by RBCA")?;
    }

    for bag in w.task_ids_per_bag().iter() {
        let groups = runtime_balanced_task_groups(w, bag, c.size());
        select_good_nodes_for_expensive_groups(c, w, &mut s, groups);
    }

    Ok(s)
}

/// Partitions the bag into `min(|bag|, num_cluster_nodes)` groups of sizes
/// from the split policy, filled in bag order.
fn runtime_balanced_task_groups(
    w: &Workflow,
    bag: &[usize],
    num_cluster_nodes: usize,
) -> Vec<TaskGroup> {
    let num_groups = bag.len().min(num_cluster_nodes);
    if num_groups == 0 {
        return Vec::new();
    }

    let group_sizes = split_most_evenly(bag.len(), num_groups);
    let mut groups = Vec::with_capacity(num_groups);

    let mut bag_index = 0;
    for &group_size in group_sizes.iter() {
        let mut group = TaskGroup::default();
        for &t_id in bag[bag_index..bag_index + group_size].iter() {
            group.add_task(w, t_id);
        }
        bag_index += group_size;
        groups.push(group);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn bag_workflow(n: usize) -> Workflow {
        let tasks = (0..n)
            .map(|id| Task {
                id,
                workload: 5.,
                memory_requirement: 0.,
            })
            .collect();
        Workflow::new(
            tasks,
            vec![1.; n],
            vec![1.; n],
            Vec::new(),
            vec![(0..n).collect()],
        )
        .unwrap()
    }

    #[test]
    fn seven_tasks_on_three_nodes_split_as_3_2_2() {
        let w = bag_workflow(7);
        let bag = w.task_ids_per_bag()[0].clone();
        let groups = runtime_balanced_task_groups(&w, &bag, 3);

        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);

        let first: Vec<usize> = groups[0].task_ids().iter().copied().collect();
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[test]
    fn small_bags_get_one_group_per_task() {
        let w = bag_workflow(2);
        let bag = w.task_ids_per_bag()[0].clone();
        let groups = runtime_balanced_task_groups(&w, &bag, 5);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 1));
    }
}
