//! DBCA: dependency-balanced clustering.
//!
//! Like RBCA, but instead of filling the groups in bag order, tasks sharing
//! many successors are grouped together so that their common consumers can
//! read from one node.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::epsilon;
use crate::error::Result;
use crate::report::Report;
use crate::schedule::Schedule;
use crate::schedulers::common::{
    select_good_nodes_for_expensive_groups, split_most_evenly, TaskGroup,
};
use crate::workflow::Workflow;

pub fn dbca(
    c: &Cluster,
    w: &Workflow,
    use_memory_requirements: bool,
    report: &mut Report,
) -> Result<Schedule> {
    let mut s = Schedule::new(c, w.size(), use_memory_requirements);

    if use_memory_requirements {
        report.warn("memory requirements are not used by DBCA")?;
    }

    for bag in w.task_ids_per_bag().iter() {
        let groups = dependency_balanced_task_groups(w, bag, c.size());
        select_good_nodes_for_expensive_groups(c, w, &mut s, groups);
    }

    Ok(s)
}

/// Pairwise dependency correlation of the bag members: the cosine similarity
/// of their successor sets, 0 when either task has no successors.
fn dependency_correlation_matrix(w: &Workflow, bag: &[usize]) -> Vec<Vec<f64>> {
    let successors: Vec<BTreeSet<usize>> = bag
        .iter()
        .map(|&t_id| w.task_outgoing_edges(t_id).keys().copied().collect())
        .collect();

    let n = bag.len();
    let mut matrix = vec![vec![0.; n]; n];

    for i in 0..n {
        for j in i..n {
            if successors[i].is_empty() || successors[j].is_empty() {
                continue;
            }
            let common = successors[i].intersection(&successors[j]).count();
            let correlation = common as f64
                / ((successors[i].len() * successors[j].len()) as f64).sqrt();
            matrix[i][j] = correlation;
            matrix[j][i] = correlation;
        }
    }

    matrix
}

/// Greedy group formation: each group is seeded with the lowest remaining
/// task and grown by the remaining task with the highest summed correlation
/// to the group. Correlation ties prefer the task whose workload is closest
/// to the group's running mean, then the lowest id.
fn dependency_balanced_task_groups(
    w: &Workflow,
    bag: &[usize],
    num_cluster_nodes: usize,
) -> Vec<TaskGroup> {
    let num_groups = bag.len().min(num_cluster_nodes);
    if num_groups == 0 {
        return Vec::new();
    }

    let correlation = dependency_correlation_matrix(w, bag);
    let group_sizes = split_most_evenly(bag.len(), num_groups);

    // bag-local indices of the not yet grouped tasks
    let mut remaining: BTreeSet<usize> = (0..bag.len()).collect();
    let mut groups = Vec::with_capacity(num_groups);

    for &group_size in group_sizes.iter() {
        let seed = *remaining.iter().next().unwrap();
        remaining.remove(&seed);
        let mut members = vec![seed];

        while members.len() < group_size {
            let mean_workload = members
                .iter()
                .map(|&local| w.task(bag[local]).workload)
                .sum::<f64>()
                / members.len() as f64;

            let mut best: Option<(f64, f64, usize)> = None;
            for &candidate in remaining.iter() {
                let correlation_sum: f64 = members
                    .iter()
                    .map(|&member| correlation[candidate][member])
                    .sum();
                let workload_distance =
                    (mean_workload - w.task(bag[candidate]).workload).abs();

                let better = match best {
                    None => true,
                    Some((best_sum, best_distance, _)) => {
                        epsilon::greater(correlation_sum, best_sum)
                            || (epsilon::eq(correlation_sum, best_sum)
                                && epsilon::less(workload_distance, best_distance))
                    }
                };
                if better {
                    best = Some((correlation_sum, workload_distance, candidate));
                }
            }

            let (_, _, chosen) = best.expect("remaining tasks cover the group sizes");
            remaining.remove(&chosen);
            members.push(chosen);
        }

        let mut group = TaskGroup::default();
        for &local in members.iter() {
            group.add_task(w, bag[local]);
        }
        groups.push(group);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use crate::workflow::Dependency;

    // bag {0, 1, 2} with successor sets {3, 4}, {3, 4}, {5}
    fn correlated_workflow() -> Workflow {
        let tasks = (0..6)
            .map(|id| Task {
                id,
                workload: 2.,
                memory_requirement: 0.,
            })
            .collect();
        let deps = vec![
            Dependency { from_id: 0, to_id: 3 },
            Dependency { from_id: 0, to_id: 4 },
            Dependency { from_id: 1, to_id: 3 },
            Dependency { from_id: 1, to_id: 4 },
            Dependency { from_id: 2, to_id: 5 },
        ];
        Workflow::new(
            tasks,
            vec![1.; 6],
            vec![1.; 6],
            deps,
            vec![vec![0, 1, 2], vec![3, 4, 5]],
        )
        .unwrap()
    }

    #[test]
    fn correlation_is_cosine_similarity_of_successor_sets() {
        let w = correlated_workflow();
        let matrix = dependency_correlation_matrix(&w, &[0, 1, 2]);

        assert_eq!(matrix[0][1], 1.);
        assert_eq!(matrix[0][2], 0.);
        assert_eq!(matrix[1][2], 0.);
        assert_eq!(matrix[2][2], 1.);
    }

    #[test]
    fn tasks_sharing_successors_are_grouped_together() {
        let w = correlated_workflow();
        let groups = dependency_balanced_task_groups(&w, &[0, 1, 2], 2);

        let first: Vec<usize> = groups[0].task_ids().iter().copied().collect();
        let second: Vec<usize> = groups[1].task_ids().iter().copied().collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn tasks_without_successors_have_zero_correlation() {
        let w = correlated_workflow();
        let matrix = dependency_correlation_matrix(&w, &[3, 4, 5]);
        assert!(matrix.iter().flatten().all(|&value| value == 0.));
    }
}
