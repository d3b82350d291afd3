//! HEFT: heterogeneous earliest finish time.
//!
//! List scheduling by descending upward rank with insertion-based best-EFT
//! placement.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::schedule::{BestNodeMode, Schedule};
use crate::workflow::Workflow;

pub fn heft(c: &Cluster, w: &Workflow, use_memory_requirements: bool) -> Result<Schedule> {
    let upward_ranks = w.all_upward_ranks(c.mean_performance(), c.mean_bandwidth());

    let priority_list = sort_task_ids_by_rank_descending(&upward_ranks);

    let mut s = Schedule::new(c, w.size(), use_memory_requirements);

    for t_id in priority_list.into_iter() {
        let n_id = s.insert_into_best_eft_node_schedule(
            t_id,
            w,
            BestNodeMode::EarliestFinishTime,
            false,
        )?;
        log::debug!("heft: task {} -> node {}", t_id, n_id);
    }

    Ok(s)
}

/// Task ids by descending upward rank, lower id first on equal ranks.
fn sort_task_ids_by_rank_descending(upward_ranks: &[f64]) -> Vec<usize> {
    let mut priority_list: Vec<usize> = (0..upward_ranks.len()).collect();
    priority_list.sort_by(|&a, &b| upward_ranks[b].total_cmp(&upward_ranks[a]).then(a.cmp(&b)));
    priority_list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_sort_is_descending_with_id_ties() {
        let ranks = vec![1., 3., 3., 0.5];
        assert_eq!(sort_task_ids_by_rank_descending(&ranks), vec![1, 2, 0, 3]);
    }
}
