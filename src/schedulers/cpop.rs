//! CPOP: critical path on a processor.
//!
//! Tasks are prioritized by the sum of upward and downward rank; the tasks
//! of the critical path all go to the fastest node, everything else is
//! placed by best EFT in dataflow order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cluster::Cluster;
use crate::epsilon;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::schedule::{BestNodeMode, Schedule};
use crate::workflow::Workflow;

struct PrioritizedTask {
    id: usize,
    priority: f64,
    on_critical_path: bool,
}

// higher priority first; on equal priorities the lower id wins
impl Ord for PrioritizedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(other.id.cmp(&self.id))
    }
}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PrioritizedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PrioritizedTask {}

pub fn cpop(
    c: &Cluster,
    w: &Workflow,
    use_memory_requirements: bool,
    report: &mut Report,
) -> Result<Schedule> {
    let downward_ranks = w.all_downward_ranks(c.mean_performance(), c.mean_bandwidth());
    let upward_ranks = w.all_upward_ranks(c.mean_performance(), c.mean_bandwidth());

    let task_priorities: Vec<f64> = downward_ranks
        .iter()
        .zip(upward_ranks.iter())
        .map(|(d, u)| d + u)
        .collect();

    let critical_path = compute_critical_path(w, &task_priorities);
    report.write_str(&critical_path_to_report_string(&critical_path))?;

    let best_node = best_fitting_node(&critical_path, w, c, use_memory_requirements)?;

    let mut s = Schedule::new(c, w.size(), use_memory_requirements);

    let mut prio_q: BinaryHeap<PrioritizedTask> = BinaryHeap::new();
    for &t_id in w.independent_task_ids().iter() {
        prio_q.push(PrioritizedTask {
            id: t_id,
            priority: task_priorities[t_id],
            on_critical_path: critical_path.contains(&t_id),
        });
    }

    // decremented incoming-degree table to surface newly independent tasks
    let mut remaining_incoming: Vec<usize> = w
        .all_incoming_edges()
        .iter()
        .map(|edges| edges.len())
        .collect();

    while let Some(task) = prio_q.pop() {
        if task.on_critical_path {
            s.insert_into_node_schedule(task.id, best_node, w, false);
            log::debug!("cpop: critical task {} -> node {}", task.id, best_node);
        } else {
            let n_id = s.insert_into_best_eft_node_schedule(
                task.id,
                w,
                BestNodeMode::EarliestFinishTime,
                false,
            )?;
            log::debug!("cpop: task {} -> node {}", task.id, n_id);
        }

        for &succ_id in w.task_outgoing_edges(task.id).keys() {
            if remaining_incoming[succ_id] == 0 {
                panic!("internal bug: incoming/outgoing edges are out of sync");
            }
            remaining_incoming[succ_id] -= 1;
            if remaining_incoming[succ_id] == 0 {
                prio_q.push(PrioritizedTask {
                    id: succ_id,
                    priority: task_priorities[succ_id],
                    on_critical_path: critical_path.contains(&succ_id),
                });
            }
        }
    }

    Ok(s)
}

/// Walks the maximum-priority path: start from the independent task with the
/// highest priority and repeatedly follow the successor whose priority is
/// epsilon-equal to it, lowest id among equal candidates.
///
/// The returned path is sorted by task id.
fn compute_critical_path(w: &Workflow, task_priorities: &[f64]) -> Vec<usize> {
    // a single entry task is not enforced; pick the best independent task
    let mut entry: Option<usize> = None;
    for &t_id in w.independent_task_ids().iter() {
        match entry {
            Some(e) if task_priorities[t_id] <= task_priorities[e] => {}
            _ => entry = Some(t_id),
        }
    }
    let entry = entry.expect("workflow has at least one independent task");

    let critical_priority = task_priorities[entry];
    let mut critical_path = vec![entry];
    let mut curr = entry;

    loop {
        // outgoing edges are ordered by id, the first match is the lowest
        let next = w
            .task_outgoing_edges(curr)
            .keys()
            .copied()
            .find(|&succ_id| epsilon::eq(task_priorities[succ_id], critical_priority));

        match next {
            Some(succ_id) => {
                critical_path.push(succ_id);
                curr = succ_id;
            }
            None => break,
        }
    }

    critical_path.sort_unstable();
    critical_path
}

/// The fastest node that fits the critical path: with memory awareness the
/// largest memory requirement on the path becomes the floor.
fn best_fitting_node(
    critical_path: &[usize],
    w: &Workflow,
    c: &Cluster,
    use_memory_requirements: bool,
) -> Result<usize> {
    if !use_memory_requirements {
        return Ok(c.best_performance_node(0.).unwrap());
    }

    let mut memory_requirement = 0.;
    let mut heaviest_task = critical_path[0];
    for &t_id in critical_path.iter() {
        let memory = w.task(t_id).memory_requirement;
        if memory > memory_requirement {
            memory_requirement = memory;
            heaviest_task = t_id;
        }
    }

    c.best_performance_node(memory_requirement)
        .ok_or(Error::NoFeasibleNode(heaviest_task))
}

fn critical_path_to_report_string(critical_path: &[usize]) -> String {
    let mut out = String::from("CPOP -- Critical path: [ ");
    for &t_id in critical_path.iter() {
        out.push_str(&format!("{} ", t_id));
    }
    out.push_str("]\n\n");
    out
}
