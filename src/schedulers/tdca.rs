//! TDCA: task-duplication clustering.
//!
//! Builds initial per-node task groups along critical-predecessor chains,
//! then improves them in three rounds: duplicating predecessor chains onto
//! other nodes, merging whole nodes into the fastest one, and copying the
//! producers of cross-node edges next to their consumers. A move is kept
//! only when the regenerated schedule's makespan does not increase.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::epsilon;
use crate::error::Result;
use crate::report::Report;
use crate::schedule::{BestNodeMode, Schedule};
use crate::schedulers::common::TaskGroup;
use crate::workflow::{raw_data_transfer_cost, NodeTaskMatrix, Workflow, NO_TASK};

const IMPROVEMENT_ROUNDS: usize = 4;

pub fn tdca(
    c: &Cluster,
    w: &Workflow,
    use_memory_requirements: bool,
    report: &mut Report,
) -> Result<Schedule> {
    if use_memory_requirements {
        report.warn("memory requirements are not used by TDCA")?;
    }

    let (_est, eft, cpred) = w.compute_est_and_eft(c);

    // the "level" of a task: its upward rank on the slowest node
    let worst_performance = c
        .node(c.worst_performance_node(0.).unwrap())
        .performance();
    let level = w.all_upward_ranks(worst_performance, c.uniform_bandwidth());

    let mut groups = initial_groups(c, w, &level, &cpred, &eft)?;

    task_duplication(c, w, &mut groups, &cpred);

    merge_nodes(c, w, &mut groups);

    refine_edges(c, w, &mut groups);

    Ok(schedule_from_groups(c, w, &groups, false))
}

/// Regenerates a schedule from the per-node groups, inserting all placements
/// of every task in the workflow's topological order.
fn schedule_from_groups(
    c: &Cluster,
    w: &Workflow,
    groups: &[TaskGroup],
    unscheduled_predecessors_allowed: bool,
) -> Schedule {
    let mut s = Schedule::new(c, w.size(), false);

    let mut task_to_nodes: Vec<Vec<usize>> = vec![Vec::new(); w.size()];
    for (n_id, group) in groups.iter().enumerate() {
        for t_id in group.tasks_in_topological_order(w).into_iter() {
            task_to_nodes[t_id].push(n_id);
        }
    }

    for &t_id in w.topological_order().iter() {
        for &n_id in task_to_nodes[t_id].iter() {
            s.insert_into_node_schedule(t_id, n_id, w, unscheduled_predecessors_allowed);
        }
    }

    s
}

fn task_ids_sorted_by_level_ascending(w: &Workflow, level: &[f64]) -> Vec<usize> {
    let mut task_ids: Vec<usize> = (0..w.size()).collect();
    task_ids.sort_by(|&a, &b| level[a].total_cmp(&level[b]).then(a.cmp(&b)));
    task_ids
}

/// Among the unassigned in-neighbors of `curr_task_id`, the one with the
/// lowest finish time on `curr_node_id`, provided running it there is not
/// worse than running it on the best node and paying the transfer.
fn find_better_predecessor(
    c: &Cluster,
    w: &Workflow,
    eft: &NodeTaskMatrix,
    assigned: &[bool],
    curr_task_id: usize,
    curr_node_id: usize,
) -> Option<usize> {
    let best_node_id = c.best_performance_node(0.).unwrap();

    let mut best: Option<usize> = None;
    for (&pred_id, &data_transfer) in w.task_incoming_edges(curr_task_id).iter() {
        if assigned[pred_id] {
            continue;
        }
        let data_transfer_cost = raw_data_transfer_cost(data_transfer, c.uniform_bandwidth());
        if !epsilon::less_or_eq(
            eft.get(pred_id, curr_node_id),
            eft.get(pred_id, best_node_id) + data_transfer_cost,
        ) {
            continue;
        }

        match best {
            Some(b) if eft.get(pred_id, curr_node_id) >= eft.get(b, curr_node_id) => {}
            _ => best = Some(pred_id),
        }
    }

    best
}

/// Initial clustering: walk the tasks by ascending level, give each yet
/// unassigned task the next node (fastest remaining first) and pull its
/// critical-predecessor chain onto the same node. Leftover tasks are placed
/// by best EFT afterwards.
fn initial_groups(
    c: &Cluster,
    w: &Workflow,
    level: &[f64],
    cpred: &[usize],
    eft: &NodeTaskMatrix,
) -> Result<Vec<TaskGroup>> {
    let mut groups: Vec<TaskGroup> = vec![TaskGroup::default(); c.size()];

    let sorted_task_ids = task_ids_sorted_by_level_ascending(w, level);
    // best node ids to the back, so pops hand out the fastest node first
    let mut remaining_node_ids = c.node_ids_sorted_by_performance_ascending();

    let mut assigned = vec![false; w.size()];
    let best_node_id = c.best_performance_node(0.).unwrap();

    for seed_task_id in sorted_task_ids.into_iter() {
        if assigned[seed_task_id] {
            continue;
        }
        let curr_node_id = match remaining_node_ids.pop() {
            Some(n_id) => n_id,
            None => break,
        };

        groups[curr_node_id].add_task(w, seed_task_id);
        assigned[seed_task_id] = true;

        // bubble up along the critical-predecessor chain
        let mut curr_task_id = seed_task_id;
        while !w.is_independent(curr_task_id) {
            let mut next_task_id = cpred[curr_task_id];

            let incoming_edges = w.task_incoming_edges(curr_task_id);
            let data_transfer_cost =
                raw_data_transfer_cost(incoming_edges[&next_task_id], c.uniform_bandwidth());

            if incoming_edges.len() > 1
                && (assigned[next_task_id]
                    || epsilon::greater(
                        eft.get(next_task_id, curr_node_id),
                        eft.get(next_task_id, best_node_id) + data_transfer_cost,
                    ))
            {
                match find_better_predecessor(c, w, eft, &assigned, curr_task_id, curr_node_id) {
                    Some(better_task_id) => next_task_id = better_task_id,
                    None => break,
                }
            }

            groups[curr_node_id].add_task(w, next_task_id);
            assigned[next_task_id] = true;
            curr_task_id = next_task_id;
        }
    }

    if assigned.iter().any(|&a| !a) {
        // add the remaining tasks to the groups that minimize their finish time
        let mut s = schedule_from_groups(c, w, &groups, true);
        for &t_id in w.topological_order().iter() {
            if assigned[t_id] {
                continue;
            }
            let n_id =
                s.insert_into_best_eft_node_schedule(t_id, w, BestNodeMode::EarliestFinishTime, true)?;
            groups[n_id].add_task(w, t_id);
            assigned[t_id] = true;
        }
    }

    Ok(groups)
}

/// The critical-predecessor chain of the task, excluding the task itself.
fn predecessor_trail(w: &Workflow, cpred: &[usize], t_id: usize) -> Vec<usize> {
    let mut trail = Vec::new();
    let mut curr = t_id;
    while !w.is_independent(curr) {
        curr = cpred[curr];
        debug_assert_ne!(curr, NO_TASK);
        trail.push(curr);
    }
    trail
}

/// Duplication phase: repeatedly try to off-load all but the last tasks of a
/// node to an unoccupied (or the best) node while copying the retained
/// task's predecessor chain onto the node, keeping changes that do not
/// increase the makespan.
fn task_duplication(c: &Cluster, w: &Workflow, groups: &mut Vec<TaskGroup>, cpred: &[usize]) {
    let mut unoccupied_node_ids: Vec<usize> = c
        .node_ids_sorted_by_performance_ascending()
        .into_iter()
        .filter(|&n_id| groups[n_id].is_empty())
        .collect();

    let best_node_id = c.best_performance_node(0.).unwrap();
    let mut curr_sched = schedule_from_groups(c, w, groups, false);

    for _ in 0..IMPROVEMENT_ROUNDS {
        for curr_node_id in 0..c.size() {
            let mut task_ids = groups[curr_node_id].tasks_in_topological_order(w);

            if task_ids.len() > 1 {
                for i in (1..task_ids.len()).rev() {
                    let next_node_id = unoccupied_node_ids.pop().unwrap_or(best_node_id);

                    if task_ids[i - 1] == cpred[task_ids[i]] {
                        continue;
                    }

                    let mut temp_groups = groups.clone();

                    // move all the tasks before the i-th to the new node
                    let move_ids: BTreeSet<usize> = task_ids[..i].iter().copied().collect();
                    temp_groups[curr_node_id].remove_tasks(w, &move_ids);
                    for &move_id in move_ids.iter() {
                        temp_groups[next_node_id].add_task(w, move_id);
                    }

                    // duplicate the predecessor trail of the i-th task here
                    for trail_id in predecessor_trail(w, cpred, task_ids[i]).into_iter() {
                        temp_groups[curr_node_id].add_task(w, trail_id);
                    }

                    let temp_sched = schedule_from_groups(c, w, &temp_groups, false);
                    if epsilon::less_or_eq(temp_sched.makespan(), curr_sched.makespan()) {
                        curr_sched = temp_sched;
                        *groups = temp_groups;
                        break;
                    }
                }

                // the group might have changed
                task_ids = groups[curr_node_id].tasks_in_topological_order(w);
            }

            if let Some(&first_task_id) = task_ids.first() {
                if !w.is_independent(first_task_id) {
                    let mut temp_groups = groups.clone();
                    for trail_id in predecessor_trail(w, cpred, first_task_id).into_iter() {
                        temp_groups[curr_node_id].add_task(w, trail_id);
                    }

                    let temp_sched = schedule_from_groups(c, w, &temp_groups, false);
                    if epsilon::less_or_eq(temp_sched.makespan(), curr_sched.makespan()) {
                        curr_sched = temp_sched;
                        *groups = temp_groups;
                    }
                }
            }
        }
    }
}

/// Merge phase: try to move each node's tasks in bulk to the best node,
/// keeping changes that do not increase the makespan.
fn merge_nodes(c: &Cluster, w: &Workflow, groups: &mut Vec<TaskGroup>) {
    let best_node_id = c.best_performance_node(0.).unwrap();
    let mut curr_sched = schedule_from_groups(c, w, groups, false);

    for _ in 0..IMPROVEMENT_ROUNDS {
        for curr_node_id in 0..c.size() {
            if curr_node_id == best_node_id || groups[curr_node_id].is_empty() {
                continue;
            }

            let mut temp_groups = groups.clone();
            let move_ids = temp_groups[curr_node_id].clear_and_return_task_ids();
            for &move_id in move_ids.iter() {
                temp_groups[best_node_id].add_task(w, move_id);
            }

            let temp_sched = schedule_from_groups(c, w, &temp_groups, false);
            if epsilon::less_or_eq(temp_sched.makespan(), curr_sched.makespan()) {
                curr_sched = temp_sched;
                *groups = temp_groups;
            }
        }
    }
}

/// Edge refinement: for every edge crossing nodes, copy the producer next to
/// the consumer and drop it from its old node when no consumer reads it
/// there anymore, keeping changes that do not increase the makespan.
fn refine_edges(c: &Cluster, w: &Workflow, groups: &mut Vec<TaskGroup>) {
    let mut curr_sched = schedule_from_groups(c, w, groups, false);
    let differing_edges = curr_sched.different_node_edges(w);

    for edge in differing_edges.into_iter() {
        let mut temp_groups = groups.clone();

        temp_groups[edge.to_n_id].add_task(w, edge.from_t_id);

        let successors_in_group = w
            .task_outgoing_edges(edge.from_t_id)
            .keys()
            .any(|&succ_id| temp_groups[edge.from_n_id].contains(succ_id));

        // an earlier accepted move might have dropped the producer already
        if !successors_in_group && temp_groups[edge.from_n_id].contains(edge.from_t_id) {
            let move_ids: BTreeSet<usize> = std::iter::once(edge.from_t_id).collect();
            temp_groups[edge.from_n_id].remove_tasks(w, &move_ids);
        }

        let temp_sched = schedule_from_groups(c, w, &temp_groups, false);
        if epsilon::less_or_eq(temp_sched.makespan(), curr_sched.makespan()) {
            curr_sched = temp_sched;
            *groups = temp_groups;
        }
    }
}
