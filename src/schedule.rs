//! Shared schedule over all cluster nodes.

use crate::cluster::Cluster;
use crate::epsilon;
use crate::error::{Error, Result};
use crate::node_schedule::{NodeSchedule, TimeInterval};
use crate::workflow::{raw_data_transfer_cost, Workflow};

/// Selection target of [`Schedule::insert_into_best_eft_node_schedule`]:
/// minimize the earliest finish time or the earliest start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestNodeMode {
    EarliestFinishTime,
    EarliestStartTime,
}

/// Workflow edge whose producer and consumer intervals live on different
/// nodes.
#[derive(Debug, Clone, Copy)]
pub struct DifferingEdge {
    pub from_t_id: usize,
    pub from_n_id: usize,
    pub to_n_id: usize,
}

/// Time-stamped assignment of the workflow tasks onto the cluster nodes.
///
/// Algorithms mutate the schedule through the two placement primitives.
/// Every placement gets a fresh dense scheduled-task id, so one workflow task
/// may own several intervals when an algorithm duplicates it.
#[derive(Debug, Clone)]
pub struct Schedule {
    node_schedules: Vec<NodeSchedule>,
    // workflow task id -> intervals of all placements of the task
    task_intervals: Vec<Vec<TimeInterval>>,
    next_scheduled_task_id: usize,
    use_memory_requirements: bool,
}

impl Schedule {
    /// Creates an empty schedule for `task_count` tasks on the given cluster.
    ///
    /// When `use_memory_requirements` is set, best-node placement only
    /// considers nodes with enough memory for the task.
    pub fn new(c: &Cluster, task_count: usize, use_memory_requirements: bool) -> Self {
        Self {
            node_schedules: c.iter().map(|&node| NodeSchedule::new(node)).collect(),
            task_intervals: vec![Vec::new(); task_count],
            next_scheduled_task_id: 0,
            use_memory_requirements,
        }
    }

    pub fn node_schedules(&self) -> &Vec<NodeSchedule> {
        &self.node_schedules
    }

    pub fn task_intervals(&self, t_id: usize) -> &Vec<TimeInterval> {
        &self.task_intervals[t_id]
    }

    /// Workflow task ids scheduled on the node, in interval order.
    pub fn tasks_of_node(&self, n_id: usize) -> Vec<usize> {
        self.node_schedules[n_id]
            .intervals()
            .iter()
            .map(|interval| interval.task_id)
            .collect()
    }

    /// Places the task onto the given node into the earliest fitting slot.
    pub fn insert_into_node_schedule(
        &mut self,
        t_id: usize,
        n_id: usize,
        w: &Workflow,
        unscheduled_predecessors_allowed: bool,
    ) {
        let task = w.task(t_id);
        let ready_time = self.task_ready_time(t_id, n_id, w, unscheduled_predecessors_allowed);
        let node_schedule = &mut self.node_schedules[n_id];
        let slot = node_schedule.earliest_finish_time(ready_time, task);

        let interval = TimeInterval {
            start: slot.eft - node_schedule.computation_time(task),
            end: slot.eft,
            task_id: t_id,
            scheduled_task_id: self.next_scheduled_task_id,
            node_id: n_id,
        };
        self.next_scheduled_task_id += 1;

        self.task_intervals[t_id].push(interval);
        node_schedule.insert(slot.position, interval);
    }

    /// Places the task onto the node where it finishes (or starts) earliest,
    /// lowest node id on ties. Returns the chosen node.
    ///
    /// Fails only when memory-aware placement finds no node with sufficient
    /// memory.
    pub fn insert_into_best_eft_node_schedule(
        &mut self,
        t_id: usize,
        w: &Workflow,
        mode: BestNodeMode,
        unscheduled_predecessors_allowed: bool,
    ) -> Result<usize> {
        let task = w.task(t_id);

        let mut best: Option<(f64, usize)> = None;
        for n_id in 0..self.node_schedules.len() {
            let node_schedule = &self.node_schedules[n_id];
            if self.use_memory_requirements && node_schedule.node().memory < task.memory_requirement
            {
                continue;
            }

            let ready_time = self.task_ready_time(t_id, n_id, w, unscheduled_predecessors_allowed);
            let slot = node_schedule.earliest_finish_time(ready_time, task);
            let key = match mode {
                BestNodeMode::EarliestFinishTime => slot.eft,
                BestNodeMode::EarliestStartTime => slot.eft - node_schedule.computation_time(task),
            };

            // strict comparison keeps the lowest node id on ties
            match best {
                Some((best_key, _)) if key >= best_key => {}
                _ => best = Some((key, n_id)),
            }
        }

        let (_, n_id) = best.ok_or(Error::NoFeasibleNode(t_id))?;
        self.insert_into_node_schedule(t_id, n_id, w, unscheduled_predecessors_allowed);
        Ok(n_id)
    }

    /// Earliest moment all input data of the task is available on the target
    /// node: every predecessor contributes the best over its intervals of
    /// finish time plus transfer cost, transfers being free on the same node
    /// and paid with the sending node's bandwidth otherwise.
    fn task_ready_time(
        &self,
        t_id: usize,
        n_id: usize,
        w: &Workflow,
        unscheduled_predecessors_allowed: bool,
    ) -> f64 {
        let mut ready_time: f64 = 0.;

        for (&pred_id, &data_transfer) in w.task_incoming_edges(t_id).iter() {
            let intervals = &self.task_intervals[pred_id];
            if intervals.is_empty() {
                if unscheduled_predecessors_allowed {
                    continue;
                }
                panic!(
                    "internal bug: predecessor {} of task {} is not scheduled",
                    pred_id, t_id
                );
            }

            let data_available = intervals
                .iter()
                .map(|interval| interval.end + self.transfer_cost(interval.node_id, n_id, data_transfer))
                .min_by(|a, b| a.total_cmp(b))
                .unwrap();

            ready_time = ready_time.max(data_available);
        }

        ready_time
    }

    fn transfer_cost(&self, from_n_id: usize, to_n_id: usize, data_transfer: f64) -> f64 {
        if from_n_id == to_n_id {
            return 0.;
        }
        raw_data_transfer_cost(
            data_transfer,
            self.node_schedules[from_n_id].node().network_bandwidth,
        )
    }

    /// Finish time of the last task, 0 for an empty schedule.
    pub fn makespan(&self) -> f64 {
        self.node_schedules
            .iter()
            .map(|node_schedule| node_schedule.total_finish_time())
            .max_by(|a, b| a.total_cmp(b))
            .unwrap_or(0.)
    }

    /// Checks that the schedule executes the whole workflow and respects all
    /// dependencies: every node schedule is internally consistent, every task
    /// is placed at least once, and each placement starts no earlier than
    /// data from some interval of every predecessor can arrive.
    pub fn is_valid(&self, w: &Workflow) -> bool {
        if !self
            .node_schedules
            .iter()
            .all(|node_schedule| node_schedule.is_valid())
        {
            return false;
        }

        for task in w.tasks().iter() {
            if self.task_intervals[task.id].is_empty() {
                return false;
            }

            for interval in self.task_intervals[task.id].iter() {
                for (&pred_id, &data_transfer) in w.task_incoming_edges(task.id).iter() {
                    let satisfied = self.task_intervals[pred_id].iter().any(|pred_interval| {
                        epsilon::less_or_eq(
                            pred_interval.end
                                + self.transfer_cost(
                                    pred_interval.node_id,
                                    interval.node_id,
                                    data_transfer,
                                ),
                            interval.start,
                        )
                    });
                    if !satisfied {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Data volume moved between each pair of nodes, as raw transfer costs.
    ///
    /// For every edge the predecessor interval actually supplying the data is
    /// charged. Same-node transfers on the diagonal are summed with the raw
    /// cost as well; the matrix is an informational summary, not a scheduling
    /// cost.
    pub fn node_communication_matrix(&self, w: &Workflow) -> Vec<Vec<f64>> {
        let n = self.node_schedules.len();
        let mut matrix = vec![vec![0.; n]; n];

        for task in w.tasks().iter() {
            for interval in self.task_intervals[task.id].iter() {
                for (&pred_id, &data_transfer) in w.task_incoming_edges(task.id).iter() {
                    if let Some(pred_interval) =
                        self.supplying_interval(pred_id, interval.node_id, data_transfer)
                    {
                        let bandwidth =
                            self.node_schedules[pred_interval.node_id].node().network_bandwidth;
                        matrix[pred_interval.node_id][interval.node_id] +=
                            raw_data_transfer_cost(data_transfer, bandwidth);
                    }
                }
            }
        }

        matrix
    }

    /// Workflow edges whose producer and consumer ended up on different
    /// nodes, with the producer interval chosen like in the ready-time
    /// computation.
    pub fn different_node_edges(&self, w: &Workflow) -> Vec<DifferingEdge> {
        let mut edges = Vec::new();

        for task in w.tasks().iter() {
            for interval in self.task_intervals[task.id].iter() {
                for (&pred_id, &data_transfer) in w.task_incoming_edges(task.id).iter() {
                    if let Some(pred_interval) =
                        self.supplying_interval(pred_id, interval.node_id, data_transfer)
                    {
                        if pred_interval.node_id != interval.node_id {
                            edges.push(DifferingEdge {
                                from_t_id: pred_id,
                                from_n_id: pred_interval.node_id,
                                to_n_id: interval.node_id,
                            });
                        }
                    }
                }
            }
        }

        edges
    }

    // interval of `pred_id` whose data arrives first on `n_id`
    fn supplying_interval(
        &self,
        pred_id: usize,
        n_id: usize,
        data_transfer: f64,
    ) -> Option<&TimeInterval> {
        let mut best: Option<(f64, &TimeInterval)> = None;
        for interval in self.task_intervals[pred_id].iter() {
            let arrival = interval.end + self.transfer_cost(interval.node_id, n_id, data_transfer);
            match best {
                Some((best_arrival, _)) if arrival >= best_arrival => {}
                _ => best = Some((arrival, interval)),
            }
        }
        best.map(|(_, interval)| interval)
    }

    pub fn to_report_string(&self, algorithm: &str, valid: bool) -> String {
        let mut out = format!("########## {} schedule: ##########\n", algorithm);
        for node_schedule in self.node_schedules.iter() {
            out.push_str(&node_schedule.to_report_string());
            out.push('\n');
        }
        out.push_str(&format!(
            "[makespan: {:.2}] [schedule {} valid]\n",
            self.makespan(),
            if valid { "is" } else { "NOT" }
        ));
        out
    }
}

/// Builds a schedule from an externally supplied task-to-node assignment by
/// inserting every task onto its node in topological order.
pub fn from_assignment(
    assignment: &[usize],
    c: &Cluster,
    w: &Workflow,
    use_memory_requirements: bool,
) -> Schedule {
    let mut s = Schedule::new(c, w.size(), use_memory_requirements);
    for &t_id in w.topological_order().iter() {
        s.insert_into_node_schedule(t_id, assignment[t_id], w, false);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterNode;
    use crate::task::Task;
    use crate::workflow::Dependency;

    fn cluster(performances: &[f64], bandwidth: f64) -> Cluster {
        Cluster::new(
            performances
                .iter()
                .enumerate()
                .map(|(id, &core_performance)| ClusterNode {
                    id,
                    memory: 100.,
                    num_cores: 1,
                    core_performance,
                    network_bandwidth: bandwidth,
                })
                .collect(),
        )
        .unwrap()
    }

    fn two_task_workflow() -> Workflow {
        let tasks = vec![
            Task {
                id: 0,
                workload: 10.,
                memory_requirement: 0.,
            },
            Task {
                id: 1,
                workload: 10.,
                memory_requirement: 0.,
            },
        ];
        Workflow::new(
            tasks,
            vec![0., 4.],
            vec![4., 0.],
            vec![Dependency { from_id: 0, to_id: 1 }],
            vec![vec![0], vec![1]],
        )
        .unwrap()
    }

    #[test]
    fn ready_time_includes_transfer_between_nodes() {
        let c = cluster(&[1., 1.], 2.);
        let w = two_task_workflow();
        let mut s = Schedule::new(&c, w.size(), false);

        s.insert_into_node_schedule(0, 0, &w, false);
        s.insert_into_node_schedule(1, 1, &w, false);

        let interval = s.task_intervals(1)[0];
        // predecessor ends at 10, transfer 4 / 2
        assert_eq!(interval.start, 12.);
        assert_eq!(interval.end, 22.);
        assert!(s.is_valid(&w));
    }

    #[test]
    fn same_node_transfer_is_free() {
        let c = cluster(&[1., 1.], 2.);
        let w = two_task_workflow();
        let mut s = Schedule::new(&c, w.size(), false);

        s.insert_into_node_schedule(0, 0, &w, false);
        s.insert_into_node_schedule(1, 0, &w, false);

        let interval = s.task_intervals(1)[0];
        assert_eq!(interval.start, 10.);
        assert!(s.is_valid(&w));
    }

    #[test]
    fn best_eft_node_prefers_earliest_finish_with_lowest_id_ties() {
        let c = cluster(&[1., 1.], 2.);
        let w = two_task_workflow();
        let mut s = Schedule::new(&c, w.size(), false);

        let n0 = s
            .insert_into_best_eft_node_schedule(0, &w, BestNodeMode::EarliestFinishTime, false)
            .unwrap();
        assert_eq!(n0, 0);

        // same node wins: 20 on node 0 vs 12 + 10 on node 1
        let n1 = s
            .insert_into_best_eft_node_schedule(1, &w, BestNodeMode::EarliestFinishTime, false)
            .unwrap();
        assert_eq!(n1, 0);
        assert_eq!(s.makespan(), 20.);
    }

    #[test]
    fn start_time_mode_ignores_node_speed() {
        let c = cluster(&[1., 10.], 2.);
        let tasks = vec![Task {
            id: 0,
            workload: 10.,
            memory_requirement: 0.,
        }];
        let w = Workflow::new(tasks, vec![0.], vec![0.], Vec::new(), vec![vec![0]]).unwrap();

        // both nodes can start at 0, the tie goes to the lower id
        let mut s = Schedule::new(&c, w.size(), false);
        let n_id = s
            .insert_into_best_eft_node_schedule(0, &w, BestNodeMode::EarliestStartTime, false)
            .unwrap();
        assert_eq!(n_id, 0);

        // finish-time mode prefers the faster node
        let mut s = Schedule::new(&c, w.size(), false);
        let n_id = s
            .insert_into_best_eft_node_schedule(0, &w, BestNodeMode::EarliestFinishTime, false)
            .unwrap();
        assert_eq!(n_id, 1);
    }

    #[test]
    fn memory_aware_placement_fails_without_feasible_node() {
        let c = cluster(&[1.], 2.);
        let tasks = vec![Task {
            id: 0,
            workload: 1.,
            memory_requirement: 1000.,
        }];
        let w = Workflow::new(tasks, vec![0.], vec![0.], Vec::new(), vec![vec![0]]).unwrap();

        let mut s = Schedule::new(&c, w.size(), true);
        let res = s.insert_into_best_eft_node_schedule(0, &w, BestNodeMode::EarliestFinishTime, false);
        assert!(matches!(res, Err(Error::NoFeasibleNode(0))));
    }

    #[test]
    fn validity_catches_missing_transfer_margin() {
        // schedule task 1 on another node back to back, ignoring the transfer
        let c = cluster(&[1., 1.], 2.);
        let w = two_task_workflow();
        let mut s = Schedule::new(&c, w.size(), false);

        s.insert_into_node_schedule(0, 0, &w, false);
        // forge an interval that starts exactly at the predecessor's end
        let interval = TimeInterval {
            start: 10.,
            end: 20.,
            task_id: 1,
            scheduled_task_id: 1,
            node_id: 1,
        };
        s.task_intervals[1].push(interval);
        s.node_schedules[1].insert(0, interval);

        assert!(!s.is_valid(&w));
    }

    #[test]
    fn empty_schedule_has_zero_makespan() {
        let c = cluster(&[1.], 2.);
        let s = Schedule::new(&c, 0, false);
        assert_eq!(s.makespan(), 0.);
    }

    #[test]
    fn communication_matrix_charges_the_supplying_node() {
        let c = cluster(&[1., 1.], 2.);
        let w = two_task_workflow();
        let mut s = Schedule::new(&c, w.size(), false);

        s.insert_into_node_schedule(0, 0, &w, false);
        s.insert_into_node_schedule(1, 1, &w, false);

        let matrix = s.node_communication_matrix(&w);
        assert_eq!(matrix[0][1], 2.);
        assert_eq!(matrix[1][0], 0.);

        let edges = s.different_node_edges(&w);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_t_id, 0);
        assert_eq!(edges[0].from_n_id, 0);
        assert_eq!(edges[0].to_n_id, 1);
    }
}
