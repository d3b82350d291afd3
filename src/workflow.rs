//! Workflow model of computation.
//!
//! A workflow is a DAG of tasks whose edges are weighted by the transferred
//! data volume, plus the partition of the tasks into bags. On top of the
//! graph it provides the rank computations and time matrices that the
//! scheduling algorithms consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::graph::DiGraph;
use crate::task::Task;

/// Sentinel for "no critical predecessor" (entry tasks).
pub const NO_TASK: usize = usize::MAX;

/// Directed dependency between two tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dependency {
    pub from_id: usize,
    pub to_id: usize,
}

/// Per-(node, task) matrix with a checked accessor, `data[node_id][task_id]`.
#[derive(Debug, Clone)]
pub struct NodeTaskMatrix {
    data: Vec<Vec<f64>>,
}

impl NodeTaskMatrix {
    pub fn new(data: Vec<Vec<f64>>) -> Self {
        Self { data }
    }

    pub fn get(&self, t_id: usize, n_id: usize) -> f64 {
        self.data[n_id][t_id]
    }
}

/// Cost of moving `data_transfer` units over a link with `bandwidth`,
/// regardless of the endpoints.
pub fn raw_data_transfer_cost(data_transfer: f64, bandwidth: f64) -> f64 {
    data_transfer / bandwidth
}

/// Like [`raw_data_transfer_cost`], but free when source and target node
/// coincide.
pub fn data_transfer_cost(n_id0: usize, n_id1: usize, data_transfer: f64, bandwidth: f64) -> f64 {
    if n_id0 == n_id1 {
        return 0.;
    }
    raw_data_transfer_cost(data_transfer, bandwidth)
}

/// Task DAG with the bag partition.
///
/// The topological order is fixed at construction; its per-task rank serves
/// as a total tie-breaker wherever the algorithms need a deterministic order
/// of structurally equal tasks.
#[derive(Debug, Clone)]
pub struct Workflow {
    graph: DiGraph<Task, f64>,
    topological_order: Vec<usize>,
    topological_ranks: Vec<usize>,
    independent_task_ids: Vec<usize>,
    task_ids_per_bag: Vec<Vec<usize>>,
}

impl Workflow {
    /// Builds the workflow DAG from expanded tasks and their dependencies.
    /// At least one task is required.
    ///
    /// The ids in the dependencies refer to indices of the task vector. For
    /// every dependency the sender's output data size must equal the
    /// receiver's input data size; this shared value becomes the edge weight.
    pub fn new(
        tasks: Vec<Task>,
        input_data_sizes: Vec<f64>,
        output_data_sizes: Vec<f64>,
        dependencies: Vec<Dependency>,
        task_ids_per_bag: Vec<Vec<usize>>,
    ) -> Result<Self> {
        assert_eq!(tasks.len(), input_data_sizes.len());
        assert_eq!(tasks.len(), output_data_sizes.len());

        if tasks.is_empty() {
            return Err(Error::EmptyWorkflow);
        }

        let mut graph = DiGraph::new();

        for task in tasks.into_iter() {
            if task.workload == 0. {
                return Err(Error::ZeroWorkload(task.id));
            }
            graph.add_vertex(task);
        }

        for dep in dependencies.iter() {
            if dep.from_id >= graph.vertex_count() || dep.to_id >= graph.vertex_count() {
                return Err(Error::InvalidDependency {
                    from: dep.from_id,
                    to: dep.to_id,
                });
            }

            let output_data_size = output_data_sizes[dep.from_id];
            let input_data_size = input_data_sizes[dep.to_id];
            if output_data_size != input_data_size {
                return Err(Error::DataSizeMismatch {
                    from: dep.from_id,
                    to: dep.to_id,
                    output: output_data_size,
                    input: input_data_size,
                });
            }

            if !graph.add_edge(dep.from_id, dep.to_id, output_data_size) {
                return Err(Error::InvalidDependency {
                    from: dep.from_id,
                    to: dep.to_id,
                });
            }
        }

        let topological_order = graph.topological_order().ok_or(Error::CyclicDependencies)?;
        let mut topological_ranks = vec![0; topological_order.len()];
        for (rank, &t_id) in topological_order.iter().enumerate() {
            topological_ranks[t_id] = rank;
        }
        let independent_task_ids = graph.independent_vertex_ids();

        Ok(Self {
            graph,
            topological_order,
            topological_ranks,
            independent_task_ids,
            task_ids_per_bag,
        })
    }

    pub fn task(&self, t_id: usize) -> &Task {
        self.graph.vertex(t_id)
    }

    pub fn tasks(&self) -> &Vec<Task> {
        self.graph.vertices()
    }

    /// Number of tasks in the workflow.
    pub fn size(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn task_incoming_edges(&self, t_id: usize) -> &BTreeMap<usize, f64> {
        self.graph.incoming_edges(t_id)
    }

    pub fn task_outgoing_edges(&self, t_id: usize) -> &BTreeMap<usize, f64> {
        self.graph.outgoing_edges(t_id)
    }

    pub fn all_incoming_edges(&self) -> &Vec<BTreeMap<usize, f64>> {
        self.graph.all_incoming_edges()
    }

    pub fn topological_order(&self) -> &Vec<usize> {
        &self.topological_order
    }

    /// Rank of the task within the fixed topological order.
    pub fn topological_task_rank(&self, t_id: usize) -> usize {
        self.topological_ranks[t_id]
    }

    /// Ids of the tasks without incoming edges, in ascending id order.
    pub fn independent_task_ids(&self) -> &Vec<usize> {
        &self.independent_task_ids
    }

    pub fn is_independent(&self, t_id: usize) -> bool {
        self.graph.incoming_edges(t_id).is_empty()
    }

    pub fn task_ids_per_bag(&self) -> &Vec<Vec<usize>> {
        &self.task_ids_per_bag
    }

    /// Upward ranks of all tasks: the length of the longest path from each
    /// task to an exit task, where computation costs are scaled by the given
    /// representative `performance` and transfer costs by `bandwidth`.
    ///
    /// HEFT and CPOP pass cluster means here, TDCA the worst performance and
    /// the uniform bandwidth.
    pub fn all_upward_ranks(&self, performance: f64, bandwidth: f64) -> Vec<f64> {
        let mut upward_ranks = vec![0.; self.size()];

        for &t_id in self.topological_order.iter().rev() {
            let mut rank = self.task(t_id).workload / performance;
            let outgoing_max = self
                .task_outgoing_edges(t_id)
                .iter()
                .map(|(&succ_id, &data_transfer)| {
                    data_transfer / bandwidth + upward_ranks[succ_id]
                })
                .max_by(|a, b| a.total_cmp(b));
            if let Some(max) = outgoing_max {
                rank += max;
            }
            upward_ranks[t_id] = rank;
        }

        upward_ranks
    }

    /// Downward ranks of all tasks: the length of the longest path from an
    /// entry task to each task, excluding the task's own computation.
    /// Entry tasks have rank 0.
    pub fn all_downward_ranks(&self, performance: f64, bandwidth: f64) -> Vec<f64> {
        let mut downward_ranks = vec![0.; self.size()];

        for &t_id in self.topological_order.iter() {
            downward_ranks[t_id] = self
                .task_incoming_edges(t_id)
                .iter()
                .map(|(&pred_id, &data_transfer)| {
                    self.task(pred_id).workload / performance
                        + data_transfer / bandwidth
                        + downward_ranks[pred_id]
                })
                .max_by(|a, b| a.total_cmp(b))
                .unwrap_or(0.);
        }

        downward_ranks
    }

    /// Earliest start/finish times of every task on every node, together with
    /// the critical predecessor of every task: the in-neighbor realizing the
    /// earliest start time on the best-performing node ([`NO_TASK`] for entry
    /// tasks).
    ///
    /// Since node performances uniformly scale the task workloads, the node
    /// with the best finish time for a predecessor is always the one with the
    /// best performance; the start time can still improve by keeping producer
    /// and consumer on the same node.
    pub fn compute_est_and_eft(&self, c: &Cluster) -> (NodeTaskMatrix, NodeTaskMatrix, Vec<usize>) {
        let mut est = vec![vec![0.; self.size()]; c.size()];
        let mut eft = vec![vec![0.; self.size()]; c.size()];
        let mut cpred = vec![NO_TASK; self.size()];

        let best_node_id = c.best_performance_node(0.).unwrap();
        let bandwidth = c.uniform_bandwidth();

        for &t_id in self.topological_order.iter() {
            for node in c.iter() {
                let mut max_incoming_eft = 0.;
                let mut cpred_id = NO_TASK;

                for (&pred_id, &data_transfer) in self.task_incoming_edges(t_id).iter() {
                    let via_best = eft[best_node_id][pred_id]
                        + data_transfer_cost(best_node_id, node.id, data_transfer, bandwidth);
                    let via_same = eft[node.id][pred_id];
                    let incoming_eft = via_best.min(via_same);

                    // strict comparison keeps the lowest predecessor id on ties
                    if cpred_id == NO_TASK || incoming_eft > max_incoming_eft {
                        max_incoming_eft = incoming_eft;
                        cpred_id = pred_id;
                    }
                }

                est[node.id][t_id] = max_incoming_eft;
                eft[node.id][t_id] =
                    max_incoming_eft + self.task(t_id).workload / node.performance();

                if node.id == best_node_id {
                    cpred[t_id] = cpred_id;
                }
            }
        }

        (
            NodeTaskMatrix::new(est),
            NodeTaskMatrix::new(eft),
            cpred,
        )
    }

    /// Makespan of running every task back to back on a node with the given
    /// performance.
    pub fn sequential_makespan(&self, performance: f64) -> f64 {
        self.tasks().iter().map(|t| t.workload / performance).sum()
    }

    pub fn to_report_string(&self, best_performance: Option<f64>) -> String {
        let mut out = String::from("########## Workflow: ##########\n");
        out.push_str("-- dependency format: (-> <target_task_id>, <data_transfer>)\n");

        for task in self.tasks().iter() {
            out.push_str(&format!(
                "task {}: workload {}, memory {},\n\toutgoing dependencies:",
                task.id, task.workload, task.memory_requirement
            ));
            for (succ_id, data_transfer) in self.task_outgoing_edges(task.id).iter() {
                out.push_str(&format!(" (-> {}, {})", succ_id, data_transfer));
            }
            out.push('\n');
        }

        if let Some(performance) = best_performance {
            out.push_str(&format!(
                "sequential makespan: {:.2}\n",
                self.sequential_makespan(performance)
            ));
        }

        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterNode;

    fn simple_workflow() -> Workflow {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let tasks = (0..4)
            .map(|id| Task {
                id,
                workload: 10. * (id + 1) as f64,
                memory_requirement: 0.,
            })
            .collect();
        let deps = vec![
            Dependency { from_id: 0, to_id: 1 },
            Dependency { from_id: 0, to_id: 2 },
            Dependency { from_id: 1, to_id: 3 },
            Dependency { from_id: 2, to_id: 3 },
        ];
        Workflow::new(
            tasks,
            vec![0., 4., 4., 8.],
            vec![4., 8., 8., 0.],
            deps,
            vec![vec![0], vec![1, 2], vec![3]],
        )
        .unwrap()
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let res = Workflow::new(Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert!(matches!(res, Err(Error::EmptyWorkflow)));
    }

    #[test]
    fn zero_workload_is_rejected() {
        let tasks = vec![Task {
            id: 0,
            workload: 0.,
            memory_requirement: 0.,
        }];
        let res = Workflow::new(tasks, vec![0.], vec![0.], Vec::new(), vec![vec![0]]);
        assert!(matches!(res, Err(Error::ZeroWorkload(0))));
    }

    #[test]
    fn mismatched_data_sizes_are_rejected() {
        let tasks = (0..2)
            .map(|id| Task {
                id,
                workload: 1.,
                memory_requirement: 0.,
            })
            .collect();
        let res = Workflow::new(
            tasks,
            vec![0., 3.],
            vec![4., 0.],
            vec![Dependency { from_id: 0, to_id: 1 }],
            vec![vec![0], vec![1]],
        );
        assert!(matches!(res, Err(Error::DataSizeMismatch { .. })));
    }

    #[test]
    fn cyclic_dependencies_are_rejected() {
        let tasks = (0..2)
            .map(|id| Task {
                id,
                workload: 1.,
                memory_requirement: 0.,
            })
            .collect();
        let res = Workflow::new(
            tasks,
            vec![4., 4.],
            vec![4., 4.],
            vec![
                Dependency { from_id: 0, to_id: 1 },
                Dependency { from_id: 1, to_id: 0 },
            ],
            vec![vec![0, 1]],
        );
        assert!(matches!(res, Err(Error::CyclicDependencies)));
    }

    #[test]
    fn upward_rank_of_single_sink_is_its_compute_cost() {
        let w = simple_workflow();
        let ranks = w.all_upward_ranks(2., 1.);
        // sink: workload 40 at performance 2
        assert_eq!(ranks[3], 20.);
        // chain through task 2: 10/2 + 4 + (30/2 + 8 + 20)
        assert_eq!(ranks[0], 5. + 4. + (15. + 8. + 20.));
    }

    #[test]
    fn downward_rank_of_source_is_zero() {
        let w = simple_workflow();
        let ranks = w.all_downward_ranks(2., 1.);
        assert_eq!(ranks[0], 0.);
        // 10/2 + edge weight 4
        assert_eq!(ranks[2], 5. + 4.);
        assert_eq!(ranks[3], (5. + 4.) + 15. + 8.);
    }

    #[test]
    fn est_eft_and_critical_predecessors() {
        let w = simple_workflow();
        let c = Cluster::new(vec![
            ClusterNode {
                id: 0,
                memory: 1.,
                num_cores: 1,
                core_performance: 1.,
                network_bandwidth: 1.,
            },
            ClusterNode {
                id: 1,
                memory: 1.,
                num_cores: 1,
                core_performance: 2.,
                network_bandwidth: 1.,
            },
        ])
        .unwrap();

        let (est, eft, cpred) = w.compute_est_and_eft(&c);

        // entry task
        assert_eq!(est.get(0, 1), 0.);
        assert_eq!(eft.get(0, 1), 5.);
        assert_eq!(cpred[0], NO_TASK);

        // task 1 on the best node: predecessor finishes at 5, same node
        assert_eq!(est.get(1, 1), 5.);
        assert_eq!(eft.get(1, 1), 5. + 10.);
        assert_eq!(cpred[1], 0);

        // task 1 on node 0: min(via best + transfer, same node) = min(5 + 4, 10)
        assert_eq!(est.get(1, 0), 9.);
    }

    #[test]
    fn sequential_makespan_sums_workloads() {
        let w = simple_workflow();
        assert_eq!(w.sequential_makespan(2.), (10. + 20. + 30. + 40.) / 2.);
    }
}
