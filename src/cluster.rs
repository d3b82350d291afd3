//! Cluster model.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Represents a compute node of the cluster.
///
/// Described by its memory capacity, the number of CPU cores, the performance
/// of a single core in work units per time, and the network bandwidth in data
/// units per time. The scheduling logic assumes the bandwidth to be uniform
/// across the cluster; per-node values are carried anyway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: usize,
    pub memory: f64,
    pub num_cores: u32,
    pub core_performance: f64,
    pub network_bandwidth: f64,
}

impl ClusterNode {
    /// Aggregate performance of the node over all its cores.
    pub fn performance(&self) -> f64 {
        self.core_performance * self.num_cores as f64
    }
}

/// Non-empty, read-only set of cluster nodes indexed by id.
#[derive(Debug, Clone)]
pub struct Cluster {
    nodes: Vec<ClusterNode>,
}

impl Cluster {
    pub fn new(nodes: Vec<ClusterNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::EmptyCluster);
        }
        Ok(Self { nodes })
    }

    pub fn node(&self, n_id: usize) -> &ClusterNode {
        &self.nodes[n_id]
    }

    pub fn nodes(&self) -> &Vec<ClusterNode> {
        &self.nodes
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterNode> {
        self.nodes.iter()
    }

    /// Node ids ordered by ascending performance; equal performances are
    /// ordered by id.
    pub fn node_ids_sorted_by_performance_ascending(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.nodes.len()).collect();
        ids.sort_by(|&a, &b| {
            self.nodes[a]
                .performance()
                .total_cmp(&self.nodes[b].performance())
                .then(a.cmp(&b))
        });
        ids
    }

    /// Node ids ordered by descending performance; equal performances are
    /// ordered by id.
    pub fn node_ids_sorted_by_performance_descending(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.nodes.len()).collect();
        ids.sort_by(|&a, &b| {
            self.nodes[b]
                .performance()
                .total_cmp(&self.nodes[a].performance())
                .then(a.cmp(&b))
        });
        ids
    }

    /// Id of the fastest node among those with at least `min_memory` memory,
    /// lowest id on ties. Fails only when no node has sufficient memory.
    pub fn best_performance_node(&self, min_memory: f64) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| node.memory >= min_memory)
            .fold(None, |best: Option<&ClusterNode>, node| match best {
                Some(b) if node.performance() <= b.performance() => Some(b),
                _ => Some(node),
            })
            .map(|node| node.id)
    }

    /// Id of the slowest node among those with at least `min_memory` memory,
    /// lowest id on ties.
    pub fn worst_performance_node(&self, min_memory: f64) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| node.memory >= min_memory)
            .fold(None, |worst: Option<&ClusterNode>, node| match worst {
                Some(w) if node.performance() >= w.performance() => Some(w),
                _ => Some(node),
            })
            .map(|node| node.id)
    }

    pub fn best_performance(&self) -> f64 {
        self.nodes
            .iter()
            .map(|node| node.performance())
            .max_by(|a, b| a.total_cmp(b))
            .unwrap()
    }

    pub fn mean_performance(&self) -> f64 {
        self.nodes.iter().map(|node| node.performance()).sum::<f64>() / self.nodes.len() as f64
    }

    pub fn mean_bandwidth(&self) -> f64 {
        self.nodes
            .iter()
            .map(|node| node.network_bandwidth)
            .sum::<f64>()
            / self.nodes.len() as f64
    }

    /// Bandwidth of node 0, under the assumption that all bandwidths are
    /// equal. The CSV reader warns when they are not.
    pub fn uniform_bandwidth(&self) -> f64 {
        self.nodes[0].network_bandwidth
    }

    pub fn to_report_string(&self) -> String {
        let mut out = String::from("########## Cluster: ##########\n");
        for node in self.nodes.iter() {
            out.push_str(&format!(
                "node {}: memory {}, cores {}, core performance {}, bandwidth {}\n",
                node.id, node.memory, node.num_cores, node.core_performance, node.network_bandwidth
            ));
        }
        out.push('\n');
        out
    }
}
