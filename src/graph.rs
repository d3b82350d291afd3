//! Directed graph primitive.

use std::collections::BTreeMap;

/// Simple directed graph without delete functionality, stored as a sparse
/// adjacency matrix. Vertex ids are dense indices into the vertex vector.
///
/// Edge maps are ordered by neighbor id, so all neighbor iterations are
/// deterministic; the tie-breaking rules of the schedulers rely on this.
#[derive(Debug, Clone)]
pub struct DiGraph<V, W> {
    vertices: Vec<V>,
    incoming_edges: Vec<BTreeMap<usize, W>>,
    outgoing_edges: Vec<BTreeMap<usize, W>>,
}

impl<V, W: Copy> DiGraph<V, W> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
        }
    }

    /// Adds a vertex and returns its id.
    pub fn add_vertex(&mut self, value: V) -> usize {
        let v_id = self.vertices.len();
        self.vertices.push(value);
        self.incoming_edges.push(BTreeMap::new());
        self.outgoing_edges.push(BTreeMap::new());
        v_id
    }

    /// Adds an edge with the given weight. Returns whether the edge was
    /// created; it is not when an endpoint is unknown or the edge exists.
    pub fn add_edge(&mut self, from_id: usize, to_id: usize, weight: W) -> bool {
        if from_id >= self.vertices.len()
            || to_id >= self.vertices.len()
            || self.incoming_edges[to_id].contains_key(&from_id)
        {
            return false;
        }
        self.incoming_edges[to_id].insert(from_id, weight);
        self.outgoing_edges[from_id].insert(to_id, weight);
        true
    }

    pub fn vertex(&self, v_id: usize) -> &V {
        &self.vertices[v_id]
    }

    pub fn vertices(&self) -> &Vec<V> {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn incoming_edges(&self, v_id: usize) -> &BTreeMap<usize, W> {
        &self.incoming_edges[v_id]
    }

    pub fn outgoing_edges(&self, v_id: usize) -> &BTreeMap<usize, W> {
        &self.outgoing_edges[v_id]
    }

    pub fn all_incoming_edges(&self) -> &Vec<BTreeMap<usize, W>> {
        &self.incoming_edges
    }

    /// Returns the ids of vertices without incoming edges.
    pub fn independent_vertex_ids(&self) -> Vec<usize> {
        (0..self.vertices.len())
            .filter(|&v_id| self.incoming_edges[v_id].is_empty())
            .collect()
    }

    /// Kahn's algorithm. Returns `None` if the graph is cyclic.
    ///
    /// Runs in time linear in the number of edges.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut order = Vec::with_capacity(self.vertices.len());
        let mut independent = self.independent_vertex_ids();

        // copy incoming edge counts to decrement while vertices are extracted
        let mut remaining_incoming: Vec<usize> =
            self.incoming_edges.iter().map(|edges| edges.len()).collect();

        while let Some(v_id) = independent.pop() {
            order.push(v_id);

            for &neighbor_id in self.outgoing_edges[v_id].keys() {
                remaining_incoming[neighbor_id] -= 1;
                if remaining_incoming[neighbor_id] == 0 {
                    independent.push(neighbor_id);
                }
            }
        }

        if order.len() != self.vertices.len() {
            return None;
        }

        Some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_and_invalid_edges_are_rejected() {
        let mut g: DiGraph<(), f64> = DiGraph::new();
        g.add_vertex(());
        g.add_vertex(());

        assert!(g.add_edge(0, 1, 1.));
        assert!(!g.add_edge(0, 1, 2.));
        assert!(!g.add_edge(0, 2, 1.));
        assert_eq!(g.outgoing_edges(0).len(), 1);
    }

    #[test]
    fn topological_order_covers_dag() {
        let mut g: DiGraph<(), f64> = DiGraph::new();
        for _ in 0..4 {
            g.add_vertex(());
        }
        g.add_edge(0, 1, 0.);
        g.add_edge(0, 2, 0.);
        g.add_edge(1, 3, 0.);
        g.add_edge(2, 3, 0.);

        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 4);
        let rank: Vec<usize> = {
            let mut rank = vec![0; 4];
            for (i, &v) in order.iter().enumerate() {
                rank[v] = i;
            }
            rank
        };
        assert!(rank[0] < rank[1] && rank[0] < rank[2]);
        assert!(rank[1] < rank[3] && rank[2] < rank[3]);
    }

    #[test]
    fn cycle_is_detected() {
        let mut g: DiGraph<(), f64> = DiGraph::new();
        for _ in 0..3 {
            g.add_vertex(());
        }
        g.add_edge(0, 1, 0.);
        g.add_edge(1, 2, 0.);
        g.add_edge(2, 0, 0.);

        assert!(g.topological_order().is_none());
    }
}
