//! CSV input readers.
//!
//! All readers accept `#` line comments, trim whitespace around fields and
//! match columns by header name, in any column order.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::cluster::ClusterNode;
use crate::error::{Error, Result};
use crate::task::TaskBag;
use crate::workflow::Dependency;

fn open_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_path(path.as_ref())
        .map_err(|source| Error::Csv {
            path: path.as_ref().display().to_string(),
            source,
        })
}

fn csv_error<P: AsRef<Path>>(path: P) -> impl FnOnce(csv::Error) -> Error {
    let path = path.as_ref().display().to_string();
    move |source| Error::Csv { path, source }
}

#[derive(Debug, Deserialize)]
struct ClusterRecord {
    bandwidth: f64,
    performance: f64,
    memory: f64,
    num_cores: u32,
}

/// Reads the cluster description; row i becomes node i.
pub fn read_cluster_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ClusterNode>> {
    let mut reader = open_reader(&path)?;
    let mut nodes = Vec::new();

    for record in reader.deserialize() {
        let record: ClusterRecord = record.map_err(csv_error(&path))?;
        nodes.push(ClusterNode {
            id: nodes.len(),
            memory: record.memory,
            num_cores: record.num_cores,
            core_performance: record.performance,
            network_bandwidth: record.bandwidth,
        });
    }

    if nodes.is_empty() {
        return Err(Error::EmptyCluster);
    }

    Ok(nodes)
}

#[derive(Debug, Deserialize)]
struct TaskBagRecord {
    workload: f64,
    input_data_size: f64,
    output_data_size: f64,
    memory: f64,
    cardinality: usize,
}

/// Reads the task bags; row i becomes bag i.
pub fn read_task_bag_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TaskBag>> {
    let mut reader = open_reader(&path)?;
    let mut bags = Vec::new();

    for record in reader.deserialize() {
        let record: TaskBagRecord = record.map_err(csv_error(&path))?;
        bags.push(TaskBag {
            id: bags.len(),
            workload: record.workload,
            input_data_size: record.input_data_size,
            output_data_size: record.output_data_size,
            memory_requirement: record.memory,
            cardinality: record.cardinality,
        });
    }

    Ok(bags)
}

/// Reads task dependencies from columns `from_id`, `to_id`.
pub fn read_dependency_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Dependency>> {
    let mut reader = open_reader(&path)?;
    let mut dependencies = Vec::new();

    for record in reader.deserialize() {
        let dependency: Dependency = record.map_err(csv_error(&path))?;
        dependencies.push(dependency);
    }

    Ok(dependencies)
}

#[derive(Debug, Deserialize)]
struct AssignmentRecord {
    task_number: usize,
    node_number: usize,
    is_assigned: usize,
}

/// Reads a fixed task-to-node assignment with 1-based task and node numbers.
/// Exactly one assigned row per task is required.
pub fn read_assignment_csv<P: AsRef<Path>>(
    path: P,
    num_tasks: usize,
    num_nodes: usize,
) -> Result<Vec<usize>> {
    let mut reader = open_reader(&path)?;

    let mut assignment = vec![0; num_tasks];
    let mut assigned = vec![false; num_tasks];

    for record in reader.deserialize() {
        let record: AssignmentRecord = record.map_err(csv_error(&path))?;

        if record.task_number == 0 || record.task_number > num_tasks {
            return Err(Error::InvalidAssignment(format!(
                "task_number {} is out of range 1..={}",
                record.task_number, num_tasks
            )));
        }
        if record.node_number == 0 || record.node_number > num_nodes {
            return Err(Error::InvalidAssignment(format!(
                "node_number {} is out of range 1..={}",
                record.node_number, num_nodes
            )));
        }
        if record.is_assigned > 1 {
            return Err(Error::InvalidAssignment(format!(
                "is_assigned must be 0 or 1, got {}",
                record.is_assigned
            )));
        }

        if record.is_assigned == 1 {
            if assigned[record.task_number - 1] {
                return Err(Error::InvalidAssignment(format!(
                    "task {} has multiple assigned nodes",
                    record.task_number
                )));
            }
            assignment[record.task_number - 1] = record.node_number - 1;
            assigned[record.task_number - 1] = true;
        }
    }

    if let Some(t_id) = assigned.iter().position(|&a| !a) {
        return Err(Error::InvalidAssignment(format!(
            "task {} was not assigned a node",
            t_id + 1
        )));
    }

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn cluster_csv_accepts_comments_and_any_column_order() {
        let path = write_temp(
            "dag_sched_cluster.csv",
            "# cluster\nperformance, bandwidth, memory, num_cores\n10, 5, 100, 2\n20, 5, 50, 1\n",
        );
        let nodes = read_cluster_csv(&path).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, 0);
        assert_eq!(nodes[0].core_performance, 10.);
        assert_eq!(nodes[0].network_bandwidth, 5.);
        assert_eq!(nodes[1].num_cores, 1);
    }

    #[test]
    fn empty_cluster_csv_is_rejected() {
        let path = write_temp(
            "dag_sched_cluster_empty.csv",
            "bandwidth,performance,memory,num_cores\n",
        );
        assert!(matches!(read_cluster_csv(&path), Err(Error::EmptyCluster)));
    }

    #[test]
    fn task_bags_and_dependencies_parse() {
        let bags_path = write_temp(
            "dag_sched_bags.csv",
            "workload,input_data_size,output_data_size,memory,cardinality\n100,0,10,1,1\n50,10,0,1,4\n",
        );
        let bags = read_task_bag_csv(&bags_path).unwrap();
        assert_eq!(bags.len(), 2);
        assert_eq!(bags[1].cardinality, 4);

        let deps_path = write_temp("dag_sched_deps.csv", "from_id,to_id\n0,1\n0,2\n");
        let deps = read_dependency_csv(&deps_path).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].to_id, 2);
    }

    #[test]
    fn assignment_requires_exactly_one_node_per_task() {
        let path = write_temp(
            "dag_sched_assignment.csv",
            "task_number,node_number,is_assigned\n1,2,1\n2,1,1\n2,2,0\n",
        );
        let assignment = read_assignment_csv(&path, 2, 2).unwrap();
        assert_eq!(assignment, vec![1, 0]);

        let missing = write_temp(
            "dag_sched_assignment_missing.csv",
            "task_number,node_number,is_assigned\n1,1,1\n",
        );
        assert!(read_assignment_csv(&missing, 2, 2).is_err());

        let double = write_temp(
            "dag_sched_assignment_double.csv",
            "task_number,node_number,is_assigned\n1,1,1\n1,2,1\n2,1,1\n",
        );
        assert!(read_assignment_csv(&double, 2, 2).is_err());
    }
}
