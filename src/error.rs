//! Error types.

use thiserror::Error;

/// Errors reported to the user. Internal invariant violations are not
/// represented here; those panic with a diagnostic since they indicate bugs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("can't read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("can't parse DAX from file {path}: {source}")]
    Dax {
        path: String,
        source: serde_xml_rs::Error,
    },

    #[error("cluster must have at least 1 node")]
    EmptyCluster,

    #[error("the workflow must have at least 1 task")]
    EmptyWorkflow,

    #[error("task {0} has zero workload, all tasks need a workload > 0")]
    ZeroWorkload(usize),

    #[error("dependency {from} -> {to} is invalid (unknown endpoint or duplicate edge)")]
    InvalidDependency { from: usize, to: usize },

    #[error(
        "output/input data sizes don't match for dependency {from} -> {to}: {output} vs {input}"
    )]
    DataSizeMismatch {
        from: usize,
        to: usize,
        output: f64,
        input: f64,
    },

    #[error("the task dependencies contain a cycle")]
    CyclicDependencies,

    #[error("unknown parent or child job id {0} in DAX dependencies")]
    UnknownDaxJob(String),

    #[error("bags {source_bag} -> {target_bag}: {reason}")]
    BadBagDependency {
        source_bag: usize,
        target_bag: usize,
        reason: String,
    },

    #[error("the montage topology requires an explicit dependency file")]
    MontageWithoutDependencies,

    #[error("invalid task-to-node assignment: {0}")]
    InvalidAssignment(String),

    #[error("task {0} has a memory requirement larger than the memory of every node")]
    NoFeasibleNode(usize),

    #[error("can't write to output file {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
