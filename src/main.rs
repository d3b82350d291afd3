use std::path::PathBuf;

use clap::Parser;

use dag_sched::runner::{run, RunConfig};
use dag_sched::topology::Topology;

/// Computes static schedules of a workflow DAG on a heterogeneous cluster
/// with HEFT, CPOP, RBCA, DBCA and TDCA, and reports their makespans.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// CSV file describing the cluster; exactly the columns bandwidth,
    /// performance, memory and num_cores
    #[arg(short, long)]
    cluster: PathBuf,

    /// CSV file describing the task bags of the workflow; exactly the columns
    /// workload, input_data_size, output_data_size, memory and cardinality
    #[arg(short, long)]
    tasks: PathBuf,

    /// Task dependencies, either as CSV (columns from_id, to_id) or as a
    /// Pegasus DAX XML file whose jobs are in the level order implied by the
    /// task bags
    #[arg(short, long, required_unless_present = "topology")]
    dependencies: Option<PathBuf>,

    /// Workflow topology to infer the dependencies from when no dependency
    /// file is given; montage always needs a dependency file
    #[arg(short = 'p', long, value_enum, required_unless_present = "dependencies")]
    topology: Option<Topology>,

    /// Optional fixed task-to-node assignment CSV (columns task_number,
    /// node_number, is_assigned; 1-based) reported as an extra schedule
    #[arg(short, long)]
    assignment: Option<PathBuf>,

    /// Write the full plain-text report to this file (truncated at start)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full report to the console
    #[arg(short, long)]
    verbose: bool,

    /// Only schedule tasks onto nodes with sufficient memory; honored by
    /// HEFT and CPOP, ignored with a warning by the clustering algorithms
    #[arg(short = 'm', long)]
    use_memory_requirements: bool,
}

fn main() {
    env_logger::Builder::from_default_env().init();

    let args = Args::parse();

    let config = RunConfig {
        cluster_file: args.cluster,
        task_bag_file: args.tasks,
        dependency_file: args.dependencies,
        topology: args.topology,
        assignment_file: args.assignment,
        output_file: args.output,
        verbose: args.verbose,
        use_memory_requirements: args.use_memory_requirements,
    };

    if let Err(error) = run(&config) {
        eprintln!("ERROR: {}", error);
        std::process::exit(1);
    }
}
