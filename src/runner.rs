//! Batch run: load inputs, execute the algorithms, report.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use strum::IntoEnumIterator;

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::parsers;
use crate::report::{format_node_communication_matrix, Report};
use crate::schedule::{self, Schedule};
use crate::schedulers::Algorithm;
use crate::task::{expand_task_bags, expand_task_bags_into_ids};
use crate::topology::{infer_dependencies, remove_bag_dependencies, Topology};
use crate::workflow::Workflow;

/// Resolved run configuration, one-to-one with the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cluster_file: PathBuf,
    pub task_bag_file: PathBuf,
    pub dependency_file: Option<PathBuf>,
    pub topology: Option<Topology>,
    pub assignment_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub verbose: bool,
    pub use_memory_requirements: bool,
}

/// Executes the whole batch run described by the configuration.
pub fn run(config: &RunConfig) -> Result<()> {
    let mut report = Report::new(config.verbose, config.output_file.as_deref())?;

    let nodes = parsers::read_cluster_csv(&config.cluster_file)?;
    let uniform = nodes
        .iter()
        .all(|node| node.network_bandwidth == nodes[0].network_bandwidth);
    if !uniform {
        report.warn("not all cluster nodes have the same bandwidth")?;
    }
    let cluster = Cluster::new(nodes)?;

    report.write_str(&cluster.to_report_string())?;

    let bags = parsers::read_task_bag_csv(&config.task_bag_file)?;
    let (tasks, input_data_sizes, output_data_sizes) = expand_task_bags(&bags);

    let mut dependencies = match &config.dependency_file {
        Some(path) => parsers::read_dependency_file(path)?,
        None => {
            let top = config
                .topology
                .expect("clap enforces a dependency file or a topology");
            if top.requires_dependency_file() {
                return Err(Error::MontageWithoutDependencies);
            }
            infer_dependencies(top, &bags)?
        }
    };

    if config.topology == Some(Topology::Montage) && config.dependency_file.is_some() {
        // the complex 0 -> 1 relation is beyond the bag model
        remove_bag_dependencies(&mut dependencies, 0, 1, &bags);
    }

    let workflow = Workflow::new(
        tasks,
        input_data_sizes,
        output_data_sizes,
        dependencies,
        expand_task_bags_into_ids(&bags),
    )?;

    report.write_str(&workflow.to_report_string(Some(cluster.best_performance())))?;

    for algorithm in Algorithm::iter() {
        let algorithm_name = algorithm.to_string();
        let (result, elapsed) = measure_execution(|| {
            algorithm.run(&cluster, &workflow, config.use_memory_requirements, &mut report)
        });
        let schedule = result?;

        handle_computed_schedule(
            &mut report,
            &algorithm_name,
            &schedule,
            &workflow,
            Some(elapsed),
        )?;
    }

    if let Some(path) = &config.assignment_file {
        let assignment = parsers::read_assignment_csv(path, workflow.size(), cluster.size())?;
        let schedule = schedule::from_assignment(
            &assignment,
            &cluster,
            &workflow,
            config.use_memory_requirements,
        );
        handle_computed_schedule(&mut report, "ASSIGNMENT", &schedule, &workflow, None)?;
    }

    Ok(())
}

fn handle_computed_schedule(
    report: &mut Report,
    algorithm_name: &str,
    schedule: &Schedule,
    workflow: &Workflow,
    elapsed: Option<Duration>,
) -> Result<()> {
    let valid = schedule.is_valid(workflow);
    log::info!(
        "{} makespan: {:.2} ({}valid)",
        algorithm_name,
        schedule.makespan(),
        if valid { "" } else { "NOT " }
    );

    report.write_str(&schedule.to_report_string(algorithm_name, valid))?;

    let mut summary = format!(
        "{} makespan: {:.2} ({}valid)",
        algorithm_name,
        schedule.makespan(),
        if valid { "" } else { "NOT " }
    );

    if let Some(elapsed) = elapsed {
        let formatted = format_duration(elapsed);
        report.write_str(&format!(
            "{} -- CPU running time: {}\n\n",
            algorithm_name, formatted
        ))?;
        summary.push_str(&format!(" -- CPU running time: {}", formatted));
    } else {
        report.write_str("\n")?;
    }

    report.console_line(&summary);

    if valid {
        let matrix = schedule.node_communication_matrix(workflow);
        report.write_str(&format_node_communication_matrix(&matrix, algorithm_name))?;
    }

    Ok(())
}

fn measure_execution<T>(func: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = func();
    (result, start.elapsed())
}

/// `1.23 seconds` / `4.56 milliseconds` / `7.89 microseconds`, whichever
/// fits the magnitude.
fn format_duration(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();

    if seconds >= 1.0 {
        format!("{:.2} seconds", seconds)
    } else if seconds >= 0.001 {
        format!("{:.2} milliseconds", seconds * 1e3)
    } else {
        format!("{:.2} microseconds", seconds * 1e6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_pick_a_readable_unit() {
        assert_eq!(format_duration(Duration::from_secs_f64(2.5)), "2.50 seconds");
        assert_eq!(
            format_duration(Duration::from_secs_f64(0.0042)),
            "4.20 milliseconds"
        );
        assert_eq!(
            format_duration(Duration::from_secs_f64(0.0000077)),
            "7.70 microseconds"
        );
    }
}
