//! Scheduling algorithms over the common workflow/cluster/schedule model.

pub mod common;
pub mod cpop;
pub mod dbca;
pub mod heft;
pub mod rbca;
pub mod tdca;

use strum_macros::{Display, EnumIter, EnumString};

use crate::cluster::Cluster;
use crate::error::Result;
use crate::report::Report;
use crate::schedule::Schedule;
use crate::workflow::Workflow;

/// The available scheduling algorithms, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Algorithm {
    Heft,
    Cpop,
    Rbca,
    Dbca,
    Tdca,
}

impl Algorithm {
    /// Runs the algorithm on the given inputs.
    ///
    /// `use_memory_requirements` restricts placement to nodes with enough
    /// memory; only HEFT and CPOP honor it, the clustering algorithms warn
    /// and ignore it.
    pub fn run(
        &self,
        c: &Cluster,
        w: &Workflow,
        use_memory_requirements: bool,
        report: &mut Report,
    ) -> Result<Schedule> {
        match self {
            Algorithm::Heft => heft::heft(c, w, use_memory_requirements),
            Algorithm::Cpop => cpop::cpop(c, w, use_memory_requirements, report),
            Algorithm::Rbca => rbca::rbca(c, w, use_memory_requirements, report),
            Algorithm::Dbca => dbca::dbca(c, w, use_memory_requirements, report),
            Algorithm::Tdca => tdca::tdca(c, w, use_memory_requirements, report),
        }
    }
}
