//! Tools for loading the cluster and workflow inputs from different file
//! formats.

mod csv_input;
mod dax_parser;

use std::path::Path;

use crate::error::Result;
use crate::workflow::Dependency;

pub use csv_input::{
    read_assignment_csv, read_cluster_csv, read_dependency_csv, read_task_bag_csv,
};
pub use dax_parser::read_dependency_dax;

/// Reads task dependencies from a CSV or DAX XML file, dispatching on the
/// file extension.
pub fn read_dependency_file<P: AsRef<Path>>(path: P) -> Result<Vec<Dependency>> {
    let is_xml = path
        .as_ref()
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xml"));

    if is_xml {
        read_dependency_dax(path)
    } else {
        read_dependency_csv(path)
    }
}
