//! Dependency reader for the Pegasus DAX format.
//!
//! Only the job ids and the child/parent relations are consumed. The jobs
//! are expected in a level order matching the task-bag expansion, so the
//! i-th job of the document maps to task id i.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_xml_rs::from_str;

use crate::error::{Error, Result};
use crate::workflow::Dependency;

#[derive(Debug, Deserialize)]
struct Job {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Parent {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "parent", default)]
    parents: Vec<Parent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "adag")]
struct Adag {
    #[serde(rename = "job", default)]
    jobs: Vec<Job>,
    #[serde(rename = "child", default)]
    children: Vec<Child>,
}

/// Reads the dependencies of a workflow in
/// [DAX format](https://pegasus.isi.edu/documentation/development/schemas.html).
pub fn read_dependency_dax<P: AsRef<Path>>(path: P) -> Result<Vec<Dependency>> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|source| Error::Io {
        path: path.as_ref().display().to_string(),
        source,
    })?;

    let adag: Adag = from_str(&content).map_err(|source| Error::Dax {
        path: path.as_ref().display().to_string(),
        source,
    })?;

    let to_internal_id: HashMap<&str, usize> = adag
        .jobs
        .iter()
        .enumerate()
        .map(|(t_id, job)| (job.id.as_str(), t_id))
        .collect();

    let mut dependencies = Vec::new();
    for child in adag.children.iter() {
        let to_id = *to_internal_id
            .get(child.reference.as_str())
            .ok_or_else(|| Error::UnknownDaxJob(child.reference.clone()))?;

        for parent in child.parents.iter() {
            let from_id = *to_internal_id
                .get(parent.reference.as_str())
                .ok_or_else(|| Error::UnknownDaxJob(parent.reference.clone()))?;
            dependencies.push(Dependency { from_id, to_id });
        }
    }

    Ok(dependencies)
}
