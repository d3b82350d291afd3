//! Plain-text reporting sink.
//!
//! Collects the run output for the console and, when requested, an output
//! file. The file is truncated once at construction and appended to
//! afterwards, so reruns never mix with stale content.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Report {
    verbose: bool,
    file: Option<File>,
    path: PathBuf,
}

impl Report {
    pub fn new(verbose: bool, output_path: Option<&Path>) -> Result<Self> {
        let file = match output_path {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|source| Error::Output {
                        path: path.display().to_string(),
                        source,
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            verbose,
            file,
            path: output_path.map(Path::to_path_buf).unwrap_or_default(),
        })
    }

    /// Sink that drops all report text; summaries still go to the console.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            file: None,
            path: PathBuf::new(),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Writes report text: to the console when verbose, to the output file
    /// when one was given.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        if self.verbose {
            print!("{}", s);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(s.as_bytes()).map_err(|source| Error::Output {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// One-line console summary, used when the full report is not printed.
    pub fn console_line(&self, s: &str) {
        if !self.verbose {
            println!("{}", s);
        }
    }

    /// Emits a warning to the report and the console. Warnings never alter
    /// behavior.
    pub fn warn(&mut self, s: &str) -> Result<()> {
        log::warn!("{}", s);
        let warning = format!("----- WARNING ---> {}\n", s);
        self.write_str(&format!("{}\n", warning))?;
        if !self.verbose {
            print!("{}", warning);
        }
        Ok(())
    }
}

/// Renders the node-communication matrix as a padded table with two decimal
/// places, row = source node, column = target node.
pub fn format_node_communication_matrix(matrix: &[Vec<f64>], algorithm: &str) -> String {
    let n = matrix.len();

    let header: Vec<String> = (0..n).map(|n_id| n_id.to_string()).collect();
    let cells: Vec<Vec<String>> = matrix
        .iter()
        .map(|row| row.iter().map(|value| format!("{:.2}", value)).collect())
        .collect();

    let label = "source\\target";
    let mut width = label.len();
    for row in cells.iter() {
        for cell in row.iter() {
            width = width.max(cell.len());
        }
    }

    let mut out = format!("Node communications in {} schedule:\n", algorithm);
    out.push_str(&format!("{:>width$}", label, width = width));
    for column in header.iter() {
        out.push_str(&format!(" | {:>width$}", column, width = width));
    }
    out.push('\n');

    for (n_id, row) in cells.iter().enumerate() {
        out.push_str(&format!("{:>width$}", n_id, width = width));
        for cell in row.iter() {
            out.push_str(&format!(" | {:>width$}", cell, width = width));
        }
        out.push('\n');
    }

    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_rendered_with_fixed_precision() {
        let matrix = vec![vec![0., 2.5], vec![10.125, 0.]];
        let out = format_node_communication_matrix(&matrix, "HEFT");

        assert!(out.starts_with("Node communications in HEFT schedule:\n"));
        assert!(out.contains("source\\target"));
        assert!(out.contains("2.50"));
        assert!(out.contains("10.13"));
    }
}
