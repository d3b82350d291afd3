//! Named science-workflow topologies.
//!
//! Each topology is a fixed pattern of collective dependencies between task
//! bags; expanding the pattern against the concrete bag cardinalities yields
//! the per-task dependency edges.

use clap::ValueEnum;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::schedulers::common::split_most_evenly;
use crate::task::{expand_task_bags_into_ids, TaskBag};
use crate::workflow::Dependency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Topology {
    Epigenome,
    Cybershake,
    Ligo,
    Montage,
}

/// Collective dependency between a source and a target bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BagDependency {
    /// Both bags have the same number of tasks; the i-th source task feeds
    /// the i-th target task.
    OneToOne,

    /// The target bag is at least as large; the target tasks are divided as
    /// evenly as possible among the source tasks, every target task
    /// receiving from exactly one source task.
    Distribute,

    /// The source bag is at least as large; the source tasks are divided as
    /// evenly as possible among the target tasks, every source task sending
    /// to exactly one target task.
    Aggregate,

    /// A non-trivial pattern that the bag model cannot express. Such edges
    /// must come from a dependency file; see [`remove_bag_dependencies`].
    Complex,
}

impl Topology {
    /// The bag-level dependency pattern, as `(source_bag, target_bag,
    /// dependency)` triples.
    pub fn dependency_pattern(&self) -> Vec<(usize, usize, BagDependency)> {
        use BagDependency::*;

        match self {
            Topology::Epigenome => vec![
                (0, 1, Distribute),
                (1, 2, OneToOne),
                (2, 3, OneToOne),
                (3, 4, OneToOne),
                (4, 5, Aggregate),
                (5, 6, Aggregate),
                (6, 7, OneToOne),
            ],
            // differs from the actual CyberShake workflow, whose fan-out
            // cannot be modeled with task bags alone
            Topology::Cybershake => vec![
                (0, 1, Distribute),
                (1, 3, OneToOne),
                (2, 3, Distribute),
                (3, 4, Aggregate),
            ],
            Topology::Ligo => vec![
                (0, 1, OneToOne),
                (1, 2, Aggregate),
                (2, 3, Distribute),
                (3, 4, OneToOne),
                (4, 5, Aggregate),
            ],
            Topology::Montage => vec![
                (0, 1, Complex),
                (0, 4, OneToOne),
                (1, 2, Aggregate),
                (2, 3, OneToOne),
                (3, 4, Distribute),
                (4, 5, Aggregate),
                (5, 6, OneToOne),
                (6, 7, OneToOne),
                (7, 8, OneToOne),
            ],
        }
    }

    /// Whether the pattern contains a [`BagDependency::Complex`] relation
    /// and therefore needs an explicit dependency file.
    pub fn requires_dependency_file(&self) -> bool {
        self.dependency_pattern()
            .iter()
            .any(|&(_, _, dep)| dep == BagDependency::Complex)
    }
}

/// Expands the topology's bag-level pattern into per-task dependencies.
pub fn infer_dependencies(top: Topology, bags: &[TaskBag]) -> Result<Vec<Dependency>> {
    let task_ids_per_bag = expand_task_bags_into_ids(bags);
    let mut dependencies = Vec::new();

    for (source_bag, target_bag, bag_dependency) in top.dependency_pattern().into_iter() {
        if source_bag >= bags.len() || target_bag >= bags.len() {
            return Err(Error::BadBagDependency {
                source_bag,
                target_bag,
                reason: format!(
                    "the {} topology needs {} bags, the input has {}",
                    top,
                    source_bag.max(target_bag) + 1,
                    bags.len()
                ),
            });
        }

        let source_ids = &task_ids_per_bag[source_bag];
        let target_ids = &task_ids_per_bag[target_bag];

        match bag_dependency {
            BagDependency::OneToOne => {
                if source_ids.len() != target_ids.len() {
                    return Err(Error::BadBagDependency {
                        source_bag,
                        target_bag,
                        reason: format!(
                            "one_to_one needs equal cardinalities, got {} and {}",
                            source_ids.len(),
                            target_ids.len()
                        ),
                    });
                }
                for (&from_id, &to_id) in source_ids.iter().zip(target_ids.iter()) {
                    dependencies.push(Dependency { from_id, to_id });
                }
            }

            BagDependency::Distribute => {
                if target_ids.len() < source_ids.len() {
                    return Err(Error::BadBagDependency {
                        source_bag,
                        target_bag,
                        reason: format!(
                            "distribute needs at least as many target tasks, got {} -> {}",
                            source_ids.len(),
                            target_ids.len()
                        ),
                    });
                }
                let chunk_sizes = split_most_evenly(target_ids.len(), source_ids.len());
                let mut target_index = 0;
                for (&from_id, &chunk_size) in source_ids.iter().zip(chunk_sizes.iter()) {
                    for &to_id in target_ids[target_index..target_index + chunk_size].iter() {
                        dependencies.push(Dependency { from_id, to_id });
                    }
                    target_index += chunk_size;
                }
            }

            BagDependency::Aggregate => {
                if source_ids.len() < target_ids.len() {
                    return Err(Error::BadBagDependency {
                        source_bag,
                        target_bag,
                        reason: format!(
                            "aggregate needs at least as many source tasks, got {} -> {}",
                            source_ids.len(),
                            target_ids.len()
                        ),
                    });
                }
                let chunk_sizes = split_most_evenly(source_ids.len(), target_ids.len());
                let mut source_index = 0;
                for (&to_id, &chunk_size) in target_ids.iter().zip(chunk_sizes.iter()) {
                    for &from_id in source_ids[source_index..source_index + chunk_size].iter() {
                        dependencies.push(Dependency { from_id, to_id });
                    }
                    source_index += chunk_size;
                }
            }

            BagDependency::Complex => {
                return Err(Error::BadBagDependency {
                    source_bag,
                    target_bag,
                    reason: "the complex dependency pattern cannot be inferred; \
                             provide a dependency file"
                        .to_string(),
                });
            }
        }
    }

    Ok(dependencies)
}

/// Drops every dependency leading from a task of `source_bag` to a task of
/// `target_bag`. Used to strip relations a dependency file contains but the
/// bag model cannot carry (montage's complex pattern).
pub fn remove_bag_dependencies(
    dependencies: &mut Vec<Dependency>,
    source_bag: usize,
    target_bag: usize,
    bags: &[TaskBag],
) {
    let task_ids_per_bag = expand_task_bags_into_ids(bags);

    let in_bag = |t_id: usize, bag: usize| task_ids_per_bag[bag].binary_search(&t_id).is_ok();

    dependencies
        .retain(|dep| !(in_bag(dep.from_id, source_bag) && in_bag(dep.to_id, target_bag)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bags(cardinalities: &[usize]) -> Vec<TaskBag> {
        cardinalities
            .iter()
            .enumerate()
            .map(|(id, &cardinality)| TaskBag {
                id,
                workload: 1.,
                input_data_size: 1.,
                output_data_size: 1.,
                memory_requirement: 0.,
                cardinality,
            })
            .collect()
    }

    #[test]
    fn epigenome_pattern_expands() {
        // fan out to 4, pass through, aggregate back down
        let bags = bags(&[1, 4, 4, 4, 4, 1, 1, 1]);
        let deps = infer_dependencies(Topology::Epigenome, &bags).unwrap();

        // distribute 0 -> 1: all 4 tasks of bag 1 hang off task 0
        assert_eq!(
            deps.iter().filter(|d| d.from_id == 0).count(),
            4
        );
        // aggregate 4 -> 5: all 4 tasks of bag 4 feed the single task of bag 5
        let bag5_task = 1 + 4 * 4;
        assert_eq!(
            deps.iter().filter(|d| d.to_id == bag5_task).count(),
            4
        );
    }

    #[test]
    fn distribute_and_aggregate_split_evenly() {
        // cybershake with bag cardinalities 1, 4, 2, 4, 1
        let bags = bags(&[1, 4, 2, 4, 1]);
        let deps = infer_dependencies(Topology::Cybershake, &bags).unwrap();

        // distribute 2 -> 3: sources 5 and 6 feed targets 7..=10 in chunks of 2
        let from_5: Vec<usize> = deps
            .iter()
            .filter(|d| d.from_id == 5)
            .map(|d| d.to_id)
            .collect();
        let from_6: Vec<usize> = deps
            .iter()
            .filter(|d| d.from_id == 6)
            .map(|d| d.to_id)
            .collect();
        assert_eq!(from_5, vec![7, 8]);
        assert_eq!(from_6, vec![9, 10]);

        // aggregate 3 -> 4: all of bag 3 feeds the single sink task 11
        assert_eq!(deps.iter().filter(|d| d.to_id == 11).count(), 4);
    }

    #[test]
    fn one_to_one_with_unequal_cardinalities_fails() {
        let bags = bags(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(infer_dependencies(Topology::Epigenome, &bags).is_err());
    }

    #[test]
    fn montage_requires_a_dependency_file() {
        assert!(Topology::Montage.requires_dependency_file());
        assert!(!Topology::Ligo.requires_dependency_file());

        let bags = bags(&[1; 9]);
        assert!(infer_dependencies(Topology::Montage, &bags).is_err());
    }

    #[test]
    fn bag_dependencies_are_removable() {
        let bags = bags(&[2, 2]);
        let mut deps = vec![
            Dependency { from_id: 0, to_id: 2 },
            Dependency { from_id: 1, to_id: 3 },
            Dependency { from_id: 0, to_id: 1 },
        ];
        remove_bag_dependencies(&mut deps, 0, 1, &bags);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].from_id, 0);
        assert_eq!(deps[0].to_id, 1);
    }
}
