//! Identity resolution: person-root clusters and their consistency checks

mod consistency;
mod person_root;

pub use consistency::{ConsistencyChecker, Violation};
pub use person_root::{PersonRootAggregator, PersonRootConflict, PersonRootOutcome};
