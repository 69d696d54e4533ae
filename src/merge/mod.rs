//! Merge engine and its two policies

mod engine;
mod fact;
mod policy;

pub use engine::{MergeEngine, MergeReport};
pub use fact::Fact;
pub use policy::{CategoryResolution, MergePolicy, MergeSettings};
