//! Merge policies: how unknown properties and category mismatches are treated

use crate::graph::{Category, GraphError, GraphResult, NodeKey, PropertyName};
use serde::{Deserialize, Serialize};

/// Rule set applied when a fact meets an existing node
///
/// Chosen once at startup from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Only allow-listed properties are kept; a category mismatch is rejected
    #[default]
    Strict,
    /// Every property is kept; a category mismatch keeps the first-seen category
    Lenient,
}

/// What to do with an incoming category that differs from the stored one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryResolution {
    /// Categories agree
    Unchanged,
    /// Keep the stored category and note the ignored one in history
    KeepStored(String),
}

impl MergePolicy {
    /// Whether a property may be stored under this policy
    pub fn admits_property(&self, name: &PropertyName, allowed: &[PropertyName]) -> bool {
        match self {
            Self::Strict => allowed.contains(name),
            Self::Lenient => true,
        }
    }

    /// Decide what happens when `incoming` meets a node stored as `stored`
    pub fn reconcile_category(
        &self,
        key: &NodeKey,
        stored: &Category,
        incoming: &Category,
    ) -> GraphResult<CategoryResolution> {
        if stored == incoming {
            return Ok(CategoryResolution::Unchanged);
        }
        match self {
            Self::Strict => Err(GraphError::CategoryConflict {
                key: key.clone(),
                stored: stored.clone(),
                incoming: incoming.clone(),
            }),
            Self::Lenient => {
                tracing::warn!(
                    %key,
                    %stored,
                    %incoming,
                    "category conflict, keeping first-seen category"
                );
                Ok(CategoryResolution::KeepStored(format!(
                    "category conflict: kept {}, ignored {}",
                    stored, incoming
                )))
            }
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown merge policy '{}' (expected strict or lenient)", other)),
        }
    }
}

/// Policy plus the property allow-list it consults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    pub policy: MergePolicy,
    /// Ordered, de-duplicated allow-list of extra property names
    pub allowed_properties: Vec<PropertyName>,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            policy: MergePolicy::Strict,
            allowed_properties: PropertyName::well_known().to_vec(),
        }
    }
}

impl MergeSettings {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_allowed_properties(
        mut self,
        names: impl IntoIterator<Item = PropertyName>,
    ) -> Self {
        self.allowed_properties.clear();
        for name in names {
            if !self.allowed_properties.contains(&name) {
                self.allowed_properties.push(name);
            }
        }
        self
    }

    pub fn admits_property(&self, name: &PropertyName) -> bool {
        self.policy.admits_property(name, &self.allowed_properties)
    }
}
