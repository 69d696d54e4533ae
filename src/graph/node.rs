//! Node representation in the research graph

use super::history::HistoryEvent;
use super::key::{InvalidKeyError, NodeKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// `name` shared by every person-root node
pub const PERSON_ROOT_NAME: &str = "person-root";

/// Coarse classification of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    /// Personally-identifying facts (ORCID, ISNI, full name, employee ID, ...)
    Person,
    /// Synthetic anchor aggregating one person's identifiers
    PersonRoot,
    Organization,
    Publication,
    Dataset,
    Software,
    Skill,
    Project,
    /// Any other category a harvester emits
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "person",
            Self::PersonRoot => "person-root",
            Self::Organization => "organization",
            Self::Publication => "publication",
            Self::Dataset => "dataset",
            Self::Software => "software",
            Self::Skill => "skill",
            Self::Project => "project",
            Self::Other(s) => s,
        }
    }

    /// Whether nodes of this category identify a physical person
    pub fn is_personally_identifying(&self) -> bool {
        matches!(self, Self::Person)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err("category must not be empty".to_string()),
            "person" => Ok(Self::Person),
            "person-root" => Ok(Self::PersonRoot),
            "organization" => Ok(Self::Organization),
            "publication" => Ok(Self::Publication),
            "dataset" => Ok(Self::Dataset),
            "software" => Ok(Self::Software),
            "skill" => Ok(Self::Skill),
            "project" => Ok(Self::Project),
            _ => Ok(Self::Other(normalized)),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

/// Name of an extra (non-identifying) property
///
/// The well-known names form the default allow-list. `Other` carries any
/// name outside that set; the merge policy decides whether it is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyName {
    Comment,
    /// Primary URL
    UrlMain,
    /// Secondary URL
    UrlOther,
    /// Free-form note
    Note,
    Other(String),
}

impl PropertyName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Comment => "comment",
            Self::UrlMain => "url_main",
            Self::UrlOther => "url_other",
            Self::Note => "note",
            Self::Other(s) => s,
        }
    }

    /// The well-known names, in allow-list order
    pub fn well_known() -> [PropertyName; 4] {
        [Self::Comment, Self::UrlMain, Self::UrlOther, Self::Note]
    }
}

impl From<&str> for PropertyName {
    fn from(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "comment" => Self::Comment,
            "url_main" => Self::UrlMain,
            "url_other" => Self::UrlOther,
            "note" => Self::Note,
            _ => Self::Other(normalized),
        }
    }
}

impl From<String> for PropertyName {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PropertyName> for String {
    fn from(p: PropertyName) -> Self {
        p.as_str().to_string()
    }
}

impl std::fmt::Display for PropertyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extra properties: every name maps to one or more values, in arrival order
pub type Properties = BTreeMap<PropertyName, Vec<String>>;

/// A node in the research graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Primary lookup key, derived from `(name, value)`
    pub key: NodeKey,
    /// Semantic kind of the value (identifier scheme or metadata field)
    pub name: String,
    /// Coarse classification, fixed at creation
    pub category: Category,
    /// Literal content
    pub value: String,
    /// Extra properties admitted by the merge policy
    #[serde(default)]
    pub properties: Properties,
    /// Append-only provenance; written only through `HistoryTracker`
    #[serde(default)]
    history: Vec<HistoryEvent>,
}

impl Node {
    /// Create a node, computing its key from `name` and `value`
    pub fn new(
        name: impl Into<String>,
        category: Category,
        value: impl Into<String>,
    ) -> Result<Self, InvalidKeyError> {
        let name = name.into();
        let value = value.into();
        let key = NodeKey::compute(&name, &value)?;
        Ok(Self {
            key,
            name,
            category,
            value,
            properties: Properties::new(),
            history: Vec::new(),
        })
    }

    /// Create a fresh person-root node with a synthetic value
    pub fn new_person_root() -> Self {
        let value = Uuid::new_v4().to_string();
        let key = NodeKey::from_normalized(PERSON_ROOT_NAME, &value);
        Self {
            key,
            name: PERSON_ROOT_NAME.to_string(),
            category: Category::PersonRoot,
            value,
            properties: Properties::new(),
            history: Vec::new(),
        }
    }

    /// Rebuild a node from stored fields
    pub(crate) fn from_parts(
        key: NodeKey,
        name: String,
        category: Category,
        value: String,
        properties: Properties,
        history: Vec<HistoryEvent>,
    ) -> Self {
        Self {
            key,
            name,
            category,
            value,
            properties,
            history,
        }
    }

    pub fn with_property(mut self, name: PropertyName, value: impl Into<String>) -> Self {
        self.add_property_value(name, value);
        self
    }

    /// Append a value to a property. Returns false if the value was already present.
    pub fn add_property_value(&mut self, name: PropertyName, value: impl Into<String>) -> bool {
        let value = value.into();
        let values = self.properties.entry(name).or_default();
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    /// All values of a property (empty if unset)
    pub fn property(&self, name: &PropertyName) -> &[String] {
        self.properties.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut Vec<HistoryEvent> {
        &mut self.history
    }

    /// Source systems that contributed this node, according to its history
    pub fn sources(&self) -> BTreeSet<String> {
        self.history.iter().map(|e| e.source.clone()).collect()
    }

    pub fn is_person_root(&self) -> bool {
        self.category == Category::PersonRoot
    }

    pub fn is_personally_identifying(&self) -> bool {
        self.category.is_personally_identifying()
    }

    /// Fields that define the node's content, ignoring provenance
    pub fn same_content(&self, other: &Node) -> bool {
        self.key == other.key
            && self.name == other.name
            && self.category == other.category
            && self.value == other.value
            && self.properties == other.properties
    }
}
