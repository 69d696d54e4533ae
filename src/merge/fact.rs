//! Facts submitted by harvesters

use crate::graph::{Category, InvalidKeyError, NodeKey, PropertyName};
use serde::{Deserialize, Serialize};

/// One harvested statement: "`name` = `value` (a `category`), according to
/// `source_system`", with optional extra properties and co-identity hints
///
/// In JSON Lines form, `properties` is an object whose values are a string
/// or an array of strings:
///
/// ```json
/// {"name":"ORCID","category":"person","value":"0000-0001-9510-0802",
///  "source_system":"SysA","properties":{"comment":"staff page"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub name: String,
    pub category: Category,
    pub value: String,
    #[serde(alias = "source")]
    pub source_system: String,
    /// Extra properties in arrival order
    #[serde(default, with = "property_list", skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<(PropertyName, String)>,
    /// Keys of identifiers the source asserts belong to the same person
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub same_person_as: Vec<NodeKey>,
}

impl Fact {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        value: impl Into<String>,
        source_system: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            value: value.into(),
            source_system: source_system.into(),
            properties: Vec::new(),
            same_person_as: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<PropertyName>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// Declare that this identifier and `other` denote the same person
    pub fn same_person_as(mut self, other: NodeKey) -> Self {
        if !self.same_person_as.contains(&other) {
            self.same_person_as.push(other);
        }
        self
    }

    /// The key of the node this fact merges into
    pub fn key(&self) -> Result<NodeKey, InvalidKeyError> {
        NodeKey::compute(&self.name, &self.value)
    }
}

/// `Vec<(PropertyName, String)>` as a `{name: value | [values]}` object
mod property_list {
    use crate::graph::PropertyName;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(
        props: &[(PropertyName, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, value) in props {
            grouped.entry(name.as_str()).or_default().push(value.as_str());
        }
        grouped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(PropertyName, String)>, D::Error> {
        let raw: BTreeMap<String, OneOrMany> = BTreeMap::deserialize(deserializer)?;
        let mut props = Vec::new();
        for (name, values) in raw {
            let name = PropertyName::from(name);
            match values {
                OneOrMany::One(v) => props.push((name, v)),
                OneOrMany::Many(vs) => props.extend(vs.into_iter().map(|v| (name.clone(), v))),
            }
        }
        Ok(props)
    }
}
