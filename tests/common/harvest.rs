//! Harvest fixtures: the facts a few source systems would submit

use researchgraph::{Category, Fact, NodeKey, ResearchGraphApi};

/// A personally-identifying fact
pub fn person_fact(name: &str, value: &str, source: &str) -> Fact {
    Fact::new(name, Category::Person, value, source)
}

/// An ordered batch of facts from one source system
pub struct Harvest {
    pub source: String,
    pub facts: Vec<Fact>,
}

impl Harvest {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            facts: Vec::new(),
        }
    }

    pub fn fact(mut self, name: &str, category: Category, value: &str) -> Self {
        self.facts.push(Fact::new(name, category, value, &self.source));
        self
    }

    pub fn person(mut self, name: &str, value: &str) -> Self {
        self.facts.push(person_fact(name, value, &self.source));
        self
    }

    /// Run the whole batch, returning the keys in submission order
    pub fn run(&self, api: &ResearchGraphApi) -> Vec<NodeKey> {
        self.facts
            .iter()
            .map(|fact| api.merge(fact).unwrap().node.key)
            .collect()
    }

    /// The batch as JSON Lines, as a harvester would write it
    pub fn to_jsonl(&self) -> String {
        self.facts
            .iter()
            .map(|f| serde_json::to_string(f).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
