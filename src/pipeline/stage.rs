//! Pipeline Stages
//!
//! The wire representation of a single aggregation stage. Every variant serializes
//! to a one-key object (`{"$match": {...}}`, `{"$skip": 20}`), which is exactly the
//! form the document store accepts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as exchanged with the store
pub type Document = Map<String, Value>;

/// One stage of an aggregation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Keep documents matching a predicate
    #[serde(rename = "$match")]
    Match(Document),
    /// Order documents by one or more keys (`1` ascending, `-1` descending)
    #[serde(rename = "$sort")]
    Sort(Document),
    /// Drop the first N documents
    #[serde(rename = "$skip")]
    Skip(u64),
    /// Keep at most N documents
    #[serde(rename = "$limit")]
    Limit(u64),
    /// Reshape documents (inclusion, exclusion or computed fields)
    #[serde(rename = "$project")]
    Project(Document),
    /// Add computed fields, keeping everything else
    #[serde(rename = "$addFields")]
    AddFields(Document),
    /// Group documents by `_id` and evaluate accumulators
    #[serde(rename = "$group")]
    Group(Document),
    /// Replace the stream with a single `{<name>: count}` document
    #[serde(rename = "$count")]
    Count(String),
}

impl Stage {
    /// The store operator name of this stage
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Project(_) => "$project",
            Self::AddFields(_) => "$addFields",
            Self::Group(_) => "$group",
            Self::Count(_) => "$count",
        }
    }

    /// Render the stage as a store document
    pub fn to_value(&self) -> Value {
        let body = match self {
            Self::Match(doc)
            | Self::Sort(doc)
            | Self::Project(doc)
            | Self::AddFields(doc)
            | Self::Group(doc) => Value::Object(doc.clone()),
            Self::Skip(n) | Self::Limit(n) => Value::from(*n),
            Self::Count(name) => Value::String(name.clone()),
        };

        let mut stage = Map::with_capacity(1);
        stage.insert(self.operator().to_string(), body);
        Value::Object(stage)
    }

    /// Build a single-field stage body, e.g. `{"___group_key_0": <expr>}`
    pub fn single(name: impl Into<String>, value: Value) -> Document {
        let mut doc = Map::with_capacity(1);
        doc.insert(name.into(), value);
        doc
    }
}

/// Render a whole pipeline as a JSON array
pub fn pipeline_to_value(stages: &[Stage]) -> Value {
    Value::Array(stages.iter().map(Stage::to_value).collect())
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
