//! In-Memory Collection
//!
//! Runs pipelines over a vector of JSON documents. It understands exactly the
//! stages and operators the compiler emits and rejects everything else, which
//! makes it a faithful stand-in for the document store in tests and in the CLI.
//!
//! # Example
//!
//! ```rust
//! use gridquery::pipeline::Stage;
//! use gridquery::store::{Collection, MemoryCollection};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collection = MemoryCollection::from_values(vec![json!({"a": 1}), json!({"a": 2})])?;
//!     let result = collection.aggregate(&[Stage::Count("n".into())]).await?;
//!     assert_eq!(result[0]["n"], json!(2));
//!     Ok(())
//! }
//! ```

use crate::pipeline::{Document, Stage};
use crate::store::error::{StoreError, StoreResult};
use crate::store::eval::{evaluate, matches};
use crate::store::value::{compare, get_path, remove_path, set_path, values_equal};
use crate::store::Collection;
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use tokio::sync::Mutex;

/// A collection held in memory
pub struct MemoryCollection {
    name: String,
    documents: Vec<Document>,
    /// Every pipeline run so far, in submission order
    executed: Mutex<Vec<Vec<Stage>>>,
}

impl MemoryCollection {
    /// Create a collection from documents
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            name: "memory".to_string(),
            documents,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Create a collection from JSON values, which must all be objects
    pub fn from_values(values: Vec<Value>) -> StoreResult<Self> {
        let documents = values
            .into_iter()
            .map(|value| match value {
                Value::Object(doc) => Ok(doc),
                other => Err(StoreError::Backend(format!("not a document: {}", other))),
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self::new(documents))
    }

    /// Set the collection name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Pipelines executed so far
    pub async fn executed(&self) -> Vec<Vec<Stage>> {
        self.executed.lock().await.clone()
    }

    /// Run a pipeline synchronously
    pub fn run(&self, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
        let mut docs: Vec<Value> = self.documents.iter().cloned().map(Value::Object).collect();

        for stage in pipeline {
            docs = apply_stage(stage, docs)?;
        }

        docs.into_iter()
            .map(|doc| match doc {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::InvalidExpression(format!(
                    "stage produced a non-document: {}",
                    other
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
        self.executed.lock().await.push(pipeline.to_vec());
        self.run(pipeline)
    }
}

fn apply_stage(stage: &Stage, docs: Vec<Value>) -> StoreResult<Vec<Value>> {
    match stage {
        Stage::Match(predicate) => {
            let mut kept = Vec::with_capacity(docs.len());
            for doc in docs {
                if matches(predicate, &doc)? {
                    kept.push(doc);
                }
            }
            Ok(kept)
        }
        Stage::Sort(keys) => sort(keys, docs),
        Stage::Skip(n) => Ok(docs.into_iter().skip(*n as usize).collect()),
        Stage::Limit(n) => Ok(docs.into_iter().take(*n as usize).collect()),
        Stage::Project(spec) => docs.iter().map(|doc| project(spec, doc)).collect(),
        Stage::AddFields(fields) => docs
            .into_iter()
            .map(|doc| add_fields(fields, doc))
            .collect(),
        Stage::Group(spec) => group(spec, &docs),
        Stage::Count(name) => {
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![Value::Object(Stage::single(name.clone(), Value::from(docs.len())))])
        }
    }
}

fn sort(keys: &Document, mut docs: Vec<Value>) -> StoreResult<Vec<Value>> {
    let mut order = Vec::with_capacity(keys.len());
    for (field, direction) in keys {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(StoreError::InvalidExpression(format!(
                    "$sort direction for {} must be 1 or -1",
                    field
                )))
            }
        };
        order.push((field.as_str(), descending));
    }

    let null = Value::Null;
    docs.sort_by(|a, b| {
        order
            .iter()
            .map(|(field, descending)| {
                let ord = compare(
                    get_path(a, field).unwrap_or(&null),
                    get_path(b, field).unwrap_or(&null),
                );
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(docs)
}

fn is_flag(value: &Value, flag: bool) -> bool {
    match value {
        Value::Bool(b) => *b == flag,
        Value::Number(n) => (n.as_f64() != Some(0.0)) == flag,
        _ => false,
    }
}

fn project(spec: &Document, doc: &Value) -> StoreResult<Value> {
    let source = doc.as_object().cloned().unwrap_or_default();

    let excluding = spec
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .all(|(_, v)| is_flag(v, false));

    if excluding {
        let mut out = source;
        for (field, _) in spec.iter().filter(|(_, v)| is_flag(v, false)) {
            remove_path(&mut out, field);
        }
        return Ok(Value::Object(out));
    }

    let mut out = Document::new();
    if !spec.get("_id").is_some_and(|v| is_flag(v, false)) {
        if let Some(id) = source.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }

    for (field, value) in spec {
        if field == "_id" && (is_flag(value, false) || is_flag(value, true)) {
            continue;
        }
        if is_flag(value, false) {
            return Err(StoreError::InvalidExpression(format!(
                "cannot exclude {} in an inclusion projection",
                field
            )));
        }
        if matches!(value, Value::Bool(_) | Value::Number(_)) {
            if let Some(existing) = get_path(doc, field) {
                set_path(&mut out, field, existing.clone());
            }
        } else {
            set_path(&mut out, field, evaluate(value, doc)?);
        }
    }
    Ok(Value::Object(out))
}

fn add_fields(fields: &Document, doc: Value) -> StoreResult<Value> {
    let mut out = doc.as_object().cloned().unwrap_or_default();
    for (field, expr) in fields {
        let value = evaluate(expr, &doc)?;
        set_path(&mut out, field, value);
    }
    Ok(Value::Object(out))
}

/// Running state of one accumulator
enum Accumulator {
    Sum { int: Option<i64>, float: f64 },
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Push(Vec<Value>),
}

impl Accumulator {
    fn new(op: &str) -> StoreResult<Self> {
        Ok(match op {
            "$sum" => Self::Sum {
                int: Some(0),
                float: 0.0,
            },
            "$avg" => Self::Avg {
                total: 0.0,
                count: 0,
            },
            "$min" => Self::Min(None),
            "$max" => Self::Max(None),
            "$push" => Self::Push(Vec::new()),
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        })
    }

    fn add(&mut self, value: Value) {
        if value.is_null() && matches!(self, Self::Min(_) | Self::Max(_)) {
            return;
        }

        match self {
            Self::Sum { int, float } => {
                if let Some(n) = value.as_f64() {
                    *float += n;
                    *int = int.zip(value.as_i64()).and_then(|(a, b)| a.checked_add(b));
                }
            }
            Self::Avg { total, count } => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                    *count += 1;
                }
            }
            Self::Min(current) => {
                if current.as_ref().map_or(true, |c| compare(&value, c) == Ordering::Less) {
                    *current = Some(value);
                }
            }
            Self::Max(current) => {
                if current
                    .as_ref()
                    .map_or(true, |c| compare(&value, c) == Ordering::Greater)
                {
                    *current = Some(value);
                }
            }
            Self::Push(items) => items.push(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum { int: Some(i), .. } => Value::from(i),
            Self::Sum { int: None, float } => {
                Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null)
            }
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { total, count } => Number::from_f64(total / count as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Min(v) | Self::Max(v) => v.unwrap_or(Value::Null),
            Self::Push(items) => Value::Array(items),
        }
    }
}

fn accumulator_spec(field: &str, spec: &Value) -> StoreResult<(String, Value)> {
    spec.as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.iter().next())
        .map(|(op, expr)| (op.clone(), expr.clone()))
        .ok_or_else(|| StoreError::InvalidExpression(format!("bad accumulator for {}", field)))
}

fn group(spec: &Document, docs: &[Value]) -> StoreResult<Vec<Value>> {
    let id_expr = spec
        .get("_id")
        .ok_or_else(|| StoreError::InvalidExpression("$group needs an _id".to_string()))?;

    let accumulators = spec
        .iter()
        .filter(|(field, _)| field.as_str() != "_id")
        .map(|(field, acc)| {
            let (op, expr) = accumulator_spec(field, acc)?;
            Ok((field.clone(), op, expr))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    // groups keep first-seen order
    let mut groups: Vec<(Value, Vec<Accumulator>)> = Vec::new();

    for doc in docs {
        let key = evaluate(id_expr, doc)?;
        let index = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(index) => index,
            None => {
                let state = accumulators
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<StoreResult<Vec<_>>>()?;
                groups.push((key, state));
                groups.len() - 1
            }
        };

        for ((_, _, expr), state) in accumulators.iter().zip(groups[index].1.iter_mut()) {
            state.add(evaluate(expr, doc)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, state)| {
            let mut out = Document::new();
            out.insert("_id".to_string(), key);
            for ((field, _, _), acc) in accumulators.iter().zip(state) {
                out.insert(field.clone(), acc.finish());
            }
            Value::Object(out)
        })
        .collect())
}
