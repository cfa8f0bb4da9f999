//! Row Post-Processing
//!
//! Rows leave the store carrying native `_id` values and, for grouped rows,
//! the key fields computed for grouping. Both are cleaned up here before the
//! rows are returned.

use crate::pipeline::Document;
use crate::query::error::{QueryError, QueryResult};
use crate::store::value::oid_hex;
use serde_json::Value;

/// Cleans rows on their way out
#[derive(Debug, Clone, Default)]
pub struct RowProcessor {
    replace_ids: bool,
    strip: Vec<String>,
}

impl RowProcessor {
    pub fn new(replace_ids: bool) -> Self {
        Self {
            replace_ids,
            strip: Vec::new(),
        }
    }

    /// Also remove these top-level fields from every row
    pub fn stripping(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        for field in fields {
            if !self.strip.contains(&field) {
                self.strip.push(field);
            }
        }
        self
    }

    /// Clean one row in place
    pub fn process(&self, row: &mut Document) {
        for field in &self.strip {
            row.remove(field);
        }
        if self.replace_ids {
            replace_id(row);
        }
    }

    /// Clean a batch of rows
    pub fn process_all(&self, mut rows: Vec<Document>) -> Vec<Document> {
        rows.iter_mut().for_each(|row| self.process(row));
        rows
    }

    /// Clean the pushed `items` of a group entry
    pub fn process_items(&self, items: Value) -> QueryResult<Vec<Document>> {
        let Value::Array(items) = items else {
            return Err(QueryError::MalformedResult(format!(
                "group items is not an array: {}",
                items
            )));
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut row) => {
                    self.process(&mut row);
                    Ok(row)
                }
                other => Err(QueryError::MalformedResult(format!(
                    "group item is not a document: {}",
                    other
                ))),
            })
            .collect()
    }
}

/// Replace a native object id in `_id` by its hex string
pub fn replace_id(row: &mut Document) {
    let hex = row.get("_id").and_then(oid_hex).map(str::to_string);
    if let Some(hex) = hex {
        row.insert("_id".to_string(), Value::String(hex));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_replace_id() {
        let mut row = doc(json!({"_id": {"$oid": "5a0b6c0f2d0b3a1b2c3d4e5f"}, "a": 1}));
        replace_id(&mut row);
        assert_eq!(row["_id"], json!("5a0b6c0f2d0b3a1b2c3d4e5f"));

        let mut plain = doc(json!({"_id": 7}));
        replace_id(&mut plain);
        assert_eq!(plain["_id"], json!(7));
    }

    #[test]
    fn test_strip_and_keep_ids() {
        let processor = RowProcessor::new(false)
            .stripping(vec!["___group_key_0".to_string(), "___group_key_0".to_string()]);
        let rows = processor.process_all(vec![doc(json!({
            "_id": {"$oid": "5a0b6c0f2d0b3a1b2c3d4e5f"},
            "___group_key_0": 3,
            "int1": 3
        }))]);

        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"_id": {"$oid": "5a0b6c0f2d0b3a1b2c3d4e5f"}, "int1": 3})
        );
    }

    #[test]
    fn test_process_items_rejects_non_documents() {
        let processor = RowProcessor::new(true);
        assert_eq!(processor.process_items(json!([{"a": 1}])).unwrap().len(), 1);
        assert!(matches!(
            processor.process_items(json!([1])),
            Err(QueryError::MalformedResult(_))
        ));
        assert!(processor.process_items(json!(null)).is_err());
    }
}
