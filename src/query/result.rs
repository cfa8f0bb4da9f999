//! Load Results
//!
//! Group results are built bottom-up: a node is only constructed once its
//! children (or rows) are complete, and its count is derived from them.

use crate::pipeline::Document;
use serde::Serialize;
use serde_json::Value;

/// Children of a group: sub-groups or rows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupItems {
    Groups(Vec<GroupResult>),
    Rows(Vec<Document>),
}

impl GroupItems {
    pub fn len(&self) -> usize {
        match self {
            Self::Groups(groups) => groups.len(),
            Self::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One group: `{key, count, items, summary?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResult {
    pub key: Value,
    pub count: u64,
    /// `null` when the count came from the store and items were not fetched
    pub items: Option<GroupItems>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<Value>>,
}

impl GroupResult {
    /// A group whose count was computed by the store, without items
    pub fn counted(key: Value, count: u64) -> Self {
        Self {
            key,
            count,
            items: None,
            summary: None,
        }
    }

    /// A group holding its rows
    pub fn with_rows(key: Value, rows: Vec<Document>) -> Self {
        Self {
            key,
            count: rows.len() as u64,
            items: Some(GroupItems::Rows(rows)),
            summary: None,
        }
    }

    /// A group holding its sub-groups
    pub fn with_groups(key: Value, groups: Vec<GroupResult>) -> Self {
        Self {
            key,
            count: groups.len() as u64,
            items: Some(GroupItems::Groups(groups)),
            summary: None,
        }
    }

    /// Attach summary values
    pub fn with_summary(mut self, summary: Option<Vec<Value>>) -> Self {
        self.summary = summary;
        self
    }

    /// Sub-groups, if this group has any
    pub fn groups(&self) -> Option<&[GroupResult]> {
        match &self.items {
            Some(GroupItems::Groups(groups)) => Some(groups),
            _ => None,
        }
    }

    /// Rows, if they were fetched
    pub fn rows(&self) -> Option<&[Document]> {
        match &self.items {
            Some(GroupItems::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    /// Whether `items` and `count` agree at this node and every node below
    pub fn is_consistent(&self) -> bool {
        match &self.items {
            None => true,
            Some(items) => {
                items.len() as u64 == self.count
                    && match items {
                        GroupItems::Groups(groups) => groups.iter().all(Self::is_consistent),
                        GroupItems::Rows(_) => true,
                    }
            }
        }
    }
}

/// Data of a load result: rows (flat) or groups
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoadData {
    Rows(Vec<Document>),
    Groups(Vec<GroupResult>),
}

/// Result of one load call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub data: LoadData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Total summary, absent when nothing matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<Value>>,
}

impl LoadResult {
    /// Rows of a flat result
    pub fn rows(&self) -> Option<&[Document]> {
        match &self.data {
            LoadData::Rows(rows) => Some(rows),
            LoadData::Groups(_) => None,
        }
    }

    /// Groups of a grouped result
    pub fn groups(&self) -> Option<&[GroupResult]> {
        match &self.data {
            LoadData::Groups(groups) => Some(groups),
            LoadData::Rows(_) => None,
        }
    }

    /// Render as JSON
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
