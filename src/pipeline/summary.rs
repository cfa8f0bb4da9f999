//! Summary Aggregation
//!
//! Summaries are computed by one `$group` stage over the whole matched set, with
//! one accumulator per requested summary. Results are read back by position.

use crate::pipeline::expr::field_ref;
use crate::pipeline::stage::{Document, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A requested summary: `{summaryType, selector}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySpec {
    pub summary_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl SummarySpec {
    pub fn new(summary_type: impl Into<String>, selector: Option<&str>) -> Self {
        Self {
            summary_type: summary_type.into(),
            selector: selector.map(str::to_string),
        }
    }

    /// Name of the accumulator carrying this summary, `None` if it cannot be computed
    pub fn accumulator_name(&self) -> Option<String> {
        match SummaryType::from_str(&self.summary_type)? {
            SummaryType::Count => Some("___count".to_string()),
            ty => self
                .selector
                .as_ref()
                .map(|selector| format!("___{}{}", ty, selector)),
        }
    }
}

/// Supported summary types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryType {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl SummaryType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "count" => Some(Self::Count),
            _ => None,
        }
    }

    fn accumulator(&self, selector: Option<&str>) -> Option<Value> {
        let op = match self {
            Self::Count => return Some(json!({ "$sum": 1 })),
            Self::Sum => "$sum",
            Self::Avg => "$avg",
            Self::Min => "$min",
            Self::Max => "$max",
        };
        Some(Value::from(Stage::single(op, field_ref(selector?))))
    }
}

impl std::fmt::Display for SummaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Avg => write!(f, "avg"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Build the summary stage. Empty when no summaries are requested.
pub fn summary_stages(summaries: &[SummarySpec]) -> Vec<Stage> {
    if summaries.is_empty() {
        return Vec::new();
    }

    let mut group = Document::new();
    group.insert("_id".to_string(), Value::Null);

    for spec in summaries {
        let Some(ty) = SummaryType::from_str(&spec.summary_type) else {
            tracing::warn!(summary_type = %spec.summary_type, "Unknown summary type, skipping");
            continue;
        };
        let (Some(name), Some(accumulator)) = (
            spec.accumulator_name(),
            ty.accumulator(spec.selector.as_deref()),
        ) else {
            tracing::warn!(summary_type = %ty, "Summary without selector, skipping");
            continue;
        };
        group.insert(name, accumulator);
    }

    vec![Stage::Group(group)]
}

/// Read summary values back in the order they were requested.
///
/// Skipped or missing accumulators yield `null` so positions stay aligned.
pub fn read_summary(summaries: &[SummarySpec], result: &Document) -> Vec<Value> {
    summaries
        .iter()
        .map(|spec| {
            spec.accumulator_name()
                .and_then(|name| result.get(&name).cloned())
                .unwrap_or(Value::Null)
        })
        .collect()
}
