//! Filter Compiler
//!
//! Parses the array-shaped grid filter language into a [`FilterExpression`] and
//! compiles it into a `$match` predicate.
//!
//! # Filter shapes
//!
//! ```text
//! "isActive"                                  field truth
//! ["!", <filter>]                             negation
//! [<filter>]                                  transparent wrapper
//! ["price", ">=", 10]                         comparison
//! [<filter>, "and", <filter>, "and", ...]     chain (one connective throughout)
//! ```
//!
//! Shapes that are not recognized compile to *no constraint*; they never raise
//! an error. A chain mixing `and` and `or` is one of those shapes.

use crate::pipeline::chain;
use crate::pipeline::nested::match_field_name;
use crate::pipeline::stage::{Document, Stage};
use serde_json::{json, Value};

/// Comparison operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
    EqualsObjectId,
}

impl ComparisonOp {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "=" => Some(Self::Eq),
            "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "contains" => Some(Self::Contains),
            "notcontains" => Some(Self::NotContains),
            "equalsobjectid" => Some(Self::EqualsObjectId),
            _ => None,
        }
    }

    /// Store operator for plain comparisons
    fn store_operator(&self) -> Option<&'static str> {
        match self {
            Self::Eq | Self::EqualsObjectId => Some("$eq"),
            Self::Ne => Some("$ne"),
            Self::Gt => Some("$gt"),
            Self::Gte => Some("$gte"),
            Self::Lt => Some("$lt"),
            Self::Lte => Some("$lte"),
            _ => None,
        }
    }

    /// Regular expression for the string-match operators
    fn pattern(&self, operand: &str) -> Option<String> {
        match self {
            Self::StartsWith => Some(format!("^{}", operand)),
            Self::EndsWith => Some(format!("{}$", operand)),
            Self::Contains => Some(operand.to_string()),
            Self::NotContains => Some(format!("^((?!{}).)*$", operand)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
            Self::NotContains => "notcontains",
            Self::EqualsObjectId => "equalsObjectId",
        };
        write!(f, "{}", s)
    }
}

/// Chain connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    fn store_operator(&self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
        }
    }
}

/// A parsed filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// `"field"`: the field is `true`
    FieldTruth(String),
    /// `["!", expr]`
    Negation(Box<FilterExpression>),
    /// `[field, op, value]`
    Comparison {
        field: String,
        op: ComparisonOp,
        value: Value,
    },
    /// `[expr, op, expr, op, ...]` with one connective throughout
    Chain {
        op: Connective,
        operands: Vec<FilterExpression>,
    },
}

/// A compiled filter: the `$match` body and every field it references
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub predicate: Document,
    /// Leaf field references in order of appearance, nested `base.unit` names included
    pub fields: Vec<String>,
}

impl CompiledFilter {
    /// The `$match` stage for this filter
    pub fn match_stage(&self) -> Stage {
        Stage::Match(self.predicate.clone())
    }
}

impl FilterExpression {
    /// Parse a filter from its JSON shape. Unrecognized shapes yield `None`.
    pub fn parse(element: &Value) -> Option<Self> {
        match element {
            Value::String(field) => Some(Self::FieldTruth(field.clone())),
            Value::Array(items) => Self::parse_array(items),
            _ => None,
        }
    }

    fn parse_array(items: &[Value]) -> Option<Self> {
        match items {
            [inner @ Value::Array(_)] => Self::parse(inner),
            [Value::String(bang), inner] if bang == "!" => {
                Some(Self::Negation(Box::new(Self::parse(inner)?)))
            }
            _ if chain::is_incomplete_and_chain(items) => {
                let fixed = chain::normalize(items);
                if chain::is_complete_and_chain(&fixed) {
                    Self::parse_array(&fixed)
                } else {
                    None
                }
            }
            _ if items.len() >= 3 && items.len() % 2 == 1 => Self::parse_odd(items),
            _ => None,
        }
    }

    fn parse_odd(items: &[Value]) -> Option<Self> {
        let operator = items[1].as_str()?;

        if let Some(connective) = Connective::from_str(operator) {
            return Self::parse_chain(connective, items);
        }

        if items.len() != 3 {
            return None;
        }

        let field = items[0].as_str()?;
        let op = ComparisonOp::from_str(operator)?;
        Some(Self::Comparison {
            field: field.to_string(),
            op,
            value: items[2].clone(),
        })
    }

    fn parse_chain(connective: Connective, items: &[Value]) -> Option<Self> {
        let consistent = items
            .iter()
            .skip(1)
            .step_by(2)
            .all(|token| token.as_str().and_then(Connective::from_str) == Some(connective));
        if !consistent {
            tracing::debug!("Filter chain mixes connectives, ignoring it");
            return None;
        }

        let operands: Vec<Self> = items.iter().step_by(2).filter_map(Self::parse).collect();
        if operands.is_empty() {
            return None;
        }

        Some(Self::Chain {
            op: connective,
            operands,
        })
    }

    /// Compile into a match predicate.
    ///
    /// `case_insensitive` controls the `$options` of the string-match operators.
    pub fn compile(&self, case_insensitive: bool) -> Option<CompiledFilter> {
        let mut fields = Vec::new();
        let predicate = self.compile_into(case_insensitive, &mut fields)?;
        Some(CompiledFilter { predicate, fields })
    }

    fn compile_into(&self, case_insensitive: bool, fields: &mut Vec<String>) -> Option<Document> {
        match self {
            Self::FieldTruth(field) => {
                fields.push(field.clone());
                Some(Stage::single(match_field_name(field), json!({ "$eq": true })))
            }
            Self::Negation(inner) => {
                let inner = inner.compile_into(case_insensitive, fields)?;
                Some(Stage::single("$nor", json!([inner])))
            }
            Self::Comparison { field, op, value } => {
                let condition = compile_comparison(*op, value, case_insensitive)?;
                fields.push(field.clone());
                Some(Stage::single(match_field_name(field), condition))
            }
            Self::Chain { op, operands } => {
                let compiled: Vec<Value> = operands
                    .iter()
                    .filter_map(|operand| operand.compile_into(case_insensitive, fields))
                    .map(Value::Object)
                    .collect();
                if compiled.is_empty() {
                    return None;
                }
                Some(Stage::single(op.store_operator(), Value::Array(compiled)))
            }
        }
    }
}

fn compile_comparison(op: ComparisonOp, value: &Value, case_insensitive: bool) -> Option<Value> {
    if op == ComparisonOp::EqualsObjectId {
        let Some(id) = object_id(value) else {
            tracing::debug!(%value, "equalsObjectId operand is not an object id");
            return None;
        };
        return Some(json!({ "$eq": id }));
    }

    if let Some(operator) = op.store_operator() {
        return Some(Stage::single(operator, value.clone()).into());
    }

    let operand = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let pattern = op.pattern(&operand)?;
    let options = if case_insensitive { "i" } else { "" };
    Some(json!({ "$regex": pattern, "$options": options }))
}

/// Coerce a hex string or a native id into the store's id form `{"$oid": hex}`
pub fn object_id(value: &Value) -> Option<Value> {
    let hex = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) if map.len() == 1 => map.get("$oid")?.as_str()?,
        _ => return None,
    };

    if hex.len() == 24 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(json!({ "$oid": hex.to_lowercase() }))
    } else {
        None
    }
}

/// Parse and compile a filter in one step
pub fn compile_filter(filter: &Value, case_insensitive: bool) -> Option<CompiledFilter> {
    let compiled = FilterExpression::parse(filter).and_then(|expr| expr.compile(case_insensitive));
    if compiled.is_none() {
        tracing::debug!(%filter, "Filter did not compile, no constraint applied");
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(filter: Value) -> Option<CompiledFilter> {
        compile_filter(&filter, true)
    }

    fn predicate(filter: Value) -> Value {
        Value::Object(compile(filter).unwrap().predicate)
    }

    #[test]
    fn test_field_truth() {
        let compiled = compile(json!("isActive")).unwrap();
        assert_eq!(Value::Object(compiled.predicate), json!({"isActive": {"$eq": true}}));
        assert_eq!(compiled.fields, vec!["isActive"]);
    }

    #[test]
    fn test_comparisons_have_single_key() {
        let cases = [
            ("=", "$eq"),
            ("<>", "$ne"),
            (">", "$gt"),
            (">=", "$gte"),
            ("<", "$lt"),
            ("<=", "$lte"),
        ];
        for (op, store_op) in cases {
            let p = predicate(json!(["int1", op, 3]));
            let map = p.as_object().unwrap();
            assert_eq!(map.len(), 1);
            assert_eq!(map["int1"], json!({ store_op: 3 }));
        }
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(
            predicate(json!(["name", "startswith", "Jo"])),
            json!({"name": {"$regex": "^Jo", "$options": "i"}})
        );
        assert_eq!(
            predicate(json!(["name", "endswith", "hn"])),
            json!({"name": {"$regex": "hn$", "$options": "i"}})
        );
        assert_eq!(
            predicate(json!(["name", "contains", "oh"])),
            json!({"name": {"$regex": "oh", "$options": "i"}})
        );
        assert_eq!(
            predicate(json!(["name", "notcontains", "oh"])),
            json!({"name": {"$regex": "^((?!oh).)*$", "$options": "i"}})
        );
    }

    #[test]
    fn test_case_sensitive_regex() {
        let compiled = compile_filter(&json!(["name", "contains", "x"]), false).unwrap();
        assert_eq!(compiled.predicate["name"]["$options"], json!(""));
    }

    #[test]
    fn test_equals_object_id() {
        let hex = "5a1b2c3d4e5f60718293a4b5";
        let expected = json!({"_id": {"$eq": {"$oid": hex}}});
        assert_eq!(predicate(json!(["_id", "equalsObjectId", hex])), expected);
        assert_eq!(
            predicate(json!(["_id", "equalsObjectId", {"$oid": hex}])),
            expected
        );
        assert!(compile(json!(["_id", "equalsObjectId", "nothex"])).is_none());
    }

    #[test]
    fn test_or_chain() {
        let compiled = compile(json!([["int1", "=", 3], "or", ["int1", "=", 5]])).unwrap();
        assert_eq!(
            Value::Object(compiled.predicate),
            json!({"$or": [{"int1": {"$eq": 3}}, {"int1": {"$eq": 5}}]})
        );
        assert_eq!(compiled.fields, vec!["int1", "int1"]);
    }

    #[test]
    fn test_connectives_case_insensitive() {
        assert_eq!(
            predicate(json!([["a", "=", 1], "AND", ["b", "=", 2], "And", ["c", "=", 3]])),
            json!({"$and": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}, {"c": {"$eq": 3}}]})
        );
    }

    #[test]
    fn test_mixed_connectives_do_not_compile() {
        assert!(compile(json!([["a", "=", 1], "and", ["b", "=", 2], "or", ["c", "=", 3]])).is_none());
        assert!(compile(json!([["a", "=", 1], "or", ["b", "=", 2], "and", ["c", "=", 3]])).is_none());
    }

    #[test]
    fn test_negation_and_unwrap() {
        assert_eq!(
            predicate(json!(["!", ["int1", "=", 3]])),
            json!({"$nor": [{"int1": {"$eq": 3}}]})
        );
        assert_eq!(predicate(json!([["int1", "=", 3]])), json!({"int1": {"$eq": 3}}));
        assert_eq!(predicate(json!([[["int1", "=", 3]]])), json!({"int1": {"$eq": 3}}));
    }

    #[test]
    fn test_incomplete_and_chain_is_repaired() {
        assert_eq!(
            predicate(json!([["a", "=", 1], ["b", "=", 2]])),
            json!({"$and": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}]})
        );
    }

    #[test]
    fn test_nested_field_reference() {
        let compiled = compile(json!(["date.Month", "=", 3])).unwrap();
        assert_eq!(
            Value::Object(compiled.predicate),
            json!({"___date_Month": {"$eq": 3}})
        );
        assert_eq!(compiled.fields, vec!["date.Month"]);
    }

    #[test]
    fn test_malformed_shapes_compile_to_nothing() {
        assert!(compile(json!(42)).is_none());
        assert!(compile(json!(["a", "=="])).is_none());
        assert!(compile(json!(["a", "like", 3])).is_none());
        assert!(compile(json!(["a", "=", 1, "and"])).is_none());
        assert!(compile(json!([1, "=", 3])).is_none());
        assert!(compile(json!(["!", 42])).is_none());
    }

    #[test]
    fn test_chain_drops_bad_operands() {
        assert_eq!(
            predicate(json!([["a", "=", 1], "and", ["b", "like", 2]])),
            json!({"$and": [{"a": {"$eq": 1}}]})
        );
        assert!(compile(json!([["a", "like", 1], "and", ["b", "like", 2]])).is_none());
    }
}
