//! Chain Normalization
//!
//! Grid clients sometimes send `[[a], [b], "and", [c]]` where the connective
//! between consecutive conditions was left out. Such arrays are repaired by
//! inserting the missing `"and"` tokens before the chain is parsed.

use serde_json::Value;

const AND: &str = "and";

fn is_and(value: &Value) -> bool {
    value.as_str() == Some(AND)
}

/// Whether the array alternates `operand, "and", operand, ...` with operands
/// in every even position
pub fn is_complete_and_chain(elements: &[Value]) -> bool {
    elements.len() % 2 == 1
        && elements.iter().enumerate().all(|(i, element)| {
            if i % 2 == 0 {
                element.is_array()
            } else {
                is_and(element)
            }
        })
}

/// Whether the array is an and-chain with missing connectives.
///
/// Only arrays that start with a condition and consist solely of conditions
/// and literal `"and"` tokens qualify.
pub fn is_incomplete_and_chain(elements: &[Value]) -> bool {
    elements.len() >= 2
        && elements[0].is_array()
        && elements.iter().all(|e| e.is_array() || is_and(e))
        && !is_complete_and_chain(elements)
}

/// Insert `"and"` between every pair of consecutive conditions.
///
/// Already-connected positions are left untouched, so the operation is idempotent.
pub fn normalize(elements: &[Value]) -> Vec<Value> {
    let mut normalized: Vec<Value> = Vec::with_capacity(elements.len() * 2);

    for element in elements {
        if element.is_array() && normalized.last().is_some_and(Value::is_array) {
            normalized.push(Value::from(AND));
        }
        normalized.push(element.clone());
    }

    normalized
}
