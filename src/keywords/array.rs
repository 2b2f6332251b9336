//! The array family: `prefixItems`, `items`, `contains` with its bounds,
//! the count keywords, `uniqueItems`, and `unevaluatedItems`.

use crate::keywords::core::json_equal;
use crate::schema::Schema;
use crate::validator::{EvaluationError, EvaluationResult};
use crate::vm::{self, DynamicScope};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Whether any array keyword is present on the node.
pub(crate) fn applies(schema: &Schema) -> bool {
    schema.prefix_items.is_some()
        || schema.items.is_some()
        || schema.contains.is_some()
        || schema.min_contains.is_some()
        || schema.max_contains.is_some()
        || schema.min_items.is_some()
        || schema.max_items.is_some()
        || schema.unique_items
}

pub(crate) fn eval_array(
    schema: &Schema,
    instance: &Value,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Vec<EvaluationError>) {
    let Some(array) = instance.as_array() else {
        // Array keywords are silent on non-arrays.
        return (Vec::new(), Vec::new());
    };

    let mut details = Vec::new();
    let mut errors = Vec::new();

    let prefix_len = schema.prefix_items.as_ref().map_or(0, Vec::len);

    if let Some(prefixes) = &schema.prefix_items {
        let mut failed = Vec::new();
        for (index, (prefix, item)) in prefixes.iter().zip(array).enumerate() {
            let (mut child, _, _) = vm::evaluate(prefix, item, scope);
            let index_segment = index.to_string();
            child.rebase(&["prefixItems", &index_segment], &[&index_segment]);

            if child.is_valid() {
                evaluated_items.insert(index);
            } else {
                failed.push(json!(index));
                details.push(child);
            }
        }
        if !failed.is_empty() {
            errors.push(
                EvaluationError::new(
                    "prefixItems",
                    "prefix_items_mismatch",
                    "Items at {indexes} do not match their prefix schemas",
                )
                .with_param("indexes", json!(failed)),
            );
        }
    }

    if let Some(items) = &schema.items {
        let mut failed = Vec::new();
        for (index, item) in array.iter().enumerate().skip(prefix_len) {
            let (mut child, _, _) = vm::evaluate(items, item, scope);
            let index_segment = index.to_string();
            child.rebase(&["items", &index_segment], &[&index_segment]);

            if child.is_valid() {
                evaluated_items.insert(index);
            } else {
                failed.push(index);
                details.push(child);
            }
        }
        match failed.as_slice() {
            [] => {}
            [index] => errors.push(
                EvaluationError::new(
                    "items",
                    "item_mismatch",
                    "Item at index {index} does not match the schema",
                )
                .with_param("index", json!(index)),
            ),
            indexes => errors.push(
                EvaluationError::new(
                    "items",
                    "items_mismatch",
                    "Items at {indexes} do not match the schema",
                )
                .with_param("indexes", json!(indexes)),
            ),
        }
    }

    if schema.contains.is_some() {
        errors.extend(eval_contains(schema, array, evaluated_items, scope));
    }

    if let Some(min) = schema.min_items {
        if (array.len() as u64) < min {
            errors.push(
                EvaluationError::new(
                    "minItems",
                    "min_items_mismatch",
                    "Array has {count} items but at least {limit} are required",
                )
                .with_param("count", json!(array.len()))
                .with_param("limit", json!(min)),
            );
        }
    }

    if let Some(max) = schema.max_items {
        if array.len() as u64 > max {
            errors.push(
                EvaluationError::new(
                    "maxItems",
                    "max_items_mismatch",
                    "Array has {count} items but at most {limit} are allowed",
                )
                .with_param("count", json!(array.len()))
                .with_param("limit", json!(max)),
            );
        }
    }

    if schema.unique_items {
        if let Some((first, second)) = first_duplicate(array) {
            errors.push(
                EvaluationError::new(
                    "uniqueItems",
                    "unique_items_mismatch",
                    "Items at indexes {first} and {second} are equal",
                )
                .with_param("first", json!(first))
                .with_param("second", json!(second)),
            );
        }
    }

    (details, errors)
}

/// Counts the indices satisfying `contains`; matching items become
/// evaluated-item annotations. Probe failures on individual items are
/// expected and never surface in the tree.
fn eval_contains(
    schema: &Schema,
    array: &[Value],
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> Vec<EvaluationError> {
    let contains = schema.contains.as_ref().expect("caller checked contains");

    let mut count: u64 = 0;
    for (index, item) in array.iter().enumerate() {
        let (child, _, _) = vm::evaluate(contains, item, scope);
        if child.is_valid() {
            count += 1;
            evaluated_items.insert(index);
        }
    }

    let mut errors = Vec::new();
    // An explicit `minContains: 0` disables the at-least-one requirement.
    let min = schema.min_contains.unwrap_or(1);
    if count < min {
        errors.push(
            EvaluationError::new(
                "contains",
                "contains_mismatch",
                "Array contains {count} matching items but at least {limit} are required",
            )
            .with_param("count", json!(count))
            .with_param("limit", json!(min)),
        );
    }
    if let Some(max) = schema.max_contains {
        if count > max {
            errors.push(
                EvaluationError::new(
                    "maxContains",
                    "max_contains_mismatch",
                    "Array contains {count} matching items but at most {limit} are allowed",
                )
                .with_param("count", json!(count))
                .with_param("limit", json!(max)),
            );
        }
    }
    errors
}

/// Validates the indices no sibling applicator evaluated.
pub(crate) fn eval_unevaluated_items(
    schema: &Schema,
    instance: &Value,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(unevaluated) = &schema.unevaluated_items else {
        return (Vec::new(), None);
    };
    let Some(array) = instance.as_array() else {
        return (Vec::new(), None);
    };

    let mut details = Vec::new();
    let mut failed = Vec::new();

    for (index, item) in array.iter().enumerate() {
        if evaluated_items.contains(&index) {
            continue;
        }

        let (mut child, _, _) = vm::evaluate(unevaluated, item, scope);
        let index_segment = index.to_string();
        child.rebase(&["unevaluatedItems", &index_segment], &[&index_segment]);

        if child.is_valid() {
            evaluated_items.insert(index);
        } else {
            failed.push(json!(index));
            details.push(child);
        }
    }

    let error = if failed.is_empty() {
        None
    } else {
        Some(
            EvaluationError::new(
                "unevaluatedItems",
                "unevaluated_items_mismatch",
                "Unevaluated items at {indexes} do not match the schema",
            )
            .with_param("indexes", json!(failed)),
        )
    };
    (details, error)
}

fn first_duplicate(array: &[Value]) -> Option<(usize, usize)> {
    for (first, a) in array.iter().enumerate() {
        for (offset, b) in array[first + 1..].iter().enumerate() {
            if json_equal(a, b) {
                return Some((first, first + 1 + offset));
            }
        }
    }
    None
}
