//! The logical applicators: `allOf`, `anyOf`, `oneOf`, `not`, the
//! `if`/`then`/`else` conditional, and `dependentSchemas`.
//!
//! These keywords drive the annotation model: evaluated-property and
//! evaluated-item sets flow out of the branches that validated and feed the
//! `unevaluated*` keywords later in the same schema. `allOf` contributes
//! from every branch, `anyOf` from each branch that validated, `oneOf` from
//! the unique matching branch, and `not` contributes nothing.

use crate::schema::Schema;
use crate::validator::{EvaluationError, EvaluationResult};
use crate::vm::{self, DynamicScope};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub(crate) fn eval_all_of(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(branches) = &schema.all_of else {
        return (Vec::new(), None);
    };

    let mut details = Vec::with_capacity(branches.len());
    let mut failed = Vec::new();

    for (index, branch) in branches.iter().enumerate() {
        let (mut child, props, items) = vm::evaluate(branch, instance, scope);
        let index_segment = index.to_string();
        child.rebase(&["allOf", &index_segment], &[]);

        if !child.is_valid() {
            failed.push(json!(index));
        }
        evaluated_props.extend(props);
        evaluated_items.extend(items);
        details.push(child);
    }

    let error = if failed.is_empty() {
        None
    } else {
        Some(
            EvaluationError::new(
                "allOf",
                "all_of_mismatch",
                "Value does not match the subschemas at {indexes}",
            )
            .with_param("indexes", json!(failed)),
        )
    };
    (details, error)
}

pub(crate) fn eval_any_of(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(branches) = &schema.any_of else {
        return (Vec::new(), None);
    };

    let mut outcomes = Vec::with_capacity(branches.len());
    let mut any_valid = false;

    for (index, branch) in branches.iter().enumerate() {
        let (mut child, props, items) = vm::evaluate(branch, instance, scope);
        let index_segment = index.to_string();
        child.rebase(&["anyOf", &index_segment], &[]);

        let valid = child.is_valid();
        if valid {
            any_valid = true;
            evaluated_props.extend(props);
            evaluated_items.extend(items);
        }
        outcomes.push((child, valid));
    }

    if any_valid {
        // Only the satisfied branches appear in the tree; the failed ones
        // are expected misses, not problems to report.
        let details = outcomes
            .into_iter()
            .filter(|(_, valid)| *valid)
            .map(|(child, _)| child)
            .collect();
        (details, None)
    } else {
        let details = outcomes.into_iter().map(|(child, _)| child).collect();
        (
            details,
            Some(EvaluationError::new(
                "anyOf",
                "any_of_mismatch",
                "Value does not match any of the subschemas",
            )),
        )
    }
}

pub(crate) fn eval_one_of(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(branches) = &schema.one_of else {
        return (Vec::new(), None);
    };

    let mut outcomes = Vec::with_capacity(branches.len());
    let mut matched = Vec::new();

    for (index, branch) in branches.iter().enumerate() {
        let (mut child, props, items) = vm::evaluate(branch, instance, scope);
        let index_segment = index.to_string();
        child.rebase(&["oneOf", &index_segment], &[]);

        if child.is_valid() {
            matched.push(index);
        }
        outcomes.push((child, props, items));
    }

    match matched.as_slice() {
        [unique] => {
            let (child, props, items) = outcomes.swap_remove(*unique);
            evaluated_props.extend(props);
            evaluated_items.extend(items);
            (vec![child], None)
        }
        [] => {
            let details = outcomes.into_iter().map(|(child, _, _)| child).collect();
            (
                details,
                Some(EvaluationError::new(
                    "oneOf",
                    "none_matched",
                    "Value does not match any of the subschemas",
                )),
            )
        }
        _ => {
            let details = outcomes.into_iter().map(|(child, _, _)| child).collect();
            (
                details,
                Some(
                    EvaluationError::new(
                        "oneOf",
                        "multiple_matched",
                        "Value matches the subschemas at {indexes} but must match exactly one",
                    )
                    .with_param("indexes", json!(matched)),
                ),
            )
        }
    }
}

pub(crate) fn eval_not(
    schema: &Arc<Schema>,
    instance: &Value,
    scope: &mut DynamicScope,
) -> (Option<EvaluationResult>, Option<EvaluationError>) {
    let Some(inner) = &schema.not else {
        return (None, None);
    };

    let (mut child, _, _) = vm::evaluate(inner, instance, scope);
    child.rebase(&["not"], &[]);

    if child.is_valid() {
        (
            Some(child),
            Some(EvaluationError::new(
                "not",
                "not_mismatch",
                "Value must not match the schema",
            )),
        )
    } else {
        // The inner mismatch is the desired outcome; nothing propagates.
        (None, None)
    }
}

pub(crate) fn eval_conditional(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(condition) = &schema.if_schema else {
        // `then` and `else` have no effect without `if`.
        return (Vec::new(), None);
    };

    // The condition is evaluated silently: its errors are discarded, its
    // annotations survive only when it holds.
    let (condition_result, condition_props, condition_items) =
        vm::evaluate(condition, instance, scope);

    let mut details = Vec::new();
    let mut error = None;

    if condition_result.is_valid() {
        evaluated_props.extend(condition_props);
        evaluated_items.extend(condition_items);

        if let Some(consequent) = &schema.then_schema {
            let (mut child, props, items) = vm::evaluate(consequent, instance, scope);
            child.rebase(&["then"], &[]);
            if child.is_valid() {
                evaluated_props.extend(props);
                evaluated_items.extend(items);
            } else {
                error = Some(EvaluationError::new(
                    "then",
                    "then_mismatch",
                    "Value does not match the schema required when the condition matches",
                ));
            }
            details.push(child);
        }
    } else if let Some(alternative) = &schema.else_schema {
        let (mut child, props, items) = vm::evaluate(alternative, instance, scope);
        child.rebase(&["else"], &[]);
        if child.is_valid() {
            evaluated_props.extend(props);
            evaluated_items.extend(items);
        } else {
            error = Some(EvaluationError::new(
                "else",
                "else_mismatch",
                "Value does not match the schema required when the condition does not match",
            ));
        }
        details.push(child);
    }

    (details, error)
}

pub(crate) fn eval_dependent_schemas(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(dependents) = &schema.dependent_schemas else {
        return (Vec::new(), None);
    };
    let Some(object) = instance.as_object() else {
        return (Vec::new(), None);
    };

    let mut details = Vec::new();
    let mut failed = Vec::new();

    for (property, dependent) in dependents {
        if !object.contains_key(property) {
            continue;
        }

        let (mut child, props, items) = vm::evaluate(dependent, instance, scope);
        child.rebase(&["dependentSchemas", property], &[]);
        if child.is_valid() {
            evaluated_props.extend(props);
            evaluated_items.extend(items);
        } else {
            failed.push(property.clone());
        }
        details.push(child);
    }

    let error = if failed.is_empty() {
        None
    } else {
        Some(
            EvaluationError::new(
                "dependentSchemas",
                "dependent_schemas_mismatch",
                "Object does not match the schemas required by the presence of {properties}",
            )
            .with_param("properties", json!(failed)),
        )
    };
    (details, error)
}
