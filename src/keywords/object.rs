//! The object family: `properties`, `patternProperties`,
//! `additionalProperties`, `propertyNames`, the count keywords, `required`,
//! `dependentRequired`, `unevaluatedProperties`, and the `@parent`
//! inheritance merge.

use crate::keywords::custom;
use crate::schema::Schema;
use crate::validator::{EvaluationError, EvaluationResult};
use crate::vm::{self, DynamicScope};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Evaluates the object keywords.
///
/// When the instance carries `@parent`, the referent is fetched and the
/// instance is deep-merged over it first; the merged object is returned so
/// the driver can use it for the remainder of this schema's keywords.
pub(crate) fn eval_object(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Vec<EvaluationError>, Option<Value>) {
    if instance.as_object().is_none() {
        // Object keywords are silent on non-objects.
        return (Vec::new(), Vec::new(), None);
    }

    let mut details = Vec::new();
    let mut errors = Vec::new();

    let mut merged: Option<Value> = None;
    if let Some(parent_ref) = instance
        .as_object()
        .and_then(|object| object.get("@parent"))
        .and_then(Value::as_str)
    {
        match custom::load_parent(schema, parent_ref) {
            Ok(parent) => merged = Some(custom::merge_over(parent, instance)),
            Err(error) => {
                errors.push(error);
                return (details, errors, None);
            }
        }
    }

    let active: &Value = merged.as_ref().unwrap_or(instance);
    let object = active.as_object().expect("merging objects yields an object");

    if let Some(properties) = &schema.properties {
        let mut failed = Vec::new();
        for (key, property) in properties {
            let Some(value) = object.get(key) else {
                continue;
            };

            let (mut child, _, _) = vm::evaluate(property, value, scope);
            child.rebase(&["properties", key], &[key]);
            if child.is_valid() {
                evaluated_props.insert(key.clone());
            } else {
                failed.push(key.clone());
                details.push(child);
            }
        }
        if !failed.is_empty() {
            errors.push(
                EvaluationError::new(
                    "properties",
                    "properties_mismatch",
                    "Properties {properties} do not match their schemas",
                )
                .with_param("properties", json!(failed)),
            );
        }
    }

    if let Some(patterns) = &schema.pattern_properties {
        let mut failed = Vec::new();
        for (pattern, subschema) in patterns {
            for (key, value) in object {
                if !pattern.regex.is_match(key) {
                    continue;
                }

                let (mut child, _, _) = vm::evaluate(subschema, value, scope);
                child.rebase(&["patternProperties", &pattern.source], &[key]);
                if child.is_valid() {
                    evaluated_props.insert(key.clone());
                } else {
                    failed.push(key.clone());
                    details.push(child);
                }
            }
        }
        if !failed.is_empty() {
            errors.push(
                EvaluationError::new(
                    "patternProperties",
                    "pattern_properties_mismatch",
                    "Properties {properties} do not match their pattern schemas",
                )
                .with_param("properties", json!(failed)),
            );
        }
    }

    if let Some(additional) = &schema.additional_properties {
        let mut failed = Vec::new();
        for (key, value) in object {
            if covered_by_siblings(schema, key) {
                continue;
            }

            let (mut child, _, _) = vm::evaluate(additional, value, scope);
            child.rebase(&["additionalProperties"], &[key]);
            if child.is_valid() {
                evaluated_props.insert(key.clone());
            } else {
                failed.push(key.clone());
                details.push(child);
            }
        }
        if !failed.is_empty() {
            errors.push(
                EvaluationError::new(
                    "additionalProperties",
                    "additional_properties_mismatch",
                    "Additional properties {properties} do not match the schema",
                )
                .with_param("properties", json!(failed)),
            );
        }
    }

    if let Some(names) = &schema.property_names {
        let mut failed = Vec::new();
        for key in object.keys() {
            let name = Value::String(key.clone());
            let (mut child, _, _) = vm::evaluate(names, &name, scope);
            child.rebase(&["propertyNames"], &[key]);
            if !child.is_valid() {
                failed.push(key.clone());
                details.push(child);
            }
        }
        if !failed.is_empty() {
            errors.push(
                EvaluationError::new(
                    "propertyNames",
                    "property_names_mismatch",
                    "Property names {properties} do not match the schema",
                )
                .with_param("properties", json!(failed)),
            );
        }
    }

    if let Some(min) = schema.min_properties {
        if (object.len() as u64) < min {
            errors.push(
                EvaluationError::new(
                    "minProperties",
                    "min_properties_mismatch",
                    "Object has {count} properties but at least {limit} are required",
                )
                .with_param("count", json!(object.len()))
                .with_param("limit", json!(min)),
            );
        }
    }

    if let Some(max) = schema.max_properties {
        if object.len() as u64 > max {
            errors.push(
                EvaluationError::new(
                    "maxProperties",
                    "max_properties_mismatch",
                    "Object has {count} properties but at most {limit} are allowed",
                )
                .with_param("count", json!(object.len()))
                .with_param("limit", json!(max)),
            );
        }
    }

    if let Some(required) = &schema.required {
        let missing: Vec<&String> = required
            .iter()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            errors.push(
                EvaluationError::new(
                    "required",
                    "required_mismatch",
                    "Object is missing the required properties {missing}",
                )
                .with_param("missing", json!(missing)),
            );
        }
    }

    if let Some(dependents) = &schema.dependent_required {
        for (trigger, dependencies) in dependents {
            if !object.contains_key(trigger) {
                continue;
            }
            let missing: Vec<&String> = dependencies
                .iter()
                .filter(|key| !object.contains_key(*key))
                .collect();
            if !missing.is_empty() {
                errors.push(
                    EvaluationError::new(
                        "dependentRequired",
                        "dependent_required_mismatch",
                        "Object has {property} but is missing the properties {missing} it requires",
                    )
                    .with_param("property", Value::String(trigger.clone()))
                    .with_param("missing", json!(missing)),
                );
            }
        }
    }

    (details, errors, merged)
}

/// Validates the keys no sibling applicator evaluated.
pub(crate) fn eval_unevaluated_properties(
    schema: &Schema,
    instance: &Value,
    evaluated_props: &mut HashSet<String>,
    scope: &mut DynamicScope,
) -> (Vec<EvaluationResult>, Option<EvaluationError>) {
    let Some(unevaluated) = &schema.unevaluated_properties else {
        return (Vec::new(), None);
    };
    let Some(object) = instance.as_object() else {
        return (Vec::new(), None);
    };

    let mut details = Vec::new();
    let mut failed = Vec::new();

    for (key, value) in object {
        if evaluated_props.contains(key) {
            continue;
        }

        let (mut child, _, _) = vm::evaluate(unevaluated, value, scope);
        child.rebase(&["unevaluatedProperties", key], &[key]);
        if child.is_valid() {
            evaluated_props.insert(key.clone());
        } else {
            failed.push(key.clone());
            details.push(child);
        }
    }

    let error = if failed.is_empty() {
        None
    } else {
        Some(
            EvaluationError::new(
                "unevaluatedProperties",
                "unevaluated_properties_mismatch",
                "Unevaluated properties {properties} do not match the schema",
            )
            .with_param("properties", json!(failed)),
        )
    };
    (details, error)
}

/// Whether `properties` or some `patternProperties` regex already covers
/// the key, keeping it out of `additionalProperties`.
fn covered_by_siblings(schema: &Schema, key: &str) -> bool {
    if let Some(properties) = &schema.properties {
        if properties.contains_key(key) {
            return true;
        }
    }
    if let Some(patterns) = &schema.pattern_properties {
        if patterns.iter().any(|(pattern, _)| pattern.regex.is_match(key)) {
            return true;
        }
    }
    false
}
