//! The evaluation driver and the dynamic scope.
//!
//! [`evaluate`] walks one schema node against one instance value: it pushes
//! the node onto the dynamic scope, runs the keyword families in the
//! canonical order, pops, and returns the result tree together with the
//! evaluated-property and evaluated-item annotation sets. Applicator
//! keywords recurse back into [`evaluate`] for their subschemas.
//!
//! Keyword order matters: annotations accumulated by `$ref`, the logical
//! applicators, the conditional and the array/object families feed
//! `unevaluatedProperties` and `unevaluatedItems` at the end of the same
//! schema. Sibling applicators contribute; an enclosing schema never
//! inherits annotations from its descendants.

use crate::keywords::{array, content, core, custom, format, logic, numeric, object, string};
use crate::resolver;
use crate::schema::Schema;
use crate::uri;
use crate::validator::{EvaluationError, EvaluationResult};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Scope depth at which evaluation refuses to recurse further. Cyclic
/// references otherwise turn into unbounded recursion: following `$ref`
/// consumes no instance depth.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// The stack of schemas currently under evaluation.
///
/// `$dynamicRef` resolves against this stack: the *outermost* schema that
/// declares a matching `$dynamicAnchor` wins. One scope belongs to one
/// validation call; there is no shared mutable state between concurrent
/// validations.
pub struct DynamicScope {
    schemas: Vec<Arc<Schema>>,
    max_depth: usize,
}

impl DynamicScope {
    pub fn new() -> DynamicScope {
        DynamicScope::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// A scope with a custom recursion limit, for schemas with unusually
    /// deep (or deliberately cyclic) reference structure.
    pub fn with_max_depth(max_depth: usize) -> DynamicScope {
        DynamicScope {
            schemas: Vec::new(),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.schemas.len()
    }

    fn push(&mut self, schema: &Arc<Schema>) {
        self.schemas.push(Arc::clone(schema));
    }

    fn pop(&mut self) {
        self.schemas.pop();
    }

    /// Scans outermost-first for a schema resource declaring the dynamic
    /// anchor.
    pub(crate) fn lookup_dynamic_anchor(&self, name: &str) -> Option<Arc<Schema>> {
        for schema in &self.schemas {
            if let Some(index) = schema.dynamic_anchor_index() {
                if let Some(found) = index.get(name).and_then(Weak::upgrade) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl Default for DynamicScope {
    fn default() -> DynamicScope {
        DynamicScope::new()
    }
}

/// Evaluates `instance` against `schema`, returning the result tree plus
/// the annotation sets the node produced.
pub(crate) fn evaluate(
    schema: &Arc<Schema>,
    instance: &Value,
    scope: &mut DynamicScope,
) -> (EvaluationResult, HashSet<String>, HashSet<usize>) {
    let mut result = EvaluationResult::new(schema.location().to_owned());
    let mut evaluated_props = HashSet::new();
    let mut evaluated_items = HashSet::new();

    if scope.depth() >= scope.max_depth {
        result.add_error(
            EvaluationError::new(
                "schema",
                "max_depth_exceeded",
                "Maximum evaluation depth of {limit} exceeded",
            )
            .with_param("limit", json!(scope.max_depth)),
        );
        return (result, evaluated_props, evaluated_items);
    }

    // Boolean schemas short-circuit: `true` marks everything evaluated,
    // `false` rejects outright.
    if let Some(accept) = schema.boolean {
        if accept {
            match instance {
                Value::Object(object) => evaluated_props.extend(object.keys().cloned()),
                Value::Array(items) => evaluated_items.extend(0..items.len()),
                _ => {}
            }
        } else {
            result.add_error(EvaluationError::new(
                "schema",
                "false_schema_mismatch",
                "No values are allowed because the schema is 'false'",
            ));
        }
        return (result, evaluated_props, evaluated_items);
    }

    scope.push(schema);

    eval_ref(
        schema,
        instance,
        scope,
        &mut result,
        &mut evaluated_props,
        &mut evaluated_items,
    );
    eval_dynamic_ref(
        schema,
        instance,
        scope,
        &mut result,
        &mut evaluated_props,
        &mut evaluated_items,
    );

    if let Some(error) = core::eval_type(schema, instance) {
        result.add_error(error);
    }
    if let Some(error) = core::eval_enum(schema, instance) {
        result.add_error(error);
    }
    if let Some(error) = core::eval_const(schema, instance) {
        result.add_error(error);
    }

    absorb(
        &mut result,
        logic::eval_all_of(schema, instance, &mut evaluated_props, &mut evaluated_items, scope),
    );
    absorb(
        &mut result,
        logic::eval_any_of(schema, instance, &mut evaluated_props, &mut evaluated_items, scope),
    );
    absorb(
        &mut result,
        logic::eval_one_of(schema, instance, &mut evaluated_props, &mut evaluated_items, scope),
    );

    let (not_detail, not_error) = logic::eval_not(schema, instance, scope);
    if let Some(detail) = not_detail {
        result.add_detail(detail);
    }
    if let Some(error) = not_error {
        result.add_error(error);
    }

    absorb(
        &mut result,
        logic::eval_conditional(
            schema,
            instance,
            &mut evaluated_props,
            &mut evaluated_items,
            scope,
        ),
    );

    if array::applies(schema) {
        let (details, errors) = array::eval_array(schema, instance, &mut evaluated_items, scope);
        for detail in details {
            result.add_detail(detail);
        }
        for error in errors {
            result.add_error(error);
        }
    }

    for error in numeric::eval_numeric(schema, instance) {
        result.add_error(error);
    }
    for error in string::eval_string(schema, instance) {
        result.add_error(error);
    }
    if let Some(error) = format::eval_format(schema, instance) {
        result.add_error(error);
    }

    // The object family may swap in a merged instance when `@parent` is
    // present; the remainder of this schema's keywords see the merge.
    let (details, errors, merged) =
        object::eval_object(schema, instance, &mut evaluated_props, scope);
    for detail in details {
        result.add_detail(detail);
    }
    for error in errors {
        result.add_error(error);
    }
    let active: &Value = merged.as_ref().unwrap_or(instance);

    absorb(
        &mut result,
        logic::eval_dependent_schemas(
            schema,
            active,
            &mut evaluated_props,
            &mut evaluated_items,
            scope,
        ),
    );

    let (details, error) =
        object::eval_unevaluated_properties(schema, active, &mut evaluated_props, scope);
    for detail in details {
        result.add_detail(detail);
    }
    if let Some(error) = error {
        result.add_error(error);
    }

    let (details, error) =
        array::eval_unevaluated_items(schema, active, &mut evaluated_items, scope);
    for detail in details {
        result.add_detail(detail);
    }
    if let Some(error) = error {
        result.add_error(error);
    }

    let (content_detail, content_errors) = content::eval_content(schema, active, scope);
    if let Some(detail) = content_detail {
        result.add_detail(detail);
    }
    for error in content_errors {
        result.add_error(error);
    }

    for error in custom::eval_id_types(schema, active) {
        result.add_error(error);
    }

    scope.pop();

    (result, evaluated_props, evaluated_items)
}

fn absorb(
    result: &mut EvaluationResult,
    outcome: (Vec<EvaluationResult>, Option<EvaluationError>),
) {
    let (details, error) = outcome;
    for detail in details {
        result.add_detail(detail);
    }
    if let Some(error) = error {
        result.add_error(error);
    }
}

fn eval_ref(
    schema: &Arc<Schema>,
    instance: &Value,
    scope: &mut DynamicScope,
    result: &mut EvaluationResult,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
) {
    let Some(reference) = &schema.reference else {
        return;
    };

    let target = match schema.resolved_ref.get().and_then(Weak::upgrade) {
        Some(target) => target,
        None if uri::scheme_of(reference).is_none() => {
            // Domain extension: a reference that is still relative-looking
            // at evaluation time dispatches on the instance's `@type`.
            let type_uri = instance
                .as_object()
                .and_then(|object| object.get("@type"))
                .and_then(Value::as_str);
            let Some(type_uri) = type_uri else {
                result.add_error(
                    EvaluationError::new(
                        "@type",
                        "type_not_found",
                        "Instance carries no @type to resolve the reference {reference}",
                    )
                    .with_param("reference", json!(reference)),
                );
                return;
            };

            match resolver::resolve_ref(schema, type_uri) {
                Ok(target) => target,
                Err(_) => {
                    result.add_error(
                        EvaluationError::new(
                            "@type",
                            "type_cant_reach",
                            "Cannot reach the type schema {type}",
                        )
                        .with_param("type", json!(type_uri)),
                    );
                    return;
                }
            }
        }
        None => match resolver::resolve_ref(schema, reference) {
            Ok(target) => {
                // The target is deterministic for an absolute reference;
                // cache it for later evaluations.
                let _ = schema.resolved_ref.set(Arc::downgrade(&target));
                target
            }
            Err(_) => {
                result.add_error(
                    EvaluationError::new(
                        "$ref",
                        "ref_unresolved",
                        "Reference {reference} cannot be resolved",
                    )
                    .with_param("reference", json!(reference)),
                );
                return;
            }
        },
    };

    let (mut child, props, items) = evaluate(&target, instance, scope);
    child.rebase(&["$ref"], &[]);
    if !child.is_valid() {
        result.add_error(EvaluationError::new(
            "$ref",
            "ref_mismatch",
            "Value does not match the reference schema",
        ));
    }
    result.add_detail(child);
    evaluated_props.extend(props);
    evaluated_items.extend(items);
}

fn eval_dynamic_ref(
    schema: &Arc<Schema>,
    instance: &Value,
    scope: &mut DynamicScope,
    result: &mut EvaluationResult,
    evaluated_props: &mut HashSet<String>,
    evaluated_items: &mut HashSet<usize>,
) {
    let Some(reference) = &schema.dynamic_reference else {
        return;
    };

    let mut target = match schema.resolved_dynamic_ref.get().and_then(Weak::upgrade) {
        Some(target) => target,
        None => match resolver::resolve_ref(schema, reference) {
            Ok(target) => {
                let _ = schema.resolved_dynamic_ref.set(Arc::downgrade(&target));
                target
            }
            Err(_) => {
                result.add_error(
                    EvaluationError::new(
                        "$dynamicRef",
                        "dynamic_ref_unresolved",
                        "Dynamic reference {reference} cannot be resolved",
                    )
                    .with_param("reference", json!(reference)),
                );
                return;
            }
        },
    };

    // A plain-name fragment re-binds to the outermost schema in the
    // dynamic scope declaring the same `$dynamicAnchor`; pointer fragments
    // behave like `$ref`.
    if let Some(fragment) = uri::split_fragment(reference).1 {
        if !fragment.starts_with('/') {
            if let Some(name) = &target.dynamic_anchor {
                if let Some(outer) = scope.lookup_dynamic_anchor(name) {
                    target = outer;
                }
            }
        }
    }

    let (mut child, props, items) = evaluate(&target, instance, scope);
    child.rebase(&["$dynamicRef"], &[]);
    if !child.is_valid() {
        result.add_error(EvaluationError::new(
            "$dynamicRef",
            "dynamic_ref_mismatch",
            "Value does not match the dynamic reference schema",
        ));
    }
    result.add_detail(child);
    evaluated_props.extend(props);
    evaluated_items.extend(items);
}
