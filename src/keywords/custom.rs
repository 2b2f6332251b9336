//! The domain's `@`-keywords: `@idTypes` checks on loader-backed string
//! references, and the `@parent` inheritance merge.
//!
//! Both keywords reach through the compiler's loaders at evaluation time.
//! Loader failures never unwind an evaluation; they surface as
//! `id_cant_reach` errors on the consuming keyword.

use crate::schema::Schema;
use crate::validator::EvaluationError;
use failure::Error;
use serde_json::Value;
use url::Url;

/// Checks that a string instance, fetched through its scheme's loader,
/// carries a permitted `@type`.
///
/// The fetched body must be JSON with an `@type` field that either equals
/// one of the declared `@idTypes` outright or whose URI path begins with
/// one of them.
pub(crate) fn eval_id_types(schema: &Schema, instance: &Value) -> Vec<EvaluationError> {
    let Some(id_types) = &schema.id_types else {
        return Vec::new();
    };
    let Some(target) = instance.as_str() else {
        return Vec::new();
    };

    let body = match fetch(schema, target) {
        Ok(body) => body,
        Err(_) => {
            return vec![EvaluationError::new(
                "@id",
                "id_cant_reach",
                "Cannot reach the referenced object {uri}",
            )
            .with_param("uri", Value::String(target.to_owned()))];
        }
    };

    let loaded: Value = match serde_json::from_slice(&body) {
        Ok(loaded) => loaded,
        Err(_) => return vec![without_type(target)],
    };
    let type_uri = match loaded.get("@type").and_then(Value::as_str) {
        Some(type_uri) => type_uri,
        None => return vec![without_type(target)],
    };

    if id_types.iter().any(|permitted| permitted == type_uri) {
        return Vec::new();
    }

    let parsed = match Url::parse(type_uri) {
        Ok(parsed) => parsed,
        Err(_) => {
            return vec![EvaluationError::new(
                "@id",
                "id_invalid_type",
                "Referenced object does not carry a valid @type",
            )
            .with_param("type", Value::String(type_uri.to_owned()))];
        }
    };
    if id_types
        .iter()
        .any(|permitted| parsed.path().starts_with(permitted.as_str()))
    {
        return Vec::new();
    }

    vec![EvaluationError::new(
        "@id",
        "id_forbidden_type",
        "Referenced object carries the @type {type}, which is not permitted",
    )
    .with_param("type", Value::String(type_uri.to_owned()))]
}

/// Fetches and parses the referent of an `@parent` keyword.
pub(crate) fn load_parent(schema: &Schema, target: &str) -> Result<Value, EvaluationError> {
    let cant_reach = || {
        EvaluationError::new(
            "@parent",
            "id_cant_reach",
            "Cannot reach the referenced object {uri}",
        )
        .with_param("uri", Value::String(target.to_owned()))
    };

    let body = fetch(schema, target).map_err(|_| cant_reach())?;
    serde_json::from_slice(&body).map_err(|_| cant_reach())
}

/// Deep-merges `overlay` over `base`. Objects merge key-by-key with the
/// overlay winning on conflicts; any other pairing is replaced by the
/// overlay outright.
pub(crate) fn merge_over(base: Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(slot) => {
                        let existing = slot.take();
                        *slot = merge_over(existing, value);
                    }
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn fetch(schema: &Schema, target: &str) -> Result<Vec<u8>, Error> {
    match schema.compiler.upgrade() {
        Some(shared) => shared.fetch(target),
        None => Err(crate::errors::CompileError::CompilerGone.into()),
    }
}

fn without_type(target: &str) -> EvaluationError {
    EvaluationError::new(
        "@id",
        "id_without_type",
        "Referenced object does not carry a @type",
    )
    .with_param("uri", Value::String(target.to_owned()))
}
