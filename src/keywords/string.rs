//! String bounds and `pattern`.
//!
//! Lengths count Unicode scalar values, not bytes. Patterns were compiled
//! while the schema compiled; the dialect is the `regex` crate's, which
//! covers ECMA-262 except backreferences and lookaround.

use crate::schema::Schema;
use crate::validator::EvaluationError;
use serde_json::{json, Value};

pub(crate) fn eval_string(schema: &Schema, instance: &Value) -> Vec<EvaluationError> {
    let Some(text) = instance.as_str() else {
        // String keywords are silent on non-strings.
        return Vec::new();
    };

    let mut errors = Vec::new();
    let length = text.chars().count() as u64;

    if let Some(limit) = schema.max_length {
        if length > limit {
            errors.push(
                EvaluationError::new(
                    "maxLength",
                    "max_length_mismatch",
                    "String is {length} characters long but at most {limit} are allowed",
                )
                .with_param("length", json!(length))
                .with_param("limit", json!(limit)),
            );
        }
    }

    if let Some(limit) = schema.min_length {
        if length < limit {
            errors.push(
                EvaluationError::new(
                    "minLength",
                    "min_length_mismatch",
                    "String is {length} characters long but at least {limit} are required",
                )
                .with_param("length", json!(length))
                .with_param("limit", json!(limit)),
            );
        }
    }

    if let Some(pattern) = &schema.pattern {
        if !pattern.regex.is_match(text) {
            errors.push(
                EvaluationError::new(
                    "pattern",
                    "pattern_mismatch",
                    "String does not match the pattern {pattern}",
                )
                .with_param("pattern", json!(pattern.source)),
            );
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    fn errors_for(schema: Value, instance: Value) -> Vec<EvaluationError> {
        let schema = Compiler::new().compile_value(schema).unwrap();
        eval_string(&schema, &instance)
    }

    #[test]
    fn lengths_count_scalar_values() {
        // Four characters, far more than four bytes.
        let schema = json!({"minLength": 4, "maxLength": 4});
        assert!(errors_for(schema.clone(), json!("çöñé")).is_empty());
        assert_eq!(errors_for(schema.clone(), json!("abc")).len(), 1);
        assert_eq!(errors_for(schema, json!("abcde")).len(), 1);
    }

    #[test]
    fn patterns_are_precompiled_and_match() {
        let schema = json!({"pattern": "^[a-z]+-[0-9]+$"});
        assert!(errors_for(schema.clone(), json!("order-42")).is_empty());
        let errors = errors_for(schema, json!("ORDER-42"));
        assert_eq!(errors[0].code(), "pattern_mismatch");
        assert_eq!(errors[0].params()["pattern"], json!("^[a-z]+-[0-9]+$"));
    }

    #[test]
    fn non_strings_are_ignored() {
        assert!(errors_for(json!({"minLength": 2}), json!(123)).is_empty());
    }
}
