//! Numeric bounds and `multipleOf`, all over the exact rational model.

use crate::rational::Rational;
use crate::schema::Schema;
use crate::validator::EvaluationError;
use serde_json::{json, Value};

pub(crate) fn eval_numeric(schema: &Schema, instance: &Value) -> Vec<EvaluationError> {
    let Value::Number(number) = instance else {
        // Numeric keywords are silent on non-numbers.
        return Vec::new();
    };

    let Some(value) = Rational::from_number(number) else {
        return vec![EvaluationError::new(
            "type",
            "invalid_numeric",
            "Number {value} cannot be decoded exactly",
        )
        .with_param("value", instance.clone())];
    };

    let mut errors = Vec::new();

    if let Some(divisor) = &schema.multiple_of {
        if !value.is_multiple_of(divisor) {
            errors.push(
                EvaluationError::new(
                    "multipleOf",
                    "multiple_of_mismatch",
                    "Value is not a multiple of {divisor}",
                )
                .with_param("divisor", json!(divisor.to_string())),
            );
        }
    }

    if let Some(limit) = &schema.maximum {
        if value > *limit {
            errors.push(
                EvaluationError::new(
                    "maximum",
                    "maximum_mismatch",
                    "Value is greater than the maximum {limit}",
                )
                .with_param("limit", json!(limit.to_string())),
            );
        }
    }

    if let Some(limit) = &schema.exclusive_maximum {
        if value >= *limit {
            errors.push(
                EvaluationError::new(
                    "exclusiveMaximum",
                    "exclusive_maximum_mismatch",
                    "Value is not strictly less than the exclusive maximum {limit}",
                )
                .with_param("limit", json!(limit.to_string())),
            );
        }
    }

    if let Some(limit) = &schema.minimum {
        if value < *limit {
            errors.push(
                EvaluationError::new(
                    "minimum",
                    "minimum_mismatch",
                    "Value is less than the minimum {limit}",
                )
                .with_param("limit", json!(limit.to_string())),
            );
        }
    }

    if let Some(limit) = &schema.exclusive_minimum {
        if value <= *limit {
            errors.push(
                EvaluationError::new(
                    "exclusiveMinimum",
                    "exclusive_minimum_mismatch",
                    "Value is not strictly greater than the exclusive minimum {limit}",
                )
                .with_param("limit", json!(limit.to_string())),
            );
        }
    }

    errors
}
