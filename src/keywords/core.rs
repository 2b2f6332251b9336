//! `type`, `enum` and `const`, plus the structural equality they rely on.

use crate::rational::Rational;
use crate::schema::{InstanceType, Schema};
use crate::validator::EvaluationError;
use serde_json::{json, Value};

/// The draft type tag of an instance. A number with a zero fractional part
/// is an `integer`; everything else maps one-to-one.
pub(crate) fn data_type_of(instance: &Value) -> InstanceType {
    match instance {
        Value::Null => InstanceType::Null,
        Value::Bool(_) => InstanceType::Boolean,
        Value::String(_) => InstanceType::String,
        Value::Array(_) => InstanceType::Array,
        Value::Object(_) => InstanceType::Object,
        Value::Number(number) => match Rational::from_number(number) {
            Some(rational) if rational.is_integer() => InstanceType::Integer,
            _ => InstanceType::Number,
        },
    }
}

pub(crate) fn eval_type(schema: &Schema, instance: &Value) -> Option<EvaluationError> {
    let types = schema.types.as_ref()?;
    let actual = data_type_of(instance);

    let matched = types.iter().any(|tag| match tag {
        // `number` admits integers; `integer` admits only them.
        InstanceType::Number => matches!(actual, InstanceType::Number | InstanceType::Integer),
        tag => *tag == actual,
    });
    if matched {
        return None;
    }

    let expected = if types.len() == 1 {
        json!(types[0].as_str())
    } else {
        json!(types.iter().map(InstanceType::as_str).collect::<Vec<_>>())
    };
    Some(
        EvaluationError::new("type", "type_mismatch", "Value is {actual} but should be {expected}")
            .with_param("actual", json!(actual.as_str()))
            .with_param("expected", expected),
    )
}

pub(crate) fn eval_enum(schema: &Schema, instance: &Value) -> Option<EvaluationError> {
    let candidates = schema.enum_values.as_ref()?;
    if candidates.iter().any(|candidate| json_equal(candidate, instance)) {
        return None;
    }

    Some(
        EvaluationError::new(
            "enum",
            "enum_mismatch",
            "Value is not one of the permitted values {values}",
        )
        .with_param("values", json!(candidates)),
    )
}

pub(crate) fn eval_const(schema: &Schema, instance: &Value) -> Option<EvaluationError> {
    let constant = schema.const_value.as_ref()?;
    if json_equal(constant, instance) {
        return None;
    }

    Some(
        EvaluationError::new("const", "const_mismatch", "Value must be the constant {value}")
            .with_param("value", constant.clone()),
    )
}

/// Structural deep equality. Numbers compare as exact rationals, so `1`,
/// `1.0` and `1e0` are all the same value; objects compare without regard
/// to key order.
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            match (Rational::from_number(x), Rational::from_number(y)) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, a)| y.get(key).map_or(false, |b| json_equal(a, b)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    fn compile(value: Value) -> std::sync::Arc<Schema> {
        Compiler::new().compile_value(value).unwrap()
    }

    #[test]
    fn integers_are_numbers_with_unit_denominator() {
        assert_eq!(data_type_of(&json!(3)), InstanceType::Integer);
        assert_eq!(data_type_of(&json!(3.0)), InstanceType::Integer);
        assert_eq!(data_type_of(&json!(3.5)), InstanceType::Number);
    }

    #[test]
    fn number_admits_integers_but_not_vice_versa() {
        let number = compile(json!({"type": "number"}));
        assert!(eval_type(&number, &json!(3)).is_none());
        assert!(eval_type(&number, &json!(3.5)).is_none());

        let integer = compile(json!({"type": "integer"}));
        assert!(eval_type(&integer, &json!(3.0)).is_none());
        assert!(eval_type(&integer, &json!(3.5)).is_some());
    }

    #[test]
    fn type_sets_match_any_member() {
        let schema = compile(json!({"type": ["string", "null"]}));
        assert!(eval_type(&schema, &json!("x")).is_none());
        assert!(eval_type(&schema, &json!(null)).is_none());

        let err = eval_type(&schema, &json!(1)).unwrap();
        assert_eq!(err.code(), "type_mismatch");
        assert_eq!(err.params()["expected"], json!(["string", "null"]));
    }

    #[test]
    fn enum_compares_numbers_exactly() {
        let schema = compile(json!({"enum": [1, "a"]}));
        assert!(eval_enum(&schema, &json!(1.0)).is_none());
        assert!(eval_enum(&schema, &json!("a")).is_none());
        assert!(eval_enum(&schema, &json!(1.5)).is_some());
    }

    #[test]
    fn const_is_structural() {
        let schema = compile(json!({"const": {"a": [1, 2]}}));
        assert!(eval_const(&schema, &json!({"a": [1.0, 2]})).is_none());
        assert!(eval_const(&schema, &json!({"a": [1, 2, 3]})).is_some());
    }

    #[test]
    fn object_equality_ignores_key_order() {
        assert!(json_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(!json_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }
}
