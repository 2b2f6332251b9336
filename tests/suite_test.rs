use jsonschema::{Compiler, DynamicScope, Loader};
use failure::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;

#[derive(Deserialize)]
struct TestSuite {
    name: String,
    #[serde(default)]
    registry: Vec<Value>,
    schema: Value,
    instances: Vec<TestCase>,
}

#[derive(Deserialize)]
struct TestCase {
    instance: Value,
    valid: bool,
}

/// Behavior suites in the shape of the official test suite: a schema, an
/// optional registry of referenced documents, and verdict-bearing
/// instances.
#[test]
fn draft_behavior_suite() {
    let suites: Vec<TestSuite> =
        serde_json::from_value(suite_data()).expect("suite data deserializes");

    for (i, suite) in suites.into_iter().enumerate() {
        let compiler = Compiler::new();
        for document in &suite.registry {
            compiler
                .compile_value(document.clone())
                .unwrap_or_else(|err| panic!("{}: registry document failed: {}", suite.name, err));
        }
        let schema = compiler
            .compile_value(suite.schema.clone())
            .unwrap_or_else(|err| panic!("{}: schema failed to compile: {}", suite.name, err));

        for (j, case) in suite.instances.iter().enumerate() {
            let result = schema.validate(&case.instance);
            assert_eq!(
                result.is_valid(),
                case.valid,
                "suite {} ({}), case {}: instance {}",
                i,
                suite.name,
                j,
                case.instance
            );
        }
    }
}

fn suite_data() -> Value {
    json!([
        {
            "name": "type admits integers as numbers",
            "schema": {"type": "integer"},
            "instances": [
                {"instance": 1, "valid": true},
                {"instance": 1.0, "valid": true},
                {"instance": 1.5, "valid": false},
                {"instance": "1", "valid": false}
            ]
        },
        {
            "name": "type sets",
            "schema": {"type": ["string", "null"]},
            "instances": [
                {"instance": null, "valid": true},
                {"instance": "x", "valid": true},
                {"instance": false, "valid": false}
            ]
        },
        {
            "name": "boolean schemas",
            "schema": true,
            "instances": [{"instance": {"free": "form"}, "valid": true}]
        },
        {
            "name": "enum uses rational number equality",
            "schema": {"enum": [1, "a", [2]]},
            "instances": [
                {"instance": 1.0, "valid": true},
                {"instance": [2.0], "valid": true},
                {"instance": 2, "valid": false}
            ]
        },
        {
            "name": "const is structural",
            "schema": {"const": {"a": 1}},
            "instances": [
                {"instance": {"a": 1.0}, "valid": true},
                {"instance": {"a": 2}, "valid": false}
            ]
        },
        {
            "name": "allOf requires every branch",
            "schema": {"allOf": [{"type": "number"}, {"minimum": 3}]},
            "instances": [
                {"instance": 5, "valid": true},
                {"instance": 1, "valid": false},
                {"instance": "5", "valid": false}
            ]
        },
        {
            "name": "anyOf requires at least one branch",
            "schema": {"anyOf": [{"type": "string"}, {"minimum": 3}]},
            "instances": [
                {"instance": "x", "valid": true},
                {"instance": 4, "valid": true},
                {"instance": 1, "valid": false}
            ]
        },
        {
            "name": "oneOf requires exactly one branch",
            "schema": {"oneOf": [{"type": "string"}, {"type": "string", "minLength": 1}]},
            "instances": [
                {"instance": "hi", "valid": false},
                {"instance": "", "valid": true},
                {"instance": 42, "valid": false}
            ]
        },
        {
            "name": "not inverts",
            "schema": {"not": {"type": "string"}},
            "instances": [
                {"instance": 3, "valid": true},
                {"instance": "s", "valid": false}
            ]
        },
        {
            "name": "conditionals choose then or else",
            "schema": {
                "if": {"required": ["kind"], "properties": {"kind": {"const": "a"}}},
                "then": {"required": ["alpha"]},
                "else": {"required": ["beta"]}
            },
            "instances": [
                {"instance": {"kind": "a", "alpha": 1}, "valid": true},
                {"instance": {"kind": "a"}, "valid": false},
                {"instance": {"kind": "b", "beta": 1}, "valid": true},
                {"instance": {"kind": "b"}, "valid": false}
            ]
        },
        {
            "name": "prefixItems then items",
            "schema": {"prefixItems": [{"type": "string"}], "items": {"type": "number"}},
            "instances": [
                {"instance": ["x", 1, 2], "valid": true},
                {"instance": ["x", 1, "y"], "valid": false},
                {"instance": [1], "valid": false},
                {"instance": [], "valid": true}
            ]
        },
        {
            "name": "contains with bounds",
            "schema": {"contains": {"type": "number"}, "minContains": 2, "maxContains": 3},
            "instances": [
                {"instance": ["a", 1, 2], "valid": true},
                {"instance": [1], "valid": false},
                {"instance": [1, 2, 3, 4], "valid": false}
            ]
        },
        {
            "name": "minContains zero disables the at-least-one rule",
            "schema": {"contains": {"type": "number"}, "minContains": 0},
            "instances": [{"instance": ["a"], "valid": true}]
        },
        {
            "name": "array bounds and uniqueness",
            "schema": {"minItems": 1, "maxItems": 3, "uniqueItems": true},
            "instances": [
                {"instance": [1, 2], "valid": true},
                {"instance": [], "valid": false},
                {"instance": [1, 2, 3, 4], "valid": false},
                {"instance": [1, 1.0], "valid": false}
            ]
        },
        {
            "name": "object applicators cover keys",
            "schema": {
                "properties": {"a": {"type": "string"}},
                "patternProperties": {"^x-": {"type": "number"}},
                "additionalProperties": false
            },
            "instances": [
                {"instance": {"a": "s", "x-rate": 3}, "valid": true},
                {"instance": {"b": 1}, "valid": false},
                {"instance": {"a": 1}, "valid": false}
            ]
        },
        {
            "name": "propertyNames constrains keys as strings",
            "schema": {"propertyNames": {"maxLength": 3}},
            "instances": [
                {"instance": {"ab": 1}, "valid": true},
                {"instance": {"abcd": 1}, "valid": false}
            ]
        },
        {
            "name": "object bounds and required",
            "schema": {"minProperties": 1, "maxProperties": 2, "required": ["a"]},
            "instances": [
                {"instance": {"a": 1}, "valid": true},
                {"instance": {}, "valid": false},
                {"instance": {"a": 1, "b": 2, "c": 3}, "valid": false},
                {"instance": {"b": 1}, "valid": false}
            ]
        },
        {
            "name": "dependentRequired",
            "schema": {"dependentRequired": {"credit_card": ["billing_address"]}},
            "instances": [
                {"instance": {"credit_card": 1, "billing_address": "x"}, "valid": true},
                {"instance": {"credit_card": 1}, "valid": false},
                {"instance": {"billing_address": "x"}, "valid": true}
            ]
        },
        {
            "name": "dependentSchemas",
            "schema": {
                "dependentSchemas": {
                    "credit": {"required": ["billing"], "properties": {"billing": {"type": "string"}}}
                }
            },
            "instances": [
                {"instance": {"credit": 1, "billing": "a"}, "valid": true},
                {"instance": {"credit": 1}, "valid": false},
                {"instance": {}, "valid": true}
            ]
        },
        {
            "name": "exclusiveMinimum is exact on decimals",
            "schema": {"exclusiveMinimum": 1.1},
            "instances": [
                {"instance": 1.1, "valid": false},
                {"instance": 1.10000001, "valid": true},
                {"instance": 1.0, "valid": false}
            ]
        },
        {
            "name": "multipleOf survives decimal divisors",
            "schema": {"multipleOf": 0.0001},
            "instances": [
                {"instance": 0.0075, "valid": true},
                {"instance": 0.00071, "valid": false}
            ]
        },
        {
            "name": "string lengths count scalar values",
            "schema": {"minLength": 2, "maxLength": 3},
            "instances": [
                {"instance": "éé", "valid": true},
                {"instance": "é", "valid": false},
                {"instance": "abcd", "valid": false}
            ]
        },
        {
            "name": "unevaluatedProperties sees through allOf",
            "schema": {
                "allOf": [{"properties": {"a": {"type": "string"}}}],
                "unevaluatedProperties": false
            },
            "instances": [
                {"instance": {"a": "x"}, "valid": true},
                {"instance": {"a": "x", "b": 1}, "valid": false}
            ]
        },
        {
            "name": "unevaluatedProperties accepts keys any anyOf branch covered",
            "schema": {
                "anyOf": [
                    {"required": ["a"], "properties": {"a": {"type": "string"}}},
                    {"required": ["b"], "properties": {"b": {"type": "number"}}}
                ],
                "unevaluatedProperties": false
            },
            "instances": [
                {"instance": {"a": "x"}, "valid": true},
                {"instance": {"a": "x", "b": 1}, "valid": true},
                {"instance": {"a": "x", "c": 1}, "valid": false}
            ]
        },
        {
            "name": "unevaluatedItems after prefixItems",
            "schema": {"prefixItems": [{"type": "string"}], "unevaluatedItems": false},
            "instances": [
                {"instance": ["x"], "valid": true},
                {"instance": ["x", 1], "valid": false}
            ]
        },
        {
            "name": "local $defs references",
            "schema": {
                "$defs": {"positive": {"type": "number", "exclusiveMinimum": 0}},
                "properties": {"amount": {"$ref": "#/$defs/positive"}}
            },
            "instances": [
                {"instance": {"amount": 1}, "valid": true},
                {"instance": {"amount": -1}, "valid": false}
            ]
        },
        {
            "name": "anchor references",
            "schema": {
                "$id": "http://example.com/anchor-suite.json",
                "$defs": {"name": {"$anchor": "name", "type": "string"}},
                "$ref": "#name"
            },
            "instances": [
                {"instance": "x", "valid": true},
                {"instance": 5, "valid": false}
            ]
        },
        {
            "name": "registry references across documents",
            "registry": [
                {"$id": "http://example.com/suite/address.json", "type": "object", "required": ["city"]}
            ],
            "schema": {"$ref": "http://example.com/suite/address.json"},
            "instances": [
                {"instance": {"city": "x"}, "valid": true},
                {"instance": {}, "valid": false}
            ]
        },
        {
            "name": "dynamicRef binds to the outermost dynamic anchor",
            "registry": [
                {
                    "$id": "http://example.com/dyn/inner.json",
                    "$defs": {"t": {"$dynamicAnchor": "T", "type": "number"}},
                    "$dynamicRef": "#T"
                }
            ],
            "schema": {
                "$id": "http://example.com/dyn/outer.json",
                "$defs": {"t": {"$dynamicAnchor": "T", "type": "string"}},
                "$ref": "inner.json"
            },
            "instances": [
                {"instance": "hi", "valid": true},
                {"instance": 42, "valid": false}
            ]
        },
        {
            "name": "dynamicRef falls back to its own resource",
            "registry": [
                {
                    "$id": "http://example.com/dyn2/inner.json",
                    "$defs": {"t": {"$dynamicAnchor": "T", "type": "number"}},
                    "$dynamicRef": "#T"
                }
            ],
            "schema": {"$ref": "http://example.com/dyn2/inner.json"},
            "instances": [
                {"instance": 42, "valid": true},
                {"instance": "hi", "valid": false}
            ]
        }
    ])
}

fn json_loader(
    responses: Vec<(&'static str, Value)>,
) -> impl Fn(&str) -> Result<Box<dyn Read>, Error> + Send + Sync {
    move |uri: &str| -> Result<Box<dyn Read>, Error> {
        for (known, body) in &responses {
            if *known == uri {
                return Ok(Box::new(Cursor::new(body.to_string().into_bytes())));
            }
        }
        Err(failure::format_err!("no response for {}", uri))
    }
}

#[test]
fn unevaluated_properties_report_the_leftover_key() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(json!({
            "allOf": [{"properties": {"a": {"type": "string"}}}],
            "unevaluatedProperties": false
        }))
        .unwrap();

    let result = schema.validate(&json!({"a": "x", "b": 1}));
    assert!(!result.is_valid());

    let report = result.to_list(false);
    let leftover: Vec<_> = report
        .iter()
        .filter(|unit| unit.instance_location == "/b")
        .collect();
    assert_eq!(leftover.len(), 1);
    assert_eq!(leftover[0].errors[0].code(), "false_schema_mismatch");
    assert!(report.iter().any(|unit| unit
        .errors
        .iter()
        .any(|e| e.code() == "unevaluated_properties_mismatch")));
}

#[test]
fn item_errors_carry_their_index() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(json!({
            "prefixItems": [{"type": "string"}],
            "items": {"type": "number"},
            "unevaluatedItems": false
        }))
        .unwrap();

    assert!(schema.validate(&json!(["x", 1, 2])).is_valid());

    let result = schema.validate(&json!(["x", 1, "y"]));
    assert!(!result.is_valid());

    let report = result.to_list(false);
    let item_error = report
        .iter()
        .flat_map(|unit| unit.errors.iter())
        .find(|e| e.code() == "item_mismatch")
        .expect("items reports the failing index");
    assert_eq!(item_error.params()["index"], json!(2));
    assert!(report.iter().any(|unit| unit.instance_location == "/2"));
}

#[test]
fn one_of_reports_which_branches_matched() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(json!({
            "oneOf": [{"type": "string"}, {"type": "string", "minLength": 1}]
        }))
        .unwrap();

    let result = schema.validate(&json!("hi"));
    assert!(!result.is_valid());

    let error = &result.errors()[0];
    assert_eq!(error.code(), "multiple_matched");
    assert_eq!(error.params()["indexes"], json!([0, 1]));
}

#[test]
fn type_dispatch_resolves_deferred_references_through_loaders() {
    let compiler = Compiler::new();
    compiler.register_loader(
        "json-ir",
        json_loader(vec![(
            "json-ir://registry/types/form",
            json!({
                "$id": "json-ir://registry/types/form",
                "type": "object",
                "required": ["name"]
            }),
        )]),
    );

    let schema = compiler.compile_value(json!({"$ref": "some-relative"})).unwrap();

    let good = schema.validate(&json!({"@type": "json-ir://registry/types/form", "name": "a"}));
    assert!(good.is_valid());

    let bad = schema.validate(&json!({"@type": "json-ir://registry/types/form"}));
    assert!(!bad.is_valid());

    // Without a @type there is nothing to dispatch on.
    let untyped = schema.validate(&json!({"name": "a"}));
    assert!(untyped
        .errors()
        .iter()
        .any(|e| e.code() == "type_not_found"));
}

#[test]
fn type_dispatch_without_a_loader_cannot_reach_the_schema() {
    let compiler = Compiler::new();
    let schema = compiler.compile_value(json!({"$ref": "some-relative"})).unwrap();

    let result = schema.validate(&json!({"@type": "json-ir://registry/types/form"}));
    assert!(!result.is_valid());
    assert!(result
        .errors()
        .iter()
        .any(|e| e.code() == "type_cant_reach"));
}

#[test]
fn parent_merge_overlays_the_instance_over_the_referent() {
    let compiler = Compiler::new();
    compiler.register_loader(
        "obj",
        json_loader(vec![(
            "obj://things/base",
            json!({"name": 42, "tags": ["base"], "origin": "parent"}),
        )]),
    );

    let schema = compiler
        .compile_value(json!({
            "properties": {
                "name": {"type": "string"},
                "origin": {"type": "string"}
            },
            "required": ["name", "origin"]
        }))
        .unwrap();

    // `name` comes from the instance (current wins over the parent's 42),
    // `origin` is inherited from the parent.
    let merged = schema.validate(&json!({"@parent": "obj://things/base", "name": "mine"}));
    assert!(merged.is_valid());

    let unreachable = schema.validate(&json!({"@parent": "missing://things/base", "name": "mine"}));
    assert!(!unreachable.is_valid());
    assert!(unreachable
        .errors()
        .iter()
        .any(|e| e.code() == "id_cant_reach"));
}

#[test]
fn id_types_check_loaded_referents() {
    let compiler = Compiler::new();
    compiler.register_loader(
        "obj",
        json_loader(vec![(
            "obj://things/1",
            json!({"@type": "json-ir://registry/types/form/v1"}),
        )]),
    );

    let permitted = compiler
        .compile_value(json!({"@idTypes": ["/types/form"]}))
        .unwrap();
    assert!(permitted.validate(&json!("obj://things/1")).is_valid());

    let forbidden = compiler
        .compile_value(json!({"@idTypes": ["/types/report"]}))
        .unwrap();
    let result = forbidden.validate(&json!("obj://things/1"));
    assert!(!result.is_valid());
    assert!(result
        .errors()
        .iter()
        .any(|e| e.code() == "id_forbidden_type"));
}

#[test]
fn content_keywords_assert_only_after_opting_in() {
    let schema_value = json!({
        "contentEncoding": "base64",
        "contentMediaType": "application/json",
        "contentSchema": {"type": "object", "required": ["k"]}
    });

    // Annotation-only by default.
    let lenient = Compiler::new();
    let schema = lenient.compile_value(schema_value.clone()).unwrap();
    assert!(schema.validate(&json!("!!! not base64 !!!")).is_valid());

    let asserting = Compiler::new();
    asserting.set_assert_content(true);
    let schema = asserting.compile_value(schema_value).unwrap();

    assert!(schema.validate(&json!("eyJrIjoxfQ==")).is_valid());

    let wrong_shape = schema.validate(&json!("eyJ4IjoxfQ=="));
    assert!(wrong_shape
        .errors()
        .iter()
        .any(|e| e.code() == "content_schema_mismatch"));

    let not_base64 = schema.validate(&json!("!!! not base64 !!!"));
    assert!(not_base64
        .errors()
        .iter()
        .any(|e| e.code() == "content_encoding_mismatch"));
}

#[test]
fn validation_is_pure() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(json!({
            "properties": {"a": {"type": "string"}},
            "required": ["a", "b"]
        }))
        .unwrap();

    let instance = json!({"a": 1});
    assert_eq!(schema.validate(&instance), schema.validate(&instance));
}

#[test]
fn not_inverts_validity() {
    let pairs = [
        (json!({"type": "string"}), json!("x")),
        (json!({"type": "string"}), json!(1)),
        (json!({"minimum": 3}), json!(2)),
        (json!({"required": ["a"]}), json!({})),
    ];

    for (schema_value, instance) in pairs {
        let compiler = Compiler::new();
        let plain = compiler.compile_value(schema_value.clone()).unwrap();
        let negated = compiler
            .compile_value(json!({"not": schema_value}))
            .unwrap();

        assert_eq!(
            plain.validate(&instance).is_valid(),
            !negated.validate(&instance).is_valid(),
            "not inversion failed for instance {}",
            instance
        );
    }
}

#[test]
fn schemas_validate_concurrently() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(json!({"items": {"type": "number", "minimum": 0}}))
        .unwrap();

    std::thread::scope(|threads| {
        for offset in 0..4 {
            let schema = Arc::clone(&schema);
            threads.spawn(move || {
                for i in 0..50 {
                    let result = schema.validate(&json!([i + offset, -1]));
                    assert!(!result.is_valid());
                }
            });
        }
    });
}

#[test]
fn scope_reuse_with_custom_depth() {
    let compiler = Compiler::new();
    let schema = compiler.compile_value(json!({"type": "object"})).unwrap();

    let mut scope = DynamicScope::with_max_depth(64);
    assert!(schema
        .validate_with_scope(&json!({}), &mut scope)
        .is_valid());
    assert_eq!(scope.depth(), 0);
}

#[test]
fn loader_trait_objects_work_too() {
    struct Fixed;

    impl Loader for Fixed {
        fn load(&self, _uri: &str) -> Result<Box<dyn Read>, Error> {
            let body = json!({"$id": "fixed://only", "type": "null"}).to_string();
            Ok(Box::new(Cursor::new(body.into_bytes())))
        }
    }

    let compiler = Compiler::new();
    compiler.register_loader("fixed", Fixed);

    let schema = compiler.get_schema("fixed://only").unwrap();
    assert!(schema.validate(&json!(null)).is_valid());
    assert!(!schema.validate(&json!(1)).is_valid());
}
