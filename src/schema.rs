//! The compiled schema tree.
//!
//! A [`Schema`] is the compiled form of one schema object (or boolean) from
//! a JSON document. Compilation resolves `$id`s against the inherited base
//! URI, compiles regular expressions once, indexes anchors, and links every
//! node to its parent so that references can search outward. Compiled
//! schemas are immutable and shared: evaluation never mutates them, so any
//! number of validations can run against the same tree concurrently.

use crate::compiler::CompilerShared;
use crate::errors::CompileError;
use crate::rational::Rational;
use crate::uri::{escape_segment, resolve_against};
use crate::validator::EvaluationResult;
use crate::vm::{self, DynamicScope};
use failure::{bail, Error};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use url::Url;

/// The seven type tags of draft 2020-12.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl InstanceType {
    pub(crate) fn parse(name: &str) -> Option<InstanceType> {
        match name {
            "null" => Some(InstanceType::Null),
            "boolean" => Some(InstanceType::Boolean),
            "object" => Some(InstanceType::Object),
            "array" => Some(InstanceType::Array),
            "number" => Some(InstanceType::Number),
            "string" => Some(InstanceType::String),
            "integer" => Some(InstanceType::Integer),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::String => "string",
            InstanceType::Integer => "integer",
        }
    }
}

/// A regex compiled once at schema-compile time, with its source kept for
/// error parameters.
pub struct Pattern {
    pub(crate) source: String,
    pub(crate) regex: Regex,
}

impl Pattern {
    fn compile(keyword: &str, source: &str) -> Result<Pattern, Error> {
        match Regex::new(source) {
            Ok(regex) => Ok(Pattern {
                source: source.to_owned(),
                regex,
            }),
            Err(err) => bail!(CompileError::InvalidShape {
                keyword: keyword.to_owned(),
                reason: format!("invalid regular expression {:?}: {}", source, err),
            }),
        }
    }
}

/// One compiled schema node.
///
/// Subschemas are `Arc`-shared children; the parent link is weak, carrying
/// relation but not ownership, so document trees drop cleanly. Reference
/// targets are also weak: every reachable node is kept alive by its
/// document root, which the compiler's registry owns.
pub struct Schema {
    pub(crate) schema_uri: Option<String>,
    pub(crate) id: Option<Url>,
    pub(crate) base_uri: Option<Url>,
    pub(crate) anchor: Option<String>,
    pub(crate) dynamic_anchor: Option<String>,
    pub(crate) location: String,
    pub(crate) boolean: Option<bool>,

    pub(crate) types: Option<Vec<InstanceType>>,
    pub(crate) enum_values: Option<Vec<Value>>,
    pub(crate) const_value: Option<Value>,

    pub(crate) minimum: Option<Rational>,
    pub(crate) maximum: Option<Rational>,
    pub(crate) exclusive_minimum: Option<Rational>,
    pub(crate) exclusive_maximum: Option<Rational>,
    pub(crate) multiple_of: Option<Rational>,

    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<Pattern>,

    pub(crate) min_items: Option<u64>,
    pub(crate) max_items: Option<u64>,
    pub(crate) unique_items: bool,
    pub(crate) prefix_items: Option<Vec<Arc<Schema>>>,
    pub(crate) items: Option<Arc<Schema>>,
    pub(crate) contains: Option<Arc<Schema>>,
    pub(crate) min_contains: Option<u64>,
    pub(crate) max_contains: Option<u64>,
    pub(crate) unevaluated_items: Option<Arc<Schema>>,

    pub(crate) min_properties: Option<u64>,
    pub(crate) max_properties: Option<u64>,
    pub(crate) required: Option<Vec<String>>,
    pub(crate) dependent_required: Option<IndexMap<String, Vec<String>>>,
    pub(crate) properties: Option<IndexMap<String, Arc<Schema>>>,
    pub(crate) pattern_properties: Option<Vec<(Pattern, Arc<Schema>)>>,
    pub(crate) additional_properties: Option<Arc<Schema>>,
    pub(crate) property_names: Option<Arc<Schema>>,
    pub(crate) dependent_schemas: Option<IndexMap<String, Arc<Schema>>>,
    pub(crate) unevaluated_properties: Option<Arc<Schema>>,

    pub(crate) all_of: Option<Vec<Arc<Schema>>>,
    pub(crate) any_of: Option<Vec<Arc<Schema>>>,
    pub(crate) one_of: Option<Vec<Arc<Schema>>>,
    pub(crate) not: Option<Arc<Schema>>,
    pub(crate) if_schema: Option<Arc<Schema>>,
    pub(crate) then_schema: Option<Arc<Schema>>,
    pub(crate) else_schema: Option<Arc<Schema>>,

    pub(crate) format: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_media_type: Option<String>,
    pub(crate) content_schema: Option<Arc<Schema>>,

    pub(crate) reference: Option<String>,
    pub(crate) dynamic_reference: Option<String>,
    pub(crate) resolved_ref: OnceLock<Weak<Schema>>,
    pub(crate) resolved_dynamic_ref: OnceLock<Weak<Schema>>,

    pub(crate) defs: Option<IndexMap<String, Arc<Schema>>>,
    pub(crate) id_types: Option<Vec<String>>,

    /// Keywords this engine does not evaluate (`title`, `description`,
    /// `default`, …), retained verbatim.
    pub(crate) extra: Map<String, Value>,

    /// Anchor indexes for the subtree rooted here; only populated on nodes
    /// that establish a base URI (a `$id`, or the document root).
    pub(crate) anchors: OnceLock<HashMap<String, Weak<Schema>>>,
    pub(crate) dynamic_anchors: OnceLock<HashMap<String, Weak<Schema>>>,

    pub(crate) parent: OnceLock<Weak<Schema>>,
    pub(crate) this: OnceLock<Weak<Schema>>,
    pub(crate) compiler: Weak<CompilerShared>,
}

impl Schema {
    /// Validates an instance, producing the full result tree.
    pub fn validate(&self, instance: &Value) -> EvaluationResult {
        let mut scope = DynamicScope::new();
        self.validate_with_scope(instance, &mut scope)
    }

    /// Validates with a caller-supplied dynamic scope, for advanced reuse
    /// such as custom depth limits.
    pub fn validate_with_scope(
        &self,
        instance: &Value,
        scope: &mut DynamicScope,
    ) -> EvaluationResult {
        let (result, _, _) = vm::evaluate(&self.arc(), instance, scope);
        result
    }

    /// The absolute location of this schema object: base URI plus pointer
    /// fragment.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The resolved absolute `$id`, when this node declares one.
    pub fn id(&self) -> Option<&Url> {
        self.id.as_ref()
    }

    pub(crate) fn parent(&self) -> Option<Arc<Schema>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// The owning `Arc` of this node; every node is linked back to itself
    /// when its document tree is built.
    pub(crate) fn arc(&self) -> Arc<Schema> {
        self.this
            .get()
            .and_then(Weak::upgrade)
            .expect("unreachable: schema outside a compiled tree")
    }

    /// The root of the document containing this node.
    pub(crate) fn document_root(&self) -> Arc<Schema> {
        let mut current = self.arc();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Whether this node establishes a base URI: it declares `$id`, or it
    /// is a document root.
    pub(crate) fn is_base(&self) -> bool {
        self.id.is_some() || self.parent.get().is_none()
    }

    pub(crate) fn anchor_index(&self) -> Option<&HashMap<String, Weak<Schema>>> {
        self.anchors.get()
    }

    pub(crate) fn dynamic_anchor_index(&self) -> Option<&HashMap<String, Weak<Schema>>> {
        self.dynamic_anchors.get()
    }

    /// Every direct subschema, in keyword order. Used by the compile-time
    /// passes that link parents, index anchors and resolve references.
    pub(crate) fn subschemas(&self) -> Vec<&Arc<Schema>> {
        let mut children = Vec::new();

        if let Some(defs) = &self.defs {
            children.extend(defs.values());
        }
        for list in [&self.prefix_items, &self.all_of, &self.any_of, &self.one_of] {
            if let Some(list) = list {
                children.extend(list.iter());
            }
        }
        if let Some(properties) = &self.properties {
            children.extend(properties.values());
        }
        if let Some(patterns) = &self.pattern_properties {
            children.extend(patterns.iter().map(|(_, schema)| schema));
        }
        if let Some(dependents) = &self.dependent_schemas {
            children.extend(dependents.values());
        }
        for single in [
            &self.additional_properties,
            &self.property_names,
            &self.items,
            &self.contains,
            &self.not,
            &self.if_schema,
            &self.then_schema,
            &self.else_schema,
            &self.unevaluated_properties,
            &self.unevaluated_items,
            &self.content_schema,
        ] {
            if let Some(schema) = single {
                children.push(schema);
            }
        }

        children
    }

    fn empty(
        location: String,
        base_uri: Option<Url>,
        compiler: Weak<CompilerShared>,
    ) -> Schema {
        Schema {
            schema_uri: None,
            id: None,
            base_uri,
            anchor: None,
            dynamic_anchor: None,
            location,
            boolean: None,
            types: None,
            enum_values: None,
            const_value: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            multiple_of: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_items: None,
            max_items: None,
            unique_items: false,
            prefix_items: None,
            items: None,
            contains: None,
            min_contains: None,
            max_contains: None,
            unevaluated_items: None,
            min_properties: None,
            max_properties: None,
            required: None,
            dependent_required: None,
            properties: None,
            pattern_properties: None,
            additional_properties: None,
            property_names: None,
            dependent_schemas: None,
            unevaluated_properties: None,
            all_of: None,
            any_of: None,
            one_of: None,
            not: None,
            if_schema: None,
            then_schema: None,
            else_schema: None,
            format: None,
            content_encoding: None,
            content_media_type: None,
            content_schema: None,
            reference: None,
            dynamic_reference: None,
            resolved_ref: OnceLock::new(),
            resolved_dynamic_ref: OnceLock::new(),
            defs: None,
            id_types: None,
            extra: Map::new(),
            anchors: OnceLock::new(),
            dynamic_anchors: OnceLock::new(),
            parent: OnceLock::new(),
            this: OnceLock::new(),
            compiler,
        }
    }
}

/// Compiles one JSON document into a linked, indexed schema tree.
pub(crate) fn compile_document(
    value: &Value,
    compiler: &Weak<CompilerShared>,
) -> Result<Arc<Schema>, Error> {
    let root = build_node(value, None, String::new(), compiler)?;
    link_parents(&root);
    index_anchors(&root);
    Ok(root)
}

fn build_node(
    value: &Value,
    inherited_base: Option<&Url>,
    pointer: String,
    compiler: &Weak<CompilerShared>,
) -> Result<Arc<Schema>, Error> {
    let object = match value {
        Value::Bool(accept) => {
            let location = location_of(inherited_base, &pointer);
            let mut node = Schema::empty(location, inherited_base.cloned(), compiler.clone());
            node.boolean = Some(*accept);
            return Ok(Arc::new(node));
        }
        Value::Object(object) => object,
        other => bail!(CompileError::InvalidShape {
            keyword: "schema".to_owned(),
            reason: format!("expected an object or boolean, got {}", shape_of(other)),
        }),
    };

    let id = match object.get("$id") {
        Some(raw) => Some(parse_id(raw, inherited_base)?),
        None => None,
    };
    let base = id.clone().or_else(|| inherited_base.cloned());
    let pointer = if id.is_some() { String::new() } else { pointer };

    let mut node = Schema::empty(location_of(base.as_ref(), &pointer), base.clone(), compiler.clone());
    node.id = id;

    for (keyword, raw) in object {
        match keyword.as_str() {
            "$id" => {}
            "$schema" => node.schema_uri = Some(keyword_str(keyword, raw)?),
            "$anchor" => node.anchor = Some(keyword_str(keyword, raw)?),
            "$dynamicAnchor" => node.dynamic_anchor = Some(keyword_str(keyword, raw)?),
            "$ref" => node.reference = Some(keyword_str(keyword, raw)?),
            "$dynamicRef" => node.dynamic_reference = Some(keyword_str(keyword, raw)?),
            "$defs" => {
                node.defs = Some(schema_map(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }

            "type" => node.types = Some(parse_types(raw)?),
            "enum" => match raw {
                Value::Array(values) => node.enum_values = Some(values.clone()),
                other => bail_shape("enum", "an array", other)?,
            },
            "const" => node.const_value = Some(raw.clone()),

            "minimum" => node.minimum = Some(numeric_bound(keyword, raw)?),
            "maximum" => node.maximum = Some(numeric_bound(keyword, raw)?),
            "exclusiveMinimum" => node.exclusive_minimum = Some(numeric_bound(keyword, raw)?),
            "exclusiveMaximum" => node.exclusive_maximum = Some(numeric_bound(keyword, raw)?),
            "multipleOf" => node.multiple_of = Some(numeric_bound(keyword, raw)?),

            "minLength" => node.min_length = Some(uint_bound(keyword, raw)?),
            "maxLength" => node.max_length = Some(uint_bound(keyword, raw)?),
            "pattern" => {
                node.pattern = Some(Pattern::compile(keyword, &keyword_str(keyword, raw)?)?)
            }

            "minItems" => node.min_items = Some(uint_bound(keyword, raw)?),
            "maxItems" => node.max_items = Some(uint_bound(keyword, raw)?),
            "uniqueItems" => match raw {
                Value::Bool(unique) => node.unique_items = *unique,
                other => bail_shape("uniqueItems", "a boolean", other)?,
            },
            "prefixItems" => {
                node.prefix_items =
                    Some(schema_list(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "items" => node.items = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?),
            "contains" => {
                node.contains = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "minContains" => node.min_contains = Some(uint_bound(keyword, raw)?),
            "maxContains" => node.max_contains = Some(uint_bound(keyword, raw)?),
            "unevaluatedItems" => {
                node.unevaluated_items =
                    Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }

            "minProperties" => node.min_properties = Some(uint_bound(keyword, raw)?),
            "maxProperties" => node.max_properties = Some(uint_bound(keyword, raw)?),
            "required" => node.required = Some(string_list(keyword, raw)?),
            "dependentRequired" => match raw {
                Value::Object(map) => {
                    let mut dependents = IndexMap::new();
                    for (name, deps) in map {
                        dependents.insert(name.clone(), string_list(keyword, deps)?);
                    }
                    node.dependent_required = Some(dependents);
                }
                other => bail_shape(keyword, "an object of string arrays", other)?,
            },
            "properties" => {
                node.properties =
                    Some(schema_map(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "patternProperties" => match raw {
                Value::Object(map) => {
                    let mut patterns = Vec::with_capacity(map.len());
                    for (source, sub) in map {
                        let child_pointer =
                            format!("{}/patternProperties/{}", pointer, escape_segment(source));
                        patterns.push((
                            Pattern::compile(keyword, source)?,
                            build_node(sub, base.as_ref(), child_pointer, compiler)?,
                        ));
                    }
                    node.pattern_properties = Some(patterns);
                }
                other => bail_shape(keyword, "an object of schemas", other)?,
            },
            "additionalProperties" => {
                node.additional_properties =
                    Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "propertyNames" => {
                node.property_names =
                    Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "dependentSchemas" => {
                node.dependent_schemas =
                    Some(schema_map(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "unevaluatedProperties" => {
                node.unevaluated_properties =
                    Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }

            "allOf" => {
                node.all_of = Some(schema_list(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "anyOf" => {
                node.any_of = Some(schema_list(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "oneOf" => {
                node.one_of = Some(schema_list(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "not" => node.not = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?),
            "if" => {
                node.if_schema = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "then" => {
                node.then_schema = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }
            "else" => {
                node.else_schema = Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }

            "format" => node.format = Some(keyword_str(keyword, raw)?),
            "contentEncoding" => node.content_encoding = Some(keyword_str(keyword, raw)?),
            "contentMediaType" => node.content_media_type = Some(keyword_str(keyword, raw)?),
            "contentSchema" => {
                node.content_schema =
                    Some(subschema(keyword, raw, base.as_ref(), &pointer, compiler)?)
            }

            "@idTypes" => node.id_types = Some(string_list(keyword, raw)?),

            _ => {
                node.extra.insert(keyword.clone(), raw.clone());
            }
        }
    }

    Ok(Arc::new(node))
}

fn parse_id(raw: &Value, inherited_base: Option<&Url>) -> Result<Url, Error> {
    let text = keyword_str("$id", raw)?;
    let url = resolve_against(inherited_base, &text)?;
    if matches!(url.fragment(), Some(fragment) if !fragment.is_empty()) {
        bail!(CompileError::InvalidUri { uri: text });
    }
    let mut url = url;
    url.set_fragment(None);
    Ok(url)
}

fn subschema(
    keyword: &str,
    raw: &Value,
    base: Option<&Url>,
    pointer: &str,
    compiler: &Weak<CompilerShared>,
) -> Result<Arc<Schema>, Error> {
    build_node(raw, base, format!("{}/{}", pointer, keyword), compiler)
}

fn schema_map(
    keyword: &str,
    raw: &Value,
    base: Option<&Url>,
    pointer: &str,
    compiler: &Weak<CompilerShared>,
) -> Result<IndexMap<String, Arc<Schema>>, Error> {
    let object = match raw {
        Value::Object(object) => object,
        other => return bail_shape(keyword, "an object of schemas", other),
    };

    let mut map = IndexMap::with_capacity(object.len());
    for (name, sub) in object {
        let child_pointer = format!("{}/{}/{}", pointer, keyword, escape_segment(name));
        map.insert(name.clone(), build_node(sub, base, child_pointer, compiler)?);
    }
    Ok(map)
}

fn schema_list(
    keyword: &str,
    raw: &Value,
    base: Option<&Url>,
    pointer: &str,
    compiler: &Weak<CompilerShared>,
) -> Result<Vec<Arc<Schema>>, Error> {
    let array = match raw {
        Value::Array(array) => array,
        other => return bail_shape(keyword, "an array of schemas", other),
    };

    let mut list = Vec::with_capacity(array.len());
    for (index, sub) in array.iter().enumerate() {
        let child_pointer = format!("{}/{}/{}", pointer, keyword, index);
        list.push(build_node(sub, base, child_pointer, compiler)?);
    }
    Ok(list)
}

fn keyword_str(keyword: &str, raw: &Value) -> Result<String, Error> {
    match raw {
        Value::String(text) => Ok(text.clone()),
        other => bail_shape(keyword, "a string", other),
    }
}

fn string_list(keyword: &str, raw: &Value) -> Result<Vec<String>, Error> {
    let array = match raw {
        Value::Array(array) => array,
        other => return bail_shape(keyword, "an array of strings", other),
    };

    let mut list = Vec::with_capacity(array.len());
    for item in array {
        match item {
            Value::String(text) => list.push(text.clone()),
            other => bail_shape(keyword, "an array of strings", other)?,
        }
    }
    Ok(list)
}

fn parse_types(raw: &Value) -> Result<Vec<InstanceType>, Error> {
    let names: Vec<&Value> = match raw {
        Value::String(_) => vec![raw],
        Value::Array(names) => names.iter().collect(),
        other => return bail_shape("type", "a type name or array of type names", other),
    };

    let mut types = Vec::with_capacity(names.len());
    for name in names {
        let name = match name {
            Value::String(name) => name,
            other => return bail_shape("type", "a type name", other),
        };
        match InstanceType::parse(name) {
            Some(tag) => types.push(tag),
            None => bail!(CompileError::InvalidShape {
                keyword: "type".to_owned(),
                reason: format!("unknown type name {:?}", name),
            }),
        }
    }
    Ok(types)
}

fn numeric_bound(keyword: &str, raw: &Value) -> Result<Rational, Error> {
    let number = match raw {
        Value::Number(number) => number,
        other => return bail_shape(keyword, "a number", other),
    };
    match Rational::from_number(number) {
        Some(rational) => Ok(rational),
        None => bail!(CompileError::InvalidShape {
            keyword: keyword.to_owned(),
            reason: format!("number {} is out of decodable range", number),
        }),
    }
}

fn uint_bound(keyword: &str, raw: &Value) -> Result<u64, Error> {
    match numeric_bound(keyword, raw)?.to_u64() {
        Some(bound) => Ok(bound),
        None => bail!(CompileError::InvalidShape {
            keyword: keyword.to_owned(),
            reason: "expected a non-negative integer".to_owned(),
        }),
    }
}

fn bail_shape<T>(keyword: &str, expected: &str, got: &Value) -> Result<T, Error> {
    bail!(CompileError::InvalidShape {
        keyword: keyword.to_owned(),
        reason: format!("expected {}, got {}", expected, shape_of(got)),
    })
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn location_of(base: Option<&Url>, pointer: &str) -> String {
    match base {
        Some(base) => format!("{}#{}", base, pointer),
        None => format!("#{}", pointer),
    }
}

fn link_parents(node: &Arc<Schema>) {
    let _ = node.this.set(Arc::downgrade(node));
    for child in node.subschemas() {
        let _ = child.parent.set(Arc::downgrade(node));
        link_parents(child);
    }
}

/// Indexes `$anchor` and `$dynamicAnchor` under the nearest enclosing node
/// that establishes a base URI.
fn index_anchors(root: &Arc<Schema>) {
    fn walk(node: &Arc<Schema>) {
        if node.is_base() {
            let mut anchors = HashMap::new();
            let mut dynamic = HashMap::new();
            collect(node, &mut anchors, &mut dynamic, true);
            let _ = node.anchors.set(anchors);
            let _ = node.dynamic_anchors.set(dynamic);
        }
        for child in node.subschemas() {
            walk(child);
        }
    }

    fn collect(
        node: &Arc<Schema>,
        anchors: &mut HashMap<String, Weak<Schema>>,
        dynamic: &mut HashMap<String, Weak<Schema>>,
        at_owner: bool,
    ) {
        if !at_owner && node.id.is_some() {
            // A nested `$id` starts its own resource; its anchors belong to
            // its own index.
            return;
        }
        if let Some(name) = &node.anchor {
            anchors.insert(name.clone(), Arc::downgrade(node));
        }
        if let Some(name) = &node.dynamic_anchor {
            dynamic.insert(name.clone(), Arc::downgrade(node));
        }
        for child in node.subschemas() {
            collect(child, anchors, dynamic, false);
        }
    }

    walk(root);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    fn compile(value: Value) -> Arc<Schema> {
        Compiler::new().compile_value(value).expect("schema should compile")
    }

    #[test]
    fn type_names_parse() {
        assert_eq!(InstanceType::parse("integer"), Some(InstanceType::Integer));
        assert_eq!(InstanceType::parse("float"), None);
    }

    #[test]
    fn boolean_schemas_compile() {
        let schema = compile(json!(true));
        assert_eq!(schema.boolean, Some(true));
    }

    #[test]
    fn base_uri_inherits_and_resets() {
        let schema = compile(json!({
            "$id": "http://example.com/root.json",
            "properties": {
                "a": {"type": "string"},
                "b": {"$id": "sub/nested.json", "type": "number"}
            }
        }));

        assert_eq!(schema.id().unwrap().as_str(), "http://example.com/root.json");

        let a = &schema.properties.as_ref().unwrap()["a"];
        assert_eq!(a.location(), "http://example.com/root.json#/properties/a");

        let b = &schema.properties.as_ref().unwrap()["b"];
        assert_eq!(b.id().unwrap().as_str(), "http://example.com/sub/nested.json");
        assert_eq!(b.location(), "http://example.com/sub/nested.json#");
    }

    #[test]
    fn anchors_index_to_nearest_base() {
        let schema = compile(json!({
            "$id": "http://example.com/anchored.json",
            "$defs": {
                "named": {"$anchor": "here", "type": "string"},
                "moving": {"$dynamicAnchor": "target", "type": "number"}
            }
        }));

        let anchors = schema.anchor_index().unwrap();
        let here = anchors["here"].upgrade().unwrap();
        assert_eq!(here.types, Some(vec![InstanceType::String]));

        let dynamic = schema.dynamic_anchor_index().unwrap();
        assert!(dynamic.contains_key("target"));
    }

    #[test]
    fn parents_link_outward() {
        let schema = compile(json!({
            "items": {"properties": {"deep": {}}}
        }));

        let items = schema.items.as_ref().unwrap();
        let deep = &items.properties.as_ref().unwrap()["deep"];
        let back = deep.parent().unwrap();
        assert_eq!(back.location(), items.location());
        assert_eq!(schema.document_root().location(), deep.document_root().location());
    }

    #[test]
    fn malformed_keywords_fail_shape_checks() {
        let compiler = Compiler::new();
        assert!(compiler.compile_value(json!({"type": "float"})).is_err());
        assert!(compiler.compile_value(json!({"minLength": -1})).is_err());
        assert!(compiler.compile_value(json!({"required": [1]})).is_err());
        assert!(compiler.compile_value(json!({"pattern": "["})).is_err());
        assert!(compiler.compile_value(json!({"properties": []})).is_err());
    }

    #[test]
    fn unknown_keywords_are_retained() {
        let schema = compile(json!({"title": "a title", "x-vendor": 7}));
        assert_eq!(schema.extra["title"], json!("a title"));
        assert_eq!(schema.extra["x-vendor"], json!(7));
    }
}
