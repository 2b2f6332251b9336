//! The structured outcome of evaluating an instance against a schema.
//!
//! Evaluation never fails in the Rust sense; it produces an
//! [`EvaluationResult`] tree mirroring the applicators that ran. Each node
//! records where it sits in the evaluated schema (`evaluation_path`), which
//! schema object produced it (`schema_location`), and which part of the
//! instance it judged (`instance_location`). Failed keywords contribute
//! [`EvaluationError`]s; nested schema failures appear as child results.
//!
//! Error messages are templates. The core never interpolates: a consumer
//! substitutes `{param}` placeholders from the parameter map, which keeps
//! messages translatable and machine-readable.

use crate::uri::escape_segment;
use json_pointer::JsonPointer;
use serde_json::{Map, Value};
use std::fmt;

/// A single failed keyword: a stable code plus a message template and its
/// parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationError {
    keyword: &'static str,
    code: &'static str,
    message: &'static str,
    params: Map<String, Value>,
}

impl EvaluationError {
    pub(crate) fn new(keyword: &'static str, code: &'static str, message: &'static str) -> Self {
        EvaluationError {
            keyword,
            code,
            message,
            params: Map::new(),
        }
    }

    pub(crate) fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_owned(), value);
        self
    }

    /// The keyword that rejected the instance, e.g. `"items"`.
    pub fn keyword(&self) -> &str {
        self.keyword
    }

    /// A stable machine-readable code, e.g. `"item_mismatch"`.
    pub fn code(&self) -> &str {
        self.code
    }

    /// The message template, with `{param}` placeholders left in place.
    pub fn message(&self) -> &str {
        self.message
    }

    /// Values for the template's placeholders.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}): {}", self.keyword, self.code, self.message)
    }
}

/// One node of the evaluation tree.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationResult {
    schema_location: String,
    evaluation_path: Vec<String>,
    instance_location: Vec<String>,
    errors: Vec<EvaluationError>,
    details: Vec<EvaluationResult>,
}

impl EvaluationResult {
    pub(crate) fn new(schema_location: String) -> Self {
        EvaluationResult {
            schema_location,
            evaluation_path: Vec::new(),
            instance_location: Vec::new(),
            errors: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Whether the instance satisfied this schema: no error here, and no
    /// error in any attached child result.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.details.iter().all(EvaluationResult::is_valid)
    }

    /// The absolute URI (with pointer fragment) of the schema object that
    /// produced this node.
    pub fn schema_location(&self) -> &str {
        &self.schema_location
    }

    /// Where this node sits relative to the schema the evaluation started
    /// from, as a JSON Pointer through applicator keywords.
    pub fn evaluation_path(&self) -> JsonPointer<String, Vec<String>> {
        JsonPointer::new(self.evaluation_path.clone())
    }

    /// The part of the instance this node judged, as a JSON Pointer.
    pub fn instance_location(&self) -> JsonPointer<String, Vec<String>> {
        JsonPointer::new(self.instance_location.clone())
    }

    /// Errors recorded directly on this node.
    pub fn errors(&self) -> &[EvaluationError] {
        &self.errors
    }

    /// Child results from applicator keywords.
    pub fn details(&self) -> &[EvaluationResult] {
        &self.details
    }

    /// Flattens the tree into reporting records, pre-order.
    ///
    /// With `include_details` every node is listed; without it only the
    /// nodes that carry errors survive, which is the shape most reporters
    /// want.
    pub fn to_list(&self, include_details: bool) -> Vec<OutputUnit> {
        let mut list = Vec::new();
        self.flatten_into(&mut list, include_details);
        list
    }

    fn flatten_into(&self, list: &mut Vec<OutputUnit>, include_details: bool) {
        if include_details || !self.errors.is_empty() {
            list.push(OutputUnit {
                evaluation_path: render_pointer(&self.evaluation_path),
                schema_location: self.schema_location.clone(),
                instance_location: render_pointer(&self.instance_location),
                valid: self.is_valid(),
                errors: self.errors.clone(),
            });
        }

        for detail in &self.details {
            detail.flatten_into(list, include_details);
        }
    }

    pub(crate) fn add_error(&mut self, error: EvaluationError) {
        self.errors.push(error);
    }

    pub(crate) fn add_detail(&mut self, detail: EvaluationResult) {
        self.details.push(detail);
    }

    /// Re-anchors a child subtree under the keyword that evaluated it.
    ///
    /// Child results come back with paths relative to their own evaluation
    /// root; attaching them under e.g. `properties/name` prepends those
    /// segments to the whole subtree.
    pub(crate) fn rebase(&mut self, evaluation_prefix: &[&str], instance_prefix: &[&str]) {
        self.evaluation_path
            .splice(0..0, evaluation_prefix.iter().map(|s| (*s).to_owned()));
        self.instance_location
            .splice(0..0, instance_prefix.iter().map(|s| (*s).to_owned()));

        for detail in &mut self.details {
            detail.rebase(evaluation_prefix, instance_prefix);
        }
    }
}

/// A flattened reporting record, one per surviving tree node.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputUnit {
    pub evaluation_path: String,
    pub schema_location: String,
    pub instance_location: String,
    pub valid: bool,
    pub errors: Vec<EvaluationError>,
}

fn render_pointer(segments: &[String]) -> String {
    let mut rendered = String::new();
    for segment in segments {
        rendered.push('/');
        rendered.push_str(&escape_segment(segment));
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error() -> EvaluationError {
        EvaluationError::new("type", "type_mismatch", "Value is {actual} but should be {expected}")
            .with_param("actual", json!("string"))
            .with_param("expected", json!("number"))
    }

    #[test]
    fn validity_is_recursive() {
        let mut root = EvaluationResult::new("https://example.com/s#".into());
        assert!(root.is_valid());

        let mut child = EvaluationResult::new("https://example.com/s#/properties/a".into());
        child.add_error(error());
        root.add_detail(child);
        assert!(!root.is_valid());
    }

    #[test]
    fn rebase_prefixes_whole_subtree() {
        let mut leaf = EvaluationResult::new("s#/x".into());
        leaf.add_error(error());

        let mut mid = EvaluationResult::new("s#/m".into());
        leaf.rebase(&["properties", "a"], &["a"]);
        mid.add_detail(leaf);

        mid.rebase(&["allOf", "0"], &[]);
        assert_eq!(mid.evaluation_path().to_string(), "/allOf/0");
        assert_eq!(
            mid.details()[0].evaluation_path().to_string(),
            "/allOf/0/properties/a"
        );
        assert_eq!(mid.details()[0].instance_location().to_string(), "/a");
    }

    #[test]
    fn to_list_keeps_only_error_nodes_by_default() {
        let mut root = EvaluationResult::new("s#".into());
        let clean = EvaluationResult::new("s#/properties/ok".into());
        let mut bad = EvaluationResult::new("s#/properties/bad".into());
        bad.add_error(error());
        bad.rebase(&["properties", "bad"], &["bad"]);
        root.add_detail(clean);
        root.add_detail(bad);

        let errors_only = root.to_list(false);
        assert_eq!(errors_only.len(), 1);
        assert_eq!(errors_only[0].instance_location, "/bad");
        assert!(!errors_only[0].valid);

        assert_eq!(root.to_list(true).len(), 3);
    }

    #[test]
    fn pointer_rendering_escapes() {
        let mut node = EvaluationResult::new("s#".into());
        node.rebase(&["properties", "a/b"], &["a/b"]);
        assert_eq!(node.to_list(true)[0].instance_location, "/a~1b");
    }

    #[test]
    fn error_templates_stay_uninterpolated() {
        let err = error();
        assert_eq!(err.message(), "Value is {actual} but should be {expected}");
        assert_eq!(err.params()["actual"], json!("string"));
        assert_eq!(err.code(), "type_mismatch");
    }
}
