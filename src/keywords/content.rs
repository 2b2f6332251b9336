//! String-encoded content: `contentEncoding`, `contentMediaType` and
//! `contentSchema`.
//!
//! These keywords are annotations by default, per the draft. When the
//! compiler opts in through `set_assert_content(true)` they assert:
//! undecodable base64, unparseable JSON and `contentSchema` mismatches
//! become errors. Encodings and media types the engine does not understand
//! always stay annotations.

use crate::schema::Schema;
use crate::validator::{EvaluationError, EvaluationResult};
use crate::vm::{self, DynamicScope};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

pub(crate) fn eval_content(
    schema: &Schema,
    instance: &Value,
    scope: &mut DynamicScope,
) -> (Option<EvaluationResult>, Vec<EvaluationError>) {
    let Some(text) = instance.as_str() else {
        return (None, Vec::new());
    };
    let asserts = schema
        .compiler
        .upgrade()
        .map_or(false, |shared| shared.asserts_content());
    if !asserts {
        return (None, Vec::new());
    }

    let mut errors = Vec::new();

    let bytes: Vec<u8> = match schema.content_encoding.as_deref() {
        Some("base64") => match STANDARD.decode(text) {
            Ok(bytes) => bytes,
            Err(_) => {
                errors.push(
                    EvaluationError::new(
                        "contentEncoding",
                        "content_encoding_mismatch",
                        "String is not valid {encoding}",
                    )
                    .with_param("encoding", json!("base64")),
                );
                return (None, errors);
            }
        },
        Some(_) => return (None, errors),
        None => text.as_bytes().to_vec(),
    };

    let decoded = match schema.content_media_type.as_deref() {
        Some(media) if media == "application/json" || media.ends_with("+json") => {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(decoded) => Some(decoded),
                Err(_) => {
                    errors.push(
                        EvaluationError::new(
                            "contentMediaType",
                            "content_media_type_mismatch",
                            "Content is not valid {mediaType}",
                        )
                        .with_param("mediaType", json!(media)),
                    );
                    return (None, errors);
                }
            }
        }
        _ => None,
    };

    if let (Some(content_schema), Some(decoded)) = (&schema.content_schema, decoded) {
        let (mut child, _, _) = vm::evaluate(content_schema, &decoded, scope);
        child.rebase(&["contentSchema"], &[]);
        if !child.is_valid() {
            errors.push(EvaluationError::new(
                "contentSchema",
                "content_schema_mismatch",
                "Decoded content does not match the content schema",
            ));
        }
        return (Some(child), errors);
    }

    (None, errors)
}
