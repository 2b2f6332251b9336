//! Resolution of `$ref` and `$dynamicRef` targets.
//!
//! References resolve in three shapes: `#` for the containing document's
//! root, `#...` for an in-document anchor or JSON Pointer, and everything
//! else as a URI resolved against the context's base and looked up in the
//! compiler registry (possibly pulling a document through a loader).
//!
//! The pointer walk is schema-aware rather than raw object traversal: a
//! segment's meaning depends on its predecessor, so `/properties/foo` keys
//! into the `properties` map, `/prefixItems/1` indexes the prefix list,
//! `/$defs/bar` keys into `$defs`, and anything after `items` lands on the
//! single `items` subschema.

use crate::errors::CompileError;
use crate::schema::Schema;
use crate::uri::{resolve_against, split_fragment, unescape_segment};
use failure::{bail, Error};
use std::sync::Arc;
use tracing::trace;

/// Resolves a reference from the context of a schema node.
pub(crate) fn resolve_ref(context: &Arc<Schema>, reference: &str) -> Result<Arc<Schema>, Error> {
    if reference == "#" {
        return Ok(context.document_root());
    }

    if let Some(fragment) = reference.strip_prefix('#') {
        if fragment.starts_with('/') {
            return resolve_pointer(&context.document_root(), fragment);
        }
        return resolve_anchor(context, fragment);
    }

    let target = resolve_against(context.base_uri.as_ref(), reference)?;
    resolve_absolute(context, target.as_str())
}

/// Resolves a URI fragment (anchor or pointer, no leading `#`) inside one
/// document.
pub(crate) fn resolve_fragment(root: &Arc<Schema>, fragment: &str) -> Result<Arc<Schema>, Error> {
    if fragment.starts_with('/') {
        resolve_pointer(root, fragment)
    } else {
        match anchor_hit(root, fragment) {
            Some(found) => Ok(found),
            None => bail!(CompileError::NoSuchAnchor {
                anchor: fragment.to_owned(),
            }),
        }
    }
}

/// Searches for an anchor outward: the nearest enclosing base-establishing
/// schema's index first, then each outer scope in turn.
fn resolve_anchor(context: &Arc<Schema>, name: &str) -> Result<Arc<Schema>, Error> {
    let mut current = Some(Arc::clone(context));
    while let Some(schema) = current {
        if let Some(found) = anchor_hit(&schema, name) {
            return Ok(found);
        }
        current = schema.parent();
    }

    bail!(CompileError::NoSuchAnchor {
        anchor: name.to_owned(),
    })
}

fn anchor_hit(schema: &Arc<Schema>, name: &str) -> Option<Arc<Schema>> {
    if let Some(index) = schema.anchor_index() {
        if let Some(found) = index.get(name) {
            return found.upgrade();
        }
    }
    if let Some(index) = schema.dynamic_anchor_index() {
        if let Some(found) = index.get(name) {
            return found.upgrade();
        }
    }
    None
}

fn resolve_absolute(context: &Arc<Schema>, target: &str) -> Result<Arc<Schema>, Error> {
    let compiler = match context.compiler.upgrade() {
        Some(compiler) => compiler,
        None => bail!(CompileError::CompilerGone),
    };

    let (document, fragment) = split_fragment(target);
    let root = compiler.get_or_load(document)?;
    match fragment {
        None | Some("") => Ok(root),
        Some(fragment) => resolve_fragment(&root, fragment),
    }
}

/// Walks a JSON Pointer through the compiled tree, schema-aware.
pub(crate) fn resolve_pointer(root: &Arc<Schema>, pointer: &str) -> Result<Arc<Schema>, Error> {
    if pointer.is_empty() || pointer == "/" {
        return Ok(Arc::clone(root));
    }

    let segments: Vec<&str> = pointer.trim_start_matches('/').split('/').collect();
    let mut current = Arc::clone(root);
    let mut previous = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let decoded = unescape_segment(segment);
        match step(&current, &decoded, &previous) {
            Some(next) => current = next,
            None if index == segments.len() - 1 => {
                bail!(CompileError::UnresolvedPointer {
                    pointer: pointer.to_owned(),
                })
            }
            None => {}
        }
        previous = decoded;
    }

    Ok(current)
}

/// A single pointer step; the predecessor segment decides what the current
/// segment means.
fn step(current: &Arc<Schema>, segment: &str, previous: &str) -> Option<Arc<Schema>> {
    match previous {
        "properties" => current.properties.as_ref()?.get(segment).cloned(),
        "prefixItems" => {
            let index: usize = segment.parse().ok()?;
            current.prefix_items.as_ref()?.get(index).cloned()
        }
        "$defs" => current.defs.as_ref()?.get(segment).cloned(),
        "items" => current.items.clone(),
        _ => None,
    }
}

/// The compile-time resolution pass.
///
/// Local (fragment) references that fail to resolve are compile errors;
/// references that would cross a loader boundary are allowed to stay
/// unresolved until evaluation first traverses them.
pub(crate) fn resolve_references(root: &Arc<Schema>) -> Result<(), Error> {
    if let Some(reference) = &root.reference {
        match resolve_ref(root, reference) {
            Ok(target) => {
                let _ = root.resolved_ref.set(Arc::downgrade(&target));
            }
            Err(err) => {
                if reference.starts_with('#') {
                    return Err(err);
                }
                trace!(reference = reference.as_str(), "deferring unresolved reference");
            }
        }
    }

    if let Some(reference) = &root.dynamic_reference {
        match resolve_ref(root, reference) {
            Ok(target) => {
                let _ = root.resolved_dynamic_ref.set(Arc::downgrade(&target));
            }
            Err(err) => {
                if reference.starts_with('#') {
                    return Err(err);
                }
                trace!(
                    reference = reference.as_str(),
                    "deferring unresolved dynamic reference"
                );
            }
        }
    }

    for child in root.subschemas() {
        resolve_references(child)?;
    }
    Ok(())
}
