//! Logic related to compiling schema documents and holding them together.
//!
//! The [`Compiler`] owns the registry that maps absolute URIs to compiled
//! document roots, the [`Loader`]s that fetch schema bytes for custom URI
//! schemes, and the format-assertion registry. Loaders and formats are
//! registered during an initialization phase; once compilation and
//! validation begin, the compiler is effectively immutable and can be
//! shared freely across threads.
//!
//! This crate does not presume how or whether you want to fetch schemas
//! over the network: a reference to a URI nobody registered a loader for
//! simply stays unresolved and surfaces as an evaluation error when first
//! traversed.

use crate::errors::CompileError;
use crate::keywords::format;
use crate::resolver;
use crate::schema::{self, Schema};
use crate::uri;
use failure::{bail, Error};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A format assertion: returns whether the string satisfies the format.
pub type FormatCheck = fn(&str) -> bool;

/// Fetches schema bytes for a URI, keyed by the URI's scheme.
///
/// Loaders are fallible and may block; they must be safe to call from
/// several validations at once and should enforce their own timeouts. The
/// returned stream is read to completion and released before evaluation
/// continues.
pub trait Loader: Send + Sync {
    fn load(&self, uri: &str) -> Result<Box<dyn Read>, Error>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Box<dyn Read>, Error> + Send + Sync,
{
    fn load(&self, uri: &str) -> Result<Box<dyn Read>, Error> {
        self(uri)
    }
}

/// State shared between a [`Compiler`] and every schema it compiled.
pub(crate) struct CompilerShared {
    registry: RwLock<HashMap<String, Arc<Schema>>>,
    loaders: RwLock<HashMap<String, Arc<dyn Loader>>>,
    formats: RwLock<HashMap<String, FormatCheck>>,
    assert_content: AtomicBool,
}

impl CompilerShared {
    /// A registry hit for an absolute, fragmentless URI.
    pub(crate) fn lookup(&self, uri: &str) -> Option<Arc<Schema>> {
        self.registry.read().unwrap().get(uri).cloned()
    }

    pub(crate) fn loader_for(&self, scheme: &str) -> Option<Arc<dyn Loader>> {
        self.loaders.read().unwrap().get(scheme).cloned()
    }

    pub(crate) fn format_check(&self, name: &str) -> Option<FormatCheck> {
        self.formats.read().unwrap().get(name).copied()
    }

    pub(crate) fn asserts_content(&self) -> bool {
        self.assert_content.load(Ordering::Relaxed)
    }

    /// Fetches the raw bytes behind a URI through the loader registered for
    /// its scheme.
    pub(crate) fn fetch(&self, target: &str) -> Result<Vec<u8>, Error> {
        let scheme = match uri::scheme_of(target) {
            Some(scheme) => scheme,
            None => bail!(CompileError::NoSuchSchema {
                uri: target.to_owned(),
            }),
        };
        let loader = match self.loader_for(&scheme) {
            Some(loader) => loader,
            None => bail!(CompileError::NoSuchSchema {
                uri: target.to_owned(),
            }),
        };

        debug!(uri = target, scheme = scheme.as_str(), "fetching through loader");
        let mut body = loader.load(target)?;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Returns the schema registered for a fragmentless URI, loading and
    /// compiling it on a registry miss.
    pub(crate) fn get_or_load(self: &Arc<Self>, target: &str) -> Result<Arc<Schema>, Error> {
        if let Some(found) = self.lookup(target) {
            return Ok(found);
        }

        let bytes = self.fetch(target)?;
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => bail!(CompileError::InvalidJson {
                reason: err.to_string(),
            }),
        };

        let root = self.compile_rooted(&value)?;
        // The document may declare an `$id` that differs from the URI it
        // was requested under; index it under the requested URI as well.
        self.registry
            .write()
            .unwrap()
            .entry(target.to_owned())
            .or_insert_with(|| Arc::clone(&root));
        Ok(root)
    }

    /// Builds a document tree, registers every `$id` it declares, then runs
    /// the reference-resolution pass.
    ///
    /// Registration happens before resolution so that mutually-referring
    /// documents can find each other mid-compile.
    pub(crate) fn compile_rooted(self: &Arc<Self>, value: &Value) -> Result<Arc<Schema>, Error> {
        let root = schema::compile_document(value, &Arc::downgrade(self))?;
        self.register_tree(&root)?;
        resolver::resolve_references(&root)?;
        Ok(root)
    }

    fn register_tree(&self, root: &Arc<Schema>) -> Result<(), Error> {
        let mut identified = Vec::new();
        collect_identified(root, &mut identified);

        let mut registry = self.registry.write().unwrap();
        for node in identified {
            let id = node.id().expect("collected nodes declare $id");
            match registry.get(id.as_str()) {
                Some(existing) if Arc::ptr_eq(existing, &node) => {}
                Some(_) => bail!(CompileError::DuplicateId { id: id.clone() }),
                None => {
                    debug!(id = id.as_str(), "registering schema");
                    registry.insert(id.as_str().to_owned(), Arc::clone(&node));
                }
            }
        }
        Ok(())
    }
}

fn collect_identified(node: &Arc<Schema>, out: &mut Vec<Arc<Schema>>) {
    if node.id().is_some() {
        out.push(Arc::clone(node));
    }
    for child in node.subschemas() {
        collect_identified(child, out);
    }
}

/// Compiles schema documents and registers the loaders they resolve
/// through.
pub struct Compiler {
    shared: Arc<CompilerShared>,
}

impl Compiler {
    /// Constructs a compiler with the stock format registry and no loaders.
    pub fn new() -> Compiler {
        Compiler {
            shared: Arc::new(CompilerShared {
                registry: RwLock::new(HashMap::new()),
                loaders: RwLock::new(HashMap::new()),
                formats: RwLock::new(format::stock_registry()),
                assert_content: AtomicBool::new(false),
            }),
        }
    }

    /// Adds or replaces the loader for a URI scheme.
    ///
    /// Loaders let references reach documents the registry has not seen
    /// yet, and back the `@`-keywords that fetch objects by URI during
    /// evaluation. How fetching really works is up to you; it is strongly
    /// recommended that you never simply execute arbitrary schemas from
    /// the network.
    ///
    /// ```
    /// use jsonschema::Compiler;
    /// use failure::Error;
    /// use serde_json::json;
    /// use std::io::{Cursor, Read};
    ///
    /// fn main() -> Result<(), Error> {
    ///     let compiler = Compiler::new();
    ///     compiler.register_loader("demo", |uri: &str| -> Result<Box<dyn Read>, Error> {
    ///         if uri != "demo://schemas/user" {
    ///             return Err(failure::format_err!("unexpected uri: {}", uri));
    ///         }
    ///         let body = json!({
    ///             "$id": "demo://schemas/user",
    ///             "type": "object",
    ///             "required": ["name"]
    ///         })
    ///         .to_string();
    ///         Ok(Box::new(Cursor::new(body.into_bytes())))
    ///     });
    ///
    ///     let schema = compiler.compile(br#"{"$ref": "demo://schemas/user"}"#)?;
    ///     assert!(schema.validate(&json!({"name": "ada"})).is_valid());
    ///     assert!(!schema.validate(&json!({})).is_valid());
    ///     Ok(())
    /// }
    /// ```
    pub fn register_loader(&self, scheme: &str, loader: impl Loader + 'static) {
        self.shared
            .loaders
            .write()
            .unwrap()
            .insert(scheme.to_owned(), Arc::new(loader));
    }

    /// Adds or replaces a format assertion.
    pub fn register_format(&self, name: &str, check: FormatCheck) {
        self.shared
            .formats
            .write()
            .unwrap()
            .insert(name.to_owned(), check);
    }

    /// Opts the `content*` keywords into asserting instead of annotating.
    pub fn set_assert_content(&self, assert: bool) {
        self.shared.assert_content.store(assert, Ordering::Relaxed);
    }

    /// Compiles a schema document from raw bytes.
    pub fn compile(&self, bytes: &[u8]) -> Result<Arc<Schema>, Error> {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(err) => bail!(CompileError::InvalidJson {
                reason: err.to_string(),
            }),
        };
        self.compile_value(value)
    }

    /// Compiles a schema document from an already-parsed value.
    pub fn compile_value(&self, value: Value) -> Result<Arc<Schema>, Error> {
        debug!("compiling schema document");
        self.shared.compile_rooted(&value)
    }

    /// Looks a schema up by URI, with an optional anchor or pointer
    /// fragment, loading it if a loader can produce it.
    pub fn get_schema(&self, target: &str) -> Result<Arc<Schema>, Error> {
        let (document, fragment) = uri::split_fragment(target);
        let root = self.shared.get_or_load(document)?;
        match fragment {
            None | Some("") => Ok(root),
            Some(fragment) => resolver::resolve_fragment(&root, fragment),
        }
    }
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}
