//! `jsonschema` is a Rust implementation of JSON Schema draft 2020-12,
//! extended with the `@`-keywords used for loader-backed reference
//! dispatch (`@type`), inheritance merging (`@parent`) and referenced-type
//! checks (`@idTypes`).
//!
//! The crate is a two-phase engine. A [`Compiler`] ingests schema
//! documents: it resolves `$id`s and anchors, compiles regular expressions
//! once, indexes every document by its absolute URI, and resolves `$ref`
//! and `$dynamicRef` targets as far as they reach. The compiled
//! [`Schema`] then evaluates instances, producing a structured
//! [`EvaluationResult`] tree rather than a bare verdict.
//!
//! # Validating data
//!
//! ```
//! use jsonschema::Compiler;
//! use serde_json::json;
//! use failure::Error;
//!
//! fn main() -> Result<(), Error> {
//!     let compiler = Compiler::new();
//!     let schema = compiler.compile(br#"
//!         {
//!             "type": "object",
//!             "properties": {
//!                 "name": { "type": "string" },
//!                 "age": { "type": "number", "minimum": 0 }
//!             },
//!             "required": ["name"]
//!         }
//!     "#)?;
//!
//!     let good = schema.validate(&json!({"name": "John Doe", "age": 43}));
//!     assert!(good.is_valid());
//!
//!     let bad = schema.validate(&json!({"age": -1}));
//!     assert!(!bad.is_valid());
//!
//!     // Flatten the tree for reporting. Each record carries the
//!     // evaluation path, the schema location and the instance location
//!     // of one node, plus its errors.
//!     let report = bad.to_list(false);
//!     assert!(report
//!         .iter()
//!         .any(|unit| unit.errors.iter().any(|e| e.code() == "required_mismatch")));
//!     assert!(report.iter().any(|unit| unit.instance_location == "/age"));
//!
//!     Ok(())
//! }
//! ```
//!
//! Error messages are templates (`"Value is less than the minimum
//! {limit}"`) with a parameter map on the side; the core never
//! interpolates, so consumers can render, translate or match on them
//! mechanically.
//!
//! # Loaders
//!
//! References can cross documents. Registry misses are handed to a
//! [`Loader`] registered for the URI's scheme; the loader returns raw
//! bytes, the compiler compiles and indexes them, and evaluation
//! continues. The same loaders back the `@`-keywords, which fetch objects
//! by URI at evaluation time. The crate never fetches anything on its own:
//! no loader, no fetch.
//!
//! Keep the [`Compiler`] alive while validating. Schemas hold weak links
//! to it for loader access and cross-document resolution; a dropped
//! compiler turns those operations into evaluation errors.
//!
//! # Concurrency
//!
//! Compiled schemas are immutable and [`Send`] + [`Sync`]: share them
//! freely and validate from as many threads as you like. Register loaders
//! and formats before the first compile or validate; afterwards treat the
//! compiler as read-only.

mod keywords;
mod resolver;
mod uri;
mod vm;

pub mod compiler;
pub mod errors;
pub mod rational;
pub mod schema;
pub mod validator;

pub use crate::compiler::{Compiler, FormatCheck, Loader};
pub use crate::errors::CompileError;
pub use crate::rational::Rational;
pub use crate::schema::{InstanceType, Schema};
pub use crate::validator::{EvaluationError, EvaluationResult, OutputUnit};
pub use crate::vm::DynamicScope;
