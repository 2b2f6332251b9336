//! An error type for schema compilation.
//!
//! Errors that arise while *evaluating* an instance are not Rust errors; they
//! are ordinary data carried inside an
//! [`EvaluationResult`](../validator/struct.EvaluationResult.html). This
//! module only covers the failures that abort
//! [`Compiler::compile`](../compiler/struct.Compiler.html#method.compile).

use failure::Fail;
use url::Url;

/// An enum of possible errors that can emerge from compiling a schema.
#[derive(Debug, Fail, PartialEq)]
pub enum CompileError {
    /// The schema document was not syntactically valid JSON.
    #[fail(display = "schema document is not valid JSON: {}", reason)]
    InvalidJson { reason: String },

    /// A keyword held a value of the wrong shape.
    ///
    /// Draft 2020-12 constrains the value of every keyword it defines: `type`
    /// must be a type name or an array of type names, `properties` must be an
    /// object whose values are schemas, numeric bounds must be numbers, and
    /// so on. A document violating those constraints does not compile.
    #[fail(display = "invalid value for keyword {:?}: {}", keyword, reason)]
    InvalidShape { keyword: String, reason: String },

    /// An `$id` (or a reference) was not a valid URI.
    #[fail(display = "invalid URI: {}", uri)]
    InvalidUri { uri: String },

    /// Two schemas in the same registry claimed the same absolute `$id`.
    #[fail(display = "duplicate schema id: {}", id)]
    DuplicateId { id: Url },

    /// A local JSON-Pointer reference did not lead to a schema.
    ///
    /// References with a `#/`-style fragment are resolved while compiling the
    /// document that contains them. A pointer whose segments cannot be walked
    /// through the schema tree is a compile error, not a deferred one.
    #[fail(display = "unresolvable JSON pointer: {}", pointer)]
    UnresolvedPointer { pointer: String },

    /// A plain-name fragment did not match any `$anchor` or `$dynamicAnchor`
    /// in scope.
    #[fail(display = "no anchor named {:?} in scope", anchor)]
    NoSuchAnchor { anchor: String },

    /// A URI was looked up in the registry, no loader could produce it, and
    /// so no schema with that URI exists.
    #[fail(display = "no schema with id {:?} found", uri)]
    NoSuchSchema { uri: String },

    /// A schema attempted a base-relative reference, but no enclosing schema
    /// establishes a base URI.
    ///
    /// References are resolved against the base URI established by the
    /// nearest `$id`. A document without any `$id` can only use fragment
    /// references, absolute references, or the instance-driven `@type`
    /// dispatch that is deferred to evaluation time.
    #[fail(
        display = "relative reference {:?} in a schema without a base URI",
        reference
    )]
    RelativeRefWithoutBase { reference: String },

    /// The compiler behind a schema handle was dropped.
    #[fail(display = "the compiler owning this schema no longer exists")]
    CompilerGone,
}
