//! astgen
//!
//! Turns a declarative YAML description of an algebraic-data-type schema
//! (the abstract syntax tree of a language) into a Rust source module: type
//! definitions, conversion impls between types connected by sum-case
//! inclusion, tag-to-payload reflection tables for sums, and GC trace impls.
//!
//! ## Pipeline
//!
//! ```text
//! ast.yaml
//!   └─ parser     shape-directed decoding into specs
//!   └─ graph      type/slot reference graph
//!   └─ analysis   SCC enumeration, recursion breaking, unsized fixup
//!   └─ paths      all-pairs shortest cast chains
//!   └─ codegen    Rust source projection to stdout
//! ```
//!
//! The schema is immutable once parsed; the cycle breaker is the sole
//! mutator of `is_boxed`/`is_sized`, and the emitter never mutates.

pub mod codegen;
pub mod config;
pub mod error;
pub mod graph;
pub mod parser;
pub mod schema;

pub use codegen::{generate, Generator};
pub use config::CodegenConfig;
pub use error::{Result, SchemaError};
pub use parser::{load_schema, parse_document};
pub use schema::{CaseSpec, NewtypeSpec, RecordSpec, Schema, SlotId, Spec, SumSpec, Target, TypeRef};
