//! Error types for schema parsing and analysis

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Fatal errors raised by the pipeline
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unsupported shape at {position}: {shape}")]
    UnsupportedShape { position: String, shape: String },

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("duplicate case in sum {sum}: {case}")]
    DuplicateCase { sum: String, case: String },

    #[error("invalid decorator in type reference: {0:?}")]
    InvalidDecorator(String),

    #[error("tuple not allowed at {position}")]
    TupleInDisallowedPosition { position: String },

    #[error("missing required top-level key: {0}")]
    MissingKey(&'static str),

    #[error("unknown type reference {name} (from {referrer})")]
    UnknownReference { name: String, referrer: String },

    #[error("cycle through {0} cannot be broken: no boxable operand slot")]
    UnbreakableCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
