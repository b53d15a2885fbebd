//! Schema parsing
//!
//! Shape-directed decoding of the raw YAML tree into the typed model. The
//! kind of each node is inferred from its shape, never from a tag: a closed
//! discriminator is computed once per node and every dispatch arm enumerates
//! the shapes it accepts, so invalid mixtures are caught here.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_yaml::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::CodegenConfig;
use crate::error::{Result, SchemaError};
use crate::schema::{CaseSpec, NewtypeSpec, RecordSpec, Schema, Spec, SumSpec, Target, TypeRef};

/// Structural kind of a raw schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeShape {
    Scalar,
    Sequence,
    Mapping,
    Null,
    Other,
}

fn shape_of(value: &Value) -> NodeShape {
    match value {
        Value::String(_) => NodeShape::Scalar,
        Value::Sequence(_) => NodeShape::Sequence,
        Value::Mapping(_) => NodeShape::Mapping,
        Value::Null => NodeShape::Null,
        _ => NodeShape::Other,
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

fn unsupported(position: impl Into<String>, value: &Value) -> SchemaError {
    SchemaError::UnsupportedShape {
        position: position.into(),
        shape: describe(value),
    }
}

/// Read and parse a schema file
pub fn load_schema(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path)?;
    parse_document(&text)
}

/// Parse a schema document.
///
/// Top-level keys: `models` (required mapping of type name to raw shape) and
/// `config` (optional). Unknown keys are warned about and ignored.
pub fn parse_document(text: &str) -> Result<Schema> {
    let doc: Value = serde_yaml::from_str(text)?;
    let root = doc
        .as_mapping()
        .ok_or_else(|| unsupported("document root", &doc))?;

    let mut models = None;
    let mut config = CodegenConfig::default();
    for (key, value) in root {
        match key.as_str() {
            Some("models") => models = Some(value),
            Some("config") => config = CodegenConfig::from_value(value)?,
            Some(other) => warn!(key = other, "ignoring unknown top-level key"),
            None => return Err(unsupported("document root key", key)),
        }
    }

    let models = models.ok_or(SchemaError::MissingKey("models"))?;
    let models = models
        .as_mapping()
        .ok_or_else(|| unsupported("models", models))?;

    let mut specs = Vec::with_capacity(models.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(models.len());
    for (key, node) in models {
        let name = key
            .as_str()
            .ok_or_else(|| unsupported("models key", key))?;
        if !seen.insert(name.to_string()) {
            return Err(SchemaError::DuplicateName {
                kind: "type",
                name: name.to_string(),
            });
        }
        specs.push(parse_spec(name, node)?);
    }

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let bundle_hash = format!("{:x}", hasher.finalize());

    Ok(Schema {
        specs,
        config,
        bundle_hash,
    })
}

/// One top-level entry: the node's shape selects the spec kind
fn parse_spec(name: &str, node: &Value) -> Result<Spec> {
    let position = format!("models.{}", name);
    match shape_of(node) {
        NodeShape::Scalar => Ok(Spec::Newtype(NewtypeSpec {
            name: name.to_string(),
            operands: vec![parse_scalar_ref(node.as_str().unwrap())?],
        })),
        NodeShape::Sequence => {
            let seq = node.as_sequence().unwrap();
            match seq.len() {
                0 => Ok(Spec::Newtype(NewtypeSpec {
                    name: name.to_string(),
                    operands: Vec::new(),
                })),
                // a lone case mapping is a one-alternative sum, anything else
                // is the element type of an array newtype
                1 if shape_of(&seq[0]) != NodeShape::Mapping => {
                    Ok(Spec::Newtype(NewtypeSpec {
                        name: name.to_string(),
                        operands: vec![parse_type(node, &position)?],
                    }))
                }
                _ => Ok(Spec::Sum(SumSpec {
                    name: name.to_string(),
                    cases: parse_cases(name, seq)?,
                })),
            }
        }
        NodeShape::Mapping => Ok(Spec::Record(RecordSpec {
            name: name.to_string(),
            fields: parse_fields(name, node.as_mapping().unwrap())?,
        })),
        NodeShape::Null | NodeShape::Other => Err(unsupported(position, node)),
    }
}

/// Decorator grammar: `ref := "~"? name "?"?`
fn parse_scalar_ref(raw: &str) -> Result<TypeRef> {
    let mut rest = raw;
    let is_boxed = rest.starts_with('~');
    if is_boxed {
        rest = &rest[1..];
    }
    let is_optional = rest.ends_with('?');
    if is_optional {
        rest = &rest[..rest.len() - 1];
    }
    if !is_identifier(rest) {
        return Err(SchemaError::InvalidDecorator(raw.to_string()));
    }
    Ok(TypeRef {
        target: Target::Leaf(rest.to_string()),
        is_array: false,
        is_optional,
        is_boxed,
        is_sized: true,
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A type reference in operand or field position.
///
/// Modifiers written on the contained scalar of a one-element sequence are
/// hoisted onto the array slot, so `["~T?"]` reads as an optional boxed
/// array of `T`.
fn parse_type(node: &Value, position: &str) -> Result<TypeRef> {
    match shape_of(node) {
        NodeShape::Scalar => parse_scalar_ref(node.as_str().unwrap()),
        NodeShape::Sequence => {
            let seq = node.as_sequence().unwrap();
            match seq.len() {
                0 => Ok(TypeRef::unit()),
                1 => {
                    let mut elem = parse_type(&seq[0], position)?;
                    let is_optional = std::mem::take(&mut elem.is_optional);
                    let is_boxed = std::mem::take(&mut elem.is_boxed);
                    Ok(TypeRef {
                        target: Target::Elem(Box::new(elem)),
                        is_array: true,
                        is_optional,
                        is_boxed,
                        is_sized: true,
                    })
                }
                _ => Err(SchemaError::TupleInDisallowedPosition {
                    position: position.to_string(),
                }),
            }
        }
        NodeShape::Mapping | NodeShape::Null | NodeShape::Other => {
            Err(unsupported(position, node))
        }
    }
}

/// Sum alternatives: a scalar is a self-named case carrying its own type; a
/// single-entry mapping names the case and describes its payload.
fn parse_cases(sum: &str, seq: &[Value]) -> Result<indexmap::IndexMap<String, CaseSpec>> {
    let mut cases = indexmap::IndexMap::with_capacity(seq.len());
    for (i, alt) in seq.iter().enumerate() {
        let position = format!("{}[{}]", sum, i);
        let (case_name, case) = match shape_of(alt) {
            NodeShape::Scalar => {
                let operand = parse_scalar_ref(alt.as_str().unwrap())?;
                let name = operand
                    .leaf_name()
                    .expect("scalar refs always have a leaf")
                    .to_string();
                (
                    name,
                    CaseSpec {
                        operands: vec![operand],
                    },
                )
            }
            NodeShape::Mapping => {
                let mapping = alt.as_mapping().unwrap();
                if mapping.len() != 1 {
                    return Err(unsupported(position, alt));
                }
                let (key, payload) = mapping.iter().next().unwrap();
                let name = key
                    .as_str()
                    .ok_or_else(|| unsupported(position.as_str(), key))?
                    .to_string();
                let operands = parse_case_payload(sum, &name, payload)?;
                (name, CaseSpec { operands })
            }
            _ => return Err(unsupported(position, alt)),
        };
        if cases.insert(case_name.clone(), case).is_some() {
            return Err(SchemaError::DuplicateCase {
                sum: sum.to_string(),
                case: case_name,
            });
        }
    }
    Ok(cases)
}

/// Case payload: scalar = one operand; empty list = unit case; one-element
/// list = one array operand; longer list = one operand per element.
fn parse_case_payload(sum: &str, case: &str, payload: &Value) -> Result<Vec<TypeRef>> {
    let position = format!("{}::{}", sum, case);
    match shape_of(payload) {
        NodeShape::Scalar => Ok(vec![parse_scalar_ref(payload.as_str().unwrap())?]),
        NodeShape::Sequence => {
            let seq = payload.as_sequence().unwrap();
            match seq.len() {
                0 => Ok(Vec::new()),
                1 => Ok(vec![parse_type(payload, &position)?]),
                _ => seq
                    .iter()
                    .enumerate()
                    .map(|(i, elem)| parse_type(elem, &format!("{}#{}", position, i + 1)))
                    .collect(),
            }
        }
        _ => Err(unsupported(position, payload)),
    }
}

/// Record fields: each value is a type reference; tuples are not allowed
/// in field position.
fn parse_fields(
    record: &str,
    mapping: &serde_yaml::Mapping,
) -> Result<indexmap::IndexMap<String, TypeRef>> {
    let mut fields = indexmap::IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let field = key
            .as_str()
            .ok_or_else(|| unsupported(format!("{} field name", record), key))?
            .to_string();
        let position = format!("{}.{}", record, field);
        let r = parse_type(value, &position)?;
        if fields.insert(field.clone(), r).is_some() {
            return Err(SchemaError::DuplicateName {
                kind: "field",
                name: format!("{}.{}", record, field),
            });
        }
    }
    Ok(fields)
}
