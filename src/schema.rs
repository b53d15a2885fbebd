//! Schema model
//!
//! The parsed, in-memory form of the schema document: one `Spec` per
//! top-level type (newtype, record, or sum), each holding `TypeRef` operand
//! slots. The model is immutable after parsing except for the cycle-breaking
//! pass, which is the sole mutator of `is_boxed` and `is_sized`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CodegenConfig;

/// Reserved leaf names that never need a top-level spec
pub const PRIMITIVES: &[&str] = &["u8", "char", "bool", "usize", "str", "String"];

/// The sole unsized primitive leaf
pub const UNSIZED_PRIMITIVE: &str = "str";

/// Whether a leaf name is a built-in primitive
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

/// What a `TypeRef` points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Reference to another type by name
    Leaf(String),
    /// Unit-payload sentinel (empty sequence in a type position)
    Unit,
    /// Element type of an array slot
    Elem(Box<TypeRef>),
}

/// A decorated reference to another type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub target: Target,
    /// One-element sequence in the schema
    pub is_array: bool,
    /// Trailing `?` decorator
    pub is_optional: bool,
    /// Leading `~` decorator, or a recursion break inserted by analysis
    pub is_boxed: bool,
    /// Forced false only for the unsized string leaf
    pub is_sized: bool,
}

impl TypeRef {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            target: Target::Leaf(name.into()),
            is_array: false,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        }
    }

    pub fn unit() -> Self {
        Self {
            target: Target::Unit,
            is_array: false,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        }
    }

    pub fn array(elem: TypeRef) -> Self {
        Self {
            target: Target::Elem(Box::new(elem)),
            is_array: true,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        }
    }

    /// The leaf name at the bottom of the reference, descending through
    /// array element types. None for unit payloads.
    pub fn leaf_name(&self) -> Option<&str> {
        match &self.target {
            Target::Leaf(name) => Some(name),
            Target::Unit => None,
            Target::Elem(elem) => elem.leaf_name(),
        }
    }
}

/// A transparent wrapper (one operand) or unit marker (zero operands)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewtypeSpec {
    pub name: String,
    pub operands: Vec<TypeRef>,
}

/// A type with named fields, in schema order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    pub fields: IndexMap<String, TypeRef>,
}

/// One alternative of a sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSpec {
    pub operands: Vec<TypeRef>,
}

impl CaseSpec {
    pub fn arity(&self) -> usize {
        self.operands.len()
    }
}

/// A tagged alternative type, cases in schema order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumSpec {
    pub name: String,
    pub cases: IndexMap<String, CaseSpec>,
}

/// A parsed top-level type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spec {
    Newtype(NewtypeSpec),
    Record(RecordSpec),
    Sum(SumSpec),
}

impl Spec {
    pub fn name(&self) -> &str {
        match self {
            Spec::Newtype(s) => &s.name,
            Spec::Record(s) => &s.name,
            Spec::Sum(s) => &s.name,
        }
    }
}

/// Address of a single operand slot inside the schema.
///
/// Case-operand indices are 1-based per operand of the case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotId {
    NewtypeOperand { ty: String, index: usize },
    RecordField { ty: String, field: String },
    CaseOperand { sum: String, case: String, index: usize },
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::NewtypeOperand { ty, index } => write!(f, "{}.{}", ty, index),
            SlotId::RecordField { ty, field } => write!(f, "{}.{}", ty, field),
            SlotId::CaseOperand { sum, case, index } => {
                write!(f, "{}::{}#{}", sum, case, index)
            }
        }
    }
}

/// The parsed schema: specs in declaration order plus the config copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub specs: Vec<Spec>,
    pub config: CodegenConfig,
    /// SHA-256 of the source document
    pub bundle_hash: String,
}

impl Schema {
    /// Look up a spec by name
    pub fn get(&self, name: &str) -> Option<&Spec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    /// Every operand slot of every spec, in declaration order
    pub fn slots(&self) -> Vec<(SlotId, &TypeRef)> {
        let mut out = Vec::new();
        for spec in &self.specs {
            match spec {
                Spec::Newtype(n) => {
                    for (i, r) in n.operands.iter().enumerate() {
                        let id = SlotId::NewtypeOperand {
                            ty: n.name.clone(),
                            index: i,
                        };
                        out.push((id, r));
                    }
                }
                Spec::Record(rec) => {
                    for (field, r) in &rec.fields {
                        let id = SlotId::RecordField {
                            ty: rec.name.clone(),
                            field: field.clone(),
                        };
                        out.push((id, r));
                    }
                }
                Spec::Sum(sum) => {
                    for (case, spec) in &sum.cases {
                        for (i, r) in spec.operands.iter().enumerate() {
                            let id = SlotId::CaseOperand {
                                sum: sum.name.clone(),
                                case: case.clone(),
                                index: i + 1,
                            };
                            out.push((id, r));
                        }
                    }
                }
            }
        }
        out
    }

    /// Resolve a slot address to its `TypeRef`
    pub fn slot(&self, id: &SlotId) -> Option<&TypeRef> {
        match id {
            SlotId::NewtypeOperand { ty, index } => match self.get(ty)? {
                Spec::Newtype(n) => n.operands.get(*index),
                _ => None,
            },
            SlotId::RecordField { ty, field } => match self.get(ty)? {
                Spec::Record(r) => r.fields.get(field),
                _ => None,
            },
            SlotId::CaseOperand { sum, case, index } => match self.get(sum)? {
                Spec::Sum(s) => s.cases.get(case)?.operands.get(index - 1),
                _ => None,
            },
        }
    }

    /// Resolve a slot address for mutation (cycle breaking only)
    pub fn slot_mut(&mut self, id: &SlotId) -> Option<&mut TypeRef> {
        let spec = self.specs.iter_mut().find(|s| s.name() == id_owner(id))?;
        match (id, spec) {
            (SlotId::NewtypeOperand { index, .. }, Spec::Newtype(n)) => {
                n.operands.get_mut(*index)
            }
            (SlotId::RecordField { field, .. }, Spec::Record(r)) => r.fields.get_mut(field),
            (SlotId::CaseOperand { case, index, .. }, Spec::Sum(s)) => {
                s.cases.get_mut(case)?.operands.get_mut(index - 1)
            }
            _ => None,
        }
    }

    /// Visit every `TypeRef` in the schema mutably, including array element
    /// types, in declaration order.
    pub fn for_each_ref_mut(&mut self, f: &mut impl FnMut(&mut TypeRef)) {
        fn visit(r: &mut TypeRef, f: &mut impl FnMut(&mut TypeRef)) {
            f(r);
            if let Target::Elem(elem) = &mut r.target {
                visit(elem, f);
            }
        }
        for spec in &mut self.specs {
            match spec {
                Spec::Newtype(n) => {
                    for r in &mut n.operands {
                        visit(r, f);
                    }
                }
                Spec::Record(rec) => {
                    for r in rec.fields.values_mut() {
                        visit(r, f);
                    }
                }
                Spec::Sum(sum) => {
                    for case in sum.cases.values_mut() {
                        for r in &mut case.operands {
                            visit(r, f);
                        }
                    }
                }
            }
        }
    }
}

fn id_owner(id: &SlotId) -> &str {
    match id {
        SlotId::NewtypeOperand { ty, .. } => ty,
        SlotId::RecordField { ty, .. } => ty,
        SlotId::CaseOperand { sum, .. } => sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_name_descends_arrays() {
        let r = TypeRef::array(TypeRef::leaf("Datum"));
        assert_eq!(r.leaf_name(), Some("Datum"));
        assert_eq!(TypeRef::unit().leaf_name(), None);
    }

    #[test]
    fn test_slot_display() {
        let id = SlotId::CaseOperand {
            sum: "Datum".into(),
            case: "Pair".into(),
            index: 2,
        };
        assert_eq!(id.to_string(), "Datum::Pair#2");
        let id = SlotId::RecordField {
            ty: "Lambda".into(),
            field: "body".into(),
        };
        assert_eq!(id.to_string(), "Lambda.body");
    }
}
