//! Rust emitter
//!
//! Projects the analyzed schema to source text: one declaration per spec, a
//! reflection table per sum, a trace impl per spec, and one conversion impl
//! per inferred cast path. Receives only the frozen model and never reads
//! the raw schema tree.

use crate::graph::{CastHop, CastPath};
use crate::schema::{CaseSpec, Schema, Spec, SumSpec, Target, TypeRef};

/// Emit the complete generated module
pub fn emit_module(schema: &Schema, paths: &[CastPath]) -> String {
    let mut out = String::new();

    emit_preamble(&mut out);

    for spec in &schema.specs {
        emit_decl(&mut out, spec, schema);
        if let Spec::Sum(sum) = spec {
            emit_tagged_union(&mut out, sum);
        }
        emit_trace(&mut out, spec);
    }

    for path in paths {
        emit_injection(&mut out, path);
        if !path.lossless {
            emit_extraction(&mut out, path, schema);
        }
    }

    emit_size_fixture(&mut out, schema);

    out
}

fn emit_preamble(out: &mut String) {
    out.push_str("//! Generated from the AST schema - DO NOT EDIT.\n");
    out.push_str("//! Regenerate by running `astgen` against the schema file.\n\n");
    out.push_str("use super::gc::{Marker, TaggedUnion, Trace};\n\n");
    out.push_str("/// Failed downcast between two generated node types\n");
    out.push_str("#[derive(Debug, Clone, PartialEq, Eq)]\n");
    out.push_str("pub struct CastError {\n");
    out.push_str("    pub from: &'static str,\n");
    out.push_str("    pub to: &'static str,\n");
    out.push_str("}\n\n");
    out.push_str("impl std::fmt::Display for CastError {\n");
    out.push_str("    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {\n");
    out.push_str("        write!(f, \"cannot cast {} into {}\", self.from, self.to)\n");
    out.push_str("    }\n");
    out.push_str("}\n\n");
    out.push_str("impl std::error::Error for CastError {}\n\n");
}

// =============================================================================
// Type Rendering
// =============================================================================

/// Render a reference as Rust surface syntax.
///
/// Nesting order is `Option< Box< Vec<elem> > >`: the optional wrapper is
/// outermost, the box sits on the slot, arrays render their element type
/// recursively.
fn render_type(r: &TypeRef) -> String {
    let base = match &r.target {
        Target::Leaf(name) => name.clone(),
        Target::Unit => "()".to_string(),
        Target::Elem(elem) => format!("Vec<{}>", render_type(elem)),
    };
    let boxed = if r.is_boxed {
        format!("Box<{}>", base)
    } else {
        base
    };
    if r.is_optional {
        format!("Option<{}>", boxed)
    } else {
        boxed
    }
}

/// The payload's identity for the reflection table: boxes are transparent
/// for sized payloads, while the unsized string keeps its sized wrapper.
fn payload_type_name(r: &TypeRef) -> String {
    if r.is_sized {
        let mut unboxed = r.clone();
        unboxed.is_boxed = false;
        render_type(&unboxed)
    } else {
        render_type(r)
    }
}

/// Conversion target in impl signatures: the boxed form for the unsized
/// string, the plain type name otherwise.
fn target_type(path: &CastPath) -> String {
    if path.unsized_terminal {
        "Box<str>".to_string()
    } else {
        path.to.clone()
    }
}

fn vis(schema: &Schema) -> String {
    let v = schema.config.visibility.trim();
    if v.is_empty() {
        String::new()
    } else {
        format!("{} ", v)
    }
}

// =============================================================================
// Declarations
// =============================================================================

fn emit_decl(out: &mut String, spec: &Spec, schema: &Schema) {
    if let Some(attr) = schema.config.derive_attr() {
        out.push_str(&attr);
        out.push('\n');
    }
    let vis = vis(schema);
    match spec {
        Spec::Newtype(n) => match n.operands.first() {
            None => out.push_str(&format!("{}struct {};\n\n", vis, n.name)),
            Some(operand) => out.push_str(&format!(
                "{}struct {}({});\n\n",
                vis,
                n.name,
                render_type(operand)
            )),
        },
        Spec::Record(r) => {
            out.push_str(&format!("{}struct {} {{\n", vis, r.name));
            for (field, ty) in &r.fields {
                out.push_str(&format!("    {}{}: {},\n", vis, field, render_type(ty)));
            }
            out.push_str("}\n\n");
        }
        Spec::Sum(s) => {
            out.push_str(&format!("{}enum {} {{\n", vis, s.name));
            for (case, spec) in &s.cases {
                if spec.operands.is_empty() {
                    out.push_str(&format!("    {},\n", case));
                } else {
                    let operands: Vec<String> =
                        spec.operands.iter().map(render_type).collect();
                    out.push_str(&format!("    {}({}),\n", case, operands.join(", ")));
                }
            }
            out.push_str("}\n\n");
        }
    }
}

// =============================================================================
// Reflection Table
// =============================================================================

/// Tag-to-payload-type table: the discriminant byte indexes the table by
/// case position. Unit cases and multi-operand cases map to the sentinel.
fn emit_tagged_union(out: &mut String, sum: &SumSpec) {
    out.push_str(&format!("impl TaggedUnion for {} {{\n", sum.name));
    out.push_str("    const PAYLOAD_TYPES: &'static [Option<&'static str>] = &[\n");
    for case in sum.cases.values() {
        if case.arity() == 1 {
            out.push_str(&format!(
                "        Some(\"{}\"),\n",
                payload_type_name(&case.operands[0])
            ));
        } else {
            out.push_str("        None,\n");
        }
    }
    out.push_str("    ];\n\n");
    out.push_str("    fn tag(&self) -> u8 {\n");
    out.push_str("        match self {\n");
    for (i, (case, spec)) in sum.cases.iter().enumerate() {
        let pattern = case_pattern(&sum.name, case, spec, false);
        out.push_str(&format!("            {} => {},\n", pattern, i));
    }
    out.push_str("        }\n");
    out.push_str("    }\n");
    out.push_str("}\n\n");
}

fn case_pattern(sum: &str, case: &str, spec: &CaseSpec, bind: bool) -> String {
    if spec.operands.is_empty() {
        format!("{}::{}", sum, case)
    } else if bind {
        let binders: Vec<String> = (0..spec.arity()).map(|i| format!("x{}", i)).collect();
        format!("{}::{}({})", sum, case, binders.join(", "))
    } else {
        format!("{}::{}(..)", sum, case)
    }
}

// =============================================================================
// Trace
// =============================================================================

/// Structural descent over owned children in declaration order
fn emit_trace(out: &mut String, spec: &Spec) {
    match spec {
        Spec::Newtype(n) => {
            let marker = if n.operands.is_empty() { "_marker" } else { "marker" };
            out.push_str(&format!("impl Trace for {} {{\n", n.name));
            out.push_str(&format!("    fn trace(&self, {}: &Marker) {{\n", marker));
            if !n.operands.is_empty() {
                out.push_str("        self.0.trace(marker);\n");
            }
            out.push_str("    }\n");
            out.push_str("}\n\n");
        }
        Spec::Record(r) => {
            let marker = if r.fields.is_empty() { "_marker" } else { "marker" };
            out.push_str(&format!("impl Trace for {} {{\n", r.name));
            out.push_str(&format!("    fn trace(&self, {}: &Marker) {{\n", marker));
            for field in r.fields.keys() {
                out.push_str(&format!("        self.{}.trace(marker);\n", field));
            }
            out.push_str("    }\n");
            out.push_str("}\n\n");
        }
        Spec::Sum(s) => {
            let has_payload = s.cases.values().any(|c| !c.operands.is_empty());
            let marker = if has_payload { "marker" } else { "_marker" };
            out.push_str(&format!("impl Trace for {} {{\n", s.name));
            out.push_str(&format!("    fn trace(&self, {}: &Marker) {{\n", marker));
            out.push_str("        match self {\n");
            for (case, spec) in &s.cases {
                let pattern = case_pattern(&s.name, case, spec, true);
                if spec.operands.is_empty() {
                    out.push_str(&format!("            {} => {{}}\n", pattern));
                } else {
                    out.push_str(&format!("            {} => {{\n", pattern));
                    for i in 0..spec.arity() {
                        out.push_str(&format!("                x{}.trace(marker);\n", i));
                    }
                    out.push_str("            }\n");
                }
            }
            out.push_str("        }\n");
            out.push_str("    }\n");
            out.push_str("}\n\n");
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Whether a hop's payload crosses a heap boundary the cast must thread
fn hop_boxed(hop: &CastHop) -> bool {
    hop.payload.is_boxed && !hop.payload.is_array
}

/// Lossless injection: constructor chain from the innermost hop outward
fn emit_injection(out: &mut String, path: &CastPath) {
    let to_ty = target_type(path);
    out.push_str(&format!("impl From<{}> for {} {{\n", to_ty, path.from));
    out.push_str(&format!("    fn from(value: {}) -> Self {{\n", to_ty));

    let mut expr = "value".to_string();
    for hop in path.hops.iter().rev() {
        if hop_boxed(hop) && hop.payload.is_sized {
            expr = format!("Box::new({})", expr);
        }
        if hop.payload.is_optional {
            expr = format!("Some({})", expr);
        }
        expr = format!("{}::{}({})", hop.sum, hop.case, expr);
    }

    out.push_str(&format!("        {}\n", expr));
    out.push_str("    }\n");
    out.push_str("}\n\n");
}

/// Lossy extraction: match chain that dereferences each boxed boundary
/// before the next hop and fails with a `CastError` on any other case.
fn emit_extraction(out: &mut String, path: &CastPath, schema: &Schema) {
    let to_ty = target_type(path);
    let err = format!(
        "CastError {{ from: \"{}\", to: \"{}\" }}",
        path.from, to_ty
    );

    out.push_str(&format!("impl TryFrom<{}> for {} {{\n", path.from, to_ty));
    out.push_str("    type Error = CastError;\n\n");
    out.push_str(&format!(
        "    fn try_from(value: {}) -> Result<Self, Self::Error> {{\n",
        path.from
    ));

    let mut var = "value".to_string();
    let mut next_id = 1usize;
    let mut prev_boxed = false;
    for hop in &path.hops {
        let subject = if prev_boxed {
            format!("*{}", var)
        } else {
            var.clone()
        };
        let bound = format!("v{}", next_id);
        next_id += 1;

        out.push_str(&format!("        let {} = match {} {{\n", bound, subject));
        out.push_str(&format!(
            "            {}::{}(payload) => payload,\n",
            hop.sum, hop.case
        ));
        if sum_case_count(schema, &hop.sum) > 1 {
            out.push_str(&format!("            _ => return Err({}),\n", err));
        }
        out.push_str("        };\n");
        var = bound;

        if hop.payload.is_optional {
            let bound = format!("v{}", next_id);
            next_id += 1;
            out.push_str(&format!("        let {} = match {} {{\n", bound, var));
            out.push_str("            Some(payload) => payload,\n");
            out.push_str(&format!("            None => return Err({}),\n", err));
            out.push_str("        };\n");
            var = bound;
        }

        prev_boxed = hop_boxed(hop);
    }

    let last = path.hops.last().expect("paths always have at least one hop");
    if hop_boxed(last) && last.payload.is_sized {
        out.push_str(&format!("        Ok(*{})\n", var));
    } else {
        out.push_str(&format!("        Ok({})\n", var));
    }
    out.push_str("    }\n");
    out.push_str("}\n\n");
}

fn sum_case_count(schema: &Schema, name: &str) -> usize {
    match schema.get(name) {
        Some(Spec::Sum(s)) => s.cases.len(),
        _ => 0,
    }
}

// =============================================================================
// Size Fixture
// =============================================================================

fn emit_size_fixture(out: &mut String, schema: &Schema) {
    out.push_str("#[cfg(test)]\n");
    out.push_str("mod sizes {\n");
    out.push_str("    use super::*;\n\n");
    out.push_str("    #[test]\n");
    out.push_str("    fn print_sizes() {\n");
    for spec in &schema.specs {
        out.push_str(&format!(
            "        println!(\"{}: {{}} bytes\", std::mem::size_of::<{}>());\n",
            spec.name(),
            spec.name()
        ));
    }
    out.push_str("    }\n");
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Generator;
    use crate::parser::parse_document;

    fn emit(text: &str) -> String {
        let schema = parse_document(text).unwrap();
        Generator::build(schema).unwrap().emit()
    }

    #[test]
    fn test_render_type_nesting() {
        let mut r = TypeRef::array(TypeRef::leaf("Datum"));
        r.is_boxed = true;
        r.is_optional = true;
        assert_eq!(render_type(&r), "Option<Box<Vec<Datum>>>");
    }

    #[test]
    fn test_unsized_leaf_renders_boxed() {
        let mut r = TypeRef::leaf("str");
        r.is_boxed = true;
        r.is_sized = false;
        assert_eq!(render_type(&r), "Box<str>");
        assert_eq!(payload_type_name(&r), "Box<str>");
    }

    #[test]
    fn test_newtype_decl() {
        let code = emit("models:\n  Identifier: String\n");
        assert!(code.contains("pub struct Identifier(String);"));
        assert!(code.contains("impl Trace for Identifier"));
        assert!(code.contains("self.0.trace(marker);"));
    }

    #[test]
    fn test_derive_attr_from_config() {
        let code = emit(
            "config:\n  derive: [Debug, Clone]\nmodels:\n  Identifier: String\n",
        );
        assert!(code.contains("#[derive(Debug, Clone)]\npub struct Identifier(String);"));
    }

    #[test]
    fn test_sum_decl_and_reflection() {
        let code = emit(
            "models:\n  Datum:\n    - { Quotation: Datum }\n    - { EmptyList: [] }\n    - { Pair: [Datum, Datum] }\n",
        );
        assert!(code.contains("pub enum Datum {"));
        assert!(code.contains("    Quotation(Box<Datum>),"));
        assert!(code.contains("    EmptyList,"));
        assert!(code.contains("    Pair(Box<Datum>, Box<Datum>),"));
        // arity-1 case present, unit and multi-operand cases are sentinels
        assert!(code.contains("Some(\"Datum\"),"));
        assert!(code.contains("None,"));
        assert!(code.contains("Datum::Quotation(..) => 0,"));
        assert!(code.contains("Datum::EmptyList => 1,"));
        assert!(code.contains("Datum::Pair(..) => 2,"));
    }

    #[test]
    fn test_trace_descends_sum_operands() {
        let code = emit(
            "models:\n  Datum:\n    - { Pair: [Datum, Datum] }\n    - { EmptyList: [] }\n",
        );
        assert!(code.contains("Datum::Pair(x0, x1) => {"));
        assert!(code.contains("x0.trace(marker);"));
        assert!(code.contains("Datum::EmptyList => {}"));
    }

    #[test]
    fn test_lossy_pair_emits_both_directions() {
        let code = emit(
            "models:\n  Form:\n    - { Expression: Expression }\n    - { Nil: [] }\n  Expression: []\n",
        );
        assert!(code.contains("impl From<Expression> for Form {"));
        assert!(code.contains("impl TryFrom<Form> for Expression {"));
        assert!(code.contains("Form::Expression(value)"));
        assert!(code.contains("_ => return Err(CastError { from: \"Form\", to: \"Expression\" }),"));
    }

    #[test]
    fn test_lossless_pair_suppresses_extraction() {
        let code = emit("models:\n  A: [ { B: B } ]\n  B: [ { A: A } ]\n");
        assert!(code.contains("impl From<B> for A {"));
        assert!(code.contains("impl From<A> for B {"));
        assert!(!code.contains("impl TryFrom"));
    }

    #[test]
    fn test_boxed_hop_threading() {
        let code = emit(
            "models:\n  Form:\n    - { Expression: Expression }\n    - { Nil: [] }\n  Expression:\n    - { Form: Form }\n    - { Literal: Literal }\n  Literal: []\n",
        );
        // Form <-> Expression is a cycle, so the Expression hop is boxed
        assert!(code.contains("Form::Expression(Box::new(Expression::Literal(value)))"));
        // extraction derefs the boxed payload before the next match
        assert!(code.contains("match *v1"));
        // the cyclic pair itself converts losslessly in both directions
        assert!(code.contains("impl From<Expression> for Form {"));
        assert!(code.contains("impl From<Form> for Expression {"));
        assert!(!code.contains("impl TryFrom<Form> for Expression"));
    }

    #[test]
    fn test_unsized_terminal_signature() {
        let code = emit(
            "models:\n  Datum:\n    - { Symbol: str }\n    - { Nil: [] }\n",
        );
        assert!(code.contains("impl From<Box<str>> for Datum {"));
        assert!(code.contains("impl TryFrom<Datum> for Box<str> {"));
        // already boxed and unsized: passed through, never re-wrapped
        assert!(code.contains("Datum::Symbol(value)"));
        assert!(code.contains("Ok(v1)"));
    }

    #[test]
    fn test_size_fixture_lists_every_type() {
        let code = emit("models:\n  Identifier: String\n  Nil: []\n");
        assert!(code.contains("mod sizes"));
        assert!(code.contains("size_of::<Identifier>()"));
        assert!(code.contains("size_of::<Nil>()"));
    }
}
