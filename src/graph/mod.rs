//! Type reference graph
//!
//! Directed graph over the parsed schema used by cycle breaking and cast-path
//! inference. Vertices are types and operand slots; every reference runs
//! type -> slot -> target type, so a slot sits on every edge of every cycle.
//! Array slots impose their own heap boundary and cannot be traversed by a
//! cast, so they contribute no vertices or edges at all.

pub mod analysis;
pub mod paths;

pub use analysis::{break_cycles, SccAnalysis, SccGroup};
pub use paths::{infer_paths, CastHop, CastPath};

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

use crate::schema::{is_primitive, Schema, SlotId, Target};

/// Graph vertex: a type (top-level, primitive, or dangling reference) or an
/// operand slot of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Vertex {
    Type(String),
    Slot(SlotId),
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vertex::Type(name) => write!(f, "{}", name),
            Vertex::Slot(id) => write!(f, "{}", id),
        }
    }
}

/// Edge label: a type owns a slot, or a slot targets a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Operand,
    Target,
}

/// The reference graph plus a vertex index for O(1) lookup
pub struct RefGraph {
    pub graph: DiGraph<Vertex, EdgeKind>,
    indices: HashMap<Vertex, NodeIndex>,
}

impl RefGraph {
    /// Build the graph from a parsed schema.
    ///
    /// Type vertices are added in declaration order, then one vertex per
    /// non-array operand slot with its two edges. Leaf targets that name no
    /// top-level type (primitives, dangling references) still get a type
    /// vertex so traversals can reach them.
    pub fn build(schema: &Schema) -> Self {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<Vertex, NodeIndex> = HashMap::new();

        for spec in &schema.specs {
            let v = Vertex::Type(spec.name().to_string());
            let idx = graph.add_node(v.clone());
            indices.insert(v, idx);
        }

        for (slot_id, r) in schema.slots() {
            if r.is_array {
                continue;
            }
            let target = match &r.target {
                Target::Leaf(name) => name.clone(),
                Target::Unit => continue,
                // non-array refs never hold an element target
                Target::Elem(_) => continue,
            };

            let owner = Vertex::Type(owner_of(&slot_id).to_string());
            let owner_idx = indices[&owner];

            let slot_v = Vertex::Slot(slot_id);
            let slot_idx = graph.add_node(slot_v.clone());
            indices.insert(slot_v, slot_idx);

            let target_v = Vertex::Type(target);
            let target_idx = *indices
                .entry(target_v.clone())
                .or_insert_with(|| graph.add_node(target_v));

            graph.add_edge(owner_idx, slot_idx, EdgeKind::Operand);
            graph.add_edge(slot_idx, target_idx, EdgeKind::Target);
        }

        Self { graph, indices }
    }

    pub fn index_of(&self, vertex: &Vertex) -> Option<NodeIndex> {
        self.indices.get(vertex).copied()
    }

    pub fn vertex(&self, idx: NodeIndex) -> &Vertex {
        &self.graph[idx]
    }
}

fn owner_of(id: &SlotId) -> &str {
    match id {
        SlotId::NewtypeOperand { ty, .. } => ty,
        SlotId::RecordField { ty, .. } => ty,
        SlotId::CaseOperand { sum, .. } => sum,
    }
}

/// Reference hygiene report: leaf targets naming no spec and no primitive,
/// and top-level types nothing references.
#[derive(Debug, Default)]
pub struct ReferenceReport {
    /// (referring slot, unknown target name)
    pub unknown: Vec<(String, String)>,
    pub unreferenced: Vec<String>,
}

/// Scan every slot's leaf target, including array elements
pub fn reference_report(schema: &Schema) -> ReferenceReport {
    let mut report = ReferenceReport::default();
    let mut referenced: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for (slot_id, r) in schema.slots() {
        let Some(leaf) = r.leaf_name() else {
            continue;
        };
        referenced.insert(leaf);
        if !is_primitive(leaf) && schema.get(leaf).is_none() {
            report.unknown.push((slot_id.to_string(), leaf.to_string()));
        }
    }

    for spec in &schema.specs {
        // a sum's self-named case references the case type, not the sum
        if !referenced.contains(spec.name()) {
            report.unreferenced.push(spec.name().to_string());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn test_array_slots_contribute_no_edges() {
        let schema = parse_document("models:\n  Program: [Form]\n  Form: []\n").unwrap();
        let graph = RefGraph::build(&schema);
        // two type vertices, no slot vertices
        assert_eq!(graph.graph.node_count(), 2);
        assert_eq!(graph.graph.edge_count(), 0);
    }

    #[test]
    fn test_slot_vertices_and_edges() {
        let schema =
            parse_document("models:\n  Identifier: String\n  Binding:\n    name: Identifier\n")
                .unwrap();
        let graph = RefGraph::build(&schema);
        // Identifier, Binding, String + two slots
        assert_eq!(graph.graph.node_count(), 5);
        assert_eq!(graph.graph.edge_count(), 4);
        assert!(graph.index_of(&Vertex::Type("String".into())).is_some());
    }

    #[test]
    fn test_reference_report() {
        let schema = parse_document("models:\n  A:\n    field: Missing\n  B: bool\n").unwrap();
        let report = reference_report(&schema);
        assert_eq!(report.unknown, vec![("A.field".to_string(), "Missing".to_string())]);
        assert_eq!(report.unreferenced, vec!["A".to_string(), "B".to_string()]);
    }
}
