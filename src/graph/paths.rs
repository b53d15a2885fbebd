//! Cast-path inference
//!
//! For every ordered pair of types where one embeds the other through a
//! chain of single-operand sum cases, computes the canonical hop chain used
//! to synthesize conversions: the lossless injection (constructor chain) and,
//! for asymmetric pairs, the lossy extraction (fallible pattern match).

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RefGraph, Vertex};
use crate::schema::{Schema, Spec, SlotId, TypeRef, UNSIZED_PRIMITIVE};

/// One step of a cast chain: a single-operand case of a sum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastHop {
    pub sum: String,
    pub case: String,
    /// The original operand reference, so emitters see every box boundary
    pub payload: TypeRef,
}

/// A canonical conversion path between two types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastPath {
    pub from: String,
    pub to: String,
    pub hops: Vec<CastHop>,
    /// Both directions exist; conversion cannot fail either way
    pub lossless: bool,
    /// Terminal payload leaf is the unsized string; signatures use the
    /// boxed form
    pub unsized_terminal: bool,
}

/// Compute all cast paths over the post-analysis schema.
///
/// Shortest paths (uniform edge weight) from every top-level type vertex,
/// in declaration order; targets in vertex insertion order. A candidate is
/// dropped when it crosses a record-field or newtype-operand slot, or any
/// case of arity other than one.
pub fn infer_paths(schema: &Schema) -> Vec<CastPath> {
    let graph = RefGraph::build(schema);
    let mut raw: Vec<(String, String, Vec<CastHop>)> = Vec::new();

    for spec in &schema.specs {
        let from = spec.name();
        let Some(start) = graph.index_of(&Vertex::Type(from.to_string())) else {
            continue;
        };
        let preds = bfs_predecessors(&graph, start);

        for idx in graph.graph.node_indices() {
            if idx == start || !preds.contains_key(&idx) {
                continue;
            }
            let Vertex::Type(to) = graph.vertex(idx) else {
                continue;
            };

            let mut vertices = vec![idx];
            let mut cur = idx;
            while cur != start {
                cur = preds[&cur];
                vertices.push(cur);
            }
            vertices.reverse();

            match canonicalize(schema, &graph, &vertices) {
                Some(hops) => raw.push((from.to_string(), to.clone(), hops)),
                None => debug!(from = from, to = %to, "path filtered out"),
            }
        }
    }

    let pairs: HashSet<(&str, &str)> = raw
        .iter()
        .map(|(f, t, _)| (f.as_str(), t.as_str()))
        .collect();
    let lossless_pairs: HashSet<(String, String)> = raw
        .iter()
        .filter(|(f, t, _)| pairs.contains(&(t.as_str(), f.as_str())))
        .map(|(f, t, _)| (f.clone(), t.clone()))
        .collect();

    raw.into_iter()
        .map(|(from, to, hops)| {
            let lossless = lossless_pairs.contains(&(from.clone(), to.clone()));
            let unsized_terminal = hops
                .last()
                .map(|h| h.payload.leaf_name() == Some(UNSIZED_PRIMITIVE))
                .unwrap_or(false);
            CastPath {
                from,
                to,
                hops,
                lossless,
                unsized_terminal,
            }
        })
        .collect()
}

/// Breadth-first shortest-path tree rooted at `start`
fn bfs_predecessors(graph: &RefGraph, start: NodeIndex) -> HashMap<NodeIndex, NodeIndex> {
    let mut preds = HashMap::new();
    let mut visited = HashSet::new();
    visited.insert(start);
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(cur) = queue.pop_front() {
        for next in graph.graph.neighbors(cur) {
            if visited.insert(next) {
                preds.insert(next, cur);
                queue.push_back(next);
            }
        }
    }
    preds
}

/// Collapse a vertex path to its hop chain, or reject it.
///
/// Paths alternate type and slot vertices. Record fields and newtype
/// operands cannot be traversed by a cast, and a case with arity other than
/// one cannot be pattern-matched into a single value.
fn canonicalize(schema: &Schema, graph: &RefGraph, vertices: &[NodeIndex]) -> Option<Vec<CastHop>> {
    let mut hops = Vec::with_capacity(vertices.len() / 2);

    for idx in vertices {
        match graph.vertex(*idx) {
            Vertex::Type(_) => {}
            Vertex::Slot(SlotId::CaseOperand { sum, case, .. }) => {
                let arity = match schema.get(sum) {
                    Some(Spec::Sum(s)) => s.cases.get(case)?.arity(),
                    _ => return None,
                };
                if arity != 1 {
                    return None;
                }
                let payload = schema
                    .slot(&SlotId::CaseOperand {
                        sum: sum.clone(),
                        case: case.clone(),
                        index: 1,
                    })?
                    .clone();
                hops.push(CastHop {
                    sum: sum.clone(),
                    case: case.clone(),
                    payload,
                });
            }
            Vertex::Slot(_) => return None,
        }
    }

    Some(hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::break_cycles;
    use crate::parser::parse_document;

    fn analyzed(text: &str) -> Schema {
        let mut schema = parse_document(text).unwrap();
        break_cycles(&mut schema).unwrap();
        schema
    }

    fn find<'a>(paths: &'a [CastPath], from: &str, to: &str) -> Option<&'a CastPath> {
        paths.iter().find(|p| p.from == from && p.to == to)
    }

    #[test]
    fn test_newtype_has_no_paths() {
        let schema = analyzed("models:\n  Identifier: String\n");
        assert!(infer_paths(&schema).is_empty());
    }

    #[test]
    fn test_self_path_not_emitted() {
        let schema = analyzed(
            "models:\n  Datum:\n    - { Quotation: Datum }\n    - { EmptyList: [] }\n",
        );
        let paths = infer_paths(&schema);
        assert!(find(&paths, "Datum", "Datum").is_none());
        assert!(paths.is_empty());
    }

    #[test]
    fn test_cross_cycle_is_lossless_both_ways() {
        let schema = analyzed("models:\n  A: [ { B: B } ]\n  B: [ { A: A } ]\n");
        let paths = infer_paths(&schema);
        let ab = find(&paths, "A", "B").expect("A -> B");
        let ba = find(&paths, "B", "A").expect("B -> A");
        assert!(ab.lossless && ba.lossless);
        assert_eq!(ab.hops.len(), 1);
        assert_eq!(ab.hops[0].case, "B");
    }

    #[test]
    fn test_multi_arity_case_filters_path() {
        let schema = analyzed(
            "models:\n  Pair: [ { Both: [X, Y] } ]\n  X: []\n  Y: []\n",
        );
        let paths = infer_paths(&schema);
        assert!(find(&paths, "Pair", "X").is_none());
        assert!(find(&paths, "Pair", "Y").is_none());
    }

    #[test]
    fn test_record_field_filters_path() {
        let schema = analyzed(
            "models:\n  Form:\n    - { Definition: Definition }\n    - { Nil: [] }\n  Definition:\n    value: Expression\n  Expression: []\n",
        );
        let paths = infer_paths(&schema);
        // Form -> Definition crosses only a case operand
        assert!(find(&paths, "Form", "Definition").is_some());
        // but Form -> Expression would cross Definition.value
        assert!(find(&paths, "Form", "Expression").is_none());
    }

    #[test]
    fn test_two_hop_chain() {
        let text = "models:\n  Form:\n    - { Expression: Expression }\n    - { Nil: [] }\n  Expression:\n    - { Literal: Literal }\n    - { Nil: [] }\n  Literal: []\n";
        let schema = analyzed(text);
        let paths = infer_paths(&schema);
        let path = find(&paths, "Form", "Literal").expect("Form -> Literal");
        assert_eq!(path.hops.len(), 2);
        assert_eq!(path.hops[0].sum, "Form");
        assert_eq!(path.hops[1].sum, "Expression");
        assert!(!path.lossless);
    }

    #[test]
    fn test_primitive_target() {
        let schema = analyzed(
            "models:\n  Literal:\n    - { Boolean: bool }\n    - { Nil: [] }\n",
        );
        let paths = infer_paths(&schema);
        let path = find(&paths, "Literal", "bool").expect("Literal -> bool");
        assert!(!path.lossless);
        assert!(!path.unsized_terminal);
    }

    #[test]
    fn test_unsized_terminal_flagged() {
        let schema = analyzed(
            "models:\n  Datum:\n    - { Symbol: str }\n    - { Nil: [] }\n",
        );
        let paths = infer_paths(&schema);
        let path = find(&paths, "Datum", "str").expect("Datum -> str");
        assert!(path.unsized_terminal);
        assert!(path.hops[0].payload.is_boxed);
    }

    #[test]
    fn test_boxed_hop_payload_observable() {
        let schema = analyzed(
            "models:\n  Datum:\n    - { Quotation: Datum }\n    - { Wrapper: Inner }\n  Inner: []\n",
        );
        let paths = infer_paths(&schema);
        let path = find(&paths, "Datum", "Inner").expect("Datum -> Inner");
        // Wrapper's operand is not on the cycle, so it stays unboxed
        assert!(!path.hops[0].payload.is_boxed);
    }

    #[test]
    fn test_array_operand_not_traversed() {
        let schema = analyzed(
            "models:\n  Datum:\n    - { Vector: [Datum] }\n    - { Symbol: Symbol }\n  Symbol: []\n",
        );
        let paths = infer_paths(&schema);
        assert!(find(&paths, "Datum", "Symbol").is_some());
        // the Vector hop crosses an array, so no self path materializes
        assert!(find(&paths, "Datum", "Datum").is_none());
    }
}
