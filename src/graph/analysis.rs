//! Cycle breaking
//!
//! Computes strongly connected components over the reference graph and marks
//! every operand slot participating in a cycle as boxed, so every type has a
//! statically known size. Also forces `is_sized = false` (and a box) on every
//! reference to the unsized string leaf. The pass is idempotent: re-running
//! it on its own output changes nothing.

use petgraph::algo::kosaraju_scc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RefGraph, Vertex};
use crate::error::{Result, SchemaError};
use crate::schema::{Schema, SlotId, UNSIZED_PRIMITIVE};

/// One cycle group found in the reference graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SccGroup {
    pub id: usize,
    /// Type names in the component
    pub members: Vec<String>,
    /// Slots in the component that carry the heap boundary
    pub boxed_slots: Vec<SlotId>,
}

/// Result of the cycle-breaking pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SccAnalysis {
    pub groups: Vec<SccGroup>,
    /// Slots newly marked boxed by this run (empty on a re-run)
    pub newly_boxed: Vec<SlotId>,
}

/// Break every reference cycle by boxing the participating operand slots,
/// then apply the unsized-leaf fixup.
///
/// Every edge in the graph passes through a slot vertex, so a component
/// without one cannot arise from a well-formed schema; it is reported as an
/// unbreakable cycle rather than looped on.
pub fn break_cycles(schema: &mut Schema) -> Result<SccAnalysis> {
    let graph = RefGraph::build(schema);
    let components = kosaraju_scc(&graph.graph);

    let mut analysis = SccAnalysis::default();
    for component in components {
        if component.len() <= 1 {
            continue;
        }

        let mut members = Vec::new();
        let mut slots = Vec::new();
        for idx in &component {
            match graph.vertex(*idx) {
                Vertex::Type(name) => members.push(name.clone()),
                Vertex::Slot(id) => slots.push(id.clone()),
            }
        }

        if slots.is_empty() {
            return Err(SchemaError::UnbreakableCycle(
                members.first().cloned().unwrap_or_default(),
            ));
        }

        let id = analysis.groups.len();
        let mut boxed_slots = Vec::new();
        for slot in slots {
            let r = schema
                .slot_mut(&slot)
                .expect("slot vertices always address a live slot");
            if !r.is_boxed {
                r.is_boxed = true;
                debug!(slot = %slot, "boxed to break cycle");
                analysis.newly_boxed.push(slot.clone());
            }
            boxed_slots.push(slot);
        }

        analysis.groups.push(SccGroup {
            id,
            members,
            boxed_slots,
        });
    }

    // Unsized leaves must sit behind a heap boundary. Array elements are
    // boxed too: a sequence element type must itself be sized.
    schema.for_each_ref_mut(&mut |r| {
        if r.leaf_name() == Some(UNSIZED_PRIMITIVE) && !r.is_array {
            r.is_sized = false;
            if !r.is_boxed {
                r.is_boxed = true;
            }
        }
    });

    Ok(analysis)
}
