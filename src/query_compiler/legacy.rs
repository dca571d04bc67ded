//! Adapter for the historical single-return-type API.
//!
//! Callers on the old API name one object type as "the" result type instead
//! of flagging nodes. Before projection the traversal asks this module which
//! nodes to project; everything else only sees the resulting flag set.

use super::query_graph::{GraphMode, NodeId, QueryGraph};
use crate::catalog::TableDescriptor;
use std::sync::Arc;

/// `projected[id]` is true when node `id` contributes SELECT columns.
///
/// Flagged nodes always win. Without flags, a forward graph with a legacy
/// return type pins the first node of that type; if none matches, nothing is
/// pinned and every node is projected. Reverse graphs ignore the legacy type.
pub(crate) fn projected_nodes(graph: &QueryGraph) -> Vec<bool> {
    let nodes = graph.nodes();
    if nodes.iter().any(|n| n.is_return_projection()) {
        return nodes.iter().map(|n| n.is_return_projection()).collect();
    }

    if graph.mode() == GraphMode::Forward {
        if let Some(type_id) = graph.legacy_return_type() {
            match nodes
                .iter()
                .position(|n| n.object_type_id() == Some(type_id))
            {
                Some(pinned) => return (0..nodes.len()).map(|i| i == pinned).collect(),
                None => log::debug!(
                    "legacy return type {} matches no node, projecting all",
                    type_id
                ),
            }
        }
    }

    vec![true; nodes.len()]
}

pub(crate) fn return_types(graph: &QueryGraph) -> Vec<Arc<TableDescriptor>> {
    let projected = projected_nodes(graph);
    graph
        .walk_order()
        .into_iter()
        .filter(|&id: &NodeId| projected.get(id).copied().unwrap_or(false))
        .filter_map(|id| graph.node(id).ok().and_then(|n| n.table().cloned()))
        .collect()
}
