//! Structural loop detection over the node/connection graph.
//!
//! Loops are strongly-connected components of the directed connection graph
//! (size >= 2, or a single node with a self-connection). Detection is a pure
//! function over the static graph; the orchestrator runs it once per run and
//! tags member nodes before the first sweep.

use std::collections::{BTreeSet, HashMap};

use petgraph::{algo::tarjan_scc, graph::DiGraph};

use crate::workflow::{
    breaks::BreakConfig,
    connection::{Connection, ConnectionId},
    node::NodeId,
};

/// loop id
pub type LoopId = String;

/// Maximum number of outputs retained in a loop's history.
pub const LOOP_HISTORY_CAP: usize = 100;

/// Run-scoped metadata for one detected loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopMetadata {
    /// Loop identifier, stable for the duration of a run.
    pub id: LoopId,
    /// Ids of every node participating in the loop.
    pub members: BTreeSet<NodeId>,
    /// Connections that close the loop (pointing back to an earlier node).
    pub closing_connections: Vec<ConnectionId>,
    /// Completed sweeps of this loop in the current run.
    pub current_iteration: u32,
    /// Outputs produced by member nodes in prior iterations, newest last.
    pub history: Vec<String>,
    /// Whether any closing connection carries a break configuration.
    /// Unconfigured loops are flagged as a runaway risk but still execute
    /// under the global safety ceilings.
    pub has_config: bool,
    /// The break configuration in effect, taken from the first configured
    /// closing connection.
    pub config: Option<BreakConfig>,
}

impl LoopMetadata {
    pub fn new(
        id: LoopId,
        members: BTreeSet<NodeId>,
        closing_connections: Vec<ConnectionId>,
        config: Option<BreakConfig>,
    ) -> Self {
        Self {
            id,
            members,
            closing_connections,
            current_iteration: 0,
            history: Vec::new(),
            has_config: config.is_some(),
            config,
        }
    }

    /// Append an output to the loop history, evicting the oldest beyond the cap.
    pub fn push_history(
        &mut self,
        output: String,
    ) {
        self.history.push(output);
        if self.history.len() > LOOP_HISTORY_CAP {
            let overflow = self.history.len() - LOOP_HISTORY_CAP;
            self.history.drain(..overflow);
        }
    }

    pub fn contains(
        &self,
        nid: &str,
    ) -> bool {
        self.members.contains(nid)
    }
}

/// Find every loop in the connection graph.
///
/// `order` maps each node id to its position in the declared stage sequence;
/// it determines which edges of a component are loop-closing (an edge whose
/// source does not precede its target). Overlapping or nested cycles collapse
/// into a single component, so a node belongs to at most one loop.
pub fn detect_loops(
    connections: &[Connection],
    order: &HashMap<NodeId, usize>,
) -> Vec<LoopMetadata> {
    let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut indices = HashMap::new();

    for connection in connections {
        for nid in [&connection.from, &connection.to] {
            indices.entry(nid.clone()).or_insert_with(|| graph.add_node(nid.clone()));
        }
        graph.add_edge(indices[&connection.from], indices[&connection.to], ());
    }

    let mut components: Vec<BTreeSet<NodeId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            if component.len() >= 2 {
                return true;
            }
            // single node: keep only self-loops
            let idx = component[0];
            graph.find_edge(idx, idx).is_some()
        })
        .map(|component| component.into_iter().map(|idx| graph[idx].clone()).collect())
        .collect();

    // Tarjan yields components in reverse topological order; re-sort by the
    // earliest member so loop ids follow the declared stage sequence.
    components.sort_by_key(|members| members.iter().filter_map(|nid| order.get(nid)).min().copied().unwrap_or(usize::MAX));

    components
        .into_iter()
        .enumerate()
        .map(|(n, members)| {
            let mut closing = component_closing_connections(connections, &members, order);
            closing.sort_by_key(|connection| order.get(&connection.from).copied().unwrap_or(usize::MAX));

            let config = closing.iter().find_map(|connection| connection.break_config.clone());
            let closing_ids = closing.into_iter().map(|connection| connection.id.clone()).collect();

            LoopMetadata::new(format!("loop-{}", n), members, closing_ids, config)
        })
        .collect()
}

/// Connections inside a component that point backward (or sideways) in the
/// declared order; these are the edges the UI annotates and the ones that may
/// carry a break configuration.
fn component_closing_connections<'a>(
    connections: &'a [Connection],
    members: &BTreeSet<NodeId>,
    order: &HashMap<NodeId, usize>,
) -> Vec<&'a Connection> {
    connections
        .iter()
        .filter(|connection| members.contains(&connection.from) && members.contains(&connection.to))
        .filter(|connection| {
            let from = order.get(&connection.from).copied().unwrap_or(usize::MAX);
            let to = order.get(&connection.to).copied().unwrap_or(usize::MAX);
            from >= to
        })
        .collect()
}
