// Routing graph - Directed connections between live engine nodes
//
// Bookkeeping for the headless engine:
// - Nodes are registered when created and removed when disposed
// - A connection that would close a cycle is rejected
// - `disconnect` drops every outgoing edge of a node, like a Web Audio style
//   `disconnect()` with no target
// - `chain_from` follows single outgoing edges to reconstruct a serial chain

use super::NodeId;
use crate::error::EngineError;
use std::collections::HashSet;

/// Connection between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from_node: NodeId,
    pub to_node: NodeId,
}

#[derive(Debug, Default)]
pub struct RoutingGraph {
    nodes: HashSet<NodeId>,
    connections: Vec<Connection>,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.connections
            .retain(|c| c.from_node != id && c.to_node != id);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Add a connection; duplicates are ignored
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        let connection = Connection {
            from_node: from,
            to_node: to,
        };
        if self.connections.contains(&connection) {
            return Ok(());
        }

        if self.would_create_cycle(&connection) {
            return Err(EngineError::Cycle {
                from: from.0,
                to: to.0,
            });
        }

        self.connections.push(connection);
        Ok(())
    }

    /// Drop every outgoing connection of `from`
    pub fn disconnect(&mut self, from: NodeId) {
        self.connections.retain(|c| c.from_node != from);
    }

    pub fn connections_from(&self, id: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.from_node == id)
            .map(|c| c.to_node)
            .collect()
    }

    pub fn connections_to(&self, id: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.to_node == id)
            .map(|c| c.from_node)
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Walk from `start` while each node has exactly one outgoing edge
    pub fn chain_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut chain = vec![start];
        let mut current = start;

        loop {
            let next = self.connections_from(current);
            if next.len() != 1 || chain.contains(&next[0]) {
                break;
            }
            current = next[0];
            chain.push(current);
        }

        chain
    }

    /// Check if a connection would create a cycle
    fn would_create_cycle(&self, connection: &Connection) -> bool {
        let mut visited = HashSet::new();

        // DFS from the target node to see if we can reach the source
        self.has_path_dfs(connection.to_node, connection.from_node, &mut visited)
    }

    fn has_path_dfs(&self, current: NodeId, target: NodeId, visited: &mut HashSet<NodeId>) -> bool {
        if current == target {
            return true;
        }

        if !visited.insert(current) {
            return false;
        }

        self.connections
            .iter()
            .filter(|c| c.from_node == current)
            .any(|c| self.has_path_dfs(c.to_node, target, visited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[u64]) -> RoutingGraph {
        let mut graph = RoutingGraph::new();
        for id in ids {
            graph.add_node(NodeId(*id));
        }
        graph
    }

    #[test]
    fn test_routing_graph_creation() {
        let graph = RoutingGraph::new();
        assert_eq!(graph.connection_count(), 0);
        assert!(!graph.contains(NodeId(1)));
    }

    #[test]
    fn test_add_connection_creates_cycle() {
        let mut graph = graph(&[1, 2, 3]);
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        graph.connect(NodeId(2), NodeId(3)).unwrap();

        let result = graph.connect(NodeId(3), NodeId(1));
        assert_eq!(result, Err(EngineError::Cycle { from: 3, to: 1 }));
        assert!(graph.connect(NodeId(1), NodeId(1)).is_err());
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_duplicate_connection_ignored() {
        let mut graph = graph(&[1, 2]);
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_disconnect_drops_outgoing_only() {
        let mut graph = graph(&[1, 2, 3]);
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        graph.connect(NodeId(2), NodeId(3)).unwrap();

        graph.disconnect(NodeId(2));
        assert!(graph.connections_from(NodeId(2)).is_empty());
        assert_eq!(graph.connections_to(NodeId(2)), vec![NodeId(1)]);
    }

    #[test]
    fn test_chain_walk() {
        let mut graph = graph(&[1, 2, 3, 4]);
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        graph.connect(NodeId(2), NodeId(3)).unwrap();
        graph.connect(NodeId(3), NodeId(4)).unwrap();
        assert_eq!(
            graph.chain_from(NodeId(1)),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
        );

        // a fork ends the walk
        graph.add_node(NodeId(5));
        graph.connect(NodeId(2), NodeId(5)).unwrap();
        assert_eq!(graph.chain_from(NodeId(1)), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut graph = graph(&[1, 2, 3]);
        graph.connect(NodeId(1), NodeId(2)).unwrap();
        graph.connect(NodeId(2), NodeId(3)).unwrap();

        graph.remove_node(NodeId(2));
        assert!(!graph.contains(NodeId(2)));
        assert_eq!(graph.connection_count(), 0);
    }
}
