// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cell::RefCell;
use std::collections::btree_map::{BTreeMap, Entry};

use crate::{Edge, KdTree, Node, Position};

/// Outcome of a [turn restriction](https://wiki.openstreetmap.org/wiki/Relation:restriction)
/// lookup, see [GraphLike::turn_restriction].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnCheck {
    /// No restriction applies to the queried prefix.
    None,

    /// Continuing to any of the contained nodes is forbidden.
    Prohibit(Vec<i64>),

    /// Continuing is only permitted to the contained nodes.
    /// An empty set means the queried prefix is a dead end.
    Mandate(Vec<i64>),
}

impl TurnCheck {
    /// Checks whether continuing to `next` is permitted under this restriction.
    pub fn allows(&self, next: i64) -> bool {
        match self {
            TurnCheck::None => true,
            TurnCheck::Prohibit(targets) => !targets.contains(&next),
            TurnCheck::Mandate(targets) => targets.contains(&next),
        }
    }
}

/// Protocol of a directed, weighted graph over which routes can be found,
/// see [find_route](crate::find_route).
pub trait GraphLike {
    /// Retrieves a [Node] with the provided id, or `None` if no such node exists.
    fn get_node(&self, id: i64) -> Option<Node>;

    /// Returns all outgoing [Edges](Edge) from a node with the provided id.
    /// Must return an empty iterator for unknown nodes.
    fn edges_from(&self, id: i64) -> impl Iterator<Item = Edge> + '_;

    /// Checks turn restrictions against a traversed sequence of nodes,
    /// ending at the node about to be expanded. Implementations must match
    /// any stored restriction prefix against the suffixes of the provided
    /// sequence. Graphs without turn restrictions always return [TurnCheck::None].
    fn turn_restriction(&self, _prefix: &[i64]) -> TurnCheck {
        TurnCheck::None
    }

    /// Length of the longest restriction prefix stored in this graph,
    /// computed once when the graph is built. Route finding keeps this many
    /// recently-visited nodes around for [GraphLike::turn_restriction] queries.
    /// Zero means the graph has no turn restrictions at all.
    fn longest_restriction(&self) -> usize {
        0
    }
}

/// An in-memory [GraphLike] implementation: a set of [Nodes](Node)
/// and [Edges](Edge) between them, without turn restrictions.
#[derive(Debug, Default, Clone)]
pub struct SimpleGraph {
    nodes: BTreeMap<i64, (Node, Vec<Edge>)>,

    // Rebuilt on demand by find_nearest_node, cleared on node changes.
    nearest: RefCell<Option<KdTree<Node>>>,
}

impl SimpleGraph {
    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes in the graph.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over all [Nodes](Node) in the graph.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().map(|(_, (node, _))| node)
    }

    /// Creates or updates a [Node] with `node.id`.
    ///
    /// All outgoing and incoming edges are preserved.
    /// Updating a [Node] position might result in violation of the
    /// [Edge] cost invariant (and thus break route finding) and
    /// is therefore disallowed.
    ///
    /// Returns `true` if an existing node was updated/overwritten,
    /// `false` if a new node was created.
    pub fn set_node(&mut self, node: Node) -> bool {
        assert_ne!(node.id, 0);
        self.nearest.replace(None);

        match self.nodes.entry(node.id) {
            Entry::Vacant(e) => {
                e.insert((node, Vec::default()));
                false
            }

            Entry::Occupied(mut e) => {
                debug_assert_eq!(e.get().0.id, node.id);
                e.get_mut().0 = node;
                true
            }
        }
    }

    /// Deletes a [Node] with a given `id`.
    ///
    /// While all outgoing edges are removed, incoming edges are preserved
    /// (as removing those would require a walk over all nodes in the graph).
    /// Thus, deleting a node and then re-using its id might result in violation
    /// of the [Edge] cost invariant (and break route finding) and is disallowed.
    ///
    /// Returns `true` if a node was deleted, `false` if no such node existed.
    pub fn delete_node(&mut self, id: i64) -> bool {
        self.nearest.replace(None);
        self.nodes.remove(&id).is_some()
    }

    /// Finds the closest [Node] to the given position, as measured by
    /// the haversine distance. Returns `None` if the graph is empty.
    ///
    /// The lookup goes through a [KdTree] which is lazily (re)built
    /// after node changes, making the first call after a change O(n log n)
    /// and subsequent calls logarithmic.
    pub fn find_nearest_node(&self, position: Position) -> Option<Node> {
        let mut cache = self.nearest.borrow_mut();
        if cache.is_none() {
            *cache = KdTree::from_iter(self.iter().map(|&n| (n.position, n)));
        }
        cache.as_ref().map(|tree| tree.find_nearest(position))
    }

    /// Gets all outgoing [Edges](Edge) from a node with a given id.
    pub fn get_edges(&self, from_id: i64) -> &[Edge] {
        self.nodes
            .get(&from_id)
            .map(|(_, e)| e.as_slice())
            .unwrap_or_default()
    }

    /// Gets the cost of an [Edge] from one node to another.
    /// If such an edge doesn't exist, returns [f64::INFINITY].
    pub fn get_edge(&self, from_id: i64, to_id: i64) -> f64 {
        self.nodes
            .get(&from_id)
            .and_then(|(_, e)| {
                e.iter().find_map(|edge| {
                    if edge.to == to_id {
                        Some(edge.cost)
                    } else {
                        None
                    }
                })
            })
            .unwrap_or(f64::INFINITY)
    }

    /// Creates or updates an [Edge] from a node with a given id.
    /// Duplicate edges between the same pair of nodes are collapsed
    /// to the cheapest one.
    ///
    /// Returns `true` if an edge between the two nodes already existed,
    /// `false` if a new edge was created.
    ///
    /// If `from_id` or `edge.to` doesn't exist in the graph, does nothing and returns `false`.
    pub fn set_edge(&mut self, from_id: i64, edge: Edge) -> bool {
        assert_ne!(from_id, 0);
        assert_ne!(edge.to, 0);

        if !self.nodes.contains_key(&edge.to) {
            return false;
        }

        if let Some((_, edges)) = self.nodes.get_mut(&from_id) {
            if let Some(candidate) = edges.iter_mut().find(|e| e.to == edge.to) {
                if edge.cost < candidate.cost {
                    candidate.cost = edge.cost;
                }
                return true;
            } else {
                edges.push(edge);
            }
        }

        false
    }

    /// Removes an edge from one node to another. If no such edge exists, does nothing.
    ///
    /// Returns `true` if an edge was removed, `false` otherwise.
    pub fn delete_edge(&mut self, from_id: i64, to_id: i64) -> bool {
        if let Some((_, edges)) = self.nodes.get_mut(&from_id) {
            if let Some(idx) = edges.iter().position(|edge| edge.to == to_id) {
                edges.swap_remove(idx);
                return true;
            }
        }

        false
    }
}

impl GraphLike for SimpleGraph {
    fn get_node(&self, id: i64) -> Option<Node> {
        self.nodes.get(&id).map(|&(node, _)| node)
    }

    fn edges_from(&self, id: i64) -> impl Iterator<Item = Edge> + '_ {
        self.get_edges(id).iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, lat: f64, lon: f64) -> Node {
        Node {
            id,
            position: Position::new(lat, lon),
        }
    }

    #[test]
    fn set_and_get_node() {
        let mut g = SimpleGraph::default();
        assert!(!g.set_node(node(1, 0.1, 0.2)));
        assert!(g.set_node(node(1, 0.1, 0.2)));
        assert_eq!(g.get_node(1), Some(node(1, 0.1, 0.2)));
        assert_eq!(g.get_node(2), None);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn set_edge_deduplicates_by_min_cost() {
        let mut g = SimpleGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 0.1));

        assert!(!g.set_edge(1, Edge { to: 2, cost: 30.0 }));
        assert!(g.set_edge(1, Edge { to: 2, cost: 20.0 }));
        assert_eq!(g.get_edge(1, 2), 20.0);

        // A more expensive duplicate must not win
        assert!(g.set_edge(1, Edge { to: 2, cost: 25.0 }));
        assert_eq!(g.get_edge(1, 2), 20.0);
    }

    #[test]
    fn set_edge_to_unknown_node() {
        let mut g = SimpleGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        assert!(!g.set_edge(1, Edge { to: 2, cost: 30.0 }));
        assert_eq!(g.get_edges(1), &[]);
    }

    #[test]
    fn delete_edge() {
        let mut g = SimpleGraph::default();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 0.1));
        g.set_edge(1, Edge { to: 2, cost: 30.0 });

        assert!(g.delete_edge(1, 2));
        assert!(!g.delete_edge(1, 2));
        assert_eq!(g.get_edge(1, 2), f64::INFINITY);
    }

    #[test]
    fn find_nearest_node() {
        let mut g = SimpleGraph::default();
        assert_eq!(g.find_nearest_node(Position::new(0.0, 0.0)), None);

        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.1, 0.0));
        g.set_node(node(3, 0.2, 0.0));
        assert_eq!(g.find_nearest_node(Position::new(0.09, 0.01)).unwrap().id, 2);

        // The cached tree must be invalidated by node changes
        g.set_node(node(4, 0.09, 0.01));
        assert_eq!(g.find_nearest_node(Position::new(0.09, 0.01)).unwrap().id, 4);
        g.delete_node(4);
        assert_eq!(g.find_nearest_node(Position::new(0.09, 0.01)).unwrap().id, 2);
    }

    #[test]
    fn turn_check_allows() {
        assert!(TurnCheck::None.allows(1));
        assert!(TurnCheck::Prohibit(vec![2, 3]).allows(1));
        assert!(!TurnCheck::Prohibit(vec![2, 3]).allows(3));
        assert!(TurnCheck::Mandate(vec![2]).allows(2));
        assert!(!TurnCheck::Mandate(vec![2]).allows(1));
        assert!(!TurnCheck::Mandate(vec![]).allows(1));
    }
}
