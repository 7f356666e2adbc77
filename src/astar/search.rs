// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashMap};

use crate::{haversine_earth_distance, AStarError, GraphLike, Position, TurnCheck};

/// State of the route search. Keeping the previous node around
/// makes it possible to enforce turn restrictions and to forbid
/// immediate turnarounds, at the price of a larger search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct SearchState {
    pub(super) previous: Option<i64>,
    pub(super) current: i64,
}

#[derive(Debug, Clone)]
struct QueueItem {
    at: SearchState,

    /// Most recently visited nodes, ending with `at.current`.
    /// Bounded by the graph's longest restriction prefix.
    tail: Vec<i64>,

    cost: f64,
    score: f64,

    /// Push counter, so that items with equal scores pop in insertion order.
    seq: u64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of comparison, as lower scores are
        // considered better ("higher"), and Rust's BinaryHeap is a max-heap.
        // Equal scores fall back to the reverted push order (FIFO).
        other
            .score
            .partial_cmp(&self.score)
            .expect("scores must not be NaN")
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn reconstruct_path(came_from: &HashMap<SearchState, SearchState>, mut last: SearchState) -> Vec<i64> {
    let mut path = vec![last.current];

    while let Some(&state) = came_from.get(&last) {
        path.push(state.current);
        last = state;
    }

    path.reverse();
    path
}

/// Core of the A* search, shared by [find_route] and
/// [find_route_without_turn_around](super::find_route_without_turn_around).
pub(super) fn search<G: GraphLike, D: Fn(Position, Position) -> f64>(
    g: &G,
    from_id: i64,
    to_id: i64,
    distance: D,
    step_limit: usize,
    allow_turn_around: bool,
) -> Result<Vec<i64>, AStarError> {
    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::default();
    let mut came_from: HashMap<SearchState, SearchState> = HashMap::default();
    let mut known_costs: HashMap<SearchState, f64> = HashMap::default();
    let mut steps: usize = 0;
    let mut seq: u64 = 0;

    // Turn restriction prefixes never match shorter tails, so the tail
    // only needs to remember this many nodes.
    let tail_capacity = g.longest_restriction().max(2);
    let has_restrictions = g.longest_restriction() != 0;

    let to_node = g
        .get_node(to_id)
        .ok_or(AStarError::InvalidReference(to_id))?;

    {
        let from_node = g
            .get_node(from_id)
            .ok_or(AStarError::InvalidReference(from_id))?;

        let initial_at = SearchState {
            previous: None,
            current: from_id,
        };
        known_costs.insert(initial_at, 0.0);
        queue.push(QueueItem {
            at: initial_at,
            tail: vec![from_id],
            cost: 0.0,
            score: distance(from_node.position, to_node.position),
            seq,
        });
    }

    while let Some(item) = queue.pop() {
        if item.at.current == to_id {
            return Ok(reconstruct_path(&came_from, item.at));
        }

        // Contrary to the Wikipedia definition, we might keep multiple items
        // in the queue for the same state.
        if item.cost > known_costs.get(&item.at).copied().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if steps > step_limit {
            return Err(AStarError::StepLimitExceeded);
        }

        let check = if has_restrictions {
            g.turn_restriction(&item.tail)
        } else {
            TurnCheck::None
        };

        for edge in g.edges_from(item.at.current) {
            assert_ne!(edge.to, 0);

            // Check if the referred node exists
            let neighbor = match g.get_node(edge.to) {
                Some(n) => n,
                None => continue,
            };

            // Forbid turnarounds (A-B-A) when requested
            if !allow_turn_around && item.at.previous == Some(edge.to) {
                continue;
            }

            // Honor turn restrictions along the traversed tail
            if !check.allows(edge.to) {
                continue;
            }

            // Check if this is the cheapest way to the neighbor
            let neighbor_at = SearchState {
                previous: Some(item.at.current),
                current: edge.to,
            };
            let neighbor_cost = item.cost + edge.cost;
            if neighbor_cost
                > known_costs
                    .get(&neighbor_at)
                    .copied()
                    .unwrap_or(f64::INFINITY)
            {
                continue;
            }

            let mut tail = item.tail.clone();
            tail.push(edge.to);
            if tail.len() > tail_capacity {
                tail.remove(0);
            }

            // Push the new item into the queue
            came_from.insert(neighbor_at, item.at);
            known_costs.insert(neighbor_at, neighbor_cost);
            seq += 1;
            queue.push(QueueItem {
                at: neighbor_at,
                tail,
                cost: neighbor_cost,
                score: neighbor_cost + distance(neighbor.position, to_node.position),
                seq,
            });
        }
    }

    Ok(vec![])
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the shortest route between two nodes in the provided graph,
/// with the haversine distance as the heuristic.
///
/// Returns an empty vector if there is no route between the two nodes.
///
/// Turn restrictions reported by the graph are honored: the search remembers
/// the previous node of every candidate and enough of the traversed tail to
/// query [GraphLike::turn_restriction] with restriction-prefix-sized
/// sequences. For graphs with turn restrictions consider
/// [find_route_without_turn_around](super::find_route_without_turn_around),
/// as this function will generate instructions with immediate turnarounds
/// (A-B-A) to circumvent any restrictions.
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before returning [AStarError::StepLimitExceeded]. Concluding that no route exists requires
/// expanding all nodes accessible from the start, which is usually very time-consuming,
/// especially on large datasets (like the whole planet). The recommended value is
/// [DEFAULT_STEP_LIMIT](crate::DEFAULT_STEP_LIMIT).
pub fn find_route<G: GraphLike>(
    g: &G,
    from_id: i64,
    to_id: i64,
    step_limit: usize,
) -> Result<Vec<i64>, AStarError> {
    search(g, from_id, to_id, haversine_earth_distance, step_limit, true)
}

/// Same as [find_route], with a custom heuristic distance function.
///
/// The heuristic must be admissible: it may never overestimate the cost of
/// reaching the end node, otherwise the returned route may not be the
/// shortest one. This is not checked. The default haversine heuristic is
/// only admissible when edge costs are at least the crow-flies distance
/// between nodes, in meters; for graphs with other cost models pass
/// something appropriate (e.g. [crate::euclidean_distance], or `|_, _| 0.0`
/// to degrade into Dijkstra's algorithm).
pub fn find_route_with_distance<G: GraphLike, D: Fn(Position, Position) -> f64>(
    g: &G,
    from_id: i64,
    to_id: i64,
    distance: D,
    step_limit: usize,
) -> Result<Vec<i64>, AStarError> {
    search(g, from_id, to_id, distance, step_limit, true)
}
