// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::search::search;
use crate::{haversine_earth_distance, AStarError, GraphLike, Position};

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the shortest route between two nodes in the provided graph,
/// while never immediately returning along the edge it arrived on
/// (the returned route cannot contain an A-B-A subsequence).
///
/// Returns an empty vector if there is no route between the two nodes.
///
/// For graphs with turn restrictions, prefer this function over
/// [find_route](crate::find_route): a plain search is free to dodge any
/// restriction by a quick turnaround just after it (A-B-A), which on real
/// road networks is rarely legal or desirable. Note that this does not
/// forbid u-turns altogether - a route may still turn around at the end of
/// a dead-end street by passing through a distinct node first.
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before returning [AStarError::StepLimitExceeded]. Concluding that no route exists requires
/// expanding all nodes accessible from the start, which is usually very time-consuming,
/// especially on large datasets (like the whole planet). The recommended value is
/// [DEFAULT_STEP_LIMIT](crate::DEFAULT_STEP_LIMIT).
pub fn find_route_without_turn_around<G: GraphLike>(
    g: &G,
    from_id: i64,
    to_id: i64,
    step_limit: usize,
) -> Result<Vec<i64>, AStarError> {
    search(g, from_id, to_id, haversine_earth_distance, step_limit, false)
}

/// Same as [find_route_without_turn_around], with a custom heuristic
/// distance function. The heuristic must be admissible, see
/// [find_route_with_distance](crate::find_route_with_distance).
pub fn find_route_without_turn_around_with_distance<G, D>(
    g: &G,
    from_id: i64,
    to_id: i64,
    distance: D,
    step_limit: usize,
) -> Result<Vec<i64>, AStarError>
where
    G: GraphLike,
    D: Fn(Position, Position) -> f64,
{
    search(g, from_id, to_id, distance, step_limit, false)
}

#[cfg(test)]
mod tests {
    use super::super::search::tests::{graph_from, RestrictedGraph};
    use super::*;
    use crate::{euclidean_distance, find_route_with_distance, TurnCheck, DEFAULT_STEP_LIMIT};
    use std::collections::HashMap;

    #[test]
    fn trivial_self_route() {
        let g = graph_from(
            &[(1, 0.0, 0.0), (2, 0.0, 1.0)],
            &[(1, 2, 1.0), (2, 1, 1.0)],
        );
        assert_eq!(
            find_route_without_turn_around(&g, 1, 1, DEFAULT_STEP_LIMIT),
            Ok(vec![1]),
        );
    }

    #[test]
    fn simple_route() {
        let g = graph_from(
            &[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 2.0)],
            &[(1, 2, 1.0), (2, 1, 1.0), (2, 3, 1.0), (3, 2, 1.0)],
        );
        assert_eq!(
            find_route_without_turn_around_with_distance(
                &g,
                1,
                3,
                euclidean_distance,
                DEFAULT_STEP_LIMIT,
            ),
            Ok(vec![1, 2, 3]),
        );
    }

    #[test]
    fn restriction_cannot_be_circumvented() {
        //     4
        //     │
        // 1───2───3
        // no 1-2-3, all edges two-way
        let g = RestrictedGraph {
            graph: graph_from(
                &[(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 2.0), (4, 1.0, 1.0)],
                &[
                    (1, 2, 1.0),
                    (2, 1, 1.0),
                    (2, 3, 1.0),
                    (3, 2, 1.0),
                    (2, 4, 1.0),
                    (4, 2, 1.0),
                ],
            ),
            restrictions: HashMap::from([(vec![1, 2], TurnCheck::Prohibit(vec![3]))]),
            longest: 2,
        };

        // A plain search dodges the restriction with an immediate turnaround...
        assert_eq!(
            find_route_with_distance(&g, 1, 3, euclidean_distance, DEFAULT_STEP_LIMIT),
            Ok(vec![1, 2, 4, 2, 3]),
        );

        // ...which this variant does not permit.
        assert_eq!(
            find_route_without_turn_around_with_distance(
                &g,
                1,
                3,
                euclidean_distance,
                DEFAULT_STEP_LIMIT,
            ),
            Ok(vec![]),
        );
    }

    #[test]
    fn mandatory_turn_takes_the_long_way() {
        // 1
        // │
        // 2─────4
        // │     │
        // 3─────5
        // only 1-2-4
        let g = RestrictedGraph {
            graph: graph_from(
                &[
                    (1, 2.0, 0.0),
                    (2, 1.0, 0.0),
                    (3, 0.0, 0.0),
                    (4, 1.0, 1.0),
                    (5, 0.0, 1.0),
                ],
                &[
                    (1, 2, 10.0),
                    (2, 1, 10.0),
                    (2, 3, 10.0),
                    (2, 4, 10.0),
                    (3, 2, 10.0),
                    (3, 5, 10.0),
                    (4, 2, 10.0),
                    (4, 5, 100.0),
                    (5, 3, 10.0),
                    (5, 4, 100.0),
                ],
            ),
            restrictions: HashMap::from([(vec![1, 2], TurnCheck::Mandate(vec![4]))]),
            longest: 2,
        };

        // The plain search turns right back around at 4
        assert_eq!(
            find_route_with_distance(&g, 1, 3, euclidean_distance, DEFAULT_STEP_LIMIT),
            Ok(vec![1, 2, 4, 2, 3]),
        );

        // Without turnarounds, the expensive detour through 5 is the only option
        assert_eq!(
            find_route_without_turn_around_with_distance(
                &g,
                1,
                3,
                euclidean_distance,
                DEFAULT_STEP_LIMIT,
            ),
            Ok(vec![1, 2, 4, 5, 3]),
        );
    }

    #[test]
    fn routes_never_contain_immediate_turn_arounds() {
        let g = graph_from(
            &[
                (1, 0.0, 0.0),
                (2, 0.0, 1.0),
                (3, 0.0, 2.0),
                (4, 1.0, 1.0),
            ],
            &[
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 4, 1.0),
                (4, 2, 1.0),
                (2, 3, 5.0),
                (3, 2, 5.0),
            ],
        );
        let route = find_route_without_turn_around_with_distance(
            &g,
            1,
            3,
            euclidean_distance,
            DEFAULT_STEP_LIMIT,
        )
        .unwrap();
        assert!(!route.is_empty());
        for window in route.windows(3) {
            assert_ne!(window[0], window[2], "turn-around in {:?}", route);
        }
    }
}
