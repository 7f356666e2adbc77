// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{haversine_earth_distance, Position};

/// KdTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree),
/// which can be used to speed up nearest-neighbor search for large datasets. Practice shows
/// that a linear scan over all nodes takes significantly more time than
/// [crate::find_route] when generating multiple routes. A k-d tree
/// can help with that, trading memory usage for CPU time.
///
/// The tree splits on latitude and longitude alternately, but distances are
/// measured with [haversine_earth_distance]. A subtree is only pruned when the
/// great-circle distance to its splitting plane exceeds the best candidate so far,
/// which keeps the search correct even though a degree of longitude shrinks
/// with latitude. Behavior is undefined when points are close to the
/// antimeridian (180°/-180° longitude) or poles (90°/-90° latitude).
#[derive(Debug, Clone)]
pub struct KdTree<T> {
    position: Position,
    item: T,
    left: Option<Box<KdTree<T>>>,
    right: Option<Box<KdTree<T>>>,
}

impl<T: Copy> KdTree<T> {
    /// Finds the item closest to the given position, as measured by
    /// [haversine_earth_distance]. Ties are broken arbitrarily.
    pub fn find_nearest(&self, query: Position) -> T {
        self.find_nearest_impl(query, false).0
    }

    fn find_nearest_impl(&self, query: Position, lon_divides: bool) -> (T, f64) {
        // Start by assuming that the pivot is the closest
        let mut best = self.item;
        let mut best_dist = haversine_earth_distance(query, self.position);

        // Select which branch to recurse into first
        let first_left = if lon_divides {
            query.lon < self.position.lon
        } else {
            query.lat < self.position.lat
        };
        let (first, second) = if first_left {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        // Recurse into the first branch
        if let Some(ref branch) = first {
            let (alt, alt_dist) = branch.find_nearest_impl(query, !lon_divides);
            if alt_dist < best_dist {
                best = alt;
                best_dist = alt_dist;
            }
        }

        // (Optionally) recurse into the second branch
        if let Some(ref branch) = second {
            // A closer item is possible in the second branch if and only if
            // the splitting axis is closer than the current best candidate.
            let on_axis = if lon_divides {
                Position::new(query.lat, self.position.lon)
            } else {
                Position::new(self.position.lat, query.lon)
            };
            let dist_to_axis = haversine_earth_distance(query, on_axis);

            if dist_to_axis < best_dist {
                let (alt, alt_dist) = branch.find_nearest_impl(query, !lon_divides);
                if alt_dist < best_dist {
                    best = alt;
                    best_dist = alt_dist;
                }
            }
        }

        (best, best_dist)
    }

    /// Builds a k-d tree from an iterable of positioned items.
    /// Returns `None` if the iterable was empty.
    pub fn from_iter<I: IntoIterator<Item = (Position, T)>>(points: I) -> Option<Self> {
        let mut points = points.into_iter().collect::<Vec<_>>();
        Self::build(points.as_mut_slice())
    }

    /// Builds a k-d tree from a mutable slice of positioned items. Items will be
    /// reordered in the slice to facilitate building the tree.
    ///
    /// Returns `None` if the slice was empty.
    pub fn build(points: &mut [(Position, T)]) -> Option<Self> {
        Self::build_impl(points, false)
    }

    fn build_impl(points: &mut [(Position, T)], lon_divides: bool) -> Option<Self> {
        match points.len() {
            0 => None,
            1 => Some(Self {
                position: points[0].0,
                item: points[0].1,
                left: None,
                right: None,
            }),
            _ => {
                if lon_divides {
                    points.sort_by(|a, b| a.0.lon.partial_cmp(&b.0.lon).unwrap());
                } else {
                    points.sort_by(|a, b| a.0.lat.partial_cmp(&b.0.lat).unwrap());
                }
                let median = points.len() / 2;
                let (position, item) = points[median];
                let (left, right_and_pivot) = points.split_at_mut(median);
                let right = &mut right_and_pivot[1..];
                Some(Self {
                    position,
                    item,
                    left: box_option(Self::build_impl(left, !lon_divides)),
                    right: box_option(Self::build_impl(right, !lon_divides)),
                })
            }
        }
    }
}

#[inline]
fn box_option<T>(o: Option<T>) -> Option<Box<T>> {
    o.map(|thing| Box::new(thing))
}
