// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::profile::{Profile, TurnRestriction};
use super::reader::{self, model, FeatureReader, FileFormat};
use crate::{haversine_earth_distance, Edge, GraphLike, Node, Position, SimpleGraph, TurnCheck};

/// A routing graph built from OpenStreetMap data, as interpreted by a
/// [Profile]: a [SimpleGraph] of nodes and edges enriched with a
/// [turn restriction](https://wiki.openstreetmap.org/wiki/Relation:restriction) table.
///
/// Edge costs are the haversine distance between nodes (in meters)
/// multiplied by the profile's way penalty. Duplicate edges between two
/// nodes collapse to the cheapest one.
///
/// Restrictions are not materialized in the edge set. Instead, each
/// restriction's node sequence is stored under its prefixes, and route
/// finding asks [OsmGraph::turn_restriction] about the traversed tail
/// before expanding a candidate node.
#[derive(Debug, Clone)]
pub struct OsmGraph<P: Profile> {
    profile: P,
    graph: SimpleGraph,
    restrictions: RestrictionTable,
}

impl<P: Profile> OsmGraph<P> {
    pub fn new(profile: P) -> Self {
        Self {
            profile,
            graph: SimpleGraph::default(),
            restrictions: RestrictionTable::default(),
        }
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns `true` if there are no nodes in the graph.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Returns an iterator over all [Nodes](Node) in the graph.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.graph.iter()
    }

    /// Finds the closest [Node] to the given position,
    /// see [SimpleGraph::find_nearest_node].
    pub fn find_nearest_node(&self, position: Position) -> Option<Node> {
        self.graph.find_nearest_node(position)
    }

    /// Gets the cost of an edge between two nodes,
    /// or [f64::INFINITY] if no such edge exists.
    pub fn get_edge(&self, from_id: i64, to_id: i64) -> f64 {
        self.graph.get_edge(from_id, to_id)
    }

    /// Adds OpenStreetMap data to the graph.
    ///
    /// While it is permitted to call this function multiple times on the same
    /// graph, each call must be made with a complete, self-contained dataset.
    /// That is, ways may only refer to nodes from the `features` stream, and
    /// relations as well may only refer to ways and nodes from the `features`
    /// stream. Due to linear processing, a feature may only refer to features
    /// defined beforehand: first nodes, then ways, then relations, which is
    /// the ordering OSM files follow in practice.
    ///
    /// If called on a non-empty graph the data is merged:
    ///
    /// * for duplicate nodes - the already-existing data takes precedence,
    /// * for duplicate edges between two nodes - the cheaper one wins,
    /// * duplicate turn restrictions are stored once.
    ///
    /// Any issues with incoming OSM data are reported as warnings through
    /// the `osmroute.osm` log target.
    pub fn add_features<F: FeatureReader>(&mut self, features: F) -> Result<(), F::Error> {
        GraphBuilder::new(self).add_features(features)
    }

    /// Creates an [OsmGraph] from the provided profile and feature stream,
    /// see [OsmGraph::add_features].
    pub fn from_features<F: FeatureReader>(profile: P, features: F) -> Result<Self, F::Error> {
        let mut g = Self::new(profile);
        g.add_features(features)?;
        Ok(g)
    }

    /// Creates an [OsmGraph] from an OSM file at the provided path,
    /// in any supported [FileFormat].
    pub fn from_file<Q: AsRef<Path>>(
        profile: P,
        path: Q,
        format: FileFormat,
    ) -> Result<Self, reader::Error> {
        let features = reader::read_features_from_file(path, format)?;
        Self::from_features(profile, features)
    }
}

impl<P: Profile> GraphLike for OsmGraph<P> {
    fn get_node(&self, id: i64) -> Option<Node> {
        self.graph.get_node(id)
    }

    fn edges_from(&self, id: i64) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edges_from(id)
    }

    fn turn_restriction(&self, prefix: &[i64]) -> TurnCheck {
        self.restrictions.check(prefix)
    }

    fn longest_restriction(&self) -> usize {
        self.restrictions.longest_prefix
    }
}

/// Mapping from restriction prefixes (traversed node sequences) to the sets
/// of forbidden and mandated successors. Built once by the [GraphBuilder],
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
struct RestrictionTable {
    prefixes: HashMap<Vec<i64>, PrefixRestrictions>,
    longest_prefix: usize,
}

#[derive(Debug, Clone, Default)]
struct PrefixRestrictions {
    forbidden: Vec<i64>,
    mandated: Option<Vec<i64>>,
}

impl RestrictionTable {
    /// Stores a prohibitory restriction `[n0, ..., nk]`: after traversing
    /// `n0..nk-1`, continuing to `nk` is forbidden.
    fn insert_prohibitory(&mut self, nodes: &[i64]) {
        let (&last, prefix) = nodes.split_last().expect("restrictions have >= 3 nodes");
        let entry = self.prefixes.entry(prefix.to_vec()).or_default();
        if !entry.forbidden.contains(&last) {
            entry.forbidden.push(last);
        }
        self.longest_prefix = self.longest_prefix.max(prefix.len());
    }

    /// Stores a mandatory restriction `[n0, ..., nk]`: after traversing
    /// `n0-n1`, the route must continue through `n2, ..., nk`. Every prefix
    /// of the sequence mandates its successor, so that the whole chain is
    /// enforced step by step.
    fn insert_mandatory(&mut self, nodes: &[i64]) {
        for j in 2..nodes.len() {
            let prefix = &nodes[..j];
            let next = nodes[j];

            let entry = self.prefixes.entry(prefix.to_vec()).or_default();
            match &mut entry.mandated {
                None => entry.mandated = Some(vec![next]),
                // Overlapping mandates must all hold; possibly leaving
                // no legal successor at all.
                Some(mandated) => mandated.retain(|&t| t == next),
            }
            self.longest_prefix = self.longest_prefix.max(prefix.len());
        }
    }

    /// Computes the restriction verdict for a traversed node sequence.
    /// Every stored prefix matching a suffix of `tail` applies
    /// independently: forbidden sets are unioned, mandated sets are
    /// intersected, and forbidden nodes are dropped from the mandate.
    fn check(&self, tail: &[i64]) -> TurnCheck {
        let mut forbidden: Vec<i64> = Vec::new();
        let mut mandated: Option<Vec<i64>> = None;

        for len in 2..=self.longest_prefix.min(tail.len()) {
            if let Some(entry) = self.prefixes.get(&tail[tail.len() - len..]) {
                for &target in &entry.forbidden {
                    if !forbidden.contains(&target) {
                        forbidden.push(target);
                    }
                }
                if let Some(targets) = &entry.mandated {
                    mandated = Some(match mandated {
                        None => targets.clone(),
                        Some(mut merged) => {
                            merged.retain(|t| targets.contains(t));
                            merged
                        }
                    });
                }
            }
        }

        match mandated {
            Some(mut targets) => {
                targets.retain(|t| !forbidden.contains(t));
                TurnCheck::Mandate(targets)
            }
            None if !forbidden.is_empty() => TurnCheck::Prohibit(forbidden),
            None => TurnCheck::None,
        }
    }
}

/// Helper object holding the state needed while converting a batch of
/// [OSM features](model::Feature) into an [OsmGraph].
struct GraphBuilder<'a, P: Profile> {
    g: &'a mut OsmGraph<P>,
    unused_nodes: HashSet<i64>,
    way_nodes: HashMap<i64, Vec<i64>>,
}

impl<'a, P: Profile> GraphBuilder<'a, P> {
    fn new(g: &'a mut OsmGraph<P>) -> Self {
        Self {
            g,
            unused_nodes: HashSet::default(),
            way_nodes: HashMap::default(),
        }
    }

    fn add_features<F: FeatureReader>(&mut self, features: F) -> Result<(), F::Error> {
        for f in features {
            self.add_feature(f?);
        }
        self.cleanup();
        Ok(())
    }

    fn cleanup(&mut self) {
        for &id in &self.unused_nodes {
            self.g.graph.delete_node(id);
        }
    }

    fn add_feature(&mut self, f: model::Feature) {
        match f {
            model::Feature::Node(n) => self.add_node(n),
            model::Feature::Way(w) => self.add_way(w),
            model::Feature::Relation(r) => self.add_relation(r),
        }
    }

    fn add_node(&mut self, n: model::Node) {
        // Node already exists - the existing data takes precedence
        if self.g.graph.get_node(n.id).is_some() {
            return;
        }

        if n.id == 0 {
            log::warn!(target: "osmroute.osm", "node with invalid id 0 - ignoring");
            return;
        }

        self.g.graph.set_node(Node {
            id: n.id,
            position: n.position,
        });
        self.unused_nodes.insert(n.id);
    }

    fn add_way(&mut self, w: model::Way) {
        let penalty = match self.get_way_penalty(&w) {
            Some(p) => p,
            None => return,
        };

        let nodes = self.get_way_nodes(&w);
        if nodes.is_empty() {
            return;
        }

        let (forward, backward) = self.g.profile.way_direction(&w.tags);
        if !forward && !backward {
            return;
        }

        self.create_edges(&nodes, penalty, forward, backward);
        self.update_state_after_adding_way(w.id, nodes);
    }

    /// Gets the penalty applicable for the provided way and validates it.
    /// Returns `None` for non-routable ways, otherwise a valid (>= 1) penalty.
    fn get_way_penalty(&self, w: &model::Way) -> Option<f64> {
        match self.g.profile.way_penalty(&w.tags) {
            None => None,
            Some(penalty) if !penalty.is_finite() || penalty < 1.0 => {
                log::error!(
                    target: "osmroute",
                    "profile {} returned invalid penalty {} - assuming non-routable",
                    self.g.profile.name(),
                    penalty,
                );
                None
            }
            Some(penalty) => Some(penalty),
        }
    }

    fn get_way_nodes(&self, w: &model::Way) -> Vec<i64> {
        // Check if the way has enough nodes
        if w.nodes.len() < 2 {
            log::warn!(target: "osmroute.osm", "way {} has less than 2 nodes - ignoring", w.id);
            return vec![];
        }

        // Filter out invalid references
        // NOTE: We don't warn about invalid references, as the referenced
        //       nodes may have been deliberately filtered out of the data.
        //       We're not an OSM validator.
        let nodes: Vec<i64> = w
            .nodes
            .iter()
            .copied()
            .filter(|&node_id| self.g.graph.get_node(node_id).is_some())
            .collect();

        if nodes.len() < 2 {
            vec![]
        } else {
            nodes
        }
    }

    fn create_edges(&mut self, nodes: &[i64], penalty: f64, forward: bool, backward: bool) {
        debug_assert!(nodes.len() >= 2);
        debug_assert!(penalty.is_finite() && penalty >= 1.0);
        debug_assert!(forward || backward);

        for pair in nodes.windows(2) {
            let left = self
                .g
                .graph
                .get_node(pair[0])
                .expect("get_way_nodes should only return nodes which exist");

            let right = self
                .g
                .graph
                .get_node(pair[1])
                .expect("get_way_nodes should only return nodes which exist");

            let cost = penalty * haversine_earth_distance(left.position, right.position);

            if forward {
                self.g.graph.set_edge(left.id, Edge { to: right.id, cost });
            }
            if backward {
                self.g.graph.set_edge(right.id, Edge { to: left.id, cost });
            }
        }
    }

    fn update_state_after_adding_way(&mut self, way_id: i64, nodes: Vec<i64>) {
        for node_id in &nodes {
            self.unused_nodes.remove(node_id);
        }
        self.way_nodes.insert(way_id, nodes);
    }

    fn add_relation(&mut self, r: model::Relation) {
        let kind = match self.g.profile.is_turn_restriction(&r.tags) {
            TurnRestriction::Inapplicable | TurnRestriction::Exempt => return,
            applicable => applicable,
        };

        match self.get_restriction_nodes(&r) {
            Ok(nodes) => self.store_restriction(r.id, &nodes, kind),
            Err(e) => e.log(r.id),
        }
    }

    /// Returns the sequence of nodes representing a turn restriction.
    /// Only the last 2 nodes of the `from` member and the first 2 nodes
    /// of the `to` member are taken into account.
    fn get_restriction_nodes(
        &self,
        r: &model::Relation,
    ) -> Result<Vec<i64>, InvalidRestriction> {
        let members = Self::get_ordered_restriction_members(r)?;
        let mut member_nodes = members
            .iter()
            .map(|&m| self.get_relation_member_nodes(m))
            .collect::<Result<Vec<_>, _>>()?;
        Self::flatten_member_nodes(&mut member_nodes)
    }

    /// Returns a list of turn restriction members in the from-via-...-via-to
    /// order. Ensures there is exactly one `from`, exactly one `to` and at
    /// least one `via` member. Any other members are ignored.
    fn get_ordered_restriction_members(
        r: &model::Relation,
    ) -> Result<Vec<&model::RelationMember>, InvalidRestriction> {
        let mut from: Option<&model::RelationMember> = None;
        let mut to: Option<&model::RelationMember> = None;
        let mut order: Vec<&model::RelationMember> = vec![];

        for m in &r.members {
            match m.role.as_str() {
                "from" => {
                    if from.is_some() {
                        return Err(InvalidRestriction::MultipleFromMembers);
                    }
                    from = Some(m);
                }

                "via" => order.push(m),

                "to" => {
                    if to.is_some() {
                        return Err(InvalidRestriction::MultipleToMembers);
                    }
                    to = Some(m);
                }

                _ => {}
            }
        }

        match (from, order.is_empty(), to) {
            (Some(from), false, Some(to)) => {
                order.insert(0, from);
                order.push(to);
                Ok(order)
            }
            (None, _, _) => Err(InvalidRestriction::MissingFromMember),
            (_, true, _) => Err(InvalidRestriction::MissingViaMember),
            (_, _, None) => Err(InvalidRestriction::MissingToMember),
        }
    }

    /// Returns a list of nodes corresponding to the given restriction member.
    ///
    /// [FeatureType](model::FeatureType)`::Node` references are only
    /// permitted for `via` members, way references are permitted anywhere,
    /// and relation references are not permitted at all.
    fn get_relation_member_nodes(
        &self,
        m: &model::RelationMember,
    ) -> Result<Vec<i64>, InvalidRestriction> {
        match (m.type_, m.role.as_str()) {
            (model::FeatureType::Node, "via") => {
                if self.g.graph.get_node(m.ref_).is_some() {
                    Ok(vec![m.ref_])
                } else {
                    Err(InvalidRestriction::ReferenceToUnknownNode(m.ref_))
                }
            }

            (model::FeatureType::Way, _) => {
                if let Some(nodes) = self.way_nodes.get(&m.ref_) {
                    Ok(nodes.clone())
                } else {
                    Err(InvalidRestriction::ReferenceToUnknownWay(m.ref_))
                }
            }

            (type_, _) => Err(InvalidRestriction::InvalidMemberType(m.role.clone(), type_)),
        }
    }

    /// Turns a list of turn restriction members' nodes into the node sequence
    /// of the restriction itself. Only the last two nodes of the first member
    /// and the first two nodes of the last member are considered.
    fn flatten_member_nodes(members: &mut [Vec<i64>]) -> Result<Vec<i64>, InvalidRestriction> {
        assert!(members.len() >= 2);
        let mut nodes = vec![];

        for idx in 0..members.len() {
            assert!(!members[idx].is_empty());
            let is_first = idx == 0;
            let is_last = idx == members.len() - 1;

            // Reverse members to ensure the restriction is continuous
            if is_first {
                // First member needs to be reversed if its first node
                // matches the second member's first or last node.
                if members[idx].first() == members[1].first()
                    || members[idx].first() == members[1].last()
                {
                    // incorrect order, (B-A, B-C) or (B-A, C-B) case
                    members[idx].reverse();
                }
            } else {
                // Every non-first member needs to be reversed if its last node
                // matches the previous members' last node
                if nodes.last() == members[idx].last() {
                    members[idx].reverse();
                }
            }

            // Check if the restriction is continuous
            if !is_first && nodes.last() != members[idx].first() {
                return Err(InvalidRestriction::Disjoint);
            }

            // Merge the nodes
            if is_first {
                // "from" member - only care about the last 2 nodes; A-B-C-D → C-D
                assert!(members[idx].len() >= 2);
                nodes.extend_from_slice(&members[idx][members[idx].len() - 2..]);
            } else if is_last {
                // "to" member - only care about the first 2 nodes,
                // but the first node was appended as the last node of the previous member,
                // thus only append the second node
                // A-B-C-D → A-B -("A" appended in previous step)→ B
                assert!(members[idx].len() >= 2);
                nodes.push(members[idx][1]);
            } else {
                nodes.extend_from_slice(&members[idx][1..]);
            }
        }

        Ok(nodes)
    }

    /// Verifies that the restriction's route exists in the graph and
    /// records it in the restriction table.
    fn store_restriction(&mut self, relation_id: i64, nodes: &[i64], kind: TurnRestriction) {
        debug_assert!(nodes.len() >= 3);

        if nodes
            .windows(2)
            .any(|pair| !self.g.graph.get_edge(pair[0], pair[1]).is_finite())
        {
            log::warn!(
                target: "osmroute.osm",
                "turn restriction {}: {} a non-existing route - skipping",
                relation_id,
                if kind == TurnRestriction::Mandatory { "mandates" } else { "prohibits" },
            );
            return;
        }

        match kind {
            TurnRestriction::Prohibitory => self.g.restrictions.insert_prohibitory(nodes),
            TurnRestriction::Mandatory => self.g.restrictions.insert_mandatory(nodes),
            TurnRestriction::Inapplicable | TurnRestriction::Exempt => {
                unreachable!("store_restriction called with an inapplicable restriction")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum InvalidRestriction {
    #[error("disjoint turn restriction")]
    Disjoint,

    #[error("multiple 'from' members")]
    MultipleFromMembers,

    #[error("multiple 'to' members")]
    MultipleToMembers,

    #[error("missing 'from' member")]
    MissingFromMember,

    #[error("missing 'via' member")]
    MissingViaMember,

    #[error("missing 'to' member")]
    MissingToMember,

    #[error("reference to unknown node {0}")]
    ReferenceToUnknownNode(i64),

    #[error("reference to unknown way {0}")]
    ReferenceToUnknownWay(i64),

    #[error("member with role {0} can't be of type {1}")]
    InvalidMemberType(String, model::FeatureType),
}

impl InvalidRestriction {
    fn log(&self, relation_id: i64) {
        match self {
            // NOTE: We don't warn about invalid references, as they may have
            //       been deliberately filtered out of the data.
            //       We're not an OSM validator.
            Self::ReferenceToUnknownNode(_) => {}
            Self::ReferenceToUnknownWay(_) => {}

            _ => {
                log::warn!(target: "osmroute.osm", "relation {} - {} - ignoring", relation_id, self);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::profile::{CAR_PROFILE, FOOT_PROFILE};
    use super::super::reader::test_fixtures::SIMPLE_XML;
    use super::super::reader::{read_features, FileFormat};
    use super::*;
    use crate::{find_route, find_route_without_turn_around, DEFAULT_STEP_LIMIT};
    use std::collections::HashMap;
    use std::convert::Infallible;

    macro_rules! tags {
        {} => { HashMap::default() };
        {$( $k:literal : $v:literal ),+} => {
            HashMap::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    macro_rules! n {
        ($id:expr, $lat:expr, $lon:expr) => {
            model::Feature::Node(model::Node {
                id: $id,
                position: Position::new($lat, $lon),
                tags: HashMap::default(),
            })
        };
    }

    macro_rules! w {
        ($id:expr, $nodes:expr) => {
            w!($id, $nodes, tags! {"highway": "primary"})
        };

        ($id:expr, $nodes:expr, $tags:expr) => {
            model::Feature::Way(model::Way {
                id: $id,
                nodes: $nodes,
                tags: $tags,
            })
        };
    }

    macro_rules! m {
        ($type_:expr, $ref_:expr, $role:expr) => {
            model::RelationMember {
                type_: $type_,
                ref_: $ref_,
                role: $role.to_string(),
            }
        };
    }

    macro_rules! r {
        ($id:expr, $members:expr, $tags:expr) => {
            model::Feature::Relation(model::Relation {
                id: $id,
                members: $members,
                tags: $tags,
            })
        };
    }

    macro_rules! assert_edge {
        ($graph:expr, $from:expr, $to:expr) => {
            assert!($graph.get_edge($from, $to).is_finite());
        };
    }

    macro_rules! assert_no_edge {
        ($graph:expr, $from:expr, $to:expr) => {
            assert!($graph.get_edge($from, $to).is_infinite());
        };
    }

    fn build(features: Vec<model::Feature>) -> OsmGraph<HighwayProfileAlias> {
        OsmGraph::from_features(CAR_PROFILE, features.into_iter().map(Ok::<_, Infallible>))
            .unwrap()
    }

    type HighwayProfileAlias = super::super::profile::HighwayProfile<'static>;

    use super::super::reader::model::FeatureType::{Node as NodeRef, Way as WayRef};

    #[test]
    fn add_way() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.1, 0.1),
            w!(10, vec![1, 2, 3]),
        ]);

        assert_edge!(g, 1, 2);
        assert_edge!(g, 2, 3);
        assert_no_edge!(g, 1, 3);
        assert_edge!(g, 3, 2);
        assert_edge!(g, 2, 1);
        assert_no_edge!(g, 3, 1);
    }

    #[test]
    fn add_way_costs() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            w!(10, vec![1, 2], tags! {"highway": "residential"}),
        ]);

        let expected =
            15.0 * haversine_earth_distance(Position::new(0.0, 0.0), Position::new(0.1, 0.0));
        assert!((g.get_edge(1, 2) - expected).abs() < 1e-9);
        assert!((g.get_edge(2, 1) - expected).abs() < 1e-9);
    }

    #[test]
    fn add_way_one_way() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.1, 0.1),
            w!(10, vec![1, 2, 3], tags! {"highway": "primary", "oneway": "yes"}),
        ]);

        assert_edge!(g, 1, 2);
        assert_edge!(g, 2, 3);
        assert_no_edge!(g, 2, 1);
        assert_no_edge!(g, 3, 2);
    }

    #[test]
    fn add_way_not_routable() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            w!(10, vec![1, 2], tags! {"highway": "primary", "access": "no"}),
        ]);

        assert_no_edge!(g, 1, 2);
        assert_no_edge!(g, 2, 1);
        // Nodes not used by any routable way are dropped
        assert_eq!(g.len(), 0);
    }

    #[test]
    fn add_way_with_missing_nodes() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            w!(10, vec![1, 5, 2]),
        ]);

        // The missing segment is silently dropped, connecting 1 and 2 directly
        assert_edge!(g, 1, 2);
        assert_edge!(g, 2, 1);
    }

    #[test]
    fn duplicate_ways_merge_by_min_cost() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            w!(10, vec![1, 2], tags! {"highway": "residential"}),
            w!(11, vec![1, 2], tags! {"highway": "primary"}),
        ]);

        let expected =
            5.0 * haversine_earth_distance(Position::new(0.0, 0.0), Position::new(0.1, 0.0));
        assert!((g.get_edge(1, 2) - expected).abs() < 1e-9);
    }

    #[test]
    fn cleanup_removes_unused_nodes() {
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.3, 0.0),
            w!(10, vec![1, 2]),
        ]);

        assert_eq!(g.len(), 2);
        assert!(g.get_node(1).is_some());
        assert!(g.get_node(2).is_some());
        assert!(g.get_node(3).is_none());
        assert!(g.get_node(4).is_none());
    }

    fn junction() -> Vec<model::Feature> {
        //     4
        //     │
        // 1───2───3
        vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.1, 0.1),
            w!(10, vec![1, 2]),
            w!(11, vec![2, 3]),
            w!(12, vec![2, 4]),
        ]
    }

    #[test]
    fn prohibitory_restriction() {
        let mut features = junction();
        features.push(r!(
            20,
            vec![
                m!(WayRef, 10, "from"),
                m!(NodeRef, 2, "via"),
                m!(WayRef, 12, "to"),
            ],
            tags! {"type": "restriction", "restriction": "no_left_turn"}
        ));
        let g = build(features);

        assert_eq!(g.longest_restriction(), 2);
        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::Prohibit(vec![4]));
        assert_eq!(g.turn_restriction(&[3, 2]), TurnCheck::None);

        // Longer tails still match the two-node prefix
        assert_eq!(g.turn_restriction(&[7, 1, 2]), TurnCheck::Prohibit(vec![4]));

        // All edges stay intact; only route finding is constrained
        assert_edge!(g, 1, 2);
        assert_edge!(g, 2, 4);
        assert_eq!(
            find_route_without_turn_around(&g, 1, 4, DEFAULT_STEP_LIMIT),
            Ok(vec![]),
        );
        assert_eq!(
            find_route_without_turn_around(&g, 3, 4, DEFAULT_STEP_LIMIT),
            Ok(vec![3, 2, 4]),
        );
    }

    #[test]
    fn mandatory_restriction() {
        let mut features = junction();
        features.push(r!(
            20,
            vec![
                m!(WayRef, 10, "from"),
                m!(NodeRef, 2, "via"),
                m!(WayRef, 11, "to"),
            ],
            tags! {"type": "restriction", "restriction": "only_straight_on"}
        ));
        let g = build(features);

        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::Mandate(vec![3]));
        assert_eq!(
            find_route_without_turn_around(&g, 1, 4, DEFAULT_STEP_LIMIT),
            Ok(vec![]),
        );
        assert_eq!(
            find_route_without_turn_around(&g, 1, 3, DEFAULT_STEP_LIMIT),
            Ok(vec![1, 2, 3]),
        );
    }

    #[test]
    fn restriction_with_via_way() {
        //     5   6
        //     │   │
        // 1───2───3───4
        // no_left_turn: 1-2-3-6 (via way 11)
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.3, 0.0),
            n!(5, 0.1, 0.1),
            n!(6, 0.2, 0.1),
            w!(10, vec![1, 2]),
            w!(11, vec![2, 3]),
            w!(12, vec![3, 4]),
            w!(13, vec![2, 5]),
            w!(14, vec![3, 6]),
            r!(
                20,
                vec![
                    m!(WayRef, 10, "from"),
                    m!(WayRef, 11, "via"),
                    m!(WayRef, 14, "to"),
                ],
                tags! {"type": "restriction", "restriction": "no_left_turn"}
            ),
        ]);

        assert_eq!(g.longest_restriction(), 3);
        assert_eq!(g.turn_restriction(&[1, 2, 3]), TurnCheck::Prohibit(vec![6]));
        assert_eq!(g.turn_restriction(&[2, 3]), TurnCheck::None);

        assert_eq!(
            find_route_without_turn_around(&g, 1, 6, DEFAULT_STEP_LIMIT),
            Ok(vec![]),
        );
        assert_eq!(
            find_route_without_turn_around(&g, 5, 6, DEFAULT_STEP_LIMIT),
            Ok(vec![5, 2, 3, 6]),
        );
    }

    #[test]
    fn mandatory_restriction_with_via_way() {
        //     5   6
        //     │   │
        // 1───2───3───4
        // only_straight_on: 1-2-3-4 (via way 11)
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.3, 0.0),
            n!(5, 0.1, 0.1),
            n!(6, 0.2, 0.1),
            w!(10, vec![1, 2]),
            w!(11, vec![2, 3]),
            w!(12, vec![3, 4]),
            w!(13, vec![2, 5]),
            w!(14, vec![3, 6]),
            r!(
                20,
                vec![
                    m!(WayRef, 10, "from"),
                    m!(WayRef, 11, "via"),
                    m!(WayRef, 12, "to"),
                ],
                tags! {"type": "restriction", "restriction": "only_straight_on"}
            ),
        ]);

        // The chain is enforced step by step
        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::Mandate(vec![3]));
        assert_eq!(g.turn_restriction(&[1, 2, 3]), TurnCheck::Mandate(vec![4]));

        assert_eq!(
            find_route_without_turn_around(&g, 1, 6, DEFAULT_STEP_LIMIT),
            Ok(vec![]),
        );
        assert_eq!(
            find_route_without_turn_around(&g, 1, 4, DEFAULT_STEP_LIMIT),
            Ok(vec![1, 2, 3, 4]),
        );
        // Entering the junction from elsewhere is unrestricted
        assert_eq!(
            find_route_without_turn_around(&g, 5, 6, DEFAULT_STEP_LIMIT),
            Ok(vec![5, 2, 3, 6]),
        );
    }

    #[test]
    fn restriction_not_applicable_to_one_way() {
        //     4
        //     ↓
        // 1───2───3
        // no_left_turn 1-2-4, but the 2-4 edge doesn't exist
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.1, 0.1),
            w!(10, vec![1, 2]),
            w!(11, vec![2, 3]),
            w!(12, vec![4, 2], tags! {"highway": "primary", "oneway": "yes"}),
            r!(
                20,
                vec![
                    m!(WayRef, 10, "from"),
                    m!(NodeRef, 2, "via"),
                    m!(WayRef, 12, "to"),
                ],
                tags! {"type": "restriction", "restriction": "no_left_turn"}
            ),
        ]);

        assert_eq!(g.longest_restriction(), 0);
        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::None);
    }

    #[test]
    fn exempt_restriction_is_ignored() {
        let mut features = junction();
        features.push(r!(
            20,
            vec![
                m!(WayRef, 10, "from"),
                m!(NodeRef, 2, "via"),
                m!(WayRef, 12, "to"),
            ],
            tags! {
                "type": "restriction",
                "restriction": "no_left_turn",
                "except": "motorcar"
            }
        ));
        let g = build(features);

        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::None);
    }

    #[test]
    fn disjoint_restriction_is_skipped() {
        let mut features = junction();
        features.push(r!(
            20,
            vec![
                m!(WayRef, 10, "from"),
                m!(NodeRef, 4, "via"),
                m!(WayRef, 11, "to"),
            ],
            tags! {"type": "restriction", "restriction": "no_left_turn"}
        ));
        let g = build(features);

        assert_eq!(g.longest_restriction(), 0);
    }

    #[test]
    fn malformed_restriction_members_are_skipped() {
        let mut features = junction();
        // via as a way reference that was never seen
        features.push(r!(
            20,
            vec![
                m!(WayRef, 10, "from"),
                m!(WayRef, 99, "via"),
                m!(WayRef, 11, "to"),
            ],
            tags! {"type": "restriction", "restriction": "no_left_turn"}
        ));
        // two from members
        features.push(r!(
            21,
            vec![
                m!(WayRef, 10, "from"),
                m!(WayRef, 11, "from"),
                m!(NodeRef, 2, "via"),
                m!(WayRef, 12, "to"),
            ],
            tags! {"type": "restriction", "restriction": "no_left_turn"}
        ));
        // from as a node reference
        features.push(r!(
            22,
            vec![
                m!(NodeRef, 1, "from"),
                m!(NodeRef, 2, "via"),
                m!(WayRef, 12, "to")
            ],
            tags! {"type": "restriction", "restriction": "no_left_turn"}
        ));
        let g = build(features);

        assert_eq!(g.longest_restriction(), 0);
    }

    #[test]
    fn reversed_members_are_reoriented() {
        //     4
        //     │
        // 1───2───3
        // no_left_turn 1-2-4, with the member ways pointing away from the via node
        let g = build(vec![
            n!(1, 0.0, 0.0),
            n!(2, 0.1, 0.0),
            n!(3, 0.2, 0.0),
            n!(4, 0.1, 0.1),
            w!(10, vec![2, 1]),
            w!(11, vec![2, 3]),
            w!(12, vec![4, 2]),
            r!(
                20,
                vec![
                    m!(WayRef, 10, "from"),
                    m!(NodeRef, 2, "via"),
                    m!(WayRef, 12, "to"),
                ],
                tags! {"type": "restriction", "restriction": "no_left_turn"}
            ),
        ]);

        assert_eq!(g.turn_restriction(&[1, 2]), TurnCheck::Prohibit(vec![4]));
    }

    #[test]
    fn residential_two_node_way() {
        let g = OsmGraph::from_features(
            CAR_PROFILE,
            vec![
                n!(1, 0.0, 0.0),
                n!(2, 0.0, 0.01),
                w!(10, vec![1, 2], tags! {"highway": "residential"}),
            ]
            .into_iter()
            .map(Ok::<_, Infallible>),
        )
        .unwrap();

        assert_eq!(g.len(), 2);
        assert_edge!(g, 1, 2);
        assert_edge!(g, 2, 1);

        let g = OsmGraph::from_features(
            CAR_PROFILE,
            vec![
                n!(1, 0.0, 0.0),
                n!(2, 0.0, 0.01),
                w!(
                    10,
                    vec![1, 2],
                    tags! {"highway": "residential", "oneway": "yes"}
                ),
            ]
            .into_iter()
            .map(Ok::<_, Infallible>),
        )
        .unwrap();

        assert_edge!(g, 1, 2);
        assert_no_edge!(g, 2, 1);
    }

    #[test]
    fn from_xml_fixture_with_car_profile() {
        let features = read_features(SIMPLE_XML, FileFormat::Unknown).unwrap();
        let g = OsmGraph::from_features(CAR_PROFILE, features).unwrap();

        assert_eq!(g.len(), 5);
        assert_edge!(g, -1, -2);
        assert_edge!(g, -2, -1);
        assert_edge!(g, -2, -3); // oneway=yes
        assert_no_edge!(g, -3, -2);

        // no_left_turn from -1 through -2 onto -4 applies...
        assert_eq!(
            find_route_without_turn_around(&g, -1, -4, DEFAULT_STEP_LIMIT),
            Ok(vec![]),
        );
        // ...while the no_right_turn onto -5 excepts motorcars
        assert_eq!(
            find_route_without_turn_around(&g, -1, -5, DEFAULT_STEP_LIMIT),
            Ok(vec![-1, -2, -5]),
        );
        // plain find_route can still dodge the restriction with a turnaround
        assert_eq!(
            find_route(&g, -1, -4, DEFAULT_STEP_LIMIT),
            Ok(vec![-1, -2, -5, -2, -4]),
        );
    }

    #[test]
    fn from_xml_fixture_with_foot_profile() {
        let features = read_features(SIMPLE_XML, FileFormat::Unknown).unwrap();
        let g = OsmGraph::from_features(FOOT_PROFILE, features).unwrap();

        // Pedestrians ignore the oneway tag and generic turn restrictions
        assert_edge!(g, -3, -2);
        assert_eq!(g.longest_restriction(), 0);
        assert_eq!(
            find_route_without_turn_around(&g, -1, -4, DEFAULT_STEP_LIMIT),
            Ok(vec![-1, -2, -4]),
        );
    }
}
