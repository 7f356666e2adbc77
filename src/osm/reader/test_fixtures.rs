// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Shared test data: a small road network around a single junction,
//! available as an OSM XML document and as expected feature records.

use std::collections::HashMap;

use super::model::{FeatureType, Node, Relation, RelationMember, Way};
use crate::Position;

pub(crate) const SIMPLE_XML: &[u8] = include_bytes!("test_fixtures/simple.osm");

macro_rules! tags {
    {} => { HashMap::default() };
    {$( $k:literal : $v:literal ),+} => {
        HashMap::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
    };
}

pub(crate) fn expected_features() -> (Vec<Node>, Vec<Way>, Vec<Relation>) {
    let nodes = vec![
        Node {
            id: -1,
            position: Position::new(50.05, 19.92),
            tags: tags! {},
        },
        Node {
            id: -2,
            position: Position::new(50.05, 19.93),
            tags: tags! {"crossing": "traffic_signals"},
        },
        Node {
            id: -3,
            position: Position::new(50.06, 19.93),
            tags: tags! {},
        },
        Node {
            id: -4,
            position: Position::new(50.05, 19.94),
            tags: tags! {},
        },
        Node {
            id: -5,
            position: Position::new(50.04, 19.93),
            tags: tags! {},
        },
    ];

    let ways = vec![
        Way {
            id: -100,
            nodes: vec![-1, -2],
            tags: tags! {"highway": "primary", "name": "Main & First"},
        },
        Way {
            id: -101,
            nodes: vec![-2, -3],
            tags: tags! {"highway": "residential", "oneway": "yes"},
        },
        Way {
            id: -102,
            nodes: vec![-2, -4],
            tags: tags! {"highway": "unclassified"},
        },
        Way {
            id: -103,
            nodes: vec![-2, -5],
            tags: tags! {"highway": "unclassified"},
        },
    ];

    let relations = vec![
        Relation {
            id: -200,
            members: vec![
                RelationMember {
                    type_: FeatureType::Way,
                    ref_: -100,
                    role: "from".to_string(),
                },
                RelationMember {
                    type_: FeatureType::Node,
                    ref_: -2,
                    role: "via".to_string(),
                },
                RelationMember {
                    type_: FeatureType::Way,
                    ref_: -102,
                    role: "to".to_string(),
                },
            ],
            tags: tags! {"type": "restriction", "restriction": "no_left_turn"},
        },
        Relation {
            id: -201,
            members: vec![
                RelationMember {
                    type_: FeatureType::Way,
                    ref_: -100,
                    role: "from".to_string(),
                },
                RelationMember {
                    type_: FeatureType::Node,
                    ref_: -2,
                    role: "via".to_string(),
                },
                RelationMember {
                    type_: FeatureType::Way,
                    ref_: -103,
                    role: "to".to_string(),
                },
            ],
            tags: tags! {"type": "restriction", "restriction": "no_right_turn", "except": "motorcar"},
        },
    ];

    (nodes, ways, relations)
}
