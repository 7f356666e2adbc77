// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

/// Turn restriction kind indicator, returned by [Profile::is_turn_restriction].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRestriction {
    /// Not a turn restriction, or a turn restriction which does not apply
    /// for the current [Profile].
    Inapplicable,

    /// Following the route indicated by this restriction is forbidden.
    Prohibitory,

    /// The route must be followed after traversing an edge identified
    /// by the restriction's first two nodes.
    Mandatory,

    /// A turn restriction, but the current [Profile] is listed in its
    /// `except` tag and thus not bound by it.
    Exempt,
}

/// Describes how OpenStreetMap data should be converted into a routing graph:
/// which ways are traversable, at what penalty, in which direction, and
/// which relations are turn restrictions the graph must obey.
pub trait Profile {
    /// Human-readable name of the routing profile, customarily the most
    /// specific [access tag](https://wiki.openstreetmap.org/wiki/Key:access).
    /// Also used as the cache key by [LiveGraph](crate::osm::LiveGraph) and
    /// to match `type=restriction:NAME` relations.
    fn name(&self) -> &str;

    /// Returns the penalty for traversing a way with the provided tags,
    /// or `None` if the way is not traversable at all.
    ///
    /// The penalty is multiplied by each way segment's length to get the
    /// cost of traversing an edge, and thus must be finite and at least 1.
    fn way_penalty(&self, tags: &HashMap<String, String>) -> Option<f64>;

    /// Checks if a way with the provided tags is traversable forward
    /// (first return value) and backward (second return value).
    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool);

    /// Evaluates the [access tag hierarchy](https://wiki.openstreetmap.org/wiki/Key:access)
    /// to check whether a way with the provided tags may be used at all.
    fn is_access_allowed(&self, tags: &HashMap<String, String>) -> bool;

    /// Figures out what kind of [TurnRestriction] a relation with the
    /// provided tags represents for this profile.
    fn is_turn_restriction(&self, tags: &HashMap<String, String>) -> TurnRestriction;
}

/// Access tag values which deny the use of a way.
/// Any other present value is assumed to allow it.
const ACCESS_DENIED: &[&str] = &["no", "private", "agricultural", "forestry"];

fn get<'t>(tags: &'t HashMap<String, String>, key: &str) -> &'t str {
    tags.get(key).map(|v| v.as_str()).unwrap_or("")
}

/// Parses a `no_right_turn`-style restriction description into its kind.
fn restriction_kind(value: &str) -> TurnRestriction {
    let (kind, description) = value.split_once('_').unwrap_or(("", ""));

    match description {
        "right_turn" | "left_turn" | "u_turn" | "straight_on" => {}
        _ => return TurnRestriction::Inapplicable,
    }

    match kind {
        "no" => TurnRestriction::Prohibitory,
        "only" => TurnRestriction::Mandatory,
        _ => TurnRestriction::Inapplicable,
    }
}

/// Routing [Profile] over `highway=*` ways, honoring access tags,
/// one-way tags and turn restriction relations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighwayProfile<'a> {
    pub name: &'a str,

    /// Pairs of (highway tag value, penalty). Values are matched after
    /// [HighwayProfile::equivalent_highway_value] normalization, and the
    /// first match wins. All penalties must be finite and not less than one.
    pub penalties: &'a [(&'a str, f64)],

    /// [Access tags](https://wiki.openstreetmap.org/wiki/Key:access#Land-based_transportation)
    /// to consider when checking way prohibitions, in order from least to
    /// most specific. Also consulted for mode-specific one-way tags and
    /// turn restriction exemptions.
    pub access: &'a [&'a str],
}

impl<'a> HighwayProfile<'a> {
    /// Normalizes a bunch of highway tag values to nearly-equivalent ones,
    /// so that penalty tables don't have to repeat every `*_link` entry.
    pub fn equivalent_highway_value(value: &str) -> &str {
        match value {
            "motorway_link" => "motorway",
            "trunk_link" => "trunk",
            "primary_link" => "primary",
            "secondary_link" => "secondary",
            "tertiary_link" => "tertiary",
            "minor" => "unclassified",
            other => other,
        }
    }

    fn active_highway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        Self::equivalent_highway_value(get(tags, "highway"))
    }

    fn penalty_of(&self, highway_value: &str) -> Option<f64> {
        self.penalties
            .iter()
            .find(|&&(value, _)| value == highway_value)
            .map(|&(_, penalty)| penalty)
    }

    /// Returns the value of the most specific `oneway:MODE` tag
    /// (based on [HighwayProfile::access]), falling back to plain `oneway`,
    /// and an empty string if no relevant tag was found.
    fn active_oneway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        self.access
            .iter()
            .rev()
            .filter(|&&mode| mode != "access")
            .find_map(|&mode| tags.get(&format!("oneway:{}", mode)))
            .or_else(|| tags.get("oneway"))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    /// Returns the value of the most specific `restriction:MODE` tag
    /// (based on [HighwayProfile::access]), falling back to plain `restriction`,
    /// and an empty string if no relevant tag was found.
    fn active_restriction_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        self.access
            .iter()
            .rev()
            .filter(|&&mode| mode != "access")
            .find_map(|&mode| tags.get(&format!("restriction:{}", mode)))
            .or_else(|| tags.get("restriction"))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    fn restriction_type_matches(&self, tags: &HashMap<String, String>) -> bool {
        let type_ = get(tags, "type");
        type_ == "restriction"
            || type_
                .strip_prefix("restriction:")
                .is_some_and(|mode| mode == self.name)
    }

    /// Returns `true` if any of the transportation modes listed in the
    /// `except` tag is present in [HighwayProfile::access].
    fn is_exempted(&self, tags: &HashMap<String, String>) -> bool {
        get(tags, "except")
            .split(';')
            .any(|mode| self.access.contains(&mode))
    }

    fn access_check(&self, tags: &HashMap<String, String>) -> bool {
        for &mode in self.access.iter().rev() {
            if let Some(value) = tags.get(mode) {
                return !ACCESS_DENIED.contains(&value.as_str());
            }
        }
        true
    }
}

impl Profile for HighwayProfile<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn way_penalty(&self, tags: &HashMap<String, String>) -> Option<f64> {
        let penalty = self.penalty_of(self.active_highway_value(tags))?;
        if self.is_access_allowed(tags) {
            Some(penalty)
        } else {
            None
        }
    }

    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        let mut forward = true;
        let mut backward = true;

        // Default one-way ways
        if matches!(get(tags, "highway"), "motorway" | "motorway_link")
            || matches!(get(tags, "junction"), "roundabout" | "circular")
        {
            backward = false;
        }

        match self.active_oneway_value(tags) {
            "yes" | "true" | "1" => {
                forward = true;
                backward = false;
            }
            "-1" | "reverse" => {
                forward = false;
                backward = true;
            }
            "no" => {
                forward = true;
                backward = true;
            }
            _ => {}
        }

        (forward, backward)
    }

    fn is_access_allowed(&self, tags: &HashMap<String, String>) -> bool {
        self.access_check(tags)
    }

    fn is_turn_restriction(&self, tags: &HashMap<String, String>) -> TurnRestriction {
        if !self.restriction_type_matches(tags) {
            return TurnRestriction::Inapplicable;
        }
        if self.is_exempted(tags) {
            return TurnRestriction::Exempt;
        }
        restriction_kind(self.active_restriction_value(tags))
    }
}

/// A [HighwayProfile] variant for which
/// [motorroad=yes](https://wiki.openstreetmap.org/wiki/Key:motorroad)
/// implies no access, meant for non-motorized transportation modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMotorroadHighwayProfile<'a>(pub HighwayProfile<'a>);

impl Profile for NonMotorroadHighwayProfile<'_> {
    fn name(&self) -> &str {
        self.0.name
    }

    fn way_penalty(&self, tags: &HashMap<String, String>) -> Option<f64> {
        let penalty = self.0.penalty_of(self.0.active_highway_value(tags))?;
        if self.is_access_allowed(tags) {
            Some(penalty)
        } else {
            None
        }
    }

    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        self.0.way_direction(tags)
    }

    fn is_access_allowed(&self, tags: &HashMap<String, String>) -> bool {
        get(tags, "motorroad") != "yes" && self.0.access_check(tags)
    }

    fn is_turn_restriction(&self, tags: &HashMap<String, String>) -> TurnRestriction {
        self.0.is_turn_restriction(tags)
    }
}

/// A [HighwayProfile] variant for on-foot routing. Several tags are treated
/// differently to the base profile:
///
/// * `public_transport=platform` and `railway=platform` are treated as-if
///   `highway=platform`,
/// * `motorroad=yes` implies no access,
/// * there are no default one-way ways, and generic `oneway` tags are ignored
///   unless on `highway=footway`, `path`, `steps` or `platform` -
///   on other ways only `oneway:foot` applies,
/// * only `restriction:foot` turn restrictions are considered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootProfile<'a>(pub HighwayProfile<'a>);

impl FootProfile<'_> {
    fn active_highway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        let highway = self.0.active_highway_value(tags);
        if highway.is_empty()
            && (get(tags, "public_transport") == "platform" || get(tags, "railway") == "platform")
        {
            "platform"
        } else {
            highway
        }
    }

    fn active_oneway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        let oneway_foot = get(tags, "oneway:foot");
        if !oneway_foot.is_empty() {
            return oneway_foot;
        }

        match self.active_highway_value(tags) {
            "footway" | "path" | "steps" | "platform" => get(tags, "oneway"),
            _ => "",
        }
    }
}

impl Profile for FootProfile<'_> {
    fn name(&self) -> &str {
        self.0.name
    }

    fn way_penalty(&self, tags: &HashMap<String, String>) -> Option<f64> {
        let penalty = self.0.penalty_of(self.active_highway_value(tags))?;
        if self.is_access_allowed(tags) {
            Some(penalty)
        } else {
            None
        }
    }

    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        match self.active_oneway_value(tags) {
            "yes" | "true" | "1" => (true, false),
            "-1" | "reverse" => (false, true),
            _ => (true, true),
        }
    }

    fn is_access_allowed(&self, tags: &HashMap<String, String>) -> bool {
        get(tags, "motorroad") != "yes" && self.0.access_check(tags)
    }

    fn is_turn_restriction(&self, tags: &HashMap<String, String>) -> TurnRestriction {
        if !self.0.restriction_type_matches(tags) {
            return TurnRestriction::Inapplicable;
        }
        if self.0.is_exempted(tags) {
            return TurnRestriction::Exempt;
        }
        restriction_kind(get(tags, "restriction:foot"))
    }
}

/// Routing [Profile] over `railway=*` ways.
///
/// Only `access=no` and similar denying values on the plain `access` tag can
/// exclude a way; there is no access tag hierarchy. There are no default
/// one-way ways. All `type=restriction` relations with a supported
/// `restriction` tag are passed through, without `except` tag handling
/// (railway modes never appear in `except` values).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailwayProfile<'a> {
    pub name: &'a str,

    /// Pairs of (railway tag value, penalty), first match wins.
    pub penalties: &'a [(&'a str, f64)],
}

impl Profile for RailwayProfile<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn way_penalty(&self, tags: &HashMap<String, String>) -> Option<f64> {
        if !self.is_access_allowed(tags) {
            return None;
        }
        let railway = get(tags, "railway");
        self.penalties
            .iter()
            .find(|&&(value, _)| value == railway)
            .map(|&(_, penalty)| penalty)
    }

    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        match get(tags, "oneway") {
            "yes" => (true, false),
            "-1" => (false, true),
            _ => (true, true),
        }
    }

    fn is_access_allowed(&self, tags: &HashMap<String, String>) -> bool {
        !ACCESS_DENIED.contains(&get(tags, "access"))
    }

    fn is_turn_restriction(&self, tags: &HashMap<String, String>) -> TurnRestriction {
        if get(tags, "type") != "restriction" {
            return TurnRestriction::Inapplicable;
        }
        restriction_kind(get(tags, "restriction"))
    }
}

/// Routing [Profile] over every way in the data, regardless of used tags.
/// Meant for holding arbitrary graphs in OSM XML/OSM PBF formats, without
/// following OpenStreetMap mapping conventions. All relations (and thus
/// turn restrictions) are ignored. The only introspected tag is `oneway`,
/// which may be set to `yes` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkeletonProfile;

impl Profile for SkeletonProfile {
    fn name(&self) -> &str {
        "skeleton"
    }

    fn way_penalty(&self, _tags: &HashMap<String, String>) -> Option<f64> {
        Some(1.0)
    }

    fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        match get(tags, "oneway") {
            "yes" => (true, false),
            "-1" => (false, true),
            _ => (true, true),
        }
    }

    fn is_access_allowed(&self, _tags: &HashMap<String, String>) -> bool {
        true
    }

    fn is_turn_restriction(&self, _tags: &HashMap<String, String>) -> TurnRestriction {
        TurnRestriction::Inapplicable
    }
}

/// Example routing profile for cars, with high preference for faster roads
/// and with appropriate [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const CAR_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "motorcar",
    penalties: &[
        ("motorway", 1.0),
        ("trunk", 2.0),
        ("primary", 5.0),
        ("secondary", 6.5),
        ("tertiary", 10.0),
        ("unclassified", 10.0),
        ("residential", 15.0),
        ("living_street", 20.0),
        ("track", 20.0),
        ("service", 20.0),
    ],
    access: &["access", "vehicle", "motor_vehicle", "motorcar"],
};

/// Example routing profile for buses, without high preference differences
/// between road types and with appropriate
/// [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const BUS_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "bus",
    penalties: &[
        ("motorway", 1.0),
        ("trunk", 1.0),
        ("primary", 1.1),
        ("secondary", 1.15),
        ("tertiary", 1.15),
        ("unclassified", 1.5),
        ("residential", 2.5),
        ("living_street", 2.5),
        ("track", 5.0),
        ("service", 5.0),
    ],
    access: &["access", "vehicle", "motor_vehicle", "psv", "bus", "routing:ztm"],
};

/// Example routing profile for bicycles, with preferences for quieter roads
/// and with appropriate [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const BICYCLE_PROFILE: NonMotorroadHighwayProfile<'static> =
    NonMotorroadHighwayProfile(HighwayProfile {
        name: "bicycle",
        penalties: &[
            ("trunk", 50.0),
            ("primary", 10.0),
            ("secondary", 3.0),
            ("tertiary", 2.5),
            ("unclassified", 2.5),
            ("cycleway", 1.0),
            ("residential", 1.0),
            ("living_street", 1.5),
            ("track", 2.0),
            ("service", 2.0),
            ("bridleway", 3.0),
            ("footway", 3.0),
            ("steps", 5.0),
            ("path", 2.0),
        ],
        access: &["access", "vehicle", "bicycle"],
    });

/// Example routing profile for walking, with preferences for quieter roads
/// and with appropriate [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const FOOT_PROFILE: FootProfile<'static> = FootProfile(HighwayProfile {
    name: "foot",
    penalties: &[
        ("trunk", 4.0),
        ("primary", 2.0),
        ("secondary", 1.3),
        ("tertiary", 1.2),
        ("unclassified", 1.2),
        ("residential", 1.2),
        ("living_street", 1.2),
        ("track", 1.2),
        ("service", 1.2),
        ("bridleway", 1.2),
        ("footway", 1.05),
        ("path", 1.05),
        ("steps", 1.15),
        ("pedestrian", 1.0),
        ("platform", 1.1),
    ],
    access: &["access", "foot"],
});

/// Example simple routing profile for different kinds of trains.
pub const RAILWAY_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "railway",
    penalties: &[
        ("rail", 1.0),
        ("light_rail", 1.0),
        ("subway", 1.0),
        ("narrow_gauge", 1.0),
    ],
};

/// Example simple routing profile for routing over tram and light rail lines.
pub const TRAM_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "tram",
    penalties: &[("tram", 1.0), ("light_rail", 1.0)],
};

/// Example simple routing profile for routing over subway lines.
pub const SUBWAY_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "subway",
    penalties: &[("subway", 1.0)],
};
