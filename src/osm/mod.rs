// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod graph;
mod live;
mod profile;
pub mod reader;

pub use graph::OsmGraph;
pub use live::{
    tile_at, tile_bounds, FetchError, HttpTileFetcher, LiveGraph, LiveGraphError, Tile,
    TileBounds, TileFetcher, DEFAULT_API_URL, DEFAULT_TILE_EXPIRY, DEFAULT_TILE_ZOOM,
};
pub use profile::{
    FootProfile, HighwayProfile, NonMotorroadHighwayProfile, Profile, RailwayProfile,
    SkeletonProfile, TurnRestriction, BICYCLE_PROFILE, BUS_PROFILE, CAR_PROFILE, FOOT_PROFILE,
    RAILWAY_PROFILE, SUBWAY_PROFILE, TRAM_PROFILE,
};
pub use reader::{read_features, read_features_from_file, Error, FeatureReader, FileFormat};
