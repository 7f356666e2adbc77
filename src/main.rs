// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;

use osmroute::osm::{
    FileFormat, OsmGraph, Profile, BICYCLE_PROFILE, BUS_PROFILE, CAR_PROFILE, FOOT_PROFILE,
    RAILWAY_PROFILE, SUBWAY_PROFILE, TRAM_PROFILE,
};
use osmroute::{find_route_without_turn_around, GraphLike, Position, DEFAULT_STEP_LIMIT};

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct GraphLoadError(PathBuf, #[source] osmroute::osm::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ProfileChoice {
    Car,
    Bus,
    Bicycle,
    Foot,
    Railway,
    Tram,
    Subway,
}

#[derive(Parser)]
struct Cli {
    /// The path to the OSM file
    osm_file: PathBuf,

    /// Latitude of the start point
    start_lat: f64,

    /// Longitude of the start point
    start_lon: f64,

    /// Latitude of the end point
    end_lat: f64,

    /// Longitude of the end point
    end_lon: f64,

    /// Routing profile to apply to the OSM data
    #[arg(long, value_enum, default_value = "car")]
    profile: ProfileChoice,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.profile {
        ProfileChoice::Car => run(CAR_PROFILE, &cli),
        ProfileChoice::Bus => run(BUS_PROFILE, &cli),
        ProfileChoice::Bicycle => run(BICYCLE_PROFILE, &cli),
        ProfileChoice::Foot => run(FOOT_PROFILE, &cli),
        ProfileChoice::Railway => run(RAILWAY_PROFILE, &cli),
        ProfileChoice::Tram => run(TRAM_PROFILE, &cli),
        ProfileChoice::Subway => run(SUBWAY_PROFILE, &cli),
    }
}

fn run<P: Profile>(profile: P, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let g = load_graph(profile, &cli.osm_file)?;

    let start = g
        .find_nearest_node(Position::new(cli.start_lat, cli.start_lon))
        .ok_or("no node corresponding to the given start position")?;

    let end = g
        .find_nearest_node(Position::new(cli.end_lat, cli.end_lon))
        .ok_or("no node corresponding to the given end position")?;

    let route = find_route_without_turn_around(&g, start.id, end.id, DEFAULT_STEP_LIMIT)?;

    println!("{{");
    println!("  \"type\": \"FeatureCollection\",");
    println!("  \"features\": [");
    println!("    {{");
    println!("      \"type\": \"Feature\",");
    println!("      \"properties\": {{}},");

    println!("      \"geometry\": {{");
    println!("        \"type\": \"LineString\",");
    println!("        \"coordinates\": [");

    let mut nodes = route
        .iter()
        .filter_map(|&node_id| g.get_node(node_id))
        .peekable();
    while let Some(node) = nodes.next() {
        let suffix = if nodes.peek().is_some() { "," } else { "" };
        println!(
            "          [{}, {}]{}",
            node.position.lon, node.position.lat, suffix
        );
    }

    println!("        ]");
    println!("      }}");
    println!("    }}");
    println!("  ]");
    println!("}}");

    Ok(())
}

fn load_graph<P: Profile>(profile: P, path: &Path) -> Result<OsmGraph<P>, GraphLoadError> {
    OsmGraph::from_file(profile, path, FileFormat::Unknown)
        .map_err(|e| GraphLoadError(PathBuf::from(path), e))
}
