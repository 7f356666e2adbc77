// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use fs2::FileExt;

use super::graph::OsmGraph;
use super::profile::Profile;
use super::reader::{self, read_features, FileFormat};
use crate::{Edge, GraphLike, Node, Position, TurnCheck};

/// Default zoom level of downloaded tiles,
/// see <https://wiki.openstreetmap.org/wiki/Zoom_levels>.
/// Note that the OSM API rejects requests for too much data with
/// "400 Bad Request" - if that is the case, increase the zoom level.
pub const DEFAULT_TILE_ZOOM: u8 = 15;

/// Default period after which cached tiles are re-downloaded - 30 days.
pub const DEFAULT_TILE_EXPIRY: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Default endpoint for fetching tile data, the
/// [OSM API map endpoint](https://wiki.openstreetmap.org/wiki/API_v0.6#Retrieving_map_data_by_bounding_box:_GET_/api/0.6/map).
pub const DEFAULT_API_URL: &str = "https://api.openstreetmap.org/api/0.6/map";

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BASE_DELAY: Duration = Duration::from_millis(500);

/// A [slippy map tile](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames)
/// at a fixed zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
}

/// Geographic boundary of a [Tile], in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

/// Computes the [Tile] in which the given position lays.
pub fn tile_at(position: Position, zoom: u8) -> Tile {
    let n = f64::from(1u32 << zoom);
    let x = n * ((position.lon + 180.0) / 360.0);
    let y = (1.0 - position.lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0 * n;
    Tile {
        x: (x.max(0.0) as u32).min((1u32 << zoom) - 1),
        y: (y.max(0.0) as u32).min((1u32 << zoom) - 1),
    }
}

/// Computes the geographic boundary of a [Tile].
pub fn tile_bounds(tile: Tile, zoom: u8) -> TileBounds {
    let n = f64::from(1u32 << zoom);

    let longitude_side = 360.0 / n;
    let left = f64::from(tile.x) * longitude_side - 180.0;
    let right = left + longitude_side;

    let top = mercator_to_lat(std::f64::consts::PI * (1.0 - 2.0 * (f64::from(tile.y) / n)));
    let bottom = mercator_to_lat(std::f64::consts::PI * (1.0 - 2.0 * (f64::from(tile.y + 1) / n)));

    TileBounds {
        left,
        bottom,
        right,
        top,
    }
}

fn mercator_to_lat(x: f64) -> f64 {
    x.sinh().atan().to_degrees()
}

/// Error which can occur when fetching a tile.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {0}")]
    Status(u16),
}

/// Source of tile data for a [LiveGraph]. Implementations must return the
/// tile contents as OSM XML, and should treat a missing tile as empty.
pub trait TileFetcher {
    fn fetch(&self, bounds: TileBounds) -> Result<Vec<u8>, FetchError>;
}

/// [TileFetcher] over HTTP, against an
/// [OSM API map](https://wiki.openstreetmap.org/wiki/API_v0.6)-compatible
/// endpoint. 404 responses are treated as empty tiles; other failures are
/// retried with exponential backoff before giving up.
pub struct HttpTileFetcher {
    client: reqwest::blocking::Client,
    api_url: String,
}

impl HttpTileFetcher {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_url: api_url.to_string(),
        }
    }
}

impl Default for HttpTileFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch(&self, bounds: TileBounds) -> Result<Vec<u8>, FetchError> {
        let url = format!(
            "{}?bbox={},{},{},{}",
            self.api_url, bounds.left, bounds.bottom, bounds.right, bounds.top,
        );

        let mut attempt = 0;
        loop {
            attempt += 1;

            let error: FetchError = match self.client.get(&url).send() {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.bytes()?.to_vec());
                }
                Ok(response) if response.status().as_u16() == 404 => {
                    // An empty tile, not an error
                    return Ok(b"<osm version=\"0.6\"></osm>".to_vec());
                }
                Ok(response) => FetchError::Status(response.status().as_u16()),
                Err(e) => e.into(),
            };

            if attempt >= FETCH_ATTEMPTS {
                return Err(error);
            }

            let delay = FETCH_BASE_DELAY * (1 << (attempt - 1));
            log::warn!(
                target: "osmroute.osm",
                "tile fetch failed ({}), retrying in {:?}",
                error,
                delay,
            );
            std::thread::sleep(delay);
        }
    }
}

/// Error which can occur when loading tiles into a [LiveGraph].
#[derive(Debug, thiserror::Error)]
pub enum LiveGraphError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("osm: {0}")]
    Osm(#[from] reader::Error),
}

/// LiveGraph extends [OsmGraph] by lazily downloading data from the
/// OpenStreetMap API in [tiles](Tile) around the queried positions.
///
/// [LiveGraph::find_nearest_node] and [LiveGraph::load_tile_around] ensure
/// that the tile containing the position, along with its 8 neighbors,
/// is loaded into the graph. Downloaded tiles are cached on disk under
/// `cache_directory/PROFILE_NAME/ZOOM/X/Y.osm` and re-downloaded once older
/// than the configured expiry. An advisory file lock around each tile's
/// download-and-parse window keeps multiple processes sharing one cache
/// directory from fetching the same tile concurrently; within a process an
/// already-loaded tile set is consulted first.
///
/// Usage of this struct is discouraged: it is much wiser to use [OsmGraph]
/// directly with [OSM data extracts](https://download.geofabrik.de/),
/// filtered to the area of interest.
pub struct LiveGraph<P: Profile, F: TileFetcher = HttpTileFetcher> {
    graph: OsmGraph<P>,
    fetcher: F,
    cache_directory: PathBuf,
    tile_expiry: Duration,
    tile_zoom: u8,
    loaded_tiles: HashSet<Tile>,
}

impl<P: Profile> LiveGraph<P, HttpTileFetcher> {
    /// Creates an empty LiveGraph with the default OSM API fetcher,
    /// zoom level and expiry time.
    pub fn new<Q: AsRef<Path>>(profile: P, cache_directory: Q) -> Self {
        Self::with_fetcher(profile, cache_directory, HttpTileFetcher::default())
    }
}

impl<P: Profile, F: TileFetcher> LiveGraph<P, F> {
    /// Creates an empty LiveGraph with a custom [TileFetcher].
    pub fn with_fetcher<Q: AsRef<Path>>(profile: P, cache_directory: Q, fetcher: F) -> Self {
        Self {
            graph: OsmGraph::new(profile),
            fetcher,
            cache_directory: cache_directory.as_ref().to_path_buf(),
            tile_expiry: DEFAULT_TILE_EXPIRY,
            tile_zoom: DEFAULT_TILE_ZOOM,
            loaded_tiles: HashSet::default(),
        }
    }

    /// Overrides the tile expiry period.
    pub fn set_tile_expiry(&mut self, expiry: Duration) {
        self.tile_expiry = expiry;
    }

    /// Overrides the tile zoom level. Must be called before any tiles
    /// are loaded, as tiles of different zoom levels don't stack.
    pub fn set_tile_zoom(&mut self, zoom: u8) {
        assert!(self.loaded_tiles.is_empty());
        self.tile_zoom = zoom;
    }

    /// Read-only access to the underlying [OsmGraph].
    pub fn graph(&self) -> &OsmGraph<P> {
        &self.graph
    }

    /// Finds the closest [Node] to the given position, downloading the
    /// surrounding tiles first.
    pub fn find_nearest_node(&mut self, position: Position) -> Result<Option<Node>, LiveGraphError> {
        self.load_tile_around(position)?;
        Ok(self.graph.find_nearest_node(position))
    }

    /// Ensures the tile in which `position` falls, along with its
    /// 8 neighbors, is loaded into the graph.
    ///
    /// Loaded tiles are remembered and not processed again. Cached tiles
    /// younger than the expiry period are loaded from disk; anything else
    /// is downloaded first.
    pub fn load_tile_around(&mut self, position: Position) -> Result<(), LiveGraphError> {
        let center = tile_at(position, self.tile_zoom);
        let max = (1u32 << self.tile_zoom) - 1;

        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                let x = i64::from(center.x) + dx;
                let y = i64::from(center.y) + dy;
                if x < 0 || y < 0 || x > i64::from(max) || y > i64::from(max) {
                    continue;
                }
                self.ensure_tile(Tile {
                    x: x as u32,
                    y: y as u32,
                })?;
            }
        }

        Ok(())
    }

    fn ensure_tile(&mut self, tile: Tile) -> Result<(), LiveGraphError> {
        if !self.loaded_tiles.insert(tile) {
            return Ok(());
        }

        let directory = self
            .cache_directory
            .join(self.graph.profile().name())
            .join(self.tile_zoom.to_string())
            .join(tile.x.to_string());
        fs::create_dir_all(&directory)?;

        let tile_path = directory.join(format!("{}.osm", tile.y));
        let lock_path = directory.join(format!("{}.lock", tile.y));

        // The lock is released when the file is closed, at the end of this scope.
        let lock = fs::File::create(lock_path)?;
        lock.lock_exclusive()?;

        if !self.has_up_to_date_tile(&tile_path)? {
            log::info!(
                target: "osmroute.osm",
                "downloading tile x={} y={} zoom={}",
                tile.x,
                tile.y,
                self.tile_zoom,
            );
            let data = self.fetcher.fetch(tile_bounds(tile, self.tile_zoom))?;
            fs::write(&tile_path, data)?;
        }

        log::info!(
            target: "osmroute.osm",
            "loading tile x={} y={} zoom={}",
            tile.x,
            tile.y,
            self.tile_zoom,
        );
        let file = fs::File::open(&tile_path)?;
        let features = read_features(io::BufReader::new(file), FileFormat::Xml)?;
        self.graph.add_features(features)?;
        Ok(())
    }

    /// Checks if the tile stored at the provided path is reasonably
    /// up-to-date, as measured by its modification time against the
    /// expiry period. Missing files are out-of-date.
    fn has_up_to_date_tile(&self, tile_path: &Path) -> Result<bool, io::Error> {
        match fs::metadata(tile_path) {
            Ok(metadata) => {
                let age = SystemTime::now()
                    .duration_since(metadata.modified()?)
                    .unwrap_or(Duration::ZERO);
                Ok(age < self.tile_expiry)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<P: Profile, F: TileFetcher> GraphLike for LiveGraph<P, F> {
    fn get_node(&self, id: i64) -> Option<Node> {
        self.graph.get_node(id)
    }

    fn edges_from(&self, id: i64) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edges_from(id)
    }

    fn turn_restriction(&self, prefix: &[i64]) -> TurnCheck {
        self.graph.turn_restriction(prefix)
    }

    fn longest_restriction(&self) -> usize {
        self.graph.longest_restriction()
    }
}
