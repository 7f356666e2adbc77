// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::Position;

/// Mean radius of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_RADIUS: f64 = 6_371_008.8;

/// Mean diameter of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the [haversine formula](https://en.wikipedia.org/wiki/Haversine_formula).
/// Returns the result in meters.
pub fn haversine_earth_distance(a: Position, b: Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let lat2 = b.lat.to_radians();
    let lon2 = b.lon.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    // Rounding may push h just over 1.0 for antipodal points, and asin would return NaN.
    EARTH_DIAMETER * h.sqrt().min(1.0).asin()
}

/// Calculates the [Euclidean distance](https://en.wikipedia.org/wiki/Euclidean_distance)
/// between two positions, in the same units as the input coordinates.
pub fn euclidean_distance(a: Position, b: Position) -> f64 {
    let dlat = b.lat - a.lat;
    let dlon = b.lon - a.lon;
    (dlat * dlat + dlon * dlon).sqrt()
}

/// Calculates the [Taxicab distance](https://en.wikipedia.org/wiki/Taxicab_geometry)
/// between two positions, in the same units as the input coordinates.
pub fn taxicab_distance(a: Position, b: Position) -> f64 {
    (b.lat - a.lat).abs() + (b.lon - a.lon).abs()
}
