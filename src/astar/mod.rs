// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod error;
mod search;
mod without_turn_around;

pub use error::{AStarError, DEFAULT_STEP_LIMIT};
pub use search::{find_route, find_route_with_distance};
pub use without_turn_around::{
    find_route_without_turn_around, find_route_without_turn_around_with_distance,
};
