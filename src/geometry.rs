//! Positions, collision boxes, and the canonical position key used by the
//! reachability cache.
//!
//! Kept deliberately free of simulation concerns: this module only knows
//! about 2D float geometry, not about entities, teams, or ticks.

use serde::{Deserialize, Serialize};

/// A point on the simulation surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance, avoids a sqrt on hot per-tick paths.
    pub fn distance_squared(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Position) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Canonical position key at one decimal of precision, used as a set
    /// element by the reachability cache (spec.md glossary: "Position key").
    pub fn key(&self) -> PositionKey {
        PositionKey(format!("{:.1}:{:.1}", self.x, self.y))
    }

    /// Unit vector pointing from `self` toward `other`. Returns `(0.0, 0.0)`
    /// if the two points coincide.
    pub fn unit_vector_to(&self, other: &Position) -> (f64, f64) {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < f64::EPSILON {
            (0.0, 0.0)
        } else {
            (dx / len, dy / len)
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

/// Canonical, hashable string representation of a [`Position`] at one
/// decimal of precision. Used as the element type of the reachability
/// cache's `entities`/`resources` sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey(pub String);

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned collision footprint, in tiles, centered on an entity's
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionBox {
    pub tile_width: f64,
    pub tile_height: f64,
}

impl CollisionBox {
    pub fn new(tile_width: f64, tile_height: f64) -> Self {
        Self {
            tile_width,
            tile_height,
        }
    }

    /// Radius of the smallest enclosing circle around the box.
    pub fn radius(&self) -> f64 {
        ((self.tile_width / 2.0).powi(2) + (self.tile_height / 2.0).powi(2)).sqrt()
    }

    /// `target_radius` as used by the walking perimeter-goal computation
    /// (spec.md §4.2, §8 scenario 2: a 2x2 stone-furnace yields radius
    /// `1.0`, not the circumradius `sqrt(2)`) — half the box's longer
    /// side, since the perimeter offset is a single scalar applied along
    /// whatever direction the agent approaches from.
    pub fn goal_radius(&self) -> f64 {
        self.tile_width.max(self.tile_height) / 2.0
    }

    /// Whether `point` falls within the box centered at `center`.
    pub fn contains(&self, center: &Position, point: &Position) -> bool {
        let hw = self.tile_width / 2.0;
        let hh = self.tile_height / 2.0;
        (point.x - center.x).abs() <= hw && (point.y - center.y).abs() <= hh
    }
}

/// One of the eight cardinal/diagonal walking directions, matching the
/// simulation's `walking_state.direction` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Map a bearing in radians (as produced by `atan2(dy, -dx)`, per
    /// spec.md §4.2 step 4) onto one of the eight directions.
    pub fn from_bearing(bearing: f64) -> Direction {
        use std::f64::consts::PI;
        // Normalize to [0, 2*PI)
        let mut b = bearing % (2.0 * PI);
        if b < 0.0 {
            b += 2.0 * PI;
        }
        let octant = ((b / (PI / 4.0)).round() as i64).rem_euclid(8);
        match octant {
            0 => Direction::West,
            1 => Direction::NorthWest,
            2 => Direction::North,
            3 => Direction::NorthEast,
            4 => Direction::East,
            5 => Direction::SouthEast,
            6 => Direction::South,
            _ => Direction::SouthWest,
        }
    }
}
