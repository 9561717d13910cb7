//! `datmo-types` – shared value types for the mapping and tracking stack.
//!
//! Everything that crosses a crate boundary lives here: the geometric
//! primitives, the per-tick records produced by the perception pipeline, the
//! validated [`PipelineConfig`][config::PipelineConfig] and the global
//! [`DatmoError`].

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub use config::PipelineConfig;

/// Identifier of a static landmark.  Allocated monotonically, never reused.
pub type LandmarkId = u64;

/// Identifier of a dynamic track.  Allocated monotonically, never reused.
pub type TrackId = u64;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A point in the 2-D world frame (world units, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    /// Create a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point2) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Bearing from `self` towards `other` in radians, in `(-π, π]`.
    pub fn bearing_to(self, other: Point2) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// The point reached by travelling `distance` along `heading_rad`.
    pub fn offset(self, heading_rad: f32, distance: f32) -> Point2 {
        Point2::new(
            self.x + distance * heading_rad.cos(),
            self.y + distance * heading_rad.sin(),
        )
    }
}

/// Arithmetic mean of `points`, or `None` for an empty slice.
pub fn centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor records
// ────────────────────────────────────────────────────────────────────────────

/// One range reading from a ray that hit an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Ray angle in radians, counter-clockwise from +X.
    pub angle: f32,
    /// Noisy range along the ray.
    pub range: f32,
    /// Noise-free position of the hit.
    pub point: Point2,
}

// ────────────────────────────────────────────────────────────────────────────
// Landmarks
// ────────────────────────────────────────────────────────────────────────────

/// A 2×2 covariance matrix stored row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariance2(pub [[f32; 2]; 2]);

impl Covariance2 {
    /// `value · I`.
    pub fn diagonal(value: f32) -> Self {
        Self([[value, 0.0], [0.0, value]])
    }

    /// Variance along `axis` (0 = x, 1 = y).
    pub fn variance(&self, axis: usize) -> f32 {
        self.0[axis][axis]
    }

    pub fn is_symmetric(&self, tolerance: f32) -> bool {
        (self.0[0][1] - self.0[1][0]).abs() <= tolerance
    }
}

/// A static landmark in the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: LandmarkId,
    pub position: Point2,
    pub covariance: Covariance2,
}

// ────────────────────────────────────────────────────────────────────────────
// Dynamic objects
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a dynamic track.  Retired tracks are removed from the set,
/// so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Created from a single position and never matched since.
    Seeded,
    /// Matched at least once; the last match is within the retirement timeout.
    Tracked,
    /// Unmatched for longer than the retirement timeout.
    Stale,
}

/// A tracked moving object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    pub id: TrackId,
    /// Bounded position history, oldest first.  Never empty.
    pub positions: VecDeque<Point2>,
    /// Smoothed speed estimate (world units per second).
    pub velocity: f32,
    /// Simulated time of the last successful match (ms).
    pub last_update_ms: u64,
    pub status: TrackStatus,
}

impl DynamicObject {
    /// A fresh track holding a single position and zero velocity.
    pub fn seeded(id: TrackId, position: Point2, now_ms: u64) -> Self {
        Self {
            id,
            positions: VecDeque::from([position]),
            velocity: 0.0,
            last_update_ms: now_ms,
            status: TrackStatus::Seeded,
        }
    }

    /// Most recent position.
    pub fn latest(&self) -> Option<Point2> {
        self.positions.back().copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Proximity warning
// ────────────────────────────────────────────────────────────────────────────

/// Nearest point of interest closer than the warning distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityWarning {
    /// Distance rounded to one decimal place.
    pub distance: f32,
    /// Bearing in degrees, normalised to `[0, 360)`.
    pub bearing_deg: f32,
}

impl fmt::Display for ProximityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Warning: Obstacle at {:.1} units, {:.1}°",
            self.distance, self.bearing_deg
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tick snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Everything the pipeline exposes to consumers after one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub measurements: Vec<Measurement>,
    /// Candidate features extracted this tick.
    pub features: Vec<Point2>,
    pub landmarks: Vec<Landmark>,
    pub tracks: Vec<DynamicObject>,
    pub warning: Option<ProximityWarning>,
    pub created_landmarks: Vec<LandmarkId>,
    pub removed_landmarks: Vec<LandmarkId>,
    pub promoted_tracks: Vec<TrackId>,
    pub retired_tracks: Vec<TrackId>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type.  The per-tick path never produces one; they surface
/// from construction and from the CLI's I/O edges.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatmoError {
    #[error("Invalid configuration for `{field}`: {reason}")]
    Config { field: String, reason: String },

    #[error("World Error: {0}")]
    World(String),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl DatmoError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        DatmoError::Config {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
