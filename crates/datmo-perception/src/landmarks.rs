//! Static landmark map.
//!
//! Candidate features that were not claimed by the dynamic tracker are
//! associated with existing landmarks and fused with a decoupled per-axis
//! recursive filter.  Landmarks are kept in a [`BTreeMap`] keyed by their
//! monotonically increasing id, so iteration order is creation order and
//! association is reproducible.
//!
//! # Association
//!
//! The **first** landmark (in id order) closer than the association radius
//! wins, not the nearest one.
//!
//! # Filter
//!
//! For innovation `ν = z − x` and measurement noise `R`:
//!
//! ```text
//! kᵢ   = Pᵢᵢ / (Pᵢᵢ + R)           for i ∈ {x, y}
//! xᵢ  += kᵢ · νᵢ
//! P    = (I − diag(k)) · P
//! ```
//!
//! Cross terms of `P` are carried through the update but never feed the
//! position correction.
//!
//! # Example
//!
//! ```rust
//! use datmo_perception::landmarks::LandmarkMap;
//! use datmo_types::{PipelineConfig, Point2};
//!
//! let mut map = LandmarkMap::new(&PipelineConfig::default());
//! let created = map.update(&[Point2::new(10.0, 10.0)]);
//! assert_eq!(created.len(), 1);
//!
//! // A second sighting nearby is fused into the same landmark.
//! assert!(map.update(&[Point2::new(11.0, 10.0)]).is_empty());
//! assert_eq!(map.len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use datmo_types::{Covariance2, Landmark, LandmarkId, Measurement, PipelineConfig, Point2};
use tracing::{debug, info};

/// The set of static landmarks and its id allocator.
#[derive(Debug, Clone)]
pub struct LandmarkMap {
    landmarks: BTreeMap<LandmarkId, Landmark>,
    next_id: LandmarkId,
    /// Ids scheduled for removal on the next [`prune`][Self::prune].
    pending_removal: BTreeSet<LandmarkId>,
    association_radius: f32,
    measurement_noise: f32,
    initial_covariance: f32,
    max_range: f32,
}

impl LandmarkMap {
    /// Create an empty map using the association, filter and range fields of
    /// `config`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            landmarks: BTreeMap::new(),
            next_id: 0,
            pending_removal: BTreeSet::new(),
            association_radius: config.association_radius,
            measurement_noise: config.measurement_noise,
            initial_covariance: config.initial_covariance,
            max_range: config.max_range,
        }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    /// Iterate landmarks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// First landmark (in creation order) strictly closer than `radius` to
    /// `point`.
    pub fn first_within(&self, point: Point2, radius: f32) -> Option<LandmarkId> {
        self.landmarks
            .values()
            .find(|l| l.position.distance(point) < radius)
            .map(|l| l.id)
    }

    /// Add a landmark at `position` with the default covariance.
    pub fn insert(&mut self, position: Point2) -> LandmarkId {
        let id = self.next_id;
        self.next_id += 1;
        self.landmarks.insert(
            id,
            Landmark {
                id,
                position,
                covariance: Covariance2::diagonal(self.initial_covariance),
            },
        );
        id
    }

    /// Associate each candidate with the first landmark inside the
    /// association radius and fuse it; unmatched candidates become new
    /// landmarks.
    ///
    /// Returns the ids created by this call.
    pub fn update(&mut self, candidates: &[Point2]) -> Vec<LandmarkId> {
        let mut created = Vec::new();
        for &candidate in candidates {
            match self.first_within(candidate, self.association_radius) {
                Some(id) => {
                    if let Some(landmark) = self.landmarks.get_mut(&id) {
                        fuse(landmark, candidate, self.measurement_noise);
                    }
                }
                None => {
                    let id = self.insert(candidate);
                    info!(id, x = candidate.x, y = candidate.y, "new landmark");
                    created.push(id);
                }
            }
        }
        created
    }

    /// Schedule `ids` for removal on the next [`prune`][Self::prune].
    pub fn queue_removal(&mut self, ids: &[LandmarkId]) {
        self.pending_removal.extend(ids.iter().copied());
    }

    /// Remove dangling landmarks and anything queued via
    /// [`queue_removal`][Self::queue_removal].
    ///
    /// A landmark is dangling when it lies within sensor range of `robot` and
    /// no measurement hit point is within the association radius of it.
    /// Landmarks beyond sensor range are left alone.
    ///
    /// Returns the removed ids in ascending order.
    pub fn prune(&mut self, measurements: &[Measurement], robot: Point2) -> Vec<LandmarkId> {
        let mut doomed = std::mem::take(&mut self.pending_removal);
        for landmark in self.landmarks.values() {
            if robot.distance(landmark.position) >= self.max_range {
                continue;
            }
            let supported = measurements
                .iter()
                .any(|m| m.point.distance(landmark.position) <= self.association_radius);
            if !supported {
                doomed.insert(landmark.id);
            }
        }

        let removed: Vec<LandmarkId> = doomed
            .into_iter()
            .filter(|id| self.landmarks.remove(id).is_some())
            .collect();
        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned landmarks");
        }
        removed
    }
}

/// Decoupled per-axis recursive update of `landmark` towards `observation`.
pub fn fuse(landmark: &mut Landmark, observation: Point2, measurement_noise: f32) {
    let innovation = [
        observation.x - landmark.position.x,
        observation.y - landmark.position.y,
    ];
    let p = &mut landmark.covariance.0;
    let gain = [
        p[0][0] / (p[0][0] + measurement_noise),
        p[1][1] / (p[1][1] + measurement_noise),
    ];

    landmark.position.x += gain[0] * innovation[0];
    landmark.position.y += gain[1] * innovation[1];

    for (row, k) in p.iter_mut().zip(gain) {
        for value in row.iter_mut() {
            *value *= 1.0 - k;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
