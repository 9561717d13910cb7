//! Dynamic-object tracker.
//!
//! Each tick the tracker runs three passes over the candidate features:
//!
//! 1. **Match** – a candidate is claimed by the first track (in id order)
//!    whose newest position is closer than the association radius *and* whose
//!    smoothed speed exceeds the minimal-motion threshold.  A track claims at
//!    most one candidate per tick.  The matched position is appended to the
//!    bounded history and the speed is blended:
//!
//!    ```text
//!    v ← α · v + (1 − α) · (distance / elapsed_seconds)
//!    ```
//!
//!    The speed is left untouched when no time has elapsed.
//! 2. **Retire** – an unmatched track whose last match is at least the
//!    retirement timeout old becomes [`TrackStatus::Stale`].  Stale tracks that
//!    were moving (speed above the threshold) are removed, and landmarks near
//!    their last position are reported as vacated.  Tracks that never moved
//!    linger.
//! 3. **Promote** – an unmatched candidate starts a new track when some
//!    landmark sits in the ring between one and two association radii, the
//!    map holds more than `promotion_min_landmarks` landmarks, and no
//!    landmark lies inside one association radius.
//!
//! Candidates neither matched nor promoted are passed through for the
//! landmark map.

use std::collections::{BTreeMap, BTreeSet};

use datmo_types::{DynamicObject, LandmarkId, PipelineConfig, Point2, TrackId, TrackStatus};
use tracing::info;

use crate::landmarks::LandmarkMap;

/// Result of one [`DynamicObjectTracker::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerUpdate {
    /// Tracks that claimed a candidate this tick.
    pub matched: BTreeSet<TrackId>,
    /// Candidates left for the landmark map.
    pub passthrough: Vec<Point2>,
    /// Tracks created by promotion.
    pub promoted: Vec<TrackId>,
    /// Tracks removed by the timeout rule.
    pub retired: Vec<TrackId>,
    /// Landmarks near a retired track's last position.
    pub vacated_landmarks: Vec<LandmarkId>,
}

/// Owns the set of dynamic tracks.
#[derive(Debug, Clone)]
pub struct DynamicObjectTracker {
    tracks: BTreeMap<TrackId, DynamicObject>,
    next_id: TrackId,
    association_radius: f32,
    min_motion_velocity: f32,
    retirement_timeout_ms: u64,
    velocity_smoothing: f32,
    max_history: usize,
    promotion_min_landmarks: usize,
}

impl DynamicObjectTracker {
    /// Create an empty tracker from the tracking fields of `config`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 0,
            association_radius: config.association_radius,
            min_motion_velocity: config.min_motion_velocity,
            retirement_timeout_ms: config.retirement_timeout_ms,
            velocity_smoothing: config.velocity_smoothing,
            max_history: config.max_history,
            promotion_min_landmarks: config.promotion_min_landmarks,
        }
    }

    /// Start a new track at `position` with zero speed.
    pub fn seed(&mut self, position: Point2, now_ms: u64) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.insert(id, DynamicObject::seeded(id, position, now_ms));
        id
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: TrackId) -> Option<&DynamicObject> {
        self.tracks.get(&id)
    }

    /// Iterate tracks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &DynamicObject> {
        self.tracks.values()
    }

    #[cfg(test)]
    pub(crate) fn track_mut(&mut self, id: TrackId) -> Option<&mut DynamicObject> {
        self.tracks.get_mut(&id)
    }

    /// Run the match, retire and promote passes for one tick.
    ///
    /// `landmarks` is read to decide promotions and to find the landmarks
    /// vacated by retired tracks; it is not modified.
    pub fn update(
        &mut self,
        candidates: &[Point2],
        landmarks: &LandmarkMap,
        now_ms: u64,
    ) -> TrackerUpdate {
        let mut out = TrackerUpdate::default();

        let unmatched = self.associate(candidates, now_ms, &mut out.matched);
        self.retire(
            &out.matched,
            landmarks,
            now_ms,
            &mut out.retired,
            &mut out.vacated_landmarks,
        );

        for candidate in unmatched {
            if self.should_promote(candidate, landmarks) {
                let id = self.seed(candidate, now_ms);
                info!(id, x = candidate.x, y = candidate.y, "promoted dynamic track");
                out.promoted.push(id);
            } else {
                out.passthrough.push(candidate);
            }
        }

        out
    }

    fn associate(
        &mut self,
        candidates: &[Point2],
        now_ms: u64,
        matched: &mut BTreeSet<TrackId>,
    ) -> Vec<Point2> {
        let radius = self.association_radius;
        let min_motion = self.min_motion_velocity;
        let smoothing = self.velocity_smoothing;
        let max_history = self.max_history;

        let mut unmatched = Vec::new();
        for &candidate in candidates {
            let hit = self.tracks.values_mut().find(|t| {
                !matched.contains(&t.id)
                    && t.velocity > min_motion
                    && t.latest().is_some_and(|p| p.distance(candidate) < radius)
            });
            match hit {
                Some(track) => {
                    record_match(track, candidate, now_ms, smoothing, max_history);
                    matched.insert(track.id);
                }
                None => unmatched.push(candidate),
            }
        }
        unmatched
    }

    fn retire(
        &mut self,
        matched: &BTreeSet<TrackId>,
        landmarks: &LandmarkMap,
        now_ms: u64,
        retired: &mut Vec<TrackId>,
        vacated: &mut Vec<LandmarkId>,
    ) {
        let radius = self.association_radius;
        let min_motion = self.min_motion_velocity;
        let timeout = self.retirement_timeout_ms;

        self.tracks.retain(|id, track| {
            if matched.contains(id) || now_ms.saturating_sub(track.last_update_ms) < timeout {
                return true;
            }
            track.status = TrackStatus::Stale;
            if track.velocity <= min_motion {
                return true;
            }
            if let Some(last) = track.latest() {
                vacated.extend(
                    landmarks
                        .iter()
                        .filter(|l| l.position.distance(last) < radius)
                        .map(|l| l.id),
                );
            }
            info!(id, velocity = track.velocity, "retired dynamic track");
            retired.push(*id);
            false
        });
    }

    fn should_promote(&self, candidate: Point2, landmarks: &LandmarkMap) -> bool {
        if landmarks.len() <= self.promotion_min_landmarks {
            return false;
        }
        let r = self.association_radius;
        let in_ring = landmarks.iter().any(|l| {
            let d = l.position.distance(candidate);
            d > r && d < 2.0 * r
        });
        in_ring && landmarks.first_within(candidate, r).is_none()
    }
}

/// Blend a previous speed estimate with a new instantaneous one.
pub fn smooth_velocity(previous: f32, instantaneous: f32, smoothing: f32) -> f32 {
    smoothing * previous + (1.0 - smoothing) * instantaneous
}

fn record_match(
    track: &mut DynamicObject,
    position: Point2,
    now_ms: u64,
    smoothing: f32,
    max_history: usize,
) {
    if let Some(previous) = track.latest() {
        let elapsed_s = now_ms.saturating_sub(track.last_update_ms) as f32 / 1000.0;
        if elapsed_s > 0.0 {
            let instantaneous = previous.distance(position) / elapsed_s;
            track.velocity = smooth_velocity(track.velocity, instantaneous, smoothing);
        }
    }
    track.positions.push_back(position);
    while track.positions.len() > max_history {
        track.positions.pop_front();
    }
    track.last_update_ms = now_ms;
    track.status = TrackStatus::Tracked;
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
