//! [`Pipeline`] – the per-tick perception context.
//!
//! Owns the sensor, the landmark map, the track set and the proximity monitor,
//! and runs them in a fixed order every tick:
//!
//! 1. `RangeSensor::scan` from the robot position.
//! 2. `RangeSensor::extract_features` over the scan.
//! 3. `DynamicObjectTracker::update` claims, retires and promotes.
//! 4. `LandmarkMap::update` consumes the remaining candidates.
//! 5. `LandmarkMap::prune` drops dangling and vacated landmarks.
//! 6. `ProximityMonitor::check` against the observed agent.
//!
//! A tick never fails; configuration problems are rejected by
//! [`Pipeline::new`].

use datmo_types::{DatmoError, Measurement, PipelineConfig, Point2, TickSnapshot};
use tracing::{debug, warn};

use crate::landmarks::LandmarkMap;
use crate::proximity::ProximityMonitor;
use crate::sensor::{OccupancyMap, RangeSensor};
use crate::tracker::DynamicObjectTracker;

pub struct Pipeline {
    config: PipelineConfig,
    sensor: RangeSensor,
    landmarks: LandmarkMap,
    tracker: DynamicObjectTracker,
    proximity: ProximityMonitor,
    ticks: u64,
}

impl Pipeline {
    /// Validate `config` and build the pipeline.  The track set starts with
    /// one track seeded at the observed agent's position.
    ///
    /// # Errors
    ///
    /// Returns [`DatmoError::Config`] when `config` fails validation.
    pub fn new(
        config: PipelineConfig,
        observed_agent: Point2,
        now_ms: u64,
    ) -> Result<Self, DatmoError> {
        config.validate()?;
        let mut tracker = DynamicObjectTracker::new(&config);
        tracker.seed(observed_agent, now_ms);
        Ok(Self {
            sensor: RangeSensor::new(&config),
            landmarks: LandmarkMap::new(&config),
            proximity: ProximityMonitor::new(&config),
            tracker,
            config,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn landmarks(&self) -> &LandmarkMap {
        &self.landmarks
    }

    pub fn tracker(&self) -> &DynamicObjectTracker {
        &self.tracker
    }

    /// Scan `world` from `robot` and run the rest of the tick.
    pub fn tick<M>(
        &mut self,
        robot: Point2,
        observed_agent: Point2,
        world: &M,
        now_ms: u64,
    ) -> TickSnapshot
    where
        M: OccupancyMap + ?Sized,
    {
        let measurements = self.sensor.scan(robot, world);
        self.process(measurements, robot, observed_agent, now_ms)
    }

    /// Run every stage after the scan on an externally supplied scan.
    pub fn process(
        &mut self,
        measurements: Vec<Measurement>,
        robot: Point2,
        observed_agent: Point2,
        now_ms: u64,
    ) -> TickSnapshot {
        self.ticks += 1;

        let features = self.sensor.extract_features(&measurements);
        let update = self.tracker.update(&features, &self.landmarks, now_ms);
        let created_landmarks = self.landmarks.update(&update.passthrough);
        self.landmarks.queue_removal(&update.vacated_landmarks);
        let removed_landmarks = self.landmarks.prune(&measurements, robot);
        let warning = self
            .proximity
            .check(&measurements, self.landmarks.iter(), observed_agent);

        debug!(
            tick = self.ticks,
            measurements = measurements.len(),
            features = features.len(),
            matched = update.matched.len(),
            landmarks = self.landmarks.len(),
            tracks = self.tracker.len(),
            "perception tick"
        );
        if let Some(w) = &warning {
            warn!(distance = w.distance, bearing_deg = w.bearing_deg, "proximity warning");
        }

        TickSnapshot {
            tick: self.ticks,
            time_ms: now_ms,
            landmarks: self.landmarks.iter().copied().collect(),
            tracks: self.tracker.iter().cloned().collect(),
            measurements,
            features,
            warning,
            created_landmarks,
            removed_landmarks,
            promoted_tracks: update.promoted,
            retired_tracks: update.retired,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use datmo_types::TrackStatus;

    fn quiet() -> PipelineConfig {
        PipelineConfig {
            range_noise_std: 0.0,
            noise_seed: 3,
            ..Default::default()
        }
    }

    /// Six tightly packed hits centred on `centre`, enough for one feature.
    fn blob(centre: Point2) -> Vec<Measurement> {
        (0..6)
            .map(|i| Measurement {
                angle: 0.0,
                range: 0.0,
                point: Point2::new(centre.x + 0.2 * (i as f32 - 2.5), centre.y),
            })
            .collect()
    }

    #[test]
    fn invalid_config_fails_fast() {
        let cfg = PipelineConfig {
            association_radius: -1.0,
            ..Default::default()
        };
        let err = Pipeline::new(cfg, Point2::new(0.0, 0.0), 0).err().unwrap();
        assert!(matches!(err, DatmoError::Config { ref field, .. } if field == "association_radius"));
    }

    #[test]
    fn starts_with_one_track_on_observed_agent() {
        let pipeline = Pipeline::new(quiet(), Point2::new(7.0, 8.0), 0).unwrap();
        assert_eq!(pipeline.tracker().len(), 1);
        let seed = pipeline.tracker().get(0).unwrap();
        assert_eq!(seed.latest(), Some(Point2::new(7.0, 8.0)));
        assert_eq!(seed.status, TrackStatus::Seeded);
        assert!(pipeline.landmarks().is_empty());
    }

    #[test]
    fn fixed_candidate_creates_then_refines_one_landmark() {
        let mut pipeline = Pipeline::new(quiet(), Point2::new(500.0, 500.0), 0).unwrap();
        let robot = Point2::new(0.0, 0.0);
        let centre = Point2::new(40.0, 0.0);

        let first = pipeline.process(blob(centre), robot, Point2::new(500.0, 500.0), 33);
        assert_eq!(first.created_landmarks, vec![0]);
        let mut var = first.landmarks[0].covariance.variance(0);

        for tick in 2..=3u64 {
            let snap = pipeline.process(blob(centre), robot, Point2::new(500.0, 500.0), 33 * tick);
            assert!(snap.created_landmarks.is_empty());
            assert!(snap.removed_landmarks.is_empty());
            assert_eq!(snap.landmarks.len(), 1);
            let lm = snap.landmarks[0];
            assert!((lm.position.x - centre.x).abs() < 1e-4);
            assert!(lm.covariance.variance(0) < var);
            assert!(lm.covariance.variance(1) < var);
            var = lm.covariance.variance(0);
        }
    }

    #[test]
    fn landmark_without_support_is_dropped_same_tick() {
        let mut pipeline = Pipeline::new(quiet(), Point2::new(500.0, 500.0), 0).unwrap();
        let robot = Point2::new(0.0, 0.0);
        pipeline.process(blob(Point2::new(40.0, 0.0)), robot, robot, 10);
        assert_eq!(pipeline.landmarks().len(), 1);

        // Next scan sees something else entirely.
        let snap = pipeline.process(blob(Point2::new(-60.0, 0.0)), robot, robot, 20);
        assert_eq!(snap.removed_landmarks, vec![0]);
        assert!(pipeline.landmarks().get(0).is_none());
        assert!(pipeline.landmarks().get(1).is_some());
    }

    #[test]
    fn retired_track_takes_nearby_landmark_with_it() {
        let p = Point2::new(40.0, 0.0);
        let robot = Point2::new(0.0, 0.0);
        let mut pipeline = Pipeline::new(quiet(), Point2::new(500.0, 500.0), 0).unwrap();
        // A landmark at P that stays supported by the scan.
        pipeline.process(blob(p), robot, robot, 0);
        pipeline.tracker.seed(p, 0);
        if let Some(track) = pipeline.tracker.track_mut(1) {
            track.velocity = 2.0;
            track.status = TrackStatus::Tracked;
        }

        // Too few hits for a feature, but enough to keep the landmark
        // supported under the range rule.
        let support: Vec<Measurement> = blob(p).into_iter().take(3).collect();
        let snap = pipeline.process(support.clone(), robot, robot, 4000);
        assert!(snap.retired_tracks.is_empty());
        assert_eq!(snap.landmarks.len(), 1);

        let snap = pipeline.process(support, robot, robot, 5001);
        assert_eq!(snap.retired_tracks, vec![1]);
        assert_eq!(snap.removed_landmarks, vec![0]);
        assert!(pipeline.landmarks().is_empty());
    }

    #[test]
    fn tick_scans_world_and_reports_warning() {
        let mut pipeline = Pipeline::new(quiet(), Point2::new(0.0, 0.0), 0).unwrap();
        // Ring wall of radius 20 around the robot, which stands on the agent.
        let world = |p: Point2| p.distance(Point2::new(0.0, 0.0)) >= 20.0;
        let snap = pipeline.tick(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), &world, 33);
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.measurements.len(), 720);
        let warning = snap.warning.expect("wall is within warning distance");
        assert!(warning.distance >= 20.0 && warning.distance < 21.5);
        assert!((0.0..360.0).contains(&warning.bearing_deg));
    }
}
