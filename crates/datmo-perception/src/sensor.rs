//! Rotating range sensor.
//!
//! [`RangeSensor::scan`] casts one ray per angular sample from the sensor
//! origin and marches it in unit steps until the [`OccupancyMap`] reports an
//! obstacle or the maximum range is reached.  Rays without a hit produce no
//! [`Measurement`].  Gaussian noise is added to the recorded range only; the
//! hit point stays exact.
//!
//! [`extract_features`] groups consecutive measurements into clusters by
//! single linkage over scan order and reports each large-enough cluster's
//! centroid as a candidate feature.
//!
//! # Scan seam
//!
//! Clustering runs over the scan in angle order and does not compare the last
//! ray with the first, so an object straddling angle 0 is reported as two
//! features.  Set `wrap_clusters` to merge across the seam.
//!
//! # Example
//!
//! ```rust
//! use datmo_perception::sensor::RangeSensor;
//! use datmo_types::{PipelineConfig, Point2};
//!
//! let cfg = PipelineConfig { noise_seed: 7, ..Default::default() };
//! let mut sensor = RangeSensor::new(&cfg);
//!
//! // A ring-shaped wall of radius 40 around the origin.
//! let world = |p: Point2| p.distance(Point2::new(0.0, 0.0)) >= 40.0;
//! let scan = sensor.scan(Point2::new(0.0, 0.0), &world);
//! assert_eq!(scan.len(), 720);
//! ```

use std::f32::consts::TAU;

use datmo_types::{Measurement, PipelineConfig, Point2, centroid};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

// ────────────────────────────────────────────────────────────────────────────
// Occupancy seam
// ────────────────────────────────────────────────────────────────────────────

/// Occupancy query used by ray casting.
///
/// Implementations should report points outside their known bounds as
/// occupied so rays terminate at the edge of the world.
pub trait OccupancyMap {
    fn is_obstacle(&self, point: Point2) -> bool;
}

impl<F> OccupancyMap for F
where
    F: Fn(Point2) -> bool,
{
    fn is_obstacle(&self, point: Point2) -> bool {
        self(point)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RangeSensor
// ────────────────────────────────────────────────────────────────────────────

/// Simulated time-of-flight sensor spanning a full turn.
pub struct RangeSensor {
    angular_samples: usize,
    max_range: f32,
    noise_std: f32,
    cluster_threshold: f32,
    min_cluster_size: usize,
    wrap_clusters: bool,
    rng: StdRng,
}

impl RangeSensor {
    /// Build a sensor from the ray-casting and clustering fields of `config`.
    ///
    /// A `noise_seed` of `0` seeds the noise generator from OS entropy.
    pub fn new(config: &PipelineConfig) -> Self {
        let rng = if config.noise_seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(config.noise_seed)
        };
        Self {
            angular_samples: config.angular_samples,
            max_range: config.max_range,
            noise_std: config.range_noise_std,
            cluster_threshold: config.cluster_threshold,
            min_cluster_size: config.min_cluster_size,
            wrap_clusters: config.wrap_clusters,
            rng,
        }
    }

    /// Cast every ray from `origin` and return the hits in angle order.
    pub fn scan<M>(&mut self, origin: Point2, world: &M) -> Vec<Measurement>
    where
        M: OccupancyMap + ?Sized,
    {
        let resolution = TAU / self.angular_samples as f32;
        let steps = self.max_range.floor() as u32;
        let mut measurements = Vec::with_capacity(self.angular_samples);

        for i in 0..self.angular_samples {
            let angle = i as f32 * resolution;
            let (sin, cos) = angle.sin_cos();
            for step in 1..=steps {
                let r = step as f32;
                let point = Point2::new(origin.x + cos * r, origin.y + sin * r);
                if world.is_obstacle(point) {
                    let range = origin.distance(point) + self.gaussian();
                    measurements.push(Measurement { angle, range, point });
                    break;
                }
            }
        }

        measurements
    }

    /// Cluster `measurements` with the configured threshold and size gate.
    pub fn extract_features(&self, measurements: &[Measurement]) -> Vec<Point2> {
        extract_features(
            measurements,
            self.cluster_threshold,
            self.min_cluster_size,
            self.wrap_clusters,
        )
    }

    fn gaussian(&mut self) -> f32 {
        if self.noise_std == 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * self.noise_std
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Feature extraction
// ────────────────────────────────────────────────────────────────────────────

/// Sequential single-linkage clustering over scan order.
///
/// A measurement joins the open cluster when its hit point is closer than
/// `threshold` to the previous measurement's hit point; otherwise the open
/// cluster is closed and a new one starts.  Clusters with more than
/// `min_cluster_size` members are reported as their centroid.
///
/// With `wrap` set, the trailing cluster is merged into the leading one when
/// the last and first hits are within `threshold` of each other.
pub fn extract_features(
    measurements: &[Measurement],
    threshold: f32,
    min_cluster_size: usize,
    wrap: bool,
) -> Vec<Point2> {
    let mut clusters: Vec<Vec<Point2>> = Vec::new();
    let mut current: Vec<Point2> = Vec::new();
    let mut previous: Option<Point2> = None;

    for m in measurements {
        if let Some(prev) = previous
            && prev.distance(m.point) >= threshold
        {
            clusters.push(std::mem::take(&mut current));
        }
        current.push(m.point);
        previous = Some(m.point);
    }
    if !current.is_empty() {
        clusters.push(current);
    }

    if wrap && clusters.len() > 1 {
        let first = measurements[0].point;
        let last = measurements[measurements.len() - 1].point;
        if last.distance(first) < threshold
            && let Some(tail) = clusters.pop()
        {
            clusters[0].extend(tail);
        }
    }

    clusters
        .iter()
        .filter(|c| c.len() > min_cluster_size)
        .filter_map(|c| centroid(c))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> PipelineConfig {
        PipelineConfig {
            range_noise_std: 0.0,
            noise_seed: 1,
            ..Default::default()
        }
    }

    fn hit(x: f32, y: f32) -> Measurement {
        Measurement {
            angle: 0.0,
            range: 0.0,
            point: Point2::new(x, y),
        }
    }

    /// Wall band 50 units below the origin covering roughly 30° of arc.
    fn wall_ahead(p: Point2) -> bool {
        p.y >= 50.0 && p.y < 51.0 && p.x.abs() <= 13.0
    }

    /// Same wall, but centred on angle 0 so it straddles the scan seam.
    fn wall_on_seam(p: Point2) -> bool {
        p.x >= 50.0 && p.x < 51.0 && p.y.abs() <= 13.0
    }

    #[test]
    fn empty_world_produces_no_measurements() {
        let mut sensor = RangeSensor::new(&quiet_config());
        let scan = sensor.scan(Point2::new(0.0, 0.0), &|_: Point2| false);
        assert!(scan.is_empty());
    }

    #[test]
    fn wall_produces_single_feature_on_segment() {
        let mut sensor = RangeSensor::new(&quiet_config());
        let scan = sensor.scan(Point2::new(0.0, 0.0), &wall_ahead);
        assert!(scan.len() > 40, "expected a run of hits, got {}", scan.len());
        assert!(scan.iter().all(|m| wall_ahead(m.point)));

        let features = sensor.extract_features(&scan);
        assert_eq!(features.len(), 1);
        let f = features[0];
        assert!(f.x.abs() < 0.5, "centroid x = {}", f.x);
        assert!(f.y >= 50.0 && f.y < 51.0, "centroid y = {}", f.y);
    }

    #[test]
    fn hits_are_consecutive_rays() {
        let mut sensor = RangeSensor::new(&quiet_config());
        let scan = sensor.scan(Point2::new(0.0, 0.0), &wall_ahead);
        let resolution = TAU / 720.0;
        for pair in scan.windows(2) {
            assert!((pair[1].angle - pair[0].angle - resolution).abs() < 1e-4);
        }
    }

    #[test]
    fn noise_only_perturbs_range() {
        let cfg = PipelineConfig {
            range_noise_std: 1.0,
            noise_seed: 42,
            ..Default::default()
        };
        let mut sensor = RangeSensor::new(&cfg);
        let origin = Point2::new(0.0, 0.0);
        let scan = sensor.scan(origin, &wall_ahead);

        let mut perturbed = 0;
        for m in &scan {
            let exact = origin.distance(m.point);
            // Hit points lie on whole unit steps along the ray.
            assert!((exact - exact.round()).abs() < 1e-3);
            if (m.range - exact).abs() > 1e-4 {
                perturbed += 1;
            }
        }
        assert!(perturbed > scan.len() / 2);
    }

    #[test]
    fn zero_noise_range_equals_hit_distance() {
        let mut sensor = RangeSensor::new(&quiet_config());
        let origin = Point2::new(2.0, 3.0);
        for m in sensor.scan(origin, &|p: Point2| p.distance(Point2::new(2.0, 3.0)) >= 20.0) {
            assert!((m.range - origin.distance(m.point)).abs() < 1e-5);
        }
    }

    #[test]
    fn rays_stop_at_max_range() {
        let cfg = PipelineConfig {
            max_range: 30.0,
            ..quiet_config()
        };
        let mut sensor = RangeSensor::new(&cfg);
        // Wall at 50 is beyond a 30-unit sensor.
        assert!(sensor.scan(Point2::new(0.0, 0.0), &wall_ahead).is_empty());
    }

    #[test]
    fn feature_is_cluster_mean() {
        let scan: Vec<Measurement> = (0..8).map(|i| hit(i as f32, i as f32)).collect();
        let features = extract_features(&scan, 10.0, 5, false);
        assert_eq!(features.len(), 1);
        assert!((features[0].x - 3.5).abs() < 1e-5);
        assert!((features[0].y - 3.5).abs() < 1e-5);
    }

    #[test]
    fn cluster_size_must_exceed_minimum() {
        let five: Vec<Measurement> = (0..5).map(|i| hit(i as f32, 0.0)).collect();
        assert!(extract_features(&five, 10.0, 5, false).is_empty());

        let six: Vec<Measurement> = (0..6).map(|i| hit(i as f32, 0.0)).collect();
        assert_eq!(extract_features(&six, 10.0, 5, false).len(), 1);
    }

    #[test]
    fn gap_splits_clusters() {
        let mut scan: Vec<Measurement> = (0..6).map(|i| hit(i as f32, 0.0)).collect();
        scan.extend((0..6).map(|i| hit(100.0 + i as f32, 0.0)));
        let features = extract_features(&scan, 10.0, 5, false);
        assert_eq!(features.len(), 2);
        assert!((features[0].x - 2.5).abs() < 1e-5);
        assert!((features[1].x - 102.5).abs() < 1e-5);
    }

    #[test]
    fn link_is_measured_against_previous_hit_only() {
        // Each step is 6 units: the chain spans 30 units but stays one cluster.
        let scan: Vec<Measurement> = (0..6).map(|i| hit(6.0 * i as f32, 0.0)).collect();
        assert_eq!(extract_features(&scan, 10.0, 5, false).len(), 1);
    }

    #[test]
    fn seam_splits_object_without_wrap() {
        let mut sensor = RangeSensor::new(&quiet_config());
        let scan = sensor.scan(Point2::new(0.0, 0.0), &wall_on_seam);
        let features = sensor.extract_features(&scan);
        assert_eq!(features.len(), 2);
        assert!(features[0].y > 0.0);
        assert!(features[1].y < 0.0);
    }

    #[test]
    fn wrap_merges_object_across_seam() {
        let cfg = PipelineConfig {
            wrap_clusters: true,
            ..quiet_config()
        };
        let mut sensor = RangeSensor::new(&cfg);
        let scan = sensor.scan(Point2::new(0.0, 0.0), &wall_on_seam);
        let features = sensor.extract_features(&scan);
        assert_eq!(features.len(), 1);
        assert!(features[0].y.abs() < 0.5);
        assert!(features[0].x >= 50.0 && features[0].x < 51.0);
    }

    #[test]
    fn empty_scan_has_no_features() {
        assert!(extract_features(&[], 10.0, 5, true).is_empty());
    }
}
