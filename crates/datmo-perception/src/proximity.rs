//! Nearest-obstacle proximity check.
//!
//! [`ProximityMonitor::check`] is a pure function of the tick's measurements
//! and landmarks: it finds the closest point to a reference position, ignoring
//! anything inside the self-exclusion radius (the reference object's own
//! footprint), and yields a [`ProximityWarning`] when that point is nearer
//! than the warning distance.

use datmo_types::{Landmark, Measurement, PipelineConfig, Point2, ProximityWarning};

#[derive(Debug, Clone, Copy)]
pub struct ProximityMonitor {
    self_exclusion_radius: f32,
    warning_distance: f32,
}

impl ProximityMonitor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            self_exclusion_radius: config.self_exclusion_radius,
            warning_distance: config.warning_distance,
        }
    }

    /// Return the warning for the nearest measurement hit or landmark, or
    /// `None` when nothing outside the self-exclusion radius is closer than
    /// the warning distance.
    ///
    /// Ties keep the first point seen; measurements are visited before
    /// landmarks.
    pub fn check<'a, I>(
        &self,
        measurements: &[Measurement],
        landmarks: I,
        reference: Point2,
    ) -> Option<ProximityWarning>
    where
        I: IntoIterator<Item = &'a Landmark>,
    {
        let points = measurements
            .iter()
            .map(|m| m.point)
            .chain(landmarks.into_iter().map(|l| l.position));

        let mut nearest: Option<(f32, f32)> = None;
        for point in points {
            let distance = reference.distance(point);
            if distance < self.self_exclusion_radius {
                continue;
            }
            if nearest.is_none_or(|(best, _)| distance < best) {
                nearest = Some((distance, reference.bearing_to(point)));
            }
        }

        let (distance, bearing) = nearest?;
        if distance >= self.warning_distance {
            return None;
        }
        Some(ProximityWarning {
            distance: (distance * 10.0).round() / 10.0,
            bearing_deg: normalize_degrees(bearing.to_degrees()),
        })
    }
}

/// Map any angle in degrees onto `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped + 0.0 }
}
