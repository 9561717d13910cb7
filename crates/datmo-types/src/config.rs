//! Tunable constants of the perception pipeline.
//!
//! Every field has a default, so a partial `[pipeline]` table in a TOML file
//! only overrides what it names.  Call [`PipelineConfig::validate`] before
//! handing a config to the pipeline; the pipeline constructor does so itself.
//!
//! # Example
//!
//! ```rust
//! use datmo_types::PipelineConfig;
//!
//! let mut cfg = PipelineConfig::default();
//! assert!(cfg.validate().is_ok());
//!
//! cfg.association_radius = 0.0;
//! assert!(cfg.validate().is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::DatmoError;

/// Pipeline configuration surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of rays per full turn.
    pub angular_samples: usize,
    /// Maximum ray length (world units, one step per unit).
    pub max_range: f32,
    /// Standard deviation of the Gaussian noise added to each range.
    pub range_noise_std: f32,
    /// Maximum gap between consecutive hit points inside one cluster.
    pub cluster_threshold: f32,
    /// A cluster becomes a feature only when its size exceeds this.
    pub min_cluster_size: usize,
    /// Compare the last ray with the first when clustering.  Off by default.
    pub wrap_clusters: bool,
    /// Gate used for landmark and track association.
    pub association_radius: f32,
    /// Measurement noise `R` of the per-axis landmark filter.
    pub measurement_noise: f32,
    /// Diagonal value of a new landmark's covariance.
    pub initial_covariance: f32,
    /// Track promotion needs strictly more landmarks than this.
    pub promotion_min_landmarks: usize,
    /// Maximum length of a track's position history.
    pub max_history: usize,
    /// Speed a track must exceed to be matched or retired.
    pub min_motion_velocity: f32,
    /// Unmatched time after which a moving track is retired (ms).
    pub retirement_timeout_ms: u64,
    /// Weight of the previous speed in the moving-average update.
    pub velocity_smoothing: f32,
    /// Nearest-point distance below which a warning is raised.
    pub warning_distance: f32,
    /// Points closer than this to the reference are ignored.
    pub self_exclusion_radius: f32,
    /// Seed for the range noise.  `0` draws from OS entropy.
    pub noise_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            angular_samples: 720,
            max_range: 100.0,
            range_noise_std: 0.01,
            cluster_threshold: 10.0,
            min_cluster_size: 5,
            wrap_clusters: false,
            association_radius: 3.0,
            measurement_noise: 0.1,
            initial_covariance: 0.1,
            promotion_min_landmarks: 3,
            max_history: 20,
            min_motion_velocity: 0.5,
            retirement_timeout_ms: 5000,
            velocity_smoothing: 0.7,
            warning_distance: 30.0,
            self_exclusion_radius: 5.0,
            noise_seed: 0,
        }
    }
}

impl PipelineConfig {
    /// Check every field for values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`DatmoError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), DatmoError> {
        if self.angular_samples == 0 {
            return Err(DatmoError::config("angular_samples", "must be at least 1"));
        }
        positive("max_range", self.max_range)?;
        positive("cluster_threshold", self.cluster_threshold)?;
        positive("association_radius", self.association_radius)?;
        positive("measurement_noise", self.measurement_noise)?;
        positive("initial_covariance", self.initial_covariance)?;
        positive("warning_distance", self.warning_distance)?;
        non_negative("range_noise_std", self.range_noise_std)?;
        non_negative("min_motion_velocity", self.min_motion_velocity)?;
        non_negative("self_exclusion_radius", self.self_exclusion_radius)?;
        if self.max_history == 0 {
            return Err(DatmoError::config("max_history", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.velocity_smoothing) {
            return Err(DatmoError::config(
                "velocity_smoothing",
                format!("{} is outside [0, 1]", self.velocity_smoothing),
            ));
        }
        Ok(())
    }
}

fn positive(field: &str, value: f32) -> Result<(), DatmoError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DatmoError::config(field, format!("{value} must be positive and finite")))
    }
}

fn non_negative(field: &str, value: f32) -> Result<(), DatmoError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DatmoError::config(field, format!("{value} must be non-negative and finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: DatmoError) -> String {
        match err {
            DatmoError::Config { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_samples_rejected() {
        let cfg = PipelineConfig {
            angular_samples: 0,
            ..Default::default()
        };
        assert_eq!(field_of(cfg.validate().unwrap_err()), "angular_samples");
    }

    #[test]
    fn non_positive_radius_rejected() {
        for radius in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let cfg = PipelineConfig {
                association_radius: radius,
                ..Default::default()
            };
            assert_eq!(field_of(cfg.validate().unwrap_err()), "association_radius");
        }
    }

    #[test]
    fn smoothing_outside_unit_interval_rejected() {
        let cfg = PipelineConfig {
            velocity_smoothing: 1.5,
            ..Default::default()
        };
        assert_eq!(field_of(cfg.validate().unwrap_err()), "velocity_smoothing");
    }

    #[test]
    fn zero_history_rejected() {
        let cfg = PipelineConfig {
            max_history: 0,
            ..Default::default()
        };
        assert_eq!(field_of(cfg.validate().unwrap_err()), "max_history");
    }

    #[test]
    fn negative_noise_rejected() {
        let cfg = PipelineConfig {
            range_noise_std: -0.1,
            ..Default::default()
        };
        assert_eq!(field_of(cfg.validate().unwrap_err()), "range_noise_std");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "association_radius": 4.5 }"#).unwrap();
        assert_eq!(cfg.association_radius, 4.5);
        assert_eq!(cfg.angular_samples, 720);
        assert_eq!(cfg.retirement_timeout_ms, 5000);
    }
}
