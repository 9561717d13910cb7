//! `datmo-perception` – mapping and moving-object tracking.
//!
//! Turns raw range scans into a map of static landmarks and a set of tracked
//! moving objects.
//!
//! # Modules
//!
//! - [`sensor`] – [`RangeSensor`][sensor::RangeSensor]: ray casting against an
//!   [`OccupancyMap`][sensor::OccupancyMap] and scan-order clustering into
//!   candidate features.
//! - [`landmarks`] – [`LandmarkMap`][landmarks::LandmarkMap]: first-match
//!   association, per-axis recursive fusion and pruning of dangling landmarks.
//! - [`tracker`] – [`DynamicObjectTracker`][tracker::DynamicObjectTracker]:
//!   matches candidates to moving tracks, retires stale ones and promotes
//!   movement-consistent candidates.
//! - [`proximity`] – [`ProximityMonitor`][proximity::ProximityMonitor]: nearest
//!   point-of-interest warning around the observed agent.
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline]: owns all of the above and
//!   runs one tick in a fixed order.

pub mod landmarks;
pub mod pipeline;
pub mod proximity;
pub mod sensor;
pub mod tracker;

pub use landmarks::LandmarkMap;
pub use pipeline::Pipeline;
pub use proximity::ProximityMonitor;
pub use sensor::{OccupancyMap, RangeSensor};
pub use tracker::{DynamicObjectTracker, TrackerUpdate};
