//! `datmo-world` – the simulated environment the pipeline observes.
//!
//! - [`grid`] – [`OccupancyGrid`]: rasterised walls, out-of-bounds is solid.
//! - [`actors`] – [`Walker`] random walkers and the following [`Robot`].
//! - [`world`] – [`World`] ties them together, implements
//!   [`OccupancyMap`](datmo_perception::OccupancyMap) for the range sensor and
//!   advances everything one tick at a time.

pub mod actors;
pub mod grid;
pub mod world;

pub use actors::{Robot, Walker};
pub use grid::{OccupancyGrid, Rect};
pub use world::{World, WorldBuilder, WorldConfig, default_floor_plan};
