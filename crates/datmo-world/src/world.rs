//! The simulated environment: a walled floor plan, moving obstacles, the
//! observed agent and the robot that follows it.
//!
//! # Example
//!
//! ```rust
//! use datmo_types::Point2;
//! use datmo_world::{Rect, WorldBuilder, WorldConfig};
//!
//! let config = WorldConfig {
//!     width: 200,
//!     height: 200,
//!     moving_obstacles: 0,
//!     walls: vec![Rect::new(150, 0, 5, 200)],
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let mut world = WorldBuilder::new(config)
//!     .with_agent_at(Point2::new(100.0, 100.0))
//!     .with_robot_at(Point2::new(40.0, 100.0))
//!     .build()
//!     .expect("valid world");
//!
//! world.step(&[]);
//! assert!(world.robot().position().x > 40.0);
//! ```

use datmo_perception::OccupancyMap;
use datmo_types::{DatmoError, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::actors::{Robot, Walker, random_heading};
use crate::grid::{OccupancyGrid, Rect};

const PLACEMENT_ATTEMPTS: usize = 1000;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// World geometry and actor kinematics.  Distances are world units, speeds
/// are units per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: i32,
    pub height: i32,
    pub walls: Vec<Rect>,
    pub moving_obstacles: usize,
    pub obstacle_speed: f32,
    /// Radius of a moving obstacle's disc as seen by the sensor.
    pub obstacle_radius: f32,
    /// Clearance kept by every actor from walls and the world edge.
    pub collision_buffer: i32,
    pub agent_speed: f32,
    /// Radius of the observed agent's disc as seen by the sensor.
    pub agent_footprint: f32,
    pub robot_speed: f32,
    /// The robot only moves while the agent is farther than this.
    pub follow_distance: f32,
    pub history_len: usize,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            walls: default_floor_plan(1200, 600),
            moving_obstacles: 3,
            obstacle_speed: 2.0,
            obstacle_radius: 10.0,
            collision_buffer: 15,
            agent_speed: 5.0,
            agent_footprint: 4.0,
            robot_speed: 10.0,
            follow_distance: 50.0,
            history_len: 20,
            seed: None,
        }
    }
}

/// Outer walls plus a handful of interior partitions.
pub fn default_floor_plan(width: i32, height: i32) -> Vec<Rect> {
    let t = 5;
    vec![
        Rect::new(0, 0, width, t),
        Rect::new(0, height - t, width, t),
        Rect::new(0, 0, t, height),
        Rect::new(width - t, 0, t, height),
        Rect::new(width / 2, 0, t, height * 5 / 12),
        Rect::new(width / 6, height * 2 / 3, width * 5 / 12, t),
        Rect::new(width * 17 / 24, height / 4, 80, 80),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// World
// ────────────────────────────────────────────────────────────────────────────

pub struct World {
    config: WorldConfig,
    grid: OccupancyGrid,
    obstacles: Vec<Walker>,
    agent: Walker,
    robot: Robot,
    rng: StdRng,
}

impl World {
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn agent(&self) -> &Walker {
        &self.agent
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn obstacles(&self) -> &[Walker] {
        &self.obstacles
    }

    /// Live positions of every moving obstacle.
    pub fn obstacle_positions(&self) -> Vec<Point2> {
        self.obstacles.iter().map(Walker::position).collect()
    }

    /// Walkers keep the collision buffer from walls and the world edge.
    pub fn is_blocked_for_walker(&self, p: Point2) -> bool {
        self.grid.is_blocked(p, self.config.collision_buffer)
    }

    /// The robot keeps the collision buffer from the world edge and from
    /// mapped landmarks, and twice that from moving obstacles.
    pub fn is_blocked_for_agent(&self, p: Point2, landmarks: &[Point2]) -> bool {
        let buffer = self.config.collision_buffer;
        if self.grid.is_near_edge(p, buffer) {
            return true;
        }
        let b = buffer as f32;
        if landmarks
            .iter()
            .any(|l| (l.x - p.x).abs() <= b && (l.y - p.y).abs() <= b)
        {
            return true;
        }
        self.obstacles
            .iter()
            .any(|o| o.position().distance(p) < 2.0 * b)
    }

    /// Advance the world one tick: the agent, then each obstacle, then the
    /// robot toward the agent's new position.  `landmarks` are the mapped
    /// landmark positions the robot steers clear of.
    pub fn step(&mut self, landmarks: &[Point2]) {
        let buffer = self.config.collision_buffer;
        let grid = &self.grid;
        let rng = &mut self.rng;

        if !self.agent.advance(rng, |p| grid.is_blocked(p, buffer)) {
            trace!(heading = self.agent.heading(), "agent turned");
        }
        for obstacle in &mut self.obstacles {
            obstacle.advance(rng, |p| grid.is_blocked(p, buffer));
        }

        let target = self.agent.position();
        if let Some(next) = self.robot.proposed_step(target) {
            if self.is_blocked_for_agent(next, landmarks) {
                trace!(x = next.x, y = next.y, "robot step blocked");
            } else {
                self.robot.commit(next);
            }
        }
    }
}

impl OccupancyMap for World {
    /// Walls, out-of-bounds space, obstacle discs and the agent's footprint.
    fn is_obstacle(&self, point: Point2) -> bool {
        self.grid.is_wall(point)
            || self
                .obstacles
                .iter()
                .any(|o| o.position().distance(point) <= self.config.obstacle_radius)
            || self.agent.position().distance(point) <= self.config.agent_footprint
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Fluent builder for [`World`].
///
/// Without explicit placements the robot starts at
/// `(width/4 + 5, height/4 + 5)`, the agent at `(width/4 + 50, height/4 + 50)`
/// and obstacles at random free positions.
pub struct WorldBuilder {
    config: WorldConfig,
    agent: Option<(Point2, Option<f32>)>,
    robot: Option<Point2>,
    obstacles: Vec<(Point2, f32)>,
}

impl WorldBuilder {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            agent: None,
            robot: None,
            obstacles: Vec::new(),
        }
    }

    pub fn with_agent_at(mut self, position: Point2) -> Self {
        self.agent = Some((position, None));
        self
    }

    pub fn with_agent_heading(mut self, position: Point2, heading: f32) -> Self {
        self.agent = Some((position, Some(heading)));
        self
    }

    pub fn with_robot_at(mut self, position: Point2) -> Self {
        self.robot = Some(position);
        self
    }

    /// Place an obstacle explicitly.  Explicit obstacles replace the random
    /// ones entirely.
    pub fn with_obstacle(mut self, position: Point2, heading: f32) -> Self {
        self.obstacles.push((position, heading));
        self
    }

    /// # Errors
    ///
    /// Returns [`DatmoError::World`] for a degenerate grid, a start position
    /// inside an obstacle, or when a free spot for a random obstacle cannot be
    /// found.
    pub fn build(self) -> Result<World, DatmoError> {
        let cfg = self.config;
        let grid = OccupancyGrid::with_walls(cfg.width, cfg.height, &cfg.walls)?;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (agent_pos, agent_heading) = self.agent.unwrap_or((
            Point2::new(
                (cfg.width / 4 + 50) as f32,
                (cfg.height / 4 + 50) as f32,
            ),
            None,
        ));
        if grid.is_blocked(agent_pos, cfg.collision_buffer) {
            return Err(DatmoError::World(format!(
                "agent start ({}, {}) is inside an obstacle",
                agent_pos.x, agent_pos.y
            )));
        }
        let agent_heading = agent_heading.unwrap_or_else(|| random_heading(&mut rng));
        let agent = Walker::new(agent_pos, agent_heading, cfg.agent_speed, cfg.history_len);

        let robot_pos = self.robot.unwrap_or(Point2::new(
            (cfg.width / 4 + 5) as f32,
            (cfg.height / 4 + 5) as f32,
        ));
        if grid.is_near_edge(robot_pos, cfg.collision_buffer) {
            return Err(DatmoError::World(format!(
                "robot start ({}, {}) is outside the usable area",
                robot_pos.x, robot_pos.y
            )));
        }
        let robot = Robot::new(
            robot_pos,
            cfg.robot_speed,
            cfg.follow_distance,
            cfg.history_len,
        );

        let obstacles = if self.obstacles.is_empty() {
            (0..cfg.moving_obstacles)
                .map(|_| {
                    let pos = free_position(&grid, cfg.collision_buffer, &mut rng)?;
                    let heading = random_heading(&mut rng);
                    Ok(Walker::new(pos, heading, cfg.obstacle_speed, cfg.history_len))
                })
                .collect::<Result<Vec<_>, DatmoError>>()?
        } else {
            self.obstacles
                .into_iter()
                .map(|(pos, heading)| Walker::new(pos, heading, cfg.obstacle_speed, cfg.history_len))
                .collect()
        };

        debug!(
            width = cfg.width,
            height = cfg.height,
            walls = cfg.walls.len(),
            obstacles = obstacles.len(),
            "world built"
        );

        Ok(World {
            config: cfg,
            grid,
            obstacles,
            agent,
            robot,
            rng,
        })
    }
}

fn free_position(grid: &OccupancyGrid, buffer: i32, rng: &mut StdRng) -> Result<Point2, DatmoError> {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let p = Point2::new(
            rng.gen_range(0.0..grid.width() as f32),
            rng.gen_range(0.0..grid.height() as f32),
        );
        if !grid.is_blocked(p, buffer) {
            return Ok(p);
        }
    }
    Err(DatmoError::World(format!(
        "no free position for a moving obstacle after {PLACEMENT_ATTEMPTS} attempts"
    )))
}
