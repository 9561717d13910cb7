//! [`Session`] – one simulation run.
//!
//! A session owns the [`World`], the perception [`Pipeline`] and an optional
//! [`Announcer`], and advances a simulated millisecond clock by a fixed
//! `tick_ms` per step.  Each [`Session::step`]:
//!
//! 1. moves the observed agent, the moving obstacles and then the robot,
//!    which steers clear of the currently mapped landmarks;
//! 2. runs the pipeline tick from the robot's new position, with the agent as
//!    the proximity reference;
//! 3. forwards any proximity warning to the announcer.

use std::sync::Arc;

use datmo_perception::Pipeline;
use datmo_types::{DatmoError, PipelineConfig, Point2, TickSnapshot};
use datmo_world::{World, WorldBuilder, WorldConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::announcer::{Announcement, Announcer, Speaker};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    pub world: WorldConfig,
    /// Simulated time per step.
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        let world = WorldConfig {
            follow_distance: pipeline.max_range / 2.0,
            ..Default::default()
        };
        Self {
            pipeline,
            world,
            tick_ms: 33,
        }
    }
}

/// Running totals over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub ticks: u64,
    pub warnings: u64,
    pub announcements: u64,
    pub landmarks_created: u64,
    pub landmarks_removed: u64,
    pub tracks_promoted: u64,
    pub tracks_retired: u64,
}

pub struct Session {
    id: Uuid,
    tick_ms: u64,
    clock_ms: u64,
    world: World,
    pipeline: Pipeline,
    announcer: Option<Announcer>,
    stats: SessionStats,
}

impl Session {
    /// Build the world and the pipeline.  With `speaker` set, warnings are
    /// announced through it.
    ///
    /// # Errors
    ///
    /// Returns [`DatmoError::Config`] for an invalid pipeline configuration or
    /// a zero `tick_ms`, and [`DatmoError::World`] when the world cannot be
    /// built.
    pub fn new(config: SessionConfig, speaker: Option<Arc<dyn Speaker>>) -> Result<Self, DatmoError> {
        if config.tick_ms == 0 {
            return Err(DatmoError::Config {
                field: "tick_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let world = WorldBuilder::new(config.world).build()?;
        Self::with_world(world, config.pipeline, config.tick_ms, speaker)
    }

    /// Run a session over a world built elsewhere.
    pub fn with_world(
        world: World,
        pipeline: PipelineConfig,
        tick_ms: u64,
        speaker: Option<Arc<dyn Speaker>>,
    ) -> Result<Self, DatmoError> {
        let pipeline = Pipeline::new(pipeline, world.agent().position(), 0)?;
        let id = Uuid::new_v4();
        info!(
            run_id = %id,
            tick_ms,
            obstacles = world.obstacles().len(),
            "session started"
        );
        Ok(Self {
            id,
            tick_ms,
            clock_ms: 0,
            world,
            pipeline,
            announcer: speaker.map(Announcer::new),
            stats: SessionStats::default(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Advance one tick.
    pub fn step(&mut self) -> TickSnapshot {
        let tick = self.stats.ticks + 1;
        let span = info_span!(
            "session_step",
            run_id = %self.id,
            tick,
            time_ms = self.clock_ms + self.tick_ms
        );
        let _enter = span.enter();

        let landmarks: Vec<Point2> = self
            .pipeline
            .landmarks()
            .iter()
            .map(|l| l.position)
            .collect();
        self.world.step(&landmarks);
        self.clock_ms += self.tick_ms;

        let robot = self.world.robot().position();
        let agent = self.world.agent().position();
        let snapshot = self.pipeline.tick(robot, agent, &self.world, self.clock_ms);

        self.stats.ticks = tick;
        self.stats.landmarks_created += snapshot.created_landmarks.len() as u64;
        self.stats.landmarks_removed += snapshot.removed_landmarks.len() as u64;
        self.stats.tracks_promoted += snapshot.promoted_tracks.len() as u64;
        self.stats.tracks_retired += snapshot.retired_tracks.len() as u64;

        if let Some(warning) = snapshot.warning {
            self.stats.warnings += 1;
            if let Some(announcer) = self.announcer.as_mut() {
                let outcome = announcer.announce(&warning.to_string());
                if outcome == Announcement::Started {
                    self.stats.announcements += 1;
                } else {
                    debug!(?outcome, "announcement dropped");
                }
            }
        }

        snapshot
    }

    /// Run `ticks` steps and return the last snapshot.
    pub fn run(&mut self, ticks: u64) -> Option<TickSnapshot> {
        (0..ticks).map(|_| self.step()).last()
    }

    /// Wait for any in-flight announcement to finish.
    pub fn flush(&mut self) {
        if let Some(announcer) = self.announcer.as_mut() {
            announcer.wait();
        }
    }
}
