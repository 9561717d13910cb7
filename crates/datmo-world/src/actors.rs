//! Things that move: random walkers and the following robot.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use datmo_types::Point2;
use rand::Rng;

/// Draw a heading uniformly from `[0, 2π)`.
pub fn random_heading<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(0.0..TAU)
}

// ────────────────────────────────────────────────────────────────────────────
// Walker
// ────────────────────────────────────────────────────────────────────────────

/// A constant-speed random walker.
///
/// Moving obstacles and the observed agent are both walkers.  Each step the
/// walker proposes `position + speed·(cos h, sin h)`; when that point is
/// blocked it stays put and draws a fresh heading instead.
#[derive(Debug, Clone)]
pub struct Walker {
    position: Point2,
    heading: f32,
    speed: f32,
    history: VecDeque<Point2>,
    history_len: usize,
}

impl Walker {
    pub fn new(position: Point2, heading: f32, speed: f32, history_len: usize) -> Self {
        let mut history = VecDeque::with_capacity(history_len);
        history.push_back(position);
        Self {
            position,
            heading,
            speed,
            history,
            history_len,
        }
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    /// Recent positions, oldest first.
    pub fn history(&self) -> &VecDeque<Point2> {
        &self.history
    }

    /// Advance one step.  Returns `true` when the walker moved.
    pub fn advance<R, B>(&mut self, rng: &mut R, is_blocked: B) -> bool
    where
        R: Rng + ?Sized,
        B: Fn(Point2) -> bool,
    {
        let next = self.position.offset(self.heading, self.speed);
        if is_blocked(next) {
            self.heading = random_heading(rng);
            return false;
        }
        self.position = next;
        self.history.push_back(next);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
        true
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Robot
// ────────────────────────────────────────────────────────────────────────────

/// The sensing platform.  Heads straight for its target whenever it is
/// farther away than the follow distance.
#[derive(Debug, Clone)]
pub struct Robot {
    position: Point2,
    speed: f32,
    follow_distance: f32,
    path: VecDeque<Point2>,
    path_len: usize,
}

impl Robot {
    pub fn new(position: Point2, speed: f32, follow_distance: f32, path_len: usize) -> Self {
        let mut path = VecDeque::with_capacity(path_len);
        path.push_back(position);
        Self {
            position,
            speed,
            follow_distance,
            path,
            path_len,
        }
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    /// The start position and recent moves, oldest first.
    pub fn path(&self) -> &VecDeque<Point2> {
        &self.path
    }

    /// The next position toward `target`, or `None` while the target is
    /// within the follow distance.
    pub fn proposed_step(&self, target: Point2) -> Option<Point2> {
        if self.position.distance(target) <= self.follow_distance {
            return None;
        }
        let heading = self.position.bearing_to(target);
        Some(self.position.offset(heading, self.speed))
    }

    /// Move to `next` and record it on the path.
    pub fn commit(&mut self, next: Point2) {
        self.position = next;
        self.path.push_back(next);
        while self.path.len() > self.path_len {
            self.path.pop_front();
        }
    }
}
