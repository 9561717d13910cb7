//! Rate-limited, non-blocking warning announcements.
//!
//! An [`Announcer`] hands accepted text to a [`Speaker`] on a worker thread so
//! the tick loop never waits on speech.  Only one utterance is in flight at a
//! time.  A request is dropped when it repeats the last accepted text, when it
//! arrives within the minimum interval of the last accepted one, or while the
//! speaker is still busy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Minimum spacing between two accepted announcements.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Output device for announcements.  `speak` may block for as long as the
/// utterance takes.
pub trait Speaker: Send + Sync + 'static {
    fn speak(&self, text: &str);
}

/// Emits each announcement as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        info!(target: "datmo::announce", "{text}");
    }
}

/// Outcome of [`Announcer::announce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Announcement {
    Started,
    Duplicate,
    TooSoon,
    Busy,
}

impl Announcement {
    pub fn is_started(self) -> bool {
        self == Announcement::Started
    }
}

pub struct Announcer {
    speaker: Arc<dyn Speaker>,
    min_interval: Duration,
    speaking: Arc<AtomicBool>,
    last: Option<(String, Instant)>,
    worker: Option<JoinHandle<()>>,
}

impl Announcer {
    pub fn new(speaker: Arc<dyn Speaker>) -> Self {
        Self::with_interval(speaker, DEFAULT_MIN_INTERVAL)
    }

    pub fn with_interval(speaker: Arc<dyn Speaker>, min_interval: Duration) -> Self {
        Self {
            speaker,
            min_interval,
            speaking: Arc::new(AtomicBool::new(false)),
            last: None,
            worker: None,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }

    pub fn announce(&mut self, text: &str) -> Announcement {
        self.announce_at(text, Instant::now())
    }

    /// [`announce`](Self::announce) with an explicit clock reading.
    pub fn announce_at(&mut self, text: &str, now: Instant) -> Announcement {
        if self.is_speaking() {
            return Announcement::Busy;
        }
        if let Some((last_text, last_time)) = &self.last {
            if last_text == text {
                return Announcement::Duplicate;
            }
            if now.saturating_duration_since(*last_time) < self.min_interval {
                return Announcement::TooSoon;
            }
        }

        // Reap the previous worker; it has already cleared the flag.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.speaking.store(true, Ordering::Release);
        self.last = Some((text.to_string(), now));

        let speaker = Arc::clone(&self.speaker);
        let speaking = Arc::clone(&self.speaking);
        let owned = text.to_string();
        self.worker = Some(thread::spawn(move || {
            speaker.speak(&owned);
            speaking.store(false, Ordering::Release);
        }));
        debug!(text, "announcement started");
        Announcement::Started
    }

    /// Block until the in-flight announcement, if any, has finished.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.wait();
    }
}
