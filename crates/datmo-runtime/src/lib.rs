//! `datmo-runtime` – drives the simulation.
//!
//! - [`session`] – [`Session`]: world + pipeline + announcer over a simulated
//!   clock.
//! - [`announcer`] – [`Announcer`]: rate-limited warnings spoken off the tick
//!   thread.
//! - [`telemetry`] – subscriber and OTLP setup for binaries.

pub mod announcer;
pub mod session;
pub mod telemetry;

pub use announcer::{Announcement, Announcer, LogSpeaker, Speaker};
pub use session::{Session, SessionConfig, SessionStats};
