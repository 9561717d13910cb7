//! Run configuration – reads/writes `~/.datmo/config.toml`.

use colored::Colorize;
use datmo_runtime::SessionConfig;
use datmo_runtime::telemetry::{LogFormat, TelemetryConfig};
use datmo_types::PipelineConfig;
use datmo_world::{WorldConfig, default_floor_plan};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persisted run configuration stored in `~/.datmo/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of ticks to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Simulated milliseconds per tick.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Sleep `tick_ms` of wall time between ticks.
    #[serde(default)]
    pub realtime: bool,

    #[serde(default = "default_width")]
    pub width: i32,

    #[serde(default = "default_height")]
    pub height: i32,

    #[serde(default = "default_moving_obstacles")]
    pub moving_obstacles: usize,

    /// Seeds the world and, unless `[pipeline]` sets its own, the range noise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Print proximity warnings to the terminal.
    #[serde(default = "default_announce")]
    pub announce: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// OTLP/HTTP collector base URL (e.g. `http://localhost:4318`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_ticks() -> u64 {
    600
}
fn default_tick_ms() -> u64 {
    33
}
fn default_width() -> i32 {
    1200
}
fn default_height() -> i32 {
    600
}
fn default_moving_obstacles() -> usize {
    3
}
fn default_announce() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            tick_ms: default_tick_ms(),
            realtime: false,
            width: default_width(),
            height: default_height(),
            moving_obstacles: default_moving_obstacles(),
            seed: None,
            announce: default_announce(),
            log_format: LogFormat::default(),
            otlp_endpoint: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// The session this configuration describes.  The robot's follow zone is
    /// half the sensor range.
    pub fn session_config(&self) -> SessionConfig {
        let mut pipeline = self.pipeline.clone();
        if pipeline.noise_seed == 0
            && let Some(seed) = self.seed
        {
            pipeline.noise_seed = seed;
        }
        let world = WorldConfig {
            width: self.width,
            height: self.height,
            walls: default_floor_plan(self.width, self.height),
            moving_obstacles: self.moving_obstacles,
            follow_distance: pipeline.max_range / 2.0,
            seed: self.seed,
            ..Default::default()
        };
        SessionConfig {
            pipeline,
            world,
            tick_ms: self.tick_ms,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            format: self.log_format,
            otlp_endpoint: self.otlp_endpoint.clone(),
            ..Default::default()
        }
    }
}

/// Return the path to `~/.datmo/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".datmo").join("config.toml")
}

/// Load the config file as written.  Returns `None` if the file does not
/// exist; overrides are applied by [`load_effective`].
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Resolve the configuration a run uses from the outcome of [`load`].
///
/// A missing or unreadable file falls back to defaults; `DATMO_*` overrides
/// apply in every case.
pub fn load_effective(loaded: Result<Option<Config>, String>) -> Config {
    let mut cfg = match loaded {
        Ok(Some(cfg)) => cfg,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `DATMO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DATMO_TICKS` | `ticks` |
/// | `DATMO_TICK_MS` | `tick_ms` |
/// | `DATMO_SEED` | `seed` |
/// | `DATMO_LOG_FORMAT` | `log_format` |
///
/// Unparseable values are dropped with a warning.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = parsed_env::<u64>("DATMO_TICKS") {
        cfg.ticks = v;
    }
    if let Some(v) = parsed_env::<u64>("DATMO_TICK_MS") {
        cfg.tick_ms = v;
    }
    if let Some(v) = parsed_env::<u64>("DATMO_SEED") {
        cfg.seed = Some(v);
    }
    if let Some(v) = parsed_env::<LogFormat>("DATMO_LOG_FORMAT") {
        cfg.log_format = v;
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

/// Save the config to disk, creating `~/.datmo/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ticks, 600);
        assert_eq!(loaded.tick_ms, 33);
        assert_eq!(loaded.pipeline, PipelineConfig::default());
        assert_eq!(loaded.log_format, LogFormat::Compact);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "ticks = 42\nlog_format = \"json\"\n\n[pipeline]\nwarning_distance = 12.5\n",
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.ticks, 42);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.width, 1200);
        assert_eq!(cfg.pipeline.warning_distance, 12.5);
        assert_eq!(cfg.pipeline.max_range, 100.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "ticks = \"many\"").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_datmo_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".datmo"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn session_config_derives_follow_zone_and_seed() {
        let cfg = Config {
            seed: Some(9),
            width: 800,
            height: 400,
            ..Default::default()
        };
        let session = cfg.session_config();
        assert_eq!(session.world.follow_distance, 50.0);
        assert_eq!(session.world.seed, Some(9));
        assert_eq!(session.world.width, 800);
        assert_eq!(session.pipeline.noise_seed, 9);
        assert_eq!(session.tick_ms, 33);
    }

    #[test]
    fn explicit_noise_seed_wins() {
        let mut cfg = Config {
            seed: Some(9),
            ..Default::default()
        };
        cfg.pipeline.noise_seed = 4;
        assert_eq!(cfg.session_config().pipeline.noise_seed, 4);
    }

    // Env-var tests share one body so they cannot race each other.
    #[test]
    fn apply_env_overrides_parses_and_ignores() {
        // SAFETY: single-threaded test; no other test touches DATMO_* vars.
        unsafe {
            std::env::set_var("DATMO_TICKS", "7");
            std::env::set_var("DATMO_TICK_MS", "not-a-number");
            std::env::set_var("DATMO_SEED", "123");
            std::env::set_var("DATMO_LOG_FORMAT", "json");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ticks, 7);
        assert_eq!(cfg.tick_ms, 33);
        assert_eq!(cfg.seed, Some(123));
        assert_eq!(cfg.log_format, LogFormat::Json);

        // Overrides also apply when the file is missing or unreadable.
        let dir = tempfile::tempdir().expect("tmp dir");
        let broken = dir.path().join("config.toml");
        fs::write(&broken, "ticks = \"many\"").expect("write");
        let cfg = load_effective(load_from(&broken));
        assert_eq!(cfg.ticks, 7);
        assert_eq!(cfg.seed, Some(123));
        let cfg = load_effective(load_from(&dir.path().join("absent.toml")));
        assert_eq!(cfg.ticks, 7);
        assert_eq!(cfg.log_format, LogFormat::Json);
        let good = dir.path().join("good.toml");
        fs::write(&good, "ticks = 42\nwidth = 800\n").expect("write");
        let cfg = load_effective(load_from(&good));
        assert_eq!(cfg.ticks, 7);
        assert_eq!(cfg.width, 800);
        unsafe {
            std::env::remove_var("DATMO_TICKS");
            std::env::remove_var("DATMO_TICK_MS");
            std::env::remove_var("DATMO_SEED");
            std::env::remove_var("DATMO_LOG_FORMAT");
        }
    }
}
