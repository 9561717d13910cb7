//! `datmo` – headless SLAM + DATMO simulation.
//!
//! 1. Loads `~/.datmo/config.toml` (defaults when absent) and applies
//!    `DATMO_*` overrides.
//! 2. Runs the configured number of ticks, announcing proximity warnings on
//!    the terminal.
//! 3. Prints a run summary and, with `--snapshot <path>`, writes the final
//!    tick snapshot as JSON.
//!
//! Ctrl-C stops the run after the current tick.  `--save-config` writes the
//! effective configuration back to disk and exits.

mod config;
mod speaker;

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use datmo_runtime::telemetry;
use datmo_runtime::{Session, SessionStats, Speaker};
use datmo_types::{DatmoError, TickSnapshot};
use serde::Serialize;

#[derive(Debug, Default)]
struct Args {
    snapshot: Option<PathBuf>,
    save_config: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--snapshot" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--snapshot needs a path".to_string())?;
                parsed.snapshot = Some(PathBuf::from(path));
            }
            "--save-config" => parsed.save_config = true,
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(parsed)
}

/// What `--snapshot` writes.
#[derive(Serialize)]
struct SnapshotFile<'a> {
    run_id: uuid::Uuid,
    written_at: chrono::DateTime<chrono::Utc>,
    stats: SessionStats,
    snapshot: &'a TickSnapshot,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}: {}", "Usage error".red(), e);
            eprintln!("  usage: datmo [--snapshot <path>] [--save-config]");
            std::process::exit(2);
        }
    };

    let cfg = config::load_effective(config::load());

    if args.save_config {
        match config::save(&cfg) {
            Ok(()) => println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    let _guard = match telemetry::init_tracing(&cfg.telemetry_config()) {
        Ok(guard) => {
            if guard.is_exporting() {
                info!(endpoint = ?cfg.otlp_endpoint, "exporting spans over OTLP");
            }
            Some(guard)
        }
        Err(e) => {
            eprintln!("{}: {}", "Telemetry error".red(), e);
            None
        }
    };

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after this tick …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    let speaker: Option<Arc<dyn Speaker>> = if cfg.announce {
        Some(Arc::new(speaker::TerminalSpeaker))
    } else {
        None
    };
    let mut session = match Session::new(cfg.session_config(), speaker) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", "Startup error".red(), e);
            std::process::exit(1);
        }
    };

    println!(
        "  Run {} – {} ticks of {} ms\n",
        session.id().to_string().bold(),
        cfg.ticks,
        cfg.tick_ms
    );

    let mut last = None;
    for _ in 0..cfg.ticks {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        last = Some(session.step());
        if cfg.realtime {
            std::thread::sleep(Duration::from_millis(cfg.tick_ms));
        }
    }
    session.flush();

    print_summary(&session, last.as_ref());

    if let (Some(path), Some(snapshot)) = (args.snapshot, last.as_ref()) {
        match write_snapshot(&path, &session, snapshot) {
            Ok(()) => println!(
                "  {} Snapshot written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {}", "Snapshot error".red(), e);
                std::process::exit(1);
            }
        }
    }
    info!(run_id = %session.id(), "run finished");
}

fn write_snapshot(
    path: &std::path::Path,
    session: &Session,
    snapshot: &TickSnapshot,
) -> Result<(), DatmoError> {
    let file = SnapshotFile {
        run_id: session.id(),
        written_at: chrono::Utc::now(),
        stats: session.stats(),
        snapshot,
    };
    let raw = serde_json::to_string_pretty(&file)
        .map_err(|e| DatmoError::Serialization(e.to_string()))?;
    std::fs::write(path, raw).map_err(|e| DatmoError::Io(format!("{}: {}", path.display(), e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"       __      __           "#.bold().cyan());
    println!("{}", r#"  ____/ /___ _/ /_____ ___  ____ "#.bold().cyan());
    println!("{}", r#" / __  / __ `/ __/ __ `__ \/ __ \"#.bold().cyan());
    println!("{}", r#"/ /_/ / /_/ / /_/ / / / / / /_/ /"#.bold().cyan());
    println!("{}", r#"\__,_/\__,_/\__/_/ /_/ /_/\____/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "datmo".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Landmark mapping and moving-object tracking");
    println!();
}

fn print_summary(session: &Session, last: Option<&TickSnapshot>) {
    let stats = session.stats();
    println!();
    println!("{}", "  Run summary".bold().underline());
    println!("    ticks              {}", stats.ticks);
    println!("    simulated time     {:.1} s", session.clock_ms() as f64 / 1000.0);
    let grid = session.world().grid();
    println!(
        "    world              {}×{}, sensor range {}",
        grid.width(),
        grid.height(),
        session.pipeline().config().max_range
    );
    println!(
        "    landmarks          {} live ({} created, {} removed)",
        session.pipeline().landmarks().len(),
        stats.landmarks_created,
        stats.landmarks_removed
    );
    println!(
        "    tracks             {} live ({} promoted, {} retired)",
        session.pipeline().tracker().len(),
        stats.tracks_promoted,
        stats.tracks_retired
    );
    println!(
        "    warnings           {} ({} announced)",
        stats.warnings, stats.announcements
    );
    for (i, p) in session.world().obstacle_positions().iter().enumerate() {
        println!("    obstacle {:<9} ({:.1}, {:.1})", i, p.x, p.y);
    }
    match last.and_then(|s| s.warning) {
        Some(w) => println!("    last tick          {}", w.to_string().yellow()),
        None => println!("    last tick          {}", "clear".green()),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_is_a_plain_run() {
        let parsed = args(&[]).unwrap();
        assert!(parsed.snapshot.is_none());
        assert!(!parsed.save_config);
    }

    #[test]
    fn snapshot_takes_a_path() {
        let parsed = args(&["--snapshot", "out.json"]).unwrap();
        assert_eq!(parsed.snapshot, Some(PathBuf::from("out.json")));
        assert!(args(&["--snapshot"]).is_err());
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = args(&["--fast"]).unwrap_err();
        assert!(err.contains("--fast"));
    }

    #[test]
    fn snapshot_file_is_json() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("snap.json");
        let cfg = config::Config {
            seed: Some(5),
            ..Default::default()
        };
        let mut session = Session::new(cfg.session_config(), None).unwrap();
        let snap = session.step();
        write_snapshot(&path, &session, &snap).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["snapshot"]["tick"], 1);
        assert_eq!(value["stats"]["ticks"], 1);
        assert_eq!(value["run_id"], session.id().to_string());
    }
}
