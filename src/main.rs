use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::window::WindowResolution;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apiary::colony::presentation::PresentationPlugin;
use apiary::colony::ColonyPlugin;

const LOG_PREFIX: &str = "apiary_";
const LOGS_TO_KEEP: usize = 25;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wgpu=error,bevy_render=info,apiary=info"))
}

/// Logs to stdout and to a fresh timestamped file under `logs/`.
fn setup_file_logging() -> io::Result<PathBuf> {
    let log_dir = PathBuf::from("logs");
    fs::create_dir_all(&log_dir)?;
    cleanup_old_logs(&log_dir, LOGS_TO_KEEP);

    let log_filename = format!("{}{}.log", LOG_PREFIX, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    // One file per run
    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(fmt::layer().with_writer(io::stdout).with_target(false))
        .init();

    Ok(log_dir.join(log_filename))
}

fn setup_stdout_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(io::stdout).with_target(false))
        .init();
}

/// Deletes the oldest `apiary_*.log` files beyond `keep_count`.
fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(LOG_PREFIX) && name.ends_with(".log"))
        })
        .collect();

    // Oldest first
    log_files.sort_by_key(|entry| entry.metadata().ok().and_then(|meta| meta.modified().ok()));

    let excess = log_files.len().saturating_sub(keep_count);
    for file in log_files.iter().take(excess) {
        let _ = fs::remove_file(file.path());
    }
}

fn main() {
    match setup_file_logging() {
        Ok(path) => println!("Apiary - logging to {}", path.display()),
        Err(e) => {
            eprintln!("Apiary - cannot write log files ({}), logging to stdout only", e);
            setup_stdout_logging();
        }
    }

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Apiary".into(),
                        resolution: WindowResolution::new(1280, 720),
                        resizable: true,
                        ..default()
                    }),
                    ..default()
                })
                .build()
                .disable::<LogPlugin>(), // Our own subscriber is already installed
        )
        .add_plugins((ColonyPlugin, PresentationPlugin))
        .run();
}
