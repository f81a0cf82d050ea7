// src/utils/log.rs

//! Console rendering of a crawl run.
//!
//! Diagnostics go through the `log` facade. This module prints what a person
//! at a terminal reads: the run header, a one-line progress indicator and
//! the closing summary. Its threshold reuses the `log` crate's levels.

use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;
use log::{Level, LevelFilter};

static THRESHOLD: OnceLock<LevelFilter> = OnceLock::new();

/// Set the console threshold from a level name. Later calls are ignored.
pub fn init(level: &str) {
    let _ = THRESHOLD.set(level.parse().unwrap_or(LevelFilter::Info));
}

fn shown(level: Level, threshold: LevelFilter) -> bool {
    level <= threshold
}

fn enabled(level: Level) -> bool {
    shown(level, THRESHOLD.get().copied().unwrap_or(LevelFilter::Info))
}

fn stamped(level: Level, message: &str) -> String {
    format!(
        "[{}] [{}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

pub fn info(message: &str) {
    if enabled(Level::Info) {
        println!("{}", stamped(Level::Info, message));
    }
}

pub fn error(message: &str) {
    if enabled(Level::Error) {
        eprintln!("{}", stamped(Level::Error, message));
    }
}

/// Completion line; printed at any threshold.
pub fn success(message: &str) {
    println!("{}", stamped(Level::Info, &format!("✓ {message}")));
}

/// Overwrite the current line with a progress message
pub fn progress(message: &str) {
    if enabled(Level::Info) {
        print!("\r[{}] {}", Local::now().format("%H:%M:%S"), message);
        let _ = std::io::stdout().flush();
    }
}

/// Terminate a line left open by [`progress`]
pub fn progress_done() {
    if enabled(Level::Info) {
        println!();
    }
}

pub fn header(title: &str) {
    if enabled(Level::Info) {
        let rule = "─".repeat(title.chars().count().max(40));
        println!("\n{title}\n{rule}");
    }
}

pub fn sub_item(message: &str) {
    if enabled(Level::Info) {
        println!("    {message}");
    }
}

/// Print `items` as an aligned key/value table under `title`.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if !enabled(Level::Info) {
        return;
    }
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    println!("\n{title}");
    for (key, value) in items {
        println!("  {key:<width$}  {value}");
    }
}
