//! # Skirmish Sim
//!
//! Headless arena runner for the Skirmish combat core.
//!
//! Loads a TOML simulation config and RON content, spawns the roster into an
//! in-memory arena and runs the frame loop until one side is left standing
//! or the frame budget runs out.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod arena;
mod config;
mod runner;

#[cfg(test)]
mod e2e_tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skirmish_combat::ContentLibrary;
use skirmish_common::SkirmishResult;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::SimConfig;
use crate::runner::Simulation;

/// Content bundled with the binary.
const DEFAULT_CONTENT: &str = include_str!("../assets/default_content.ron");

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Headless battler combat simulator")]
#[command(version)]
struct Args {
    /// Simulation config file (TOML)
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Skill and state definitions (RON); bundled content when omitted
    #[arg(long, value_name = "CONTENT_FILE")]
    content: Option<PathBuf>,

    /// Override the number of frames to simulate
    #[arg(long)]
    frames: Option<u32>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write the effective config to this path and exit
    #[arg(long, value_name = "OUTPUT_PATH")]
    dump_config: Option<PathBuf>,

    /// Write durable battler snapshots to this directory after the run
    #[arg(long, value_name = "DIR")]
    snapshots: Option<PathBuf>,
}

/// Main entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `--json` output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("skirmish=info".parse()?))
        .init();

    info!("Skirmish starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = args
        .config
        .as_deref()
        .map_or_else(SimConfig::default, SimConfig::load_from);
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    config.validate();

    if let Some(path) = args.dump_config.as_deref() {
        config
            .save_to(path)
            .with_context(|| format!("writing config to {}", path.display()))?;
        return Ok(());
    }

    let library = load_content(args.content.as_deref()).context("loading content")?;
    info!(
        skills = library.skill_count(),
        states = library.state_count(),
        "Content loaded"
    );

    let mut simulation = Simulation::new(&config, Arc::new(library));
    let summary = simulation.run(config.frames);

    if let Some(dir) = args.snapshots.as_deref() {
        simulation
            .save_snapshots(dir)
            .with_context(|| format!("writing snapshots to {}", dir.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for fighter in &summary.fighters {
            info!(
                name = fighter.name.as_str(),
                team = ?fighter.team,
                hp = fighter.hp,
                max_hp = fighter.max_hp,
                alive = fighter.alive,
                dealt = fighter.damage_dealt,
                taken = fighter.damage_taken,
                "Result"
            );
        }
    }

    info!("Skirmish shutdown complete");
    Ok(())
}

fn load_content(path: Option<&Path>) -> SkirmishResult<ContentLibrary> {
    let Some(path) = path else {
        return Ok(ContentLibrary::from_ron_str(DEFAULT_CONTENT)?);
    };
    let source = fs::read_to_string(path)?;
    info!("Loading content from {}", path.display());
    Ok(ContentLibrary::from_ron_str(&source)?)
}
