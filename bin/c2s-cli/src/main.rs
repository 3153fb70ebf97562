// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # c2s
//!
//! Command-line interface for the staged SVG generation scheduler.
//!
//! ## Usage
//! ```bash
//! # Breaker state, resource averages and level
//! c2s status --json
//!
//! # Compare exact and greedy schedules under given availability (percent)
//! c2s schedule --prompt "a red fox" --prompt "pixel robot" --cpu 40 --gpu 30
//!
//! # Sensitivity report with a what-if re-solve
//! c2s analyze --prompt "a red fox" --cpu 40 --what-if resource_cpu=0.8
//!
//! # Run the full pipeline with the stage commands from the config
//! c2s --config c2s.toml generate --prompt "a lighthouse at dusk" --style flat
//! ```

mod commands;

use clap::{Parser, Subcommand};
use commands::ResourceOverrides;

#[derive(Parser)]
#[command(
    name = "c2s",
    about = "Resource-aware scheduler for staged SVG generation",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show breaker state, resource averages, trends and level.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the exact and greedy schedules for a batch of prompts.
    Schedule {
        /// Prompt to schedule (repeat for a batch).
        #[arg(short, long, required = true)]
        prompt: Vec<String>,

        /// Priority applied to every prompt, in [0, 1].
        #[arg(long, default_value_t = 0.5)]
        priority: f64,

        #[command(flatten)]
        resources: ResourceOverrides,

        /// Skip the exact scheduler.
        #[arg(long)]
        greedy_only: bool,
    },

    /// Solve a batch exactly and report sensitivity and recommendations.
    Analyze {
        /// Prompt to schedule (repeat for a batch).
        #[arg(short, long, required = true)]
        prompt: Vec<String>,

        /// Priority applied to every prompt, in [0, 1].
        #[arg(long, default_value_t = 0.5)]
        priority: f64,

        #[command(flatten)]
        resources: ResourceOverrides,

        /// Re-solve with a change applied: NAME=VALUE (repeatable).
        #[arg(long = "what-if", value_name = "NAME=VALUE")]
        what_if: Vec<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Generate one request through the configured stage commands.
    Generate {
        #[arg(short, long)]
        prompt: String,

        #[arg(short, long)]
        style: Option<String>,

        #[arg(long, default_value_t = 0.5)]
        priority: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Status { json } => commands::status::execute(config, json).await,
        Commands::Schedule {
            prompt,
            priority,
            resources,
            greedy_only,
        } => commands::schedule::execute(config, prompt, priority, resources, greedy_only).await,
        Commands::Analyze {
            prompt,
            priority,
            resources,
            what_if,
            json,
        } => commands::analyze::execute(config, prompt, priority, resources, what_if, json).await,
        Commands::Generate {
            prompt,
            style,
            priority,
        } => commands::generate::execute(config, prompt, style, priority).await,
    }
}
