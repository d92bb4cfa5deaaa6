// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flair-driven moderation automation for communities this account
/// moderates.
#[derive(Parser, Debug)]
#[command(name = "flairmod", version, about)]
pub struct Cli {
    /// Path to an explicit operational config file (merged last).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot (default when no subcommand is given).
    Run,

    /// Print the merged operational configuration and exit.
    ShowConfig,

    /// Validate a community configuration file (JSON or legacy YAML) and
    /// print the canonical form.
    CheckConfig {
        /// Path to the configuration document.
        file: PathBuf,
    },
}
