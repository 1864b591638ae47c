//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::{NewRecord, RecordPatch};

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Location name
    #[arg(short, long)]
    pub name: String,

    /// Coordinates as "latitude,longitude"
    #[arg(short = 'p', long, allow_hyphen_values = true)]
    pub coordinates: String,

    /// Accuracy of the coordinates (e.g., "5 m")
    #[arg(short, long, default_value = "unknown")]
    pub accuracy: String,
}

impl AddCommand {
    /// Convert into record input.
    #[must_use]
    pub fn to_new_record(&self) -> NewRecord {
        NewRecord::new(&self.name, &self.coordinates, &self.accuracy)
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Show favorites only
    #[arg(short, long)]
    pub favorites: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Text to look for in location names
    pub query: String,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Location id
    pub id: String,

    /// New name
    #[arg(short, long)]
    pub name: Option<String>,

    /// New coordinates as "latitude,longitude"
    #[arg(short = 'p', long, allow_hyphen_values = true)]
    pub coordinates: Option<String>,

    /// New accuracy
    #[arg(short, long)]
    pub accuracy: Option<String>,
}

impl EditCommand {
    /// Convert into a partial update.
    #[must_use]
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            name: self.name.clone(),
            coordinates: self.coordinates.clone(),
            accuracy: self.accuracy.clone(),
        }
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Location id
    pub id: String,

    /// Confirm deletion
    #[arg(short, long)]
    pub yes: bool,
}

/// Route command arguments.
#[derive(Debug, Args)]
pub struct RouteCommand {
    /// Destination location id
    pub id: String,

    /// Starting point as "latitude,longitude"
    #[arg(short, long, allow_hyphen_values = true)]
    pub from: Option<String>,

    /// Open the directions link in the browser
    #[arg(short, long)]
    pub open: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Only show locations whose name contains this text
    #[arg(short = 's', long)]
    pub query: Option<String>,

    /// Show favorites only
    #[arg(short, long)]
    pub favorites: bool,
}

/// Expense ledger commands.
#[derive(Debug, Subcommand)]
pub enum ExpenseCommand {
    /// Record an expense
    Add {
        /// What the money was spent on
        #[arg(short, long)]
        description: String,

        /// Amount spent
        #[arg(short, long)]
        amount: String,

        /// Day of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List recorded expenses
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
