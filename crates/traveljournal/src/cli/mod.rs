//! Command-line interface for traveljournal.
//!
//! This module provides the CLI structure and output rendering for the
//! `tjournal` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, DeleteCommand, EditCommand, ExpenseCommand, ListCommand,
    OutputFormat, RouteCommand, SearchCommand, WatchCommand,
};

/// tjournal - Keep a journal of the places you visit
///
/// Records named locations, marks favorites, searches them, and plans
/// routes. Every command reads the same local collection, so a running
/// `tjournal watch` shows changes made from other terminals.
#[derive(Debug, Parser)]
#[command(name = "tjournal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save a new location
    Add(AddCommand),

    /// List saved locations
    List(ListCommand),

    /// Search locations by name
    Search(SearchCommand),

    /// Toggle the favorite flag of a location
    Favorite {
        /// Location id
        id: String,
    },

    /// Change fields of a location
    Edit(EditCommand),

    /// Delete a location
    Delete(DeleteCommand),

    /// Show location counts
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List map markers
    Map {
        /// Output format
        #[arg(long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Show directions to a location
    Route(RouteCommand),

    /// Print the list every time it changes
    Watch(WatchCommand),

    /// Manage the expense ledger
    #[command(subcommand)]
    Expense(ExpenseCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
