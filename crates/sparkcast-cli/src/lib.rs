//! sparkcast - appcast generator for Sparkle
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Maintains Sparkle appcast feeds: adds signed release bundles, generates
//! binary deltas against previously published builds, and prints feed
//! contents. The heavy lifting lives in `sparkcast-schema` (the feed
//! document model) and `sparkcast-core` (signing, mounting, delta
//! generation, URL derivation); this crate is the command-line glue.

pub mod cmd;
pub mod ui;

pub use sparkcast_core::{DistConfig, Publisher};
pub use sparkcast_schema::Feed;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cmd::add::AddArgs;
use crate::cmd::sign::SignArgs;

#[derive(Debug, Parser)]
#[command(name = "sparkcast")]
#[command(author, version, about = "Appcast generator for Sparkle")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a bundle to an existing appcast file
    Add(AddArgs),
    /// Generate a signature for a bundle
    Sign(SignArgs),
    /// Generate a delta update between two mac bundles
    Delta {
        /// The local file path to the new mac app/dmg/zip bundle
        #[arg(long)]
        mac_bundle: PathBuf,
        /// The local file path to the previous app/dmg/zip bundle
        #[arg(long)]
        prev_bundle: PathBuf,
        /// The local file path for the output delta file
        #[arg(long)]
        delta_path: PathBuf,
        /// The local file path to the executable used to generate binary deltas
        #[arg(long)]
        delta_generator_path: Option<PathBuf>,
    },
    /// Print the contents of an existing appcast file
    Print {
        /// The local file path to the appcast xml
        #[arg(long)]
        appcast: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
