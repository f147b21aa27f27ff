//! midisheet - inspect and rewrite Standard MIDI Files
//!
//! Subcommands:
//! - `midisheet info <file>` - Header, meter, key and per-track summary
//! - `midisheet notes <file>` - Notes as they would be laid out on a staff
//! - `midisheet chords <file>` - One estimated chord per measure
//! - `midisheet rewrite <in> <out>` - Write a copy with playback changes
//! - `midisheet options <file>` - Default saved options for a file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "midisheet")]
#[command(about = "Inspect and rewrite MIDI files")]
#[command(version)]
struct Cli {
    /// Config file to load instead of ./midisheet.toml
    #[arg(long, global = true, env = "MIDISHEET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a MIDI file
    Info {
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List notes after display transforms
    Notes {
        file: PathBuf,

        /// Only show this track
        #[arg(short, long)]
        track: Option<usize>,

        /// Merge start times closer than this many milliseconds
        #[arg(long)]
        combine_interval: Option<u32>,

        /// Split everything into a treble and a bass staff
        #[arg(long)]
        two_staffs: bool,
    },

    /// Estimate one chord per measure
    Chords { file: PathBuf },

    /// Write a copy of a MIDI file with tracks, instruments, tempo or
    /// pitch changed
    Rewrite {
        input: PathBuf,
        output: PathBuf,

        /// Semitones to shift every non-percussion note
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        transpose: i32,

        /// Microseconds per quarter note
        #[arg(long)]
        tempo: Option<u32>,

        /// Start playback at this pulse
        #[arg(long, default_value = "0")]
        pause: u32,

        /// Instrument for a track, as TRACK=PROGRAM or TRACK=NAME
        #[arg(long = "instrument", value_name = "TRACK=PROGRAM")]
        instruments: Vec<String>,

        /// Leave a track out
        #[arg(long = "exclude", value_name = "TRACK")]
        exclude: Vec<usize>,

        /// Silence a track
        #[arg(long = "mute", value_name = "TRACK")]
        mute: Vec<usize>,

        /// Saved options file to apply before the flags above
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Print the default options section for a file
    Options { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "loaded configuration"
    );

    match cli.command {
        Commands::Info { file, json } => commands::info(&file, json)?,
        Commands::Notes {
            file,
            track,
            combine_interval,
            two_staffs,
        } => commands::notes(
            &file,
            &config,
            commands::NotesArgs {
                track,
                combine_interval,
                two_staffs,
            },
        )?,
        Commands::Chords { file } => commands::chords(&file)?,
        Commands::Rewrite {
            input,
            output,
            transpose,
            tempo,
            pause,
            instruments,
            exclude,
            mute,
            options,
        } => commands::rewrite(
            &input,
            &output,
            &config,
            commands::RewriteArgs {
                transpose,
                tempo,
                pause,
                instruments,
                exclude,
                mute,
                options,
            },
        )?,
        Commands::Options { file } => commands::options(&file, &config)?,
    }

    Ok(())
}
