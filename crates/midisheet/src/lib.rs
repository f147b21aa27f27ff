//! Standard MIDI File decoding, note reconstruction and rewriting.
//!
//! The pipeline runs bytes → [`reader::ByteReader`] → [`decoder`] → raw
//! events per file track → [`assemble`] → [`MidiTrack`]s of [`MidiNote`]s.
//! From there the [`transform`] passes, [`KeySignature`] and
//! [`ClefMeasures`] derive notation views, and [`MidiFile::change_sound`]
//! re-encodes a playable file under a set of [`MidiOptions`].
//!
//! ```no_run
//! use midisheet::{MidiFile, MidiOptions};
//!
//! let midi = MidiFile::open("song.mid")?;
//! let mut options = MidiOptions::from_file(&midi);
//! options.transpose = 2;
//! let ok = midi.change_sound("song-up.mid", &options);
//! assert!(ok);
//! # Ok::<(), midisheet::Error>(())
//! ```

pub mod assemble;
pub mod chords;
pub mod clef;
pub mod decoder;
pub mod event;
pub mod file;
pub mod instruments;
pub mod key_signature;
pub mod note;
pub mod options;
pub mod reader;
pub mod rewrite;
pub mod time_signature;
pub mod transform;

use std::path::PathBuf;

pub use assemble::NoteAssembler;
pub use chords::{Chord, ChordEstimator, ChordQuality};
pub use clef::{Clef, ClefMeasures};
pub use event::{EventKind, MidiEvent};
pub use file::MidiFile;
pub use key_signature::{Accidental, AccidentalTracker, KeySignature, Letter, WhiteNote};
pub use note::{Lyric, MidiNote, MidiTrack, TrackSource};
pub use options::{Color, MidiOptions, NoteLetters, Section};
pub use time_signature::{NoteDuration, TimeSignature};

/// Errors surfaced while decoding, configuring or rewriting MIDI data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed MIDI header: {0}")]
    MalformedHeader(String),

    #[error("unexpected end of input at offset {offset} (wanted {wanted} bytes)")]
    EndOfInput { offset: usize, wanted: usize },

    #[error("variable-length quantity at offset {offset} is longer than 4 bytes")]
    MalformedVarlen { offset: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid option value: {0}")]
    Options(String),

    #[error("no tracks selected for output")]
    NoTracksSelected,
}

pub type Result<T> = std::result::Result<T, Error>;
