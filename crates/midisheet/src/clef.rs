//! Per-measure treble/bass clef choice.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::note::MidiNote;

/// Middle C: the dividing line for a track's main clef.
const MIDDLE_C: u32 = 60;
/// E4, bottom line of the treble staff.
const BOTTOM_TREBLE: u32 = 64;
/// A3, top line of the bass staff.
const TOP_BASS: u32 = 57;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clef {
    Treble,
    Bass,
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clef::Treble => f.write_str("treble"),
            Clef::Bass => f.write_str("bass"),
        }
    }
}

/// The clef to use in each measure of a track. Only measures holding notes
/// are stored; a measure without notes takes the clef of the nearest
/// earlier measure that has some, or the main clef before the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClefMeasures {
    clefs: BTreeMap<u32, Clef>,
    main: Clef,
    measure: u32,
}

impl ClefMeasures {
    /// `notes` must be sorted by start time. A measure whose average note
    /// sits clearly on one staff takes that clef; an ambiguous measure takes
    /// the track's main clef.
    pub fn new(notes: &[MidiNote], measure: u32) -> Self {
        let measure = measure.max(1);
        let main = main_clef(notes);
        let mut clefs = BTreeMap::new();

        for group in notes.chunk_by(|a, b| a.start_time / measure == b.start_time / measure) {
            let sum: u64 = group.iter().map(|n| u64::from(n.number)).sum();
            let average = sum / group.len() as u64;
            let clef = if average >= u64::from(BOTTOM_TREBLE) {
                Clef::Treble
            } else if average <= u64::from(TOP_BASS) {
                Clef::Bass
            } else {
                main
            };
            clefs.insert(group[0].start_time / measure, clef);
        }
        Self {
            clefs,
            main,
            measure,
        }
    }

    /// Clef in effect at `start_time`.
    pub fn clef_at(&self, start_time: u32) -> Clef {
        self.clefs
            .range(..=start_time / self.measure)
            .next_back()
            .map_or(self.main, |(_, &clef)| clef)
    }

    /// Clefs of the measures that hold notes, keyed by measure index.
    pub fn clefs(&self) -> &BTreeMap<u32, Clef> {
        &self.clefs
    }

    pub fn main(&self) -> Clef {
        self.main
    }
}

/// Treble when the average note is at or above middle C.
pub fn main_clef(notes: &[MidiNote]) -> Clef {
    if notes.is_empty() {
        return Clef::Treble;
    }
    let total: u64 = notes.iter().map(|n| u64::from(n.number)).sum();
    if total / notes.len() as u64 >= u64::from(MIDDLE_C) {
        Clef::Treble
    } else {
        Clef::Bass
    }
}
