//! Rough per-measure chord names.
//!
//! Each measure is cut into beats and each beat is halved recursively until
//! a note covers a whole span. Every note votes for the major, minor and
//! seventh chords it could belong to; votes from later halves count half as
//! much, and notes held over from an earlier span count half as much.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::file::MidiFile;
use crate::key_signature::KeySignature;
use crate::note::MidiNote;
use crate::time_signature::TimeSignature;

const NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Seventh,
}

impl ChordQuality {
    fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Seventh => "7",
        }
    }

    /// Semitones above the root of each chord tone.
    fn intervals(self) -> &'static [i32] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Seventh => &[0, 4, 7, 10],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Chord {
    /// Pitch class of the root, C = 0.
    pub root: u8,
    pub quality: ChordQuality,
}

impl Chord {
    pub fn new(root: u8, quality: ChordQuality) -> Self {
        Self {
            root: root % 12,
            quality,
        }
    }

    /// Chord symbol such as `F#m` or `Bb7`.
    pub fn name(&self, flat: bool) -> String {
        let names = if flat { &NAMES_FLAT } else { &NAMES_SHARP };
        format!("{}{}", names[usize::from(self.root)], self.quality.suffix())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name(false))
    }
}

type Scores = BTreeMap<Chord, f64>;

fn add_score(scores: &mut Scores, chord: Chord, value: f64) {
    *scores.entry(chord).or_insert(0.0) += value;
}

/// A span of time holding the notes that cover all of it, with the notes
/// covering only part of it pushed down into its halves.
#[derive(Debug, Default)]
struct Beat {
    notes: Vec<(u8, bool)>,
    left: Option<Box<Beat>>,
    right: Option<Box<Beat>>,
}

impl Beat {
    /// `start` and `end` are relative to this span and may lie outside it.
    fn add_note(&mut self, number: u8, start: i64, end: i64, length: i64) {
        if (start - 1 < 0 && end + 1 > length) || length <= 1 {
            self.notes.push((number, start < 0));
            return;
        }
        let half = length / 2;
        if start < half {
            self.left
                .get_or_insert_with(Box::default)
                .add_note(number, start, end, half);
        }
        if end > half {
            self.right
                .get_or_insert_with(Box::default)
                .add_note(number, start - half, end - half, half);
        }
    }

    fn scores(&self) -> Scores {
        let mut scores = Scores::new();
        for &(number, held) in &self.notes {
            let weight = if held { 0.5 } else { 1.0 };
            for quality in [ChordQuality::Major, ChordQuality::Minor, ChordQuality::Seventh] {
                let intervals = quality.intervals();
                let share = weight / intervals.len() as f64;
                for interval in intervals {
                    let root = (i32::from(number) - interval).rem_euclid(12) as u8;
                    add_score(&mut scores, Chord::new(root, quality), share);
                }
            }
        }
        if let Some(left) = &self.left {
            for (chord, value) in left.scores() {
                add_score(&mut scores, chord, value);
            }
        }
        if let Some(right) = &self.right {
            for (chord, value) in right.scores() {
                add_score(&mut scores, chord, value / 2.0);
            }
        }
        scores
    }
}

#[derive(Debug)]
struct Measure {
    beats: Vec<Option<Beat>>,
}

impl Measure {
    fn new(beats: usize) -> Self {
        Self {
            beats: (0..beats.max(1)).map(|_| None).collect(),
        }
    }

    fn add_note(&mut self, number: u8, start: i64, end: i64, length: i64) {
        let count = self.beats.len() as i64;
        let beat_length = (length / count).max(1);
        let first = (start / beat_length).max(0);
        let last = ((end - 1) / beat_length + 1).min(count);
        for beat in first..last {
            let offset = beat * beat_length;
            self.beats[beat as usize]
                .get_or_insert_with(Beat::default)
                .add_note(number, start - offset, end - offset, beat_length);
        }
    }

    fn scores(&self) -> Scores {
        let mut scores = Scores::new();
        for beat in self.beats.iter().flatten() {
            for (chord, value) in beat.scores() {
                add_score(&mut scores, chord, value);
            }
        }
        scores
    }
}

/// Beats per measure: odd meters are grouped by their smallest odd prime
/// factor up to 11, everything else is one beat.
pub fn beats_per_measure(numerator: u32) -> usize {
    if numerator % 2 == 0 {
        return 1;
    }
    [3, 5, 7, 11]
        .into_iter()
        .find(|p| numerator % p == 0)
        .map_or(1, |p| p as usize)
}

/// Collects notes and names one chord per measure. Only measures in which
/// some note starts get a chord; a note held across measures adds to each
/// of those it reaches.
#[derive(Debug)]
pub struct ChordEstimator {
    measure_len: u32,
    beats: usize,
    flat: bool,
    notes: Vec<MidiNote>,
}

impl ChordEstimator {
    pub fn new(time: &TimeSignature) -> Self {
        Self {
            measure_len: time.measure().max(1),
            beats: beats_per_measure(time.numerator()),
            flat: false,
            notes: Vec::new(),
        }
    }

    /// Spell chord names with flats when `key` has flats.
    pub fn with_key(mut self, key: &KeySignature) -> Self {
        self.flat = key.flats() > 0;
        self
    }

    pub fn set_flat(&mut self, flat: bool) {
        self.flat = flat;
    }

    /// Every note of every track, spelled for the guessed key.
    pub fn from_file(file: &MidiFile) -> Self {
        let mut estimator = Self::new(&file.time()).with_key(&file.guess_key());
        for track in file.tracks() {
            for note in &track.notes {
                estimator.insert_note(note);
            }
        }
        debug!(notes = estimator.notes.len(), "collected notes for chords");
        estimator
    }

    pub fn insert_note(&mut self, note: &MidiNote) {
        self.notes.push(*note);
    }

    fn measure_index(&self, time: u32) -> usize {
        (time / self.measure_len) as usize
    }

    fn measures(&self) -> BTreeMap<usize, Measure> {
        let starts: BTreeSet<usize> = self
            .notes
            .iter()
            .map(|n| self.measure_index(n.start_time))
            .collect();
        let mut measures: BTreeMap<usize, Measure> = BTreeMap::new();
        for note in &self.notes {
            let first = self.measure_index(note.start_time);
            let last = self.measure_index(note.end_time().saturating_sub(1)).max(first);
            for &index in starts.range(first..=last) {
                let base = i64::from(self.measure_len) * index as i64;
                measures
                    .entry(index)
                    .or_insert_with(|| Measure::new(self.beats))
                    .add_note(
                        note.number,
                        i64::from(note.start_time) - base,
                        i64::from(note.end_time()) - base,
                        i64::from(self.measure_len),
                    );
            }
        }
        measures
    }

    /// The best chord of each measure that has notes starting in it, keyed
    /// by measure index. Equal scores go to the chord that scores higher
    /// over the whole song.
    pub fn estimate(&self) -> BTreeMap<usize, Chord> {
        let per_measure: BTreeMap<usize, Scores> = self
            .measures()
            .iter()
            .map(|(&index, measure)| (index, measure.scores()))
            .collect();

        let mut global = Scores::new();
        for scores in per_measure.values() {
            for (chord, value) in scores {
                add_score(&mut global, *chord, *value);
            }
        }

        per_measure
            .iter()
            .filter_map(|(&index, scores)| {
                let mut best: Option<(Chord, f64)> = None;
                for (&chord, &value) in scores {
                    let better = match best {
                        None => true,
                        Some((current, top)) => {
                            value > top
                                || (value == top
                                    && global.get(&chord) > global.get(&current))
                        }
                    };
                    if better {
                        best = Some((chord, value));
                    }
                }
                best.map(|(chord, _)| (index, chord))
            })
            .collect()
    }

    /// Chord symbols with their measure index.
    pub fn names(&self) -> Vec<(usize, String)> {
        self.estimate()
            .into_iter()
            .map(|(index, chord)| (index, chord.name(self.flat)))
            .collect()
    }
}
