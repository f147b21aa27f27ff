//! Key signatures, accidentals and staff spelling.
//!
//! Pitch classes count semitones above C. A key is a count of sharps or
//! flats; [`AccidentalTracker`] carries the per-measure memory needed to
//! decide which notes print an accidental.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    None,
    Sharp,
    Flat,
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Semitones above C.
    pub fn pitch_class(self) -> u8 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
            Letter::F => "F",
            Letter::G => "G",
            Letter::A => "A",
            Letter::B => "B",
        };
        f.write_str(s)
    }
}

/// A staff position: a letter and an octave, middle C being C4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WhiteNote {
    pub octave: i32,
    pub letter: Letter,
}

impl WhiteNote {
    pub fn new(letter: Letter, octave: i32) -> Self {
        Self { octave, letter }
    }

    /// MIDI number of the unaltered note.
    pub fn number(&self) -> i32 {
        (self.octave + 1) * 12 + i32::from(self.letter.pitch_class())
    }
}

impl fmt::Display for WhiteNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.octave)
    }
}

const WHOLE_SHARPS: [Letter; 12] = [
    Letter::C,
    Letter::C,
    Letter::D,
    Letter::D,
    Letter::E,
    Letter::F,
    Letter::F,
    Letter::G,
    Letter::G,
    Letter::A,
    Letter::A,
    Letter::B,
];

const WHOLE_FLATS: [Letter; 12] = [
    Letter::C,
    Letter::D,
    Letter::D,
    Letter::E,
    Letter::E,
    Letter::F,
    Letter::G,
    Letter::G,
    Letter::A,
    Letter::A,
    Letter::B,
    Letter::B,
];

/// Pitch classes raised by each added sharp: F# C# G# D# A# E# B#.
const SHARP_ORDER: [u8; 7] = [6, 1, 8, 3, 10, 5, 0];

/// Pitch classes lowered by each added flat: Bb Eb Ab Db Gb Cb Fb.
const FLAT_ORDER: [u8; 7] = [10, 3, 8, 1, 6, 11, 4];

const SHARP_MAJOR: [&str; 8] = ["C", "G", "D", "A", "E", "B", "F#", "C#"];
const SHARP_MINOR: [&str; 8] = ["A", "E", "B", "F#", "C#", "G#", "D#", "A#"];
const FLAT_MAJOR: [&str; 8] = [
    "C", "F", "B-flat", "E-flat", "A-flat", "D-flat", "G-flat", "C-flat",
];
const FLAT_MINOR: [&str; 8] = [
    "A", "D", "G", "C", "F", "B-flat", "E-flat", "A-flat",
];

pub fn is_black_key(pitch_class: u8) -> bool {
    matches!(pitch_class % 12, 1 | 3 | 6 | 8 | 10)
}

/// A major/minor key signature: sharps or flats, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySignature {
    sharps: u8,
    flats: u8,
}

impl Default for KeySignature {
    fn default() -> Self {
        Self::C_MAJOR
    }
}

impl KeySignature {
    pub const C_MAJOR: Self = Self { sharps: 0, flats: 0 };

    /// Counts above 7 are clamped; when both are given, sharps win.
    pub fn new(sharps: u8, flats: u8) -> Self {
        if sharps > 0 {
            Self {
                sharps: sharps.min(7),
                flats: 0,
            }
        } else {
            Self {
                sharps: 0,
                flats: flats.min(7),
            }
        }
    }

    pub fn sharps(&self) -> u8 {
        self.sharps
    }

    pub fn flats(&self) -> u8 {
        self.flats
    }

    /// The major key whose tonic has the given pitch class. F#/Gb reads as
    /// G-flat major.
    pub fn from_tonic(pitch_class: u8) -> Self {
        match pitch_class % 12 {
            0 => Self::new(0, 0),
            1 => Self::new(0, 5),
            2 => Self::new(2, 0),
            3 => Self::new(0, 3),
            4 => Self::new(4, 0),
            5 => Self::new(0, 1),
            6 => Self::new(0, 6),
            7 => Self::new(1, 0),
            8 => Self::new(0, 4),
            9 => Self::new(3, 0),
            10 => Self::new(0, 2),
            _ => Self::new(5, 0),
        }
    }

    /// Pitch class of the major tonic.
    pub fn tonic(&self) -> u8 {
        if self.sharps > 0 {
            (7 * self.sharps) % 12
        } else {
            (5 * self.flats) % 12
        }
    }

    /// The key signature's own sharps or flats, in signature order.
    pub fn accidentals(&self) -> Vec<(Letter, Accidental)> {
        if self.sharps > 0 {
            SHARP_ORDER[..usize::from(self.sharps)]
                .iter()
                .map(|&pc| (WHOLE_SHARPS[usize::from((pc + 11) % 12)], Accidental::Sharp))
                .collect()
        } else {
            FLAT_ORDER[..usize::from(self.flats)]
                .iter()
                .map(|&pc| (WHOLE_SHARPS[usize::from((pc + 1) % 12)], Accidental::Flat))
                .collect()
        }
    }

    /// Accidental each pitch class needs at the start of a measure.
    fn base_map(&self) -> [Accidental; 12] {
        let mut map = [Accidental::None; 12];
        if self.flats == 0 {
            map[1] = Accidental::Sharp;
            map[3] = Accidental::Sharp;
            map[6] = Accidental::Sharp;
            map[8] = Accidental::Sharp;
            map[10] = Accidental::Flat;
            for &pc in &SHARP_ORDER[..usize::from(self.sharps)] {
                map[usize::from(pc)] = Accidental::None;
                map[usize::from((pc + 11) % 12)] = Accidental::Natural;
            }
        } else {
            map[1] = if self.flats >= 3 {
                Accidental::Flat
            } else {
                Accidental::Sharp
            };
            map[3] = Accidental::Flat;
            map[6] = Accidental::Sharp;
            map[8] = Accidental::Flat;
            map[10] = Accidental::Flat;
            for &pc in &FLAT_ORDER[..usize::from(self.flats)] {
                map[usize::from(pc)] = Accidental::None;
                map[usize::from((pc + 1) % 12)] = Accidental::Natural;
            }
        }
        map
    }

    fn in_signature(&self, pitch_class: u8) -> bool {
        SHARP_ORDER[..usize::from(self.sharps)].contains(&pitch_class)
            || FLAT_ORDER[..usize::from(self.flats)].contains(&pitch_class)
    }

    /// A fresh tracker for reading notes measure by measure.
    pub fn tracker(&self) -> AccidentalTracker {
        AccidentalTracker {
            key: *self,
            map: self.base_map(),
            measure: None,
        }
    }

    /// Staff position of a note at the start of a measure.
    pub fn white_note(&self, number: u8) -> WhiteNote {
        self.spell(number, &self.base_map())
    }

    fn spell(&self, number: u8, map: &[Accidental; 12]) -> WhiteNote {
        let pc = number % 12;
        let letter = match map[usize::from(pc)] {
            Accidental::Flat => WHOLE_FLATS[usize::from(pc)],
            Accidental::Sharp | Accidental::Natural => WHOLE_SHARPS[usize::from(pc)],
            Accidental::None if self.in_signature(pc) => {
                if self.sharps > 0 {
                    WHOLE_SHARPS[usize::from((pc + 11) % 12)]
                } else {
                    WHOLE_SHARPS[usize::from((pc + 1) % 12)]
                }
            }
            Accidental::None if is_black_key(pc) && self.flats > 0 => WHOLE_FLATS[usize::from(pc)],
            Accidental::None => WHOLE_SHARPS[usize::from(pc)],
        };
        let mut octave = i32::from(number / 12) - 1;
        if letter == Letter::B && pc == 0 {
            octave -= 1;
        } else if letter == Letter::C && pc == 11 {
            octave += 1;
        }
        WhiteNote::new(letter, octave)
    }

    /// Guess the key from a set of note numbers: the candidate under which
    /// the fewest notes need an accidental. Ties go to fewer accidentals.
    pub fn guess(numbers: &[u8]) -> Self {
        let mut histogram = [0usize; 12];
        for &number in numbers {
            histogram[usize::from(number % 12)] += 1;
        }

        let mut candidates = vec![Self::C_MAJOR];
        for count in 1..=7 {
            candidates.push(Self::new(count, 0));
            candidates.push(Self::new(0, count));
        }

        let mut best = Self::C_MAJOR;
        let mut best_score = usize::MAX;
        for key in candidates {
            let map = key.base_map();
            let score: usize = (0..12)
                .filter(|&pc| map[pc] != Accidental::None)
                .map(|pc| histogram[pc])
                .sum();
            if score < best_score {
                best = key;
                best_score = score;
            }
        }
        best
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flats > 0 {
            let i = usize::from(self.flats);
            write!(f, "{} major, {} minor", FLAT_MAJOR[i], FLAT_MINOR[i])
        } else {
            let i = usize::from(self.sharps);
            write!(f, "{} major, {} minor", SHARP_MAJOR[i], SHARP_MINOR[i])
        }
    }
}

/// Per-measure accidental memory for one key. An accidental printed on a
/// note holds for the rest of its measure.
#[derive(Debug, Clone)]
pub struct AccidentalTracker {
    key: KeySignature,
    map: [Accidental; 12],
    measure: Option<u32>,
}

impl AccidentalTracker {
    pub fn key(&self) -> KeySignature {
        self.key
    }

    /// Accidental to print before `number` in `measure`, updating the
    /// measure's memory.
    pub fn accidental(&mut self, number: u8, measure: u32) -> Accidental {
        if self.measure != Some(measure) {
            self.map = self.key.base_map();
            self.measure = Some(measure);
        }

        let pc = usize::from(number % 12);
        let prev = (pc + 11) % 12;
        let next = (pc + 1) % 12;
        let result = self.map[pc];

        match result {
            Accidental::Sharp => {
                self.map[pc] = Accidental::None;
                self.map[prev] = Accidental::Natural;
            }
            Accidental::Flat => {
                self.map[pc] = Accidental::None;
                self.map[next] = Accidental::Natural;
            }
            Accidental::Natural => {
                self.map[pc] = Accidental::None;
                let prev_open = self.map[prev] == Accidental::None && is_black_key(prev as u8);
                let next_open = self.map[next] == Accidental::None && is_black_key(next as u8);
                if prev_open && next_open {
                    if self.key.flats == 0 {
                        self.map[next] = Accidental::Sharp;
                    } else {
                        self.map[prev] = Accidental::Flat;
                    }
                } else if prev_open {
                    self.map[prev] = Accidental::Flat;
                } else if next_open {
                    self.map[next] = Accidental::Sharp;
                }
            }
            Accidental::None => {}
        }
        result
    }

    /// Staff position of `number` given what this measure has printed so
    /// far. Call after [`Self::accidental`] for the same note.
    pub fn white_note(&self, number: u8) -> WhiteNote {
        self.key.spell(number, &self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn signature_accidentals() {
        assert!(KeySignature::C_MAJOR.accidentals().is_empty());
        let sharps: Vec<String> = KeySignature::new(7, 0)
            .accidentals()
            .iter()
            .map(|(l, _)| l.to_string())
            .collect();
        assert_eq!(sharps, vec!["F", "C", "G", "D", "A", "E", "B"]);
        let flats: Vec<String> = KeySignature::new(0, 7)
            .accidentals()
            .iter()
            .map(|(l, _)| l.to_string())
            .collect();
        assert_eq!(flats, vec!["B", "E", "A", "D", "G", "C", "F"]);
    }

    #[test]
    fn tonic_round_trips() {
        for pc in 0..12 {
            assert_eq!(KeySignature::from_tonic(pc).tonic(), pc);
        }
    }

    #[test]
    fn names() {
        assert_eq!(KeySignature::C_MAJOR.to_string(), "C major, A minor");
        assert_eq!(KeySignature::new(3, 0).to_string(), "A major, F# minor");
        assert_eq!(KeySignature::new(0, 3).to_string(), "E-flat major, C minor");
    }

    #[test]
    fn accidental_printed_once_per_measure() {
        let mut tracker = KeySignature::C_MAJOR.tracker();
        assert_eq!(tracker.accidental(66, 0), Accidental::Sharp);
        assert_eq!(tracker.accidental(66, 0), Accidental::None);
        assert_eq!(tracker.accidental(65, 0), Accidental::Natural);
        assert_eq!(tracker.accidental(65, 0), Accidental::None);
        assert_eq!(tracker.accidental(66, 0), Accidental::Sharp);
        assert_eq!(tracker.accidental(66, 1), Accidental::Sharp);
    }

    #[test]
    fn key_notes_need_no_accidental() {
        let key = KeySignature::new(2, 0);
        let mut tracker = key.tracker();
        for number in [62, 64, 66, 67, 69, 71, 73, 74] {
            assert_eq!(tracker.accidental(number, 0), Accidental::None, "{number}");
        }
        assert_eq!(tracker.accidental(65, 0), Accidental::Natural);
        assert_eq!(tracker.accidental(66, 0), Accidental::Sharp);
    }

    #[test]
    fn flat_key_natural_then_flat() {
        let mut tracker = KeySignature::new(0, 1).tracker();
        assert_eq!(tracker.accidental(70, 0), Accidental::None);
        assert_eq!(tracker.accidental(71, 0), Accidental::Natural);
        assert_eq!(tracker.accidental(70, 0), Accidental::Flat);
    }

    #[test]
    fn spelling_follows_key() {
        let sharp_key = KeySignature::new(6, 0);
        assert_eq!(sharp_key.white_note(66), WhiteNote::new(Letter::F, 4));
        assert_eq!(sharp_key.white_note(65), WhiteNote::new(Letter::E, 4));

        let flat_key = KeySignature::new(0, 6);
        assert_eq!(flat_key.white_note(70), WhiteNote::new(Letter::B, 4));
        assert_eq!(flat_key.white_note(71), WhiteNote::new(Letter::C, 5));

        let c_major = KeySignature::C_MAJOR;
        assert_eq!(c_major.white_note(60), WhiteNote::new(Letter::C, 4));
        assert_eq!(c_major.white_note(61), WhiteNote::new(Letter::C, 4));
        assert_eq!(c_major.white_note(70), WhiteNote::new(Letter::B, 4));
        assert_eq!(WhiteNote::new(Letter::C, 4).number(), 60);
    }

    #[test]
    fn tracker_spelling_uses_measure_state() {
        let mut tracker = KeySignature::C_MAJOR.tracker();
        tracker.accidental(66, 0);
        assert_eq!(tracker.white_note(66), WhiteNote::new(Letter::F, 4));
        tracker.accidental(65, 0);
        assert_eq!(tracker.white_note(65), WhiteNote::new(Letter::F, 4));
    }

    #[test]
    fn guess_a_major() {
        let scale = [57u8, 59, 61, 62, 64, 66, 68, 69];
        let mut notes = Vec::new();
        for _ in 0..10 {
            notes.extend_from_slice(&scale);
        }
        notes.push(60);
        notes.push(65);
        assert_eq!(KeySignature::guess(&notes), KeySignature::new(3, 0));
    }

    #[test]
    fn guess_prefers_fewer_accidentals() {
        assert_eq!(KeySignature::guess(&[]), KeySignature::C_MAJOR);
        // C D E G A fit C, G and F major equally.
        assert_eq!(KeySignature::guess(&[60, 62, 64, 67, 69]), KeySignature::C_MAJOR);
        assert_eq!(KeySignature::guess(&[65, 67, 69, 70, 72]), KeySignature::new(0, 1));
    }
}
