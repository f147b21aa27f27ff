use serde::{Deserialize, Serialize};

use crate::instruments;

/// A sounding note, in pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiNote {
    pub start_time: u32,
    /// MIDI channel, or the index of the originating track once notes from
    /// several tracks have been merged.
    pub channel: u8,
    pub number: u8,
    /// Always at least 1.
    pub duration: u32,
    pub velocity: u8,
}

impl MidiNote {
    pub fn new(start_time: u32, channel: u8, number: u8, duration: u32) -> Self {
        Self {
            start_time,
            channel,
            number,
            duration: duration.max(1),
            velocity: 64,
        }
    }

    pub fn end_time(&self) -> u32 {
        self.start_time.saturating_add(self.duration)
    }

    fn sort_key(&self) -> (u32, u8) {
        (self.start_time, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyric {
    pub start_time: u32,
    pub text: String,
}

/// Where a track's notes came from in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackSource {
    pub file_track: usize,
    /// Set when a file track multiplexing several channels was split.
    pub channel: Option<u8>,
}

/// An ordered list of notes played by one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiTrack {
    pub number: usize,
    /// 0..=127 General MIDI program, 128 for percussion.
    pub instrument: u8,
    pub notes: Vec<MidiNote>,
    pub lyrics: Vec<Lyric>,
    pub source: TrackSource,
}

impl MidiTrack {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            instrument: 0,
            notes: Vec::new(),
            lyrics: Vec::new(),
            source: TrackSource {
                file_track: number,
                channel: None,
            },
        }
    }

    pub fn instrument_name(&self) -> &'static str {
        instruments::name(self.instrument)
    }

    pub fn is_percussion(&self) -> bool {
        self.instrument == instruments::PERCUSSION
    }

    /// Insert keeping notes ordered by (start time, number). Equal keys keep
    /// insertion order.
    pub fn add_note(&mut self, note: MidiNote) {
        let key = note.sort_key();
        let index = self.notes.partition_point(|n| n.sort_key() <= key);
        self.notes.insert(index, note);
    }

    pub fn sort_notes(&mut self) {
        self.notes.sort_by_key(MidiNote::sort_key);
    }

    pub fn end_time(&self) -> u32 {
        self.notes.iter().map(MidiNote::end_time).max().unwrap_or(0)
    }

    /// Lowest and highest note numbers, if the track has notes.
    pub fn range(&self) -> Option<(u8, u8)> {
        let low = self.notes.iter().map(|n| n.number).min()?;
        let high = self.notes.iter().map(|n| n.number).max()?;
        Some((low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_duration_becomes_one() {
        let note = MidiNote::new(10, 0, 60, 0);
        assert_eq!(note.duration, 1);
        assert_eq!(note.end_time(), 11);
    }

    #[test]
    fn add_note_keeps_start_then_number_order() {
        let mut track = MidiTrack::new(0);
        track.add_note(MidiNote::new(20, 0, 60, 5));
        track.add_note(MidiNote::new(0, 0, 64, 5));
        track.add_note(MidiNote::new(20, 0, 55, 5));
        track.add_note(MidiNote::new(0, 0, 60, 5));
        let keys: Vec<(u32, u8)> = track.notes.iter().map(|n| (n.start_time, n.number)).collect();
        assert_eq!(keys, vec![(0, 60), (0, 64), (20, 55), (20, 60)]);
        assert_eq!(track.range(), Some((55, 64)));
        assert_eq!(track.end_time(), 25);
    }

    #[test]
    fn percussion_instrument_name() {
        let mut track = MidiTrack::new(0);
        track.instrument = 128;
        assert!(track.is_percussion());
        assert_eq!(track.instrument_name(), "Percussion");
    }
}
