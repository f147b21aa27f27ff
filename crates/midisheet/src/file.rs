use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::assemble::build_tracks;
use crate::clef::ClefMeasures;
use crate::decoder::{read_header, read_tracks};
use crate::event::MidiEvent;
use crate::key_signature::KeySignature;
use crate::note::MidiTrack;
use crate::options::MidiOptions;
use crate::reader::ByteReader;
use crate::time_signature::{TimeSignature, DEFAULT_TEMPO};
use crate::transform;
use crate::{Error, Result};

/// A decoded Standard MIDI File: the raw events of every file track and the
/// note tracks assembled from them.
#[derive(Debug, Clone)]
pub struct MidiFile {
    name: String,
    format: u16,
    events: Vec<Vec<MidiEvent>>,
    tracks: Vec<MidiTrack>,
    time: TimeSignature,
}

impl MidiFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_named(&data, &path.to_string_lossy())
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_named(data, "")
    }

    /// Decode `data`, remembering `name` as the file name. Header errors
    /// are returned; damaged tracks are read as far as they go.
    pub fn parse_named(data: &[u8], name: &str) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = read_header(&mut reader)?;
        let events = read_tracks(&mut reader, &header);

        let mut tracks = Vec::new();
        for (file_track, track_events) in events.iter().enumerate() {
            tracks.extend(build_tracks(file_track, track_events));
        }
        for (number, track) in tracks.iter_mut().enumerate() {
            track.number = number;
        }

        let time = time_signature(&events, u32::from(header.division));
        info!(
            name,
            format = header.format,
            file_tracks = events.len(),
            tracks = tracks.len(),
            "parsed MIDI file"
        );
        Ok(Self {
            name: name.to_string(),
            format: header.format,
            events,
            tracks,
            time,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0, 1 or 2, as declared in the header.
    pub fn format(&self) -> u16 {
        self.format
    }

    pub fn tracks(&self) -> &[MidiTrack] {
        &self.tracks
    }

    pub fn time(&self) -> TimeSignature {
        self.time
    }

    /// Raw events of every file track, including tracks without notes.
    pub fn events(&self) -> &[Vec<MidiEvent>] {
        &self.events
    }

    /// Latest note end over all tracks.
    pub fn end_time(&self) -> u32 {
        self.tracks.iter().map(MidiTrack::end_time).max().unwrap_or(0)
    }

    /// Whether any file track was split into one track per channel.
    pub fn has_channel_tracks(&self) -> bool {
        self.tracks.iter().any(|t| t.source.channel.is_some())
    }

    /// Key guessed from every note of every track.
    pub fn guess_key(&self) -> KeySignature {
        let numbers: Vec<u8> = self
            .tracks
            .iter()
            .flat_map(|t| t.notes.iter().map(|n| n.number))
            .collect();
        KeySignature::guess(&numbers)
    }

    /// Key to display under `options`: the chosen key, or a guess.
    pub fn key_signature(&self, options: &MidiOptions) -> KeySignature {
        match u8::try_from(options.key) {
            Ok(tonic) => KeySignature::from_tonic(tonic),
            Err(_) => self.guess_key(),
        }
    }

    /// Per-measure clefs for a track.
    pub fn clefs(&self, track: &MidiTrack) -> ClefMeasures {
        ClefMeasures::new(&track.notes, self.time.measure())
    }

    /// Tracks as they should be displayed under `options`: only selected
    /// tracks, start times merged within the combine interval, durations
    /// rounded, optionally split into two staffs, then shifted and
    /// transposed. The file itself is left untouched.
    pub fn change_midi_notes(&self, options: &MidiOptions) -> Vec<MidiTrack> {
        let mut tracks: Vec<MidiTrack> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(i, _)| options.is_track_selected(*i))
            .map(|(_, t)| t.clone())
            .collect();

        let time = options.time.unwrap_or(self.time);
        transform::round_start_times(&mut tracks, options.combine_interval, &self.time);
        transform::round_durations(&mut tracks, time.quarter());

        if options.two_staffs {
            tracks = transform::combine_to_two_tracks(&tracks, self.time.measure());
        }
        if options.shift_time != 0 {
            transform::shift_time(&mut tracks, options.shift_time);
        }
        if options.transpose != 0 {
            transform::transpose(&mut tracks, options.transpose);
        }
        debug!(tracks = tracks.len(), "projected notes for display");
        tracks
    }
}

/// Meter from the last time signature event, tempo from the last tempo
/// event, in file order.
fn time_signature(events: &[Vec<MidiEvent>], quarter: u32) -> TimeSignature {
    let mut meter: Option<(u32, u32)> = None;
    let mut tempo: Option<u32> = None;
    for event in events.iter().flatten() {
        if let Some(value) = event.time_signature_value() {
            meter = Some(value);
        }
        if let Some(value) = event.tempo_value() {
            tempo = Some(value);
        }
    }
    let (numerator, denominator) = meter.unwrap_or((4, 4));
    TimeSignature::new(numerator, denominator, quarter, tempo.unwrap_or(DEFAULT_TEMPO))
}

impl fmt::Display for MidiFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MidiFile {} format={} {}", self.name, self.format, self.time)?;
        for track in &self.tracks {
            write!(
                f,
                "Track {} ({}): {} notes",
                track.number,
                track.instrument_name(),
                track.notes.len()
            )?;
            if let Some((low, high)) = track.range() {
                write!(f, ", range {low}..={high}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{META_EVENT, META_TEMPO, META_TIME_SIGNATURE};
    use pretty_assertions::assert_eq;

    fn file_with_track(body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&96u16.to_be_bytes());
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn last_meta_events_win() {
        let body = [
            0, META_EVENT, META_TEMPO, 3, 0x07, 0xA1, 0x20,
            0, META_EVENT, META_TIME_SIGNATURE, 4, 2, 2, 24, 8,
            10, META_EVENT, META_TEMPO, 3, 0x0F, 0x42, 0x40,
            0, META_EVENT, META_TIME_SIGNATURE, 4, 3, 2, 24, 8,
            0, 0x90, 60, 80, 96, 0x80, 60, 0,
        ];
        let midi = MidiFile::parse(&file_with_track(&body)).unwrap();
        assert_eq!(midi.time(), TimeSignature::new(3, 4, 96, 1_000_000));
        assert_eq!(midi.end_time(), 106);
    }

    #[test]
    fn defaults_without_meta_events() {
        let midi = MidiFile::parse(&file_with_track(&[0, 0x90, 60, 80, 10, 0x80, 60, 0])).unwrap();
        assert_eq!(midi.time(), TimeSignature::common(96));
        assert_eq!(midi.tracks().len(), 1);
        assert!(!midi.has_channel_tracks());
    }

    #[test]
    fn key_option_overrides_guess() {
        let midi = MidiFile::parse(&file_with_track(&[0, 0x90, 66, 80, 10, 0x80, 66, 0])).unwrap();
        let mut options = MidiOptions::from_file(&midi);
        assert_eq!(midi.key_signature(&options), KeySignature::new(1, 0));
        options.key = 5;
        assert_eq!(midi.key_signature(&options), KeySignature::new(0, 1));
    }

    #[test]
    fn change_midi_notes_filters_and_transposes() {
        let body = [
            0, 0x90, 60, 80, 0, 0x91, 48, 80,
            48, 0x80, 60, 0, 0, 0x81, 48, 0,
        ];
        let midi = MidiFile::parse(&file_with_track(&body)).unwrap();
        assert_eq!(midi.tracks().len(), 2);
        let mut options = MidiOptions::from_file(&midi);
        options.tracks = vec![false, true];
        options.transpose = 3;
        let tracks = midi.change_midi_notes(&options);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].notes[0].number, 51);
        assert_eq!(tracks[0].notes[0].duration, 48);
    }

    #[test]
    fn change_midi_notes_two_staffs() {
        let body = [
            0, 0x90, 72, 80, 0, 0x90, 40, 80,
            96, 0x80, 72, 0, 0, 0x80, 40, 0,
        ];
        let midi = MidiFile::parse(&file_with_track(&body)).unwrap();
        let options = MidiOptions::from_file(&midi);
        assert!(options.two_staffs);
        let tracks = midi.change_midi_notes(&options);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].notes[0].number, 72);
        assert_eq!(tracks[1].notes[0].number, 40);
    }
}
