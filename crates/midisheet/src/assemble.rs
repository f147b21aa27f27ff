//! Pair NoteOn/NoteOff events into notes and build tracks from a file track.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::event::{EventKind, MidiEvent, META_LYRIC};
use crate::instruments::{PERCUSSION, PERCUSSION_CHANNEL};
use crate::note::{Lyric, MidiNote, MidiTrack, TrackSource};

/// Tracks open notes by (channel, number) and closes them into [`MidiNote`]s.
#[derive(Debug, Default)]
pub struct NoteAssembler {
    notes: Vec<MidiNote>,
    pending: HashMap<(u8, u8), usize>,
}

impl NoteAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a note. A note already sounding on the same channel and number
    /// is closed at `time` first.
    pub fn note_on(&mut self, time: u32, channel: u8, number: u8, velocity: u8) {
        if let Some(index) = self.pending.remove(&(channel, number)) {
            trace!(channel, number, time, "note restarted before its note-off");
            self.close(index, time);
        }
        let mut note = MidiNote::new(time, channel, number, 1);
        note.velocity = velocity;
        self.pending.insert((channel, number), self.notes.len());
        self.notes.push(note);
    }

    /// Close the open note for (channel, number). Returns false when no
    /// note was open; the event is then ignored.
    pub fn note_off(&mut self, time: u32, channel: u8, number: u8) -> bool {
        match self.pending.remove(&(channel, number)) {
            Some(index) => {
                self.close(index, time);
                true
            }
            None => {
                trace!(channel, number, time, "ignoring note-off with no open note");
                false
            }
        }
    }

    /// Feed one event; anything other than note on/off is ignored.
    pub fn push(&mut self, event: &MidiEvent) {
        let (Some(channel), Some(number)) = (event.channel(), event.note_number()) else {
            return;
        };
        if event.starts_note() {
            self.note_on(event.start_time, channel, number, event.velocity().unwrap_or(0));
        } else if event.ends_note() {
            self.note_off(event.start_time, channel, number);
        }
    }

    pub fn open_count(&self) -> usize {
        self.pending.len()
    }

    /// Close anything still sounding at `end_time` and return the notes in
    /// (start time, number) order.
    pub fn finish(mut self, end_time: u32) -> Vec<MidiNote> {
        let open: Vec<usize> = self.pending.drain().map(|(_, index)| index).collect();
        if !open.is_empty() {
            debug!(count = open.len(), end_time, "closing notes left open at end of track");
        }
        for index in open {
            self.close(index, end_time);
        }
        self.notes.sort_by_key(|n| (n.start_time, n.number));
        self.notes
    }

    fn close(&mut self, index: usize, time: u32) {
        let note = &mut self.notes[index];
        note.duration = time.saturating_sub(note.start_time).max(1);
    }
}

/// Build the tracks for one file track. A file track whose notes use more
/// than one channel yields one track per channel, in channel order; tracks
/// with neither notes nor lyrics are dropped.
pub fn build_tracks(file_track: usize, events: &[MidiEvent]) -> Vec<MidiTrack> {
    let mut assembler = NoteAssembler::new();
    let mut programs: BTreeMap<u8, u8> = BTreeMap::new();
    let mut last_program: Option<u8> = None;
    let mut lyrics = Vec::new();

    for event in events {
        match event.kind {
            EventKind::NoteOn | EventKind::NoteOff => assembler.push(event),
            EventKind::ProgramChange => {
                if let (Some(channel), Some(program)) = (event.channel(), event.program()) {
                    programs.insert(channel, program);
                    last_program = Some(program);
                }
            }
            EventKind::Meta if event.meta_type == META_LYRIC => {
                if let Some(text) = event.text() {
                    lyrics.push(Lyric {
                        start_time: event.start_time,
                        text,
                    });
                }
            }
            _ => {}
        }
    }

    let end_time = events.last().map(|e| e.start_time).unwrap_or(0);
    let notes = assembler.finish(end_time);
    let channels: BTreeSet<u8> = notes.iter().map(|n| n.channel).collect();

    let mut tracks = Vec::new();
    if channels.len() > 1 {
        let mut by_channel: BTreeMap<u8, MidiTrack> = BTreeMap::new();
        for note in notes {
            let channel = note.channel;
            by_channel
                .entry(channel)
                .or_insert_with(|| {
                    let mut track = MidiTrack::new(file_track);
                    track.source = TrackSource {
                        file_track,
                        channel: Some(channel),
                    };
                    track.instrument = channel_instrument(channel, programs.get(&channel).copied());
                    track
                })
                .notes
                .push(note);
        }
        tracks.extend(by_channel.into_values());
        if let Some(first) = tracks.first_mut() {
            first.lyrics = lyrics;
        }
        debug!(file_track, channels = channels.len(), "split track by channel");
    } else {
        let mut track = MidiTrack::new(file_track);
        track.instrument = match channels.first() {
            Some(&channel) => channel_instrument(channel, last_program),
            None => last_program.unwrap_or(0),
        };
        track.notes = notes;
        track.lyrics = lyrics;
        if !track.notes.is_empty() || !track.lyrics.is_empty() {
            tracks.push(track);
        }
    }
    tracks
}

fn channel_instrument(channel: u8, program: Option<u8>) -> u8 {
    if channel == PERCUSSION_CHANNEL {
        PERCUSSION
    } else {
        program.unwrap_or(0)
    }
}
