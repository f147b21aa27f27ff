//! Re-encode a decoded file with tracks, instruments, transposition, tempo
//! and start position changed.
//!
//! Rewriting works on the raw events, so controllers, pitch bends and meta
//! events survive. Delta times are recomputed from absolute times and every
//! event is written with an explicit status byte.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::event::{EventKind, MidiEvent, META_END_OF_TRACK, META_TEMPO};
use crate::file::MidiFile;
use crate::instruments::{PERCUSSION, PERCUSSION_CHANNEL};
use crate::note::MidiTrack;
use crate::options::MidiOptions;
use crate::transform::transpose_number;
use crate::{Error, Result};

impl MidiFile {
    /// Write the file to `path` with `options` applied. Returns false when
    /// no track is left to play or the file cannot be written. The bytes go
    /// to a temporary file beside `path` first, so an existing file is
    /// either replaced whole or left as it was.
    pub fn change_sound(&self, path: impl AsRef<Path>, options: &MidiOptions) -> bool {
        let path = path.as_ref();
        let bytes = match self.render(options) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), %err, "not writing MIDI file");
                return false;
            }
        };
        match write_replacing(path, &bytes) {
            Ok(()) => {
                info!(path = %path.display(), bytes = bytes.len(), "wrote MIDI file");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to write MIDI file");
                false
            }
        }
    }

    /// Build the rewritten file in memory.
    pub fn render(&self, options: &MidiOptions) -> Result<Vec<u8>> {
        let tempo = options.tempo.filter(|&t| t != self.time().tempo());
        let file_has_tempo = self.events().iter().flatten().any(|e| e.is_meta(META_TEMPO));
        let mut out: Vec<Vec<MidiEvent>> = Vec::new();
        let mut kept_notes = false;

        for (file_track, events) in self.events().iter().enumerate() {
            let owned: Vec<(usize, &MidiTrack)> = self
                .tracks()
                .iter()
                .enumerate()
                .filter(|(_, t)| t.source.file_track == file_track)
                .collect();
            let kept: Vec<(usize, &MidiTrack)> = owned
                .iter()
                .copied()
                .filter(|(i, _)| options.is_track_selected(*i) && !options.is_track_muted(*i))
                .collect();
            if !owned.is_empty() && kept.is_empty() {
                continue;
            }
            kept_notes |= !kept.is_empty();

            let dropped_channels: BTreeSet<u8> = owned
                .iter()
                .filter(|(i, _)| !kept.iter().any(|(k, _)| k == i))
                .filter_map(|(_, t)| t.source.channel)
                .collect();

            let mut track: Vec<MidiEvent> = events
                .iter()
                .filter(|e| !e.channel().is_some_and(|c| dropped_channels.contains(&c)))
                .filter(|e| !e.is_meta(META_END_OF_TRACK))
                .cloned()
                .collect();

            if options.transpose != 0 {
                for event in &mut track {
                    if event.channel() == Some(PERCUSSION_CHANNEL) {
                        continue;
                    }
                    if let Some(number) = event.note_number() {
                        event.set_note_number(transpose_number(number, options.transpose));
                    }
                }
            }

            if !options.use_default_instruments {
                let mut programs = Vec::new();
                for (index, midi_track) in &kept {
                    let instrument = options
                        .instruments
                        .get(*index)
                        .copied()
                        .unwrap_or(midi_track.instrument);
                    for channel in track_channels(midi_track, events) {
                        if channel != PERCUSSION_CHANNEL && instrument < PERCUSSION {
                            programs.push((channel, instrument));
                        }
                    }
                }
                track.retain(|e| {
                    !(e.kind == EventKind::ProgramChange
                        && programs.iter().any(|(c, _)| Some(*c) == e.channel()))
                });
                for (position, (channel, instrument)) in programs.into_iter().enumerate() {
                    track.insert(position, MidiEvent::program_change(0, channel, instrument));
                }
            }

            if let Some(tempo) = tempo {
                for event in track.iter_mut().filter(|e| e.is_meta(META_TEMPO)) {
                    *event = MidiEvent::tempo(event.start_time, tempo);
                }
                if !file_has_tempo && out.is_empty() {
                    track.insert(0, MidiEvent::tempo(0, tempo));
                }
            }

            if options.pause_time > 0 {
                track = start_at_pause(track, options.pause_time);
            }

            finish_track(&mut track);
            debug!(file_track, events = track.len(), "rewrote track");
            out.push(track);
        }

        if !kept_notes {
            return Err(Error::NoTracksSelected);
        }

        let format = if out.len() > 1 && self.format() == 0 {
            1
        } else {
            self.format()
        };
        Ok(encode_file(format, self.time().quarter() as u16, &out))
    }
}

/// Write `bytes` to a temporary file in `path`'s directory, then rename it
/// over `path`.
fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Channels a track's events use: its own channel when it was split out of
/// a multi-channel file track, otherwise the channels of its notes.
fn track_channels(track: &MidiTrack, events: &[MidiEvent]) -> BTreeSet<u8> {
    if let Some(channel) = track.source.channel {
        return BTreeSet::from([channel]);
    }
    let mut channels: BTreeSet<u8> = track.notes.iter().map(|n| n.channel).collect();
    channels.extend(
        events
            .iter()
            .filter(|e| e.kind == EventKind::ProgramChange)
            .filter_map(MidiEvent::channel),
    );
    channels
}

/// Drop notes before `pause` and move the remaining events earlier by
/// `pause`. Other events before `pause` are kept at time zero so the
/// controllers and programs they set still apply.
fn start_at_pause(events: Vec<MidiEvent>, pause: u32) -> Vec<MidiEvent> {
    events
        .into_iter()
        .filter_map(|mut event| {
            if event.start_time < pause {
                if matches!(event.kind, EventKind::NoteOn | EventKind::NoteOff) {
                    return None;
                }
                event.start_time = 0;
            } else {
                event.start_time -= pause;
            }
            Some(event)
        })
        .collect()
}

/// Order by time, recompute delta times and close with end-of-track.
fn finish_track(events: &mut Vec<MidiEvent>) {
    events.sort_by_key(|e| e.start_time);
    let end = events.last().map(|e| e.start_time).unwrap_or(0);
    events.push(MidiEvent::end_of_track(end));
    let mut previous = 0;
    for event in events.iter_mut() {
        event.delta_time = event.start_time - previous;
        previous = event.start_time;
    }
}

pub fn encode_file(format: u16, division: u16, tracks: &[Vec<MidiEvent>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&format.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&division.to_be_bytes());

    for events in tracks {
        let mut body = Vec::new();
        for event in events {
            event.encode(&mut body);
        }
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body);
    }
    buf
}
