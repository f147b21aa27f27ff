//! Passes that reshape decoded tracks for display: merging, splitting into
//! two staffs and snapping human timing to a grid.
//!
//! Every pass leaves each track's notes sorted by start time.

use tracing::debug;

use crate::note::{MidiNote, MidiTrack};
use crate::time_signature::TimeSignature;

/// Notes further than this from the neighbouring register belong to the
/// other hand.
const OCTAVE: i32 = 12;
/// E5, top of the treble staff.
const DEFAULT_HIGH: i32 = 76;
/// A3, bottom of the bass staff.
const DEFAULT_LOW: i32 = 45;

/// Merge tracks into one, ordered by (start time, number). Notes with the
/// same start and number are kept once with the longest duration. Each
/// note's channel is set to the index of the track it came from.
pub fn combine_to_single_track(tracks: &[MidiTrack]) -> MidiTrack {
    let mut result = MidiTrack::new(0);
    if let Some(first) = tracks.first() {
        result.instrument = first.instrument;
    }
    let mut cursor = vec![0usize; tracks.len()];
    let mut prev: Option<usize> = None;

    loop {
        let mut lowest: Option<(usize, MidiNote)> = None;
        for (t, track) in tracks.iter().enumerate() {
            let Some(note) = track.notes.get(cursor[t]) else {
                continue;
            };
            let better = match &lowest {
                None => true,
                Some((_, low)) => (note.start_time, note.number) < (low.start_time, low.number),
            };
            if better {
                lowest = Some((t, *note));
            }
        }
        let Some((t, mut note)) = lowest else {
            break;
        };
        cursor[t] += 1;
        note.channel = u8::try_from(t).unwrap_or(u8::MAX);

        match prev {
            Some(i)
                if result.notes[i].start_time == note.start_time
                    && result.notes[i].number == note.number =>
            {
                let kept = &mut result.notes[i];
                kept.duration = kept.duration.max(note.duration);
            }
            _ => {
                result.notes.push(note);
                prev = Some(result.notes.len() - 1);
            }
        }
    }

    for track in tracks {
        result.lyrics.extend(track.lyrics.iter().cloned());
    }
    result.lyrics.sort_by_key(|l| l.start_time);
    result
}

/// Split one track into a top and a bottom staff. A note goes to whichever
/// side of the surrounding register it is nearer, looking first at notes
/// struck with it, then at notes sounding within one measure of it; when
/// neither spans more than an octave the last wide register is reused.
pub fn split_track(track: &MidiTrack, measure: u32) -> (MidiTrack, MidiTrack) {
    let mut top = MidiTrack::new(0);
    let mut bottom = MidiTrack::new(1);
    top.instrument = track.instrument;
    bottom.instrument = track.instrument;
    top.lyrics = track.lyrics.clone();

    let notes = &track.notes;
    let mut prev_high = DEFAULT_HIGH;
    let mut prev_low = DEFAULT_LOW;
    let mut start_index = 0;

    for note in notes {
        let number = i32::from(note.number);
        while start_index < notes.len() && notes[start_index].end_time() < note.start_time {
            start_index += 1;
        }
        let (high, low) = window_high_low(notes, measure, start_index, note);
        let (high_exact, low_exact) = exact_high_low(notes, start_index, note);

        let to_top = if high_exact - number > OCTAVE || number - low_exact > OCTAVE {
            high_exact - number <= number - low_exact
        } else if high - number > OCTAVE || number - low > OCTAVE {
            high - number <= number - low
        } else if high_exact - low_exact > OCTAVE {
            high_exact - number <= number - low_exact
        } else if high - low > OCTAVE {
            high - number <= number - low
        } else {
            prev_high - number <= number - prev_low
        };

        if to_top {
            top.notes.push(*note);
        } else {
            bottom.notes.push(*note);
        }

        if high - low > OCTAVE {
            prev_high = high;
            prev_low = low;
        }
    }

    top.sort_notes();
    bottom.sort_notes();
    debug!(
        top = top.notes.len(),
        bottom = bottom.notes.len(),
        "split track into two staffs"
    );
    (top, bottom)
}

/// Highest and lowest notes sounding between `note`'s start and the sooner
/// of its end or one measure later.
fn window_high_low(notes: &[MidiNote], measure: u32, start_index: usize, note: &MidiNote) -> (i32, i32) {
    let start = note.start_time;
    let end = note.end_time().min(start.saturating_add(measure));
    let mut high = i32::from(note.number);
    let mut low = high;
    for other in notes[start_index..].iter().take_while(|n| n.start_time < end) {
        if other.end_time() < start || other.start_time.saturating_add(measure) < start {
            continue;
        }
        high = high.max(i32::from(other.number));
        low = low.min(i32::from(other.number));
    }
    (high, low)
}

/// Highest and lowest notes starting at exactly `note`'s start.
fn exact_high_low(notes: &[MidiNote], start_index: usize, note: &MidiNote) -> (i32, i32) {
    let mut high = i32::from(note.number);
    let mut low = high;
    for other in notes[start_index..]
        .iter()
        .skip_while(|n| n.start_time < note.start_time)
        .take_while(|n| n.start_time == note.start_time)
    {
        high = high.max(i32::from(other.number));
        low = low.min(i32::from(other.number));
    }
    (high, low)
}

/// Merge all tracks and split the result into two staffs, lyrics on top.
pub fn combine_to_two_tracks(tracks: &[MidiTrack], measure: u32) -> Vec<MidiTrack> {
    let single = combine_to_single_track(tracks);
    let (top, bottom) = split_track(&single, measure);
    vec![top, bottom]
}

/// Snap start times that lie within `millisec` of an earlier start onto
/// it. Chains are formed against the surviving representative, so
/// 0, 10, 15 at a 15-pulse window all become 0.
pub fn round_start_times(tracks: &mut [MidiTrack], millisec: u32, time: &TimeSignature) {
    if time.tempo() == 0 {
        return;
    }
    let interval = (u64::from(time.quarter()) * u64::from(millisec) * 1000 / u64::from(time.tempo())) as i64;

    let mut starts: Vec<i64> = tracks
        .iter()
        .flat_map(|t| t.notes.iter().map(|n| i64::from(n.start_time)))
        .collect();
    starts.sort_unstable();
    for i in 1..starts.len() {
        if starts[i] - starts[i - 1] <= interval {
            starts[i] = starts[i - 1];
        }
    }

    for track in tracks.iter_mut() {
        for note in &mut track.notes {
            let start = i64::from(note.start_time);
            let i = starts.partition_point(|&s| start - interval > s);
            if let Some(&rounded) = starts.get(i) {
                if start > rounded && start - rounded <= interval {
                    note.start_time = rounded as u32;
                }
            }
        }
        track.sort_notes();
    }
    debug!(interval, "rounded start times");
}

/// Lengthen each note toward the next distinct start time, using the
/// largest of a quarter, eighth, triplet or sixteenth that fits. Notes
/// are never shortened; a note that continues a run of equal notes keeps
/// its own duration.
pub fn round_durations(tracks: &mut [MidiTrack], quarter: u32) {
    for track in tracks.iter_mut() {
        let notes = &mut track.notes;
        let mut prev: Option<usize> = None;
        for i in 0..notes.len().saturating_sub(1) {
            let note = notes[i];
            let prev_index = *prev.get_or_insert(i);

            let next_start = notes[i + 1..]
                .iter()
                .find(|n| n.start_time > note.start_time)
                .or(notes.last())
                .map(|n| n.start_time)
                .unwrap_or(note.start_time);
            let max_duration = next_start.saturating_sub(note.start_time);

            let mut duration = [quarter, quarter / 2, quarter / 3, quarter / 4]
                .into_iter()
                .find(|&d| d <= max_duration)
                .unwrap_or(0);
            duration = duration.max(note.duration);

            let prev_note = notes[prev_index];
            if prev_note.end_time() == note.start_time
                && prev_note.duration == note.duration
            {
                duration = note.duration;
            }
            notes[i].duration = duration;

            if notes[i + 1].start_time != note.start_time {
                prev = Some(i);
            }
        }
    }
}

/// Move every note by `amount` pulses, stopping at zero.
pub fn shift_time(tracks: &mut [MidiTrack], amount: i32) {
    for track in tracks.iter_mut() {
        for note in &mut track.notes {
            let shifted = i64::from(note.start_time) + i64::from(amount);
            note.start_time = shifted.clamp(0, i64::from(u32::MAX)) as u32;
        }
        for lyric in &mut track.lyrics {
            let shifted = i64::from(lyric.start_time) + i64::from(amount);
            lyric.start_time = shifted.clamp(0, i64::from(u32::MAX)) as u32;
        }
        track.sort_notes();
    }
}

/// Add `amount` to every note number, clamped to 0..=127.
pub fn transpose(tracks: &mut [MidiTrack], amount: i32) {
    for track in tracks.iter_mut() {
        for note in &mut track.notes {
            note.number = transpose_number(note.number, amount);
        }
        track.sort_notes();
    }
}

pub fn transpose_number(number: u8, amount: i32) -> u8 {
    (i32::from(number) + amount).clamp(0, 127) as u8
}
