//! Display transforms over whole tracks.

use midisheet::transform::{
    combine_to_single_track, combine_to_two_tracks, round_durations, round_start_times,
    split_track,
};
use midisheet::{MidiNote, MidiTrack, TimeSignature};
use pretty_assertions::assert_eq;

fn track_of(number: usize, notes: impl IntoIterator<Item = MidiNote>) -> MidiTrack {
    let mut track = MidiTrack::new(number);
    for note in notes {
        track.add_note(note);
    }
    track
}

#[test]
fn split_track_separates_hands() {
    let notes = (0..100u32).flat_map(|i| {
        let step = (i % 10) as u8;
        [
            MidiNote::new(i * 10, 0, 70 + step, 10),
            MidiNote::new(i * 10 + 1, 0, 65 + step, 10),
            MidiNote::new(i * 10, 0, 50 + step, 10),
            MidiNote::new(i * 10 + 1, 0, 55 + step, 10),
        ]
    });
    let track = track_of(0, notes);

    let (top, bottom) = split_track(&track, 40);
    assert_eq!(top.notes.len(), 200);
    assert_eq!(bottom.notes.len(), 200);
    for i in 0..100usize {
        let step = (i % 10) as u8;
        let start = i as u32 * 10;
        assert_eq!(
            (top.notes[2 * i].start_time, top.notes[2 * i].number),
            (start, 70 + step)
        );
        assert_eq!(
            (top.notes[2 * i + 1].start_time, top.notes[2 * i + 1].number),
            (start + 1, 65 + step)
        );
        assert_eq!(
            (bottom.notes[2 * i].start_time, bottom.notes[2 * i].number),
            (start, 50 + step)
        );
        assert_eq!(
            (bottom.notes[2 * i + 1].start_time, bottom.notes[2 * i + 1].number),
            (start + 1, 55 + step)
        );
    }
}

#[test]
fn combine_to_single_track_merges_and_dedups() {
    let odd = track_of(
        0,
        (1..=99u32)
            .step_by(2)
            .map(|i| MidiNote::new(i, 0, 30 + (i % 10) as u8, 10)),
    );
    let even = track_of(
        1,
        (0..=100u32)
            .step_by(2)
            .map(|i| MidiNote::new(i, 0, 50 + (i % 10) as u8, 10)),
    );
    let tens = track_of(
        2,
        (0..=100u32)
            .step_by(10)
            .map(|i| MidiNote::new(i, 0, 50 + (i % 10) as u8, 20)),
    );

    let track = combine_to_single_track(&[odd, even, tens]);
    assert_eq!(track.notes.len(), 101);
    for (i, note) in track.notes.iter().enumerate() {
        let i = i as u32;
        assert_eq!(note.start_time, i);
        let base: u8 = if i % 2 == 0 { 50 } else { 30 };
        let expected = base + (i % 10) as u8;
        assert_eq!(note.number, expected);
        assert_eq!(note.duration, if i % 10 == 0 { 20 } else { 10 });
    }
}

#[test]
fn round_start_times_across_tracks() {
    let first = track_of(
        0,
        [0, 3, 15, 22, 62]
            .into_iter()
            .enumerate()
            .map(|(i, start)| MidiNote::new(start, 0, 20 + i as u8, 60)),
    );
    let second = track_of(
        1,
        [2, 10, 20, 35, 36]
            .into_iter()
            .enumerate()
            .map(|(i, start)| MidiNote::new(start, 0, 30 + i as u8, 60)),
    );
    let mut tracks = vec![first, second];

    // 130 pulses per quarter at 500000us: 60ms spans 15 pulses
    round_start_times(&mut tracks, 60, &TimeSignature::new(4, 4, 130, 500_000));

    let numbers: Vec<u8> = tracks[0].notes.iter().map(|n| n.number).collect();
    assert_eq!(numbers, vec![20, 21, 22, 23, 24]);
    let starts: Vec<u32> = tracks[0].notes.iter().map(|n| n.start_time).collect();
    assert_eq!(starts, vec![0, 0, 0, 20, 62]);

    let numbers: Vec<u8> = tracks[1].notes.iter().map(|n| n.number).collect();
    assert_eq!(numbers, vec![30, 31, 32, 33, 34]);
    let starts: Vec<u32> = tracks[1].notes.iter().map(|n| n.start_time).collect();
    assert_eq!(starts, vec![0, 0, 20, 20, 36]);
}

#[test]
fn round_durations_to_next_start() {
    let mut notes = vec![MidiNote::new(0, 0, 55, 45)];
    notes.extend([50, 90, 101, 123].map(|start| MidiNote::new(start, 0, 55, 1)));
    let mut tracks = vec![track_of(0, notes)];

    round_durations(&mut tracks, 40);

    let durations: Vec<u32> = tracks[0].notes.iter().map(|n| n.duration).collect();
    assert_eq!(durations, vec![45, 40, 10, 20, 1]);
}

#[test]
fn two_tracks_from_many() {
    let right = track_of(0, [MidiNote::new(0, 0, 76, 10), MidiNote::new(20, 0, 79, 10)]);
    let left = track_of(1, [MidiNote::new(0, 0, 40, 10), MidiNote::new(20, 0, 43, 10)]);
    let staffs = combine_to_two_tracks(&[right, left], 960);
    assert_eq!(staffs.len(), 2);
    let top: Vec<u8> = staffs[0].notes.iter().map(|n| n.number).collect();
    let bottom: Vec<u8> = staffs[1].notes.iter().map(|n| n.number).collect();
    assert_eq!(top, vec![76, 79]);
    assert_eq!(bottom, vec![40, 43]);
}
