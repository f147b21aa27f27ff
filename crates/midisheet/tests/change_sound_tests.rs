//! Rewriting files with changed tracks, instruments, tempo and start.

mod common;

use common::*;
use midisheet::{MidiFile, MidiOptions};
use pretty_assertions::assert_eq;

fn rewrite(midi: &MidiFile, options: &MidiOptions) -> MidiFile {
    let (_dir, path) = scratch("changed.mid");
    assert!(midi.change_sound(&path, options));
    MidiFile::open(&path).unwrap()
}

fn numbers(midi: &MidiFile, track: usize) -> Vec<u8> {
    midi.tracks()[track].notes.iter().map(|n| n.number).collect()
}

fn instruments(midi: &MidiFile) -> Vec<u8> {
    midi.tracks().iter().map(|t| t.instrument).collect()
}

mod per_track {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file() -> MidiFile {
        MidiFile::parse(&three_track_file()).unwrap()
    }

    #[test]
    fn tempo() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.tempo = Some(0x405060);
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 3);
        assert_eq!(changed.time().tempo(), 0x405060);
    }

    #[test]
    fn transpose() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.transpose = 10;
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 3);
        for t in 0..3 {
            let first = 70 + 10 * t as u8;
            assert_eq!(numbers(&changed, t), vec![first, first + 1, first + 2]);
            let timing: Vec<(u32, u32)> = changed.tracks()[t]
                .notes
                .iter()
                .map(|n| (n.start_time, n.duration))
                .collect();
            assert_eq!(timing, vec![(0, 60), (60, 30), (90, 90)]);
        }
    }

    #[test]
    fn instruments_replace_programs() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.use_default_instruments = false;
        options.instruments = vec![40, 41, 42];
        let changed = rewrite(&midi, &options);
        assert_eq!(instruments(&changed), vec![40, 41, 42]);
    }

    #[test]
    fn only_selected_tracks() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.use_default_instruments = false;
        options.tracks = vec![false, true, false];
        options.instruments = vec![40, 41, 42];
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 1);
        assert_eq!(changed.tracks()[0].instrument, 41);
        assert_eq!(numbers(&changed, 0), vec![70, 71, 72]);
    }

    #[test]
    fn pause_time() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.pause_time = 50;
        let changed = rewrite(&midi, &options);
        assert_eq!(instruments(&changed), vec![4, 5, 0]);
        for t in 0..3 {
            let first = 61 + 10 * t as u8;
            let notes: Vec<(u32, u8, u32)> = changed.tracks()[t]
                .notes
                .iter()
                .map(|n| (n.start_time, n.number, n.duration))
                .collect();
            assert_eq!(notes, vec![(10, first, 30), (40, first + 1, 90)]);
        }
    }

    #[test]
    fn output_parses_with_midly() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.transpose = 2;
        let bytes = midi.render(&options).unwrap();
        let smf = midly::Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert!(matches!(
            smf.header.timing,
            midly::Timing::Metrical(ticks) if ticks.as_int() == 240
        ));
        assert_eq!(smf.tracks.len(), 3);
        for track in &smf.tracks {
            assert!(matches!(
                track.last().map(|e| e.kind),
                Some(midly::TrackEventKind::Meta(midly::MetaMessage::EndOfTrack))
            ));
        }
    }

    #[test]
    fn nothing_selected_writes_nothing() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.tracks = vec![false, false, false];
        let (_dir, path) = scratch("never.mid");
        assert!(!midi.change_sound(&path, &options));
        assert!(!path.exists());
    }
}

mod per_channel {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file() -> MidiFile {
        MidiFile::parse(&per_channel_file()).unwrap()
    }

    #[test]
    fn tempo() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.tempo = Some(0x405060);
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.time().tempo(), 0x405060);
    }

    #[test]
    fn transpose() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.transpose = 10;
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 3);
        for t in 0..3 {
            let first = 70 + 10 * t as u8;
            assert_eq!(numbers(&changed, t), vec![first, first + 1, first + 2]);
        }
    }

    #[test]
    fn instruments_per_channel() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.use_default_instruments = false;
        options.instruments = vec![40, 41, 42];
        let changed = rewrite(&midi, &options);
        assert_eq!(instruments(&changed), vec![40, 41, 42]);
    }

    #[test]
    fn only_selected_channel() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.tracks = vec![false, true, false];
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 1);
        assert_eq!(numbers(&changed, 0), vec![70, 71, 72]);
        assert_eq!(changed.tracks()[0].instrument, 4);
    }

    #[test]
    fn pause_time() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.pause_time = 50;
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 3);
        for t in 0..3 {
            let first = 61 + 10 * t as u8;
            let notes: Vec<(u32, u8)> = changed.tracks()[t]
                .notes
                .iter()
                .map(|n| (n.start_time, n.number))
                .collect();
            assert_eq!(notes, vec![(10, first), (70, first + 1)]);
        }
    }

    #[test]
    fn muted_channel_is_dropped() {
        let midi = file();
        let mut options = MidiOptions::from_file(&midi);
        options.mute = vec![false, false, true];
        let changed = rewrite(&midi, &options);
        assert_eq!(changed.tracks().len(), 2);
        assert_eq!(numbers(&changed, 1), vec![70, 71, 72]);
    }
}
