use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use midisheet::{
    clef, instruments, Accidental, ChordEstimator, Clef, KeySignature, MidiFile, MidiOptions,
    Section, TimeSignature, TrackSource,
};
use serde::Serialize;
use tracing::info;

use crate::config::Config;

#[derive(Serialize)]
struct FileSummary {
    name: String,
    format: u16,
    time: TimeSignature,
    key: String,
    end_time: u32,
    tracks: Vec<TrackSummary>,
}

#[derive(Serialize)]
struct TrackSummary {
    number: usize,
    instrument: u8,
    instrument_name: &'static str,
    notes: usize,
    lyrics: usize,
    range: Option<(u8, u8)>,
    clef: Clef,
    source: TrackSource,
}

fn open(path: &Path) -> Result<MidiFile> {
    MidiFile::open(path).with_context(|| format!("failed to decode {}", path.display()))
}

pub fn info(path: &Path, json: bool) -> Result<()> {
    let midi = open(path)?;
    let key = midi.guess_key();

    if json {
        let summary = FileSummary {
            name: midi.name().to_string(),
            format: midi.format(),
            time: midi.time(),
            key: key.to_string(),
            end_time: midi.end_time(),
            tracks: midi
                .tracks()
                .iter()
                .map(|t| TrackSummary {
                    number: t.number,
                    instrument: t.instrument,
                    instrument_name: t.instrument_name(),
                    notes: t.notes.len(),
                    lyrics: t.lyrics.len(),
                    range: t.range(),
                    clef: clef::main_clef(&t.notes),
                    source: t.source,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{midi}");
        println!("Key: {key}");
        for track in midi.tracks() {
            println!("Track {} clef: {}", track.number, clef::main_clef(&track.notes));
        }
    }
    Ok(())
}

pub struct NotesArgs {
    pub track: Option<usize>,
    pub combine_interval: Option<u32>,
    pub two_staffs: bool,
}

pub fn notes(path: &Path, config: &Config, args: NotesArgs) -> Result<()> {
    let midi = open(path)?;
    let mut options = MidiOptions::from_file(&midi);
    config.defaults.apply(&mut options);
    if let Some(ms) = args.combine_interval {
        options.combine_interval = ms;
    }
    if args.two_staffs {
        options.two_staffs = true;
    }
    if let Some(track) = args.track {
        if track >= midi.tracks().len() {
            bail!("track {track} out of range, file has {}", midi.tracks().len());
        }
        options.tracks = (0..midi.tracks().len()).map(|i| i == track).collect();
    }

    let key = midi.key_signature(&options);
    let time = midi.time();
    println!("Key: {key}");
    println!("Time: {time}");

    for track in midi.change_midi_notes(&options) {
        let clefs = midi.clefs(&track);
        let mut tracker = key.tracker();
        println!(
            "Track {} ({}), {} notes",
            track.number,
            track.instrument_name(),
            track.notes.len()
        );
        for note in &track.notes {
            let measure = time.measure_of(note.start_time);
            let accidental = tracker.accidental(note.number, measure);
            let white = tracker.white_note(note.number);
            println!(
                "  m{:<4} {:>8} {:>6} {:>3} {}{:<4} {:?} {}",
                measure + 1,
                note.start_time,
                note.duration,
                note.number,
                accidental_symbol(accidental),
                white.to_string(),
                time.note_duration(note.duration),
                clefs.clef_at(note.start_time),
            );
        }
    }
    Ok(())
}

fn accidental_symbol(accidental: Accidental) -> &'static str {
    match accidental {
        Accidental::None => "",
        Accidental::Sharp => "#",
        Accidental::Flat => "b",
        Accidental::Natural => "n",
    }
}

pub fn chords(path: &Path) -> Result<()> {
    let midi = open(path)?;
    let estimator = ChordEstimator::from_file(&midi);
    for (measure, name) in estimator.names() {
        println!("{:>4} {name}", measure + 1);
    }
    Ok(())
}

pub struct RewriteArgs {
    pub transpose: i32,
    pub tempo: Option<u32>,
    pub pause: u32,
    pub instruments: Vec<String>,
    pub exclude: Vec<usize>,
    pub mute: Vec<usize>,
    pub options: Option<PathBuf>,
}

pub fn rewrite(input: &Path, output: &Path, config: &Config, args: RewriteArgs) -> Result<()> {
    let midi = open(input)?;
    let options = rewrite_options(&midi, config, args)?;
    if !midi.change_sound(output, &options) {
        bail!("could not write {}", output.display());
    }
    info!(input = %input.display(), output = %output.display(), "rewrote MIDI file");
    Ok(())
}

fn rewrite_options(midi: &MidiFile, config: &Config, args: RewriteArgs) -> Result<MidiOptions> {
    let count = midi.tracks().len();
    let mut options = MidiOptions::from_file(midi);
    config.defaults.apply(&mut options);

    if let Some(path) = &args.options {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let sections = Section::parse_all(&text);
        let section = sections
            .first()
            .with_context(|| format!("no options section in {}", path.display()))?;
        let saved = MidiOptions::from_section(section)?;
        options.merge(&saved);
    }

    if args.transpose != 0 {
        options.transpose = args.transpose;
    }
    if let Some(tempo) = args.tempo {
        options.tempo = Some(tempo);
    }
    options.pause_time = args.pause;

    for spec in &args.instruments {
        let (track, program) = parse_instrument(spec)?;
        if track >= count {
            bail!("track {track} out of range, file has {count}");
        }
        options.instruments[track] = program;
        options.use_default_instruments = false;
    }
    for &track in &args.exclude {
        if track >= count {
            bail!("track {track} out of range, file has {count}");
        }
        options.tracks[track] = false;
    }
    for &track in &args.mute {
        if track >= count {
            bail!("track {track} out of range, file has {count}");
        }
        options.mute[track] = true;
    }
    Ok(options)
}

/// `TRACK=PROGRAM`, where PROGRAM is a General MIDI number or name.
fn parse_instrument(spec: &str) -> Result<(usize, u8)> {
    let (track, program) = spec
        .split_once('=')
        .with_context(|| format!("expected TRACK=PROGRAM, got {spec:?}"))?;
    let track: usize = track
        .trim()
        .parse()
        .with_context(|| format!("bad track number in {spec:?}"))?;
    let program = program.trim();
    let program = match program.parse::<u8>() {
        Ok(n) if n < instruments::PERCUSSION => n,
        Ok(n) => bail!("program {n} out of range 0..=127"),
        Err(_) => instruments::by_name(program)
            .with_context(|| format!("unknown instrument {program:?}"))?,
    };
    Ok((track, program))
}

pub fn options(path: &Path, config: &Config) -> Result<()> {
    let midi = open(path)?;
    let mut options = MidiOptions::from_file(&midi);
    config.defaults.apply(&mut options);
    let key = midi.key_signature(&options);
    print!("{}", options.to_section());
    println!("; key: {key}");
    if key != KeySignature::C_MAJOR {
        println!("; tonic pitch class: {}", key.tonic());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn instrument_by_number_or_name() {
        assert_eq!(parse_instrument("1=40").unwrap(), (1, 40));
        assert_eq!(parse_instrument("0 = Violin").unwrap(), (0, 40));
        assert!(parse_instrument("0=128").is_err());
        assert!(parse_instrument("0=Kazoo Orchestra").is_err());
        assert!(parse_instrument("40").is_err());
    }
}
