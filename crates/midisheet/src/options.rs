//! Display and playback options, and their flat key=value section form.
//!
//! A section looks like:
//!
//! ```text
//! [song.mid]
//! filename=/music/song.mid
//! version=2.6.0
//! tracks=True,False,True
//! time=3,4,720,500000
//! shadeColor=210 205 220
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::file::MidiFile;
use crate::time_signature::TimeSignature;
use crate::{Error, Result};

pub const OPTIONS_VERSION: &str = "2.6.0";
/// This release stored mute flags incorrectly; they are discarded on load.
const BROKEN_MUTE_VERSION: &str = "2.5.0";
pub const DEFAULT_COMBINE_INTERVAL: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [r, g, b] = parts[..] else {
            return Err(Error::Options(format!("color {s:?} is not \"R G B\"")));
        };
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|_| Error::Options(format!("color component {v:?} out of range")))
        };
        Ok(Color::rgb(channel(r)?, channel(g)?, channel(b)?))
    }
}

/// How note names are printed beside notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteLetters {
    #[default]
    None,
    Letter,
    FixedDoReMi,
    MovableDoReMi,
    FixedNumber,
    MovableNumber,
}

impl NoteLetters {
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Letter,
            2 => Self::FixedDoReMi,
            3 => Self::MovableDoReMi,
            4 => Self::FixedNumber,
            5 => Self::MovableNumber,
            _ => Self::None,
        }
    }

    pub fn index(self) -> i32 {
        self as i32
    }
}

/// Per-song configuration for display and rewriting. Per-track vectors are
/// indexed like [`MidiFile::tracks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiOptions {
    pub filename: String,
    pub title: String,
    /// Tracks to display and play.
    pub tracks: Vec<bool>,
    /// Tracks to silence on playback.
    pub mute: Vec<bool>,
    pub instruments: Vec<u8>,
    /// Keep each track's own instrument instead of `instruments`.
    pub use_default_instruments: bool,
    pub scroll_vert: bool,
    pub large_note_size: bool,
    pub two_staffs: bool,
    pub show_note_letters: NoteLetters,
    pub show_lyrics: bool,
    pub show_measures: bool,
    pub shift_time: i32,
    pub transpose: i32,
    /// Tonic pitch class of the key to display, or -1 to guess it.
    pub key: i32,
    pub time: Option<TimeSignature>,
    /// Milliseconds within which start times are merged.
    pub combine_interval: u32,
    pub colors: Option<Vec<Color>>,
    pub shade_color: Color,
    pub shade2_color: Color,
    /// Microseconds per quarter note to play at; `None` keeps the file's
    /// own tempo events.
    pub tempo: Option<u32>,
    /// Start playback at this pulse.
    pub pause_time: u32,
    pub play_measures_in_loop: bool,
    pub play_measures_in_loop_start: u32,
    pub play_measures_in_loop_end: u32,
}

impl Default for MidiOptions {
    fn default() -> Self {
        Self {
            filename: String::new(),
            title: String::new(),
            tracks: Vec::new(),
            mute: Vec::new(),
            instruments: Vec::new(),
            use_default_instruments: true,
            scroll_vert: true,
            large_note_size: false,
            two_staffs: false,
            show_note_letters: NoteLetters::None,
            show_lyrics: true,
            show_measures: false,
            shift_time: 0,
            transpose: 0,
            key: -1,
            time: None,
            combine_interval: DEFAULT_COMBINE_INTERVAL,
            colors: None,
            shade_color: Color::rgb(210, 205, 220),
            shade2_color: Color::rgb(80, 100, 250),
            tempo: None,
            pause_time: 0,
            play_measures_in_loop: false,
            play_measures_in_loop_start: 0,
            play_measures_in_loop_end: 0,
        }
    }
}

impl MidiOptions {
    /// Defaults for a decoded file: every track shown except percussion,
    /// which is also muted; two staffs when there is a single track.
    pub fn from_file(file: &MidiFile) -> Self {
        let tracks = file.tracks();
        let time = file.time();
        let title = Path::new(file.name())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            filename: file.name().to_string(),
            title,
            tracks: tracks.iter().map(|t| !t.is_percussion()).collect(),
            mute: tracks.iter().map(|t| t.is_percussion()).collect(),
            instruments: tracks.iter().map(|t| t.instrument).collect(),
            two_staffs: tracks.len() == 1,
            time: Some(time),
            tempo: Some(time.tempo()),
            play_measures_in_loop_end: file.end_time() / time.measure(),
            ..Self::default()
        }
    }

    pub fn is_track_selected(&self, index: usize) -> bool {
        self.tracks.get(index).copied().unwrap_or(true)
    }

    pub fn is_track_muted(&self, index: usize) -> bool {
        self.mute.get(index).copied().unwrap_or(false)
    }

    pub fn to_section(&self) -> Section {
        let mut section = Section::new(&self.title);
        section.set("filename", &self.filename);
        section.set("version", OPTIONS_VERSION);
        section.set("tracks", join(&self.tracks, format_bool));
        section.set("mute", join(&self.mute, format_bool));
        section.set("instruments", join(&self.instruments, u8::to_string));
        section.set("useDefaultInstruments", format_bool(&self.use_default_instruments));
        if let Some(time) = &self.time {
            section.set(
                "time",
                format!(
                    "{},{},{},{}",
                    time.numerator(),
                    time.denominator(),
                    time.quarter(),
                    time.tempo()
                ),
            );
        }
        section.set("scrollVert", format_bool(&self.scroll_vert));
        section.set("largeNoteSize", format_bool(&self.large_note_size));
        section.set("showLyrics", format_bool(&self.show_lyrics));
        section.set("twoStaffs", format_bool(&self.two_staffs));
        section.set("showNoteLetters", self.show_note_letters.index().to_string());
        section.set("transpose", self.transpose.to_string());
        section.set("key", self.key.to_string());
        section.set("combineInterval", self.combine_interval.to_string());
        section.set("shadeColor", self.shade_color.to_string());
        section.set("shade2Color", self.shade2_color.to_string());
        if let Some(colors) = &self.colors {
            section.set("colors", join(colors, Color::to_string));
        }
        section.set("showMeasures", format_bool(&self.show_measures));
        section.set("playMeasuresInLoop", format_bool(&self.play_measures_in_loop));
        section.set(
            "playMeasuresInLoopStart",
            self.play_measures_in_loop_start.to_string(),
        );
        section.set("playMeasuresInLoopEnd", self.play_measures_in_loop_end.to_string());
        section
    }

    /// Read options saved with [`Self::to_section`]. Missing keys keep their
    /// defaults; a white shade colour counts as missing.
    pub fn from_section(section: &Section) -> Result<Self> {
        let mut options = Self {
            title: section.name.clone(),
            filename: section.get("filename").unwrap_or_default().to_string(),
            ..Self::default()
        };

        if let Some(tracks) = section.get_list("tracks", parse_bool)? {
            options.tracks = tracks;
        }
        if let Some(mute) = section.get_list("mute", parse_bool)? {
            options.mute = if section.get("version") == Some(BROKEN_MUTE_VERSION) {
                vec![false; mute.len()]
            } else {
                mute
            };
        }
        if let Some(instruments) = section.get_list("instruments", |v| parse_number::<u8>(v))? {
            options.instruments = instruments;
        }
        if let Some(time) = section.get_list("time", |v| parse_number::<u32>(v))? {
            if let [numerator, denominator, quarter, tempo] = time[..] {
                options.time = Some(TimeSignature::new(numerator, denominator, quarter, tempo));
            }
        }

        let flags: [(&str, &mut bool); 7] = [
            ("useDefaultInstruments", &mut options.use_default_instruments),
            ("scrollVert", &mut options.scroll_vert),
            ("largeNoteSize", &mut options.large_note_size),
            ("showLyrics", &mut options.show_lyrics),
            ("twoStaffs", &mut options.two_staffs),
            ("showMeasures", &mut options.show_measures),
            ("playMeasuresInLoop", &mut options.play_measures_in_loop),
        ];
        for (key, slot) in flags {
            if let Some(value) = section.get(key) {
                *slot = parse_bool(value)?;
            }
        }

        if let Some(value) = section.get("showNoteLetters") {
            options.show_note_letters = NoteLetters::from_index(parse_number(value)?);
        }
        if let Some(value) = section.get("transpose") {
            options.transpose = parse_number(value)?;
        }
        if let Some(value) = section.get("key") {
            options.key = parse_number(value)?;
        }
        if let Some(value) = section.get("combineInterval") {
            options.combine_interval = parse_number(value)?;
        }
        if let Some(value) = section.get("playMeasuresInLoopStart") {
            options.play_measures_in_loop_start = parse_number(value)?;
        }
        if let Some(value) = section.get("playMeasuresInLoopEnd") {
            options.play_measures_in_loop_end = parse_number(value)?;
        }

        if let Some(color) = section.get_color("shadeColor")? {
            options.shade_color = color;
        }
        if let Some(color) = section.get_color("shade2Color")? {
            options.shade2_color = color;
        }
        options.colors = section.get_list("colors", str::parse::<Color>)?;
        Ok(options)
    }

    /// Copy saved settings over these. Per-track lists are only taken when
    /// they have one entry per track.
    pub fn merge(&mut self, saved: &MidiOptions) {
        if saved.tracks.len() == self.tracks.len() {
            self.tracks.clone_from(&saved.tracks);
        }
        if saved.mute.len() == self.mute.len() {
            self.mute.clone_from(&saved.mute);
        }
        if saved.instruments.len() == self.instruments.len() {
            self.instruments.clone_from(&saved.instruments);
        }
        if let Some(time) = saved.time {
            self.time = Some(time);
        }
        self.use_default_instruments = saved.use_default_instruments;
        self.scroll_vert = saved.scroll_vert;
        self.large_note_size = saved.large_note_size;
        self.show_lyrics = saved.show_lyrics;
        self.two_staffs = saved.two_staffs;
        self.show_note_letters = saved.show_note_letters;
        self.transpose = saved.transpose;
        self.key = saved.key;
        self.combine_interval = saved.combine_interval;
        if saved.shade_color != Color::WHITE {
            self.shade_color = saved.shade_color;
        }
        if saved.shade2_color != Color::WHITE {
            self.shade2_color = saved.shade2_color;
        }
        if saved.colors.is_some() {
            self.colors.clone_from(&saved.colors);
        }
        self.show_measures = saved.show_measures;
        self.play_measures_in_loop = saved.play_measures_in_loop;
        self.play_measures_in_loop_start = saved.play_measures_in_loop_start;
        self.play_measures_in_loop_end = saved.play_measures_in_loop_end;
    }
}

fn format_bool(value: &bool) -> String {
    let text = if *value { "True" } else { "False" };
    text.to_string()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::Options(format!("{other:?} is not a boolean"))),
    }
}

fn parse_number<T: FromStr>(value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Options(format!("{value:?} is not a valid number")))
}

fn join<T>(values: &[T], format: impl Fn(&T) -> String) -> String {
    values.iter().map(format).collect::<Vec<_>>().join(",")
}

/// A named group of key=value properties, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub name: String,
    pub properties: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: Vec::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_list<T>(&self, key: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<Vec<T>>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        if value.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        value.split(',').map(|v| parse(v.trim())).collect::<Result<Vec<T>>>().map(Some)
    }

    fn get_color(&self, key: &str) -> Result<Option<Color>> {
        match self.get(key) {
            Some(value) => {
                let color: Color = value.parse()?;
                Ok((color != Color::WHITE).then_some(color))
            }
            None => Ok(None),
        }
    }

    /// Parse every section in a text. Lines before the first `[name]`
    /// header, blank lines and `;`/`#` comments are ignored.
    pub fn parse_all(text: &str) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                sections.push(Section::new(name.trim()));
                continue;
            }
            if let (Some(section), Some((key, value))) = (sections.last_mut(), line.split_once('=')) {
                section.set(key.trim(), value.trim());
            }
        }
        sections
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.name)?;
        for (key, value) in &self.properties {
            writeln!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
