//! Raw MIDI events as they appear in a track chunk.

use serde::Serialize;

use crate::reader::write_varlen;

pub const EVENT_NOTE_OFF: u8 = 0x80;
pub const EVENT_NOTE_ON: u8 = 0x90;
pub const EVENT_KEY_PRESSURE: u8 = 0xA0;
pub const EVENT_CONTROL_CHANGE: u8 = 0xB0;
pub const EVENT_PROGRAM_CHANGE: u8 = 0xC0;
pub const EVENT_CHANNEL_PRESSURE: u8 = 0xD0;
pub const EVENT_PITCH_BEND: u8 = 0xE0;
pub const SYSEX_EVENT_1: u8 = 0xF0;
pub const SYSEX_EVENT_2: u8 = 0xF7;
pub const META_EVENT: u8 = 0xFF;

pub const META_SEQUENCE_NUMBER: u8 = 0x00;
pub const META_TEXT: u8 = 0x01;
pub const META_COPYRIGHT: u8 = 0x02;
pub const META_SEQUENCE_NAME: u8 = 0x03;
pub const META_INSTRUMENT: u8 = 0x04;
pub const META_LYRIC: u8 = 0x05;
pub const META_MARKER: u8 = 0x06;
pub const META_END_OF_TRACK: u8 = 0x2F;
pub const META_TEMPO: u8 = 0x51;
pub const META_SMPTE_OFFSET: u8 = 0x54;
pub const META_TIME_SIGNATURE: u8 = 0x58;
pub const META_KEY_SIGNATURE: u8 = 0x59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOff,
    NoteOn,
    KeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    SysEx,
    Meta,
}

impl EventKind {
    /// Classify a status byte. Returns `None` for system common/realtime
    /// bytes that cannot appear in a track chunk.
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0x80..=0x8F => Some(Self::NoteOff),
            0x90..=0x9F => Some(Self::NoteOn),
            0xA0..=0xAF => Some(Self::KeyPressure),
            0xB0..=0xBF => Some(Self::ControlChange),
            0xC0..=0xCF => Some(Self::ProgramChange),
            0xD0..=0xDF => Some(Self::ChannelPressure),
            0xE0..=0xEF => Some(Self::PitchBend),
            SYSEX_EVENT_1 | SYSEX_EVENT_2 => Some(Self::SysEx),
            META_EVENT => Some(Self::Meta),
            _ => None,
        }
    }

    /// Number of data bytes following a channel voice status byte.
    pub fn data_len(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelPressure => 1,
            Self::NoteOff
            | Self::NoteOn
            | Self::KeyPressure
            | Self::ControlChange
            | Self::PitchBend => 2,
            Self::SysEx | Self::Meta => 0,
        }
    }

    pub fn is_channel_event(self) -> bool {
        !matches!(self, Self::SysEx | Self::Meta)
    }
}

/// One decoded event. `data` holds the channel data bytes, the sysex
/// payload, or the meta payload depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MidiEvent {
    pub delta_time: u32,
    pub start_time: u32,
    pub kind: EventKind,
    /// Full status byte, channel nibble included.
    pub status: u8,
    /// Meta type for [`EventKind::Meta`], zero otherwise.
    pub meta_type: u8,
    pub data: Vec<u8>,
}

impl MidiEvent {
    pub fn channel_event(start_time: u32, status: u8, data: Vec<u8>) -> Self {
        let kind = EventKind::from_status(status).unwrap_or(EventKind::ControlChange);
        Self {
            delta_time: 0,
            start_time,
            kind,
            status,
            meta_type: 0,
            data,
        }
    }

    pub fn note_on(start_time: u32, channel: u8, number: u8, velocity: u8) -> Self {
        Self::channel_event(start_time, EVENT_NOTE_ON | (channel & 0x0F), vec![number, velocity])
    }

    pub fn note_off(start_time: u32, channel: u8, number: u8) -> Self {
        Self::channel_event(start_time, EVENT_NOTE_OFF | (channel & 0x0F), vec![number, 0])
    }

    pub fn program_change(start_time: u32, channel: u8, program: u8) -> Self {
        Self::channel_event(
            start_time,
            EVENT_PROGRAM_CHANGE | (channel & 0x0F),
            vec![program & 0x7F],
        )
    }

    pub fn meta(start_time: u32, meta_type: u8, data: Vec<u8>) -> Self {
        Self {
            delta_time: 0,
            start_time,
            kind: EventKind::Meta,
            status: META_EVENT,
            meta_type,
            data,
        }
    }

    /// Values above the 24-bit maximum are clamped.
    pub fn tempo(start_time: u32, microseconds: u32) -> Self {
        let bytes = microseconds.min(0x00FF_FFFF).to_be_bytes();
        Self::meta(start_time, META_TEMPO, bytes[1..].to_vec())
    }

    pub fn end_of_track(start_time: u32) -> Self {
        Self::meta(start_time, META_END_OF_TRACK, Vec::new())
    }

    pub fn channel(&self) -> Option<u8> {
        self.kind.is_channel_event().then_some(self.status & 0x0F)
    }

    pub fn set_channel(&mut self, channel: u8) {
        if self.kind.is_channel_event() {
            self.status = (self.status & 0xF0) | (channel & 0x0F);
        }
    }

    /// Note number for note and key pressure events.
    pub fn note_number(&self) -> Option<u8> {
        match self.kind {
            EventKind::NoteOn | EventKind::NoteOff | EventKind::KeyPressure => {
                self.data.first().copied()
            }
            _ => None,
        }
    }

    pub fn set_note_number(&mut self, number: u8) {
        if self.note_number().is_some() {
            self.data[0] = number & 0x7F;
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match self.kind {
            EventKind::NoteOn | EventKind::NoteOff => self.data.get(1).copied(),
            _ => None,
        }
    }

    /// True for a NoteOn with non-zero velocity.
    pub fn starts_note(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity().unwrap_or(0) > 0
    }

    /// True for a NoteOff, or a NoteOn with zero velocity.
    pub fn ends_note(&self) -> bool {
        match self.kind {
            EventKind::NoteOff => true,
            EventKind::NoteOn => self.velocity().unwrap_or(0) == 0,
            _ => false,
        }
    }

    pub fn program(&self) -> Option<u8> {
        match self.kind {
            EventKind::ProgramChange => self.data.first().copied(),
            _ => None,
        }
    }

    pub fn is_meta(&self, meta_type: u8) -> bool {
        self.kind == EventKind::Meta && self.meta_type == meta_type
    }

    /// Microseconds per quarter note of a tempo meta event.
    pub fn tempo_value(&self) -> Option<u32> {
        if !self.is_meta(META_TEMPO) || self.data.len() < 3 {
            return None;
        }
        Some(
            (u32::from(self.data[0]) << 16)
                | (u32::from(self.data[1]) << 8)
                | u32::from(self.data[2]),
        )
    }

    /// Numerator and denominator of a time signature meta event. The file
    /// stores the denominator as a power of two.
    pub fn time_signature_value(&self) -> Option<(u32, u32)> {
        if !self.is_meta(META_TIME_SIGNATURE) || self.data.len() < 2 {
            return None;
        }
        let numerator = u32::from(self.data[0]);
        let denominator = 1u32.checked_shl(u32::from(self.data[1]))?;
        Some((numerator, denominator))
    }

    /// Sharps (positive) or flats (negative) and the minor flag of a key
    /// signature meta event.
    pub fn key_signature_value(&self) -> Option<(i8, bool)> {
        if !self.is_meta(META_KEY_SIGNATURE) || self.data.len() < 2 {
            return None;
        }
        Some((self.data[0] as i8, self.data[1] != 0))
    }

    pub fn text(&self) -> Option<String> {
        match self.kind {
            EventKind::Meta if (META_TEXT..=META_MARKER).contains(&self.meta_type) => {
                Some(String::from_utf8_lossy(&self.data).into_owned())
            }
            _ => None,
        }
    }

    /// Append the event, preceded by its delta time, to a track body.
    /// Running status is not used on output.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        write_varlen(buf, self.delta_time);
        match self.kind {
            EventKind::Meta => {
                buf.push(META_EVENT);
                buf.push(self.meta_type);
                write_varlen(buf, self.data.len() as u32);
                buf.extend_from_slice(&self.data);
            }
            EventKind::SysEx => {
                buf.push(self.status);
                write_varlen(buf, self.data.len() as u32);
                buf.extend_from_slice(&self.data);
            }
            kind => {
                buf.push(self.status);
                let len = kind.data_len();
                buf.extend(self.data.iter().copied().chain(std::iter::repeat(0)).take(len));
            }
        }
    }
}
