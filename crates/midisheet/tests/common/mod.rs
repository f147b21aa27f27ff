//! Helpers for building small MIDI files byte by byte.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const KEY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const PITCH_BEND: u8 = 0xE0;
pub const META: u8 = 0xFF;
pub const META_SEQUENCE: u8 = 0x00;
pub const META_TEMPO: u8 = 0x51;
pub const META_KEY_SIGNATURE: u8 = 0x59;

pub const QUARTER: u16 = 240;
pub const VELOCITY: u8 = 80;

/// A format 1 file with one chunk per body, lengths filled in.
pub fn smf(quarter: u16, bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut data = header(1, bodies.len() as u16, quarter);
    for body in bodies {
        push_chunk(&mut data, body, body.len() as u32);
    }
    data
}

pub fn header(format: u16, tracks: u16, quarter: u16) -> Vec<u8> {
    let mut data = b"MThd".to_vec();
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&format.to_be_bytes());
    data.extend_from_slice(&tracks.to_be_bytes());
    data.extend_from_slice(&quarter.to_be_bytes());
    data
}

/// Append a track chunk that declares `declared` bytes of body.
pub fn push_chunk(data: &mut Vec<u8>, body: &[u8], declared: u32) {
    data.extend_from_slice(b"MTrk");
    data.extend_from_slice(&declared.to_be_bytes());
    data.extend_from_slice(body);
}

/// Three notes played one after another: `first` for 60 pulses, then
/// `first + 1` for 30, then `first + 2` for 90.
pub fn sequential_body(first: u8) -> Vec<u8> {
    vec![
        0, NOTE_ON, first, VELOCITY,
        60, NOTE_OFF, first, 0,
        0, NOTE_ON, first + 1, VELOCITY,
        30, NOTE_OFF, first + 1, 0,
        0, NOTE_ON, first + 2, VELOCITY,
        90, NOTE_OFF, first + 2, 0,
    ]
}

/// Three tracks, each with its own tempo and program change on channel 0,
/// playing `sequential_body(60 + 10 * track)`.
pub fn three_track_file() -> Vec<u8> {
    let setups: [([u8; 3], u8); 3] = [
        ([0x00, 0x32, 0xff], 4),
        ([0xa0, 0xb0, 0xcc], 5),
        ([0x12, 0x12, 0x44], 0),
    ];
    let bodies: Vec<Vec<u8>> = setups
        .iter()
        .enumerate()
        .map(|(track, (tempo, program))| {
            let mut body = vec![0, META, META_TEMPO, 3, tempo[0], tempo[1], tempo[2]];
            body.extend_from_slice(&[0, PROGRAM_CHANGE, *program]);
            body.extend(sequential_body(60 + 10 * track as u8));
            body
        })
        .collect();
    smf(QUARTER, &bodies)
}

/// One track multiplexing channels 0, 1 and 2 with programs 0, 4 and 5.
/// Each channel plays three 30-pulse notes at 0, 60 and 120 numbered
/// `60 + 10 * channel + i`.
pub fn per_channel_file() -> Vec<u8> {
    let mut body = vec![
        0, PROGRAM_CHANGE, 0,
        0, PROGRAM_CHANGE + 1, 4,
        0, PROGRAM_CHANGE + 2, 5,
    ];
    for i in 0..3u8 {
        let delta = if i == 0 { 0 } else { 30 };
        body.extend_from_slice(&[delta, NOTE_ON, 60 + i, VELOCITY]);
        body.extend_from_slice(&[0, NOTE_ON + 1, 70 + i, VELOCITY]);
        body.extend_from_slice(&[0, NOTE_ON + 2, 80 + i, VELOCITY]);
        body.extend_from_slice(&[30, NOTE_OFF, 60 + i, 0]);
        body.extend_from_slice(&[0, NOTE_OFF + 1, 70 + i, 0]);
        body.extend_from_slice(&[0, NOTE_OFF + 2, 80 + i, 0]);
    }
    smf(QUARTER, &[body])
}

/// A scratch directory and a path inside it for an output file.
pub fn scratch(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}
