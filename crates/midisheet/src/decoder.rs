//! Header and track chunk decoding.
//!
//! Header problems are fatal. Problems inside a track body only cut the
//! track short: whatever events decoded cleanly before the damage are kept.

use tracing::{debug, warn};

use crate::event::{EventKind, MidiEvent, META_END_OF_TRACK, META_EVENT};
use crate::reader::ByteReader;
use crate::{Error, Result};

pub const HEADER_ID: &str = "MThd";
pub const TRACK_ID: &str = "MTrk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub format: u16,
    pub track_count: u16,
    /// Pulses per quarter note.
    pub division: u16,
}

/// Decode the 14-byte "MThd" chunk.
pub fn read_header(reader: &mut ByteReader<'_>) -> Result<Header> {
    let id = reader.read_ascii(4)?;
    if id != HEADER_ID {
        return Err(Error::MalformedHeader(format!(
            "expected {HEADER_ID:?}, found {id:?}"
        )));
    }
    let len = reader.read_u32()?;
    if len != 6 {
        return Err(Error::MalformedHeader(format!(
            "header length must be 6, found {len}"
        )));
    }
    let format = reader.read_u16()?;
    if format > 2 {
        return Err(Error::MalformedHeader(format!("unknown format {format}")));
    }
    let track_count = reader.read_u16()?;
    let division = reader.read_u16()?;
    if division & 0x8000 != 0 {
        return Err(Error::MalformedHeader(
            "SMPTE time division is not supported".to_string(),
        ));
    }
    if division == 0 {
        return Err(Error::MalformedHeader("time division is zero".to_string()));
    }
    Ok(Header {
        format,
        track_count,
        division,
    })
}

/// Decode every track chunk the header announces. Chunks with an unknown id
/// are skipped; a missing chunk ends decoding with the tracks read so far.
pub fn read_tracks(reader: &mut ByteReader<'_>, header: &Header) -> Vec<Vec<MidiEvent>> {
    let mut tracks = Vec::with_capacity(usize::from(header.track_count));
    while tracks.len() < usize::from(header.track_count) {
        let chunk = match read_chunk_header(reader) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(
                    expected = header.track_count,
                    found = tracks.len(),
                    %err,
                    "file ends before all tracks were read"
                );
                break;
            }
        };
        let available = chunk.len.min(reader.remaining());
        if available < chunk.len {
            warn!(
                declared = chunk.len,
                available, "track chunk is truncated"
            );
        }
        let body = match reader.read_bytes(available) {
            Ok(body) => body,
            Err(_) => break,
        };
        if chunk.id != TRACK_ID {
            debug!(id = %chunk.id, len = available, "skipping unknown chunk");
            continue;
        }
        let events = read_track_events(body);
        debug!(track = tracks.len(), events = events.len(), "decoded track");
        tracks.push(events);
    }
    tracks
}

struct ChunkHeader {
    id: String,
    len: usize,
}

fn read_chunk_header(reader: &mut ByteReader<'_>) -> Result<ChunkHeader> {
    let id = reader.read_ascii(4)?;
    let len = reader.read_u32()? as usize;
    Ok(ChunkHeader { id, len })
}

/// Decode the events of one track body. Never fails: decoding stops at the
/// end-of-track meta event, at the end of the body, or at the first event
/// that cannot be read completely.
pub fn read_track_events(body: &[u8]) -> Vec<MidiEvent> {
    let mut reader = ByteReader::new(body);
    let mut events = Vec::new();
    let mut start_time: u32 = 0;
    let mut running_status: Option<u8> = None;

    while reader.remaining() > 0 {
        match read_event(&mut reader, &mut start_time, &mut running_status) {
            Ok(Some(event)) => {
                let end = event.is_meta(META_END_OF_TRACK);
                events.push(event);
                if end {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(offset = reader.offset(), %err, "stopping track at unreadable event");
                break;
            }
        }
    }
    events
}

fn read_event(
    reader: &mut ByteReader<'_>,
    start_time: &mut u32,
    running_status: &mut Option<u8>,
) -> Result<Option<MidiEvent>> {
    let delta_time = reader.read_varlen()?;
    let time = start_time.saturating_add(delta_time);

    let peeked = reader.peek()?;
    let status = if peeked & 0x80 == 0 {
        match *running_status {
            Some(status) => status,
            None => {
                warn!(
                    offset = reader.offset(),
                    byte = peeked,
                    "data byte without a preceding status byte"
                );
                return Ok(None);
            }
        }
    } else {
        reader.read_u8()?
    };

    let Some(kind) = EventKind::from_status(status) else {
        warn!(offset = reader.offset(), status, "unsupported status byte");
        return Ok(None);
    };

    let event = match kind {
        EventKind::Meta => {
            let meta_type = reader.read_u8()?;
            let len = reader.read_varlen()? as usize;
            let data = reader.read_bytes(len)?.to_vec();
            MidiEvent {
                delta_time,
                start_time: time,
                kind,
                status: META_EVENT,
                meta_type,
                data,
            }
        }
        EventKind::SysEx => {
            let len = reader.read_varlen()? as usize;
            let data = reader.read_bytes(len)?.to_vec();
            MidiEvent {
                delta_time,
                start_time: time,
                kind,
                status,
                meta_type: 0,
                data,
            }
        }
        _ => {
            let data = reader.read_bytes(kind.data_len())?.to_vec();
            *running_status = Some(status);
            MidiEvent {
                delta_time,
                start_time: time,
                kind,
                status,
                meta_type: 0,
                data,
            }
        }
    };
    *start_time = time;
    Ok(Some(event))
}
