//! Sequential big-endian reader over an in-memory MIDI buffer.

use crate::{Error, Result};

/// Longest variable-length quantity a MIDI file may contain.
pub const MAX_VARLEN_BYTES: usize = 4;

/// A cursor over a byte slice. Every read is bounds-checked and fails with
/// [`Error::EndOfInput`] instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current cursor position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn check(&self, wanted: usize) -> Result<()> {
        if self.remaining() < wanted {
            return Err(Error::EndOfInput {
                offset: self.offset,
                wanted,
            });
        }
        Ok(())
    }

    pub fn peek(&self) -> Result<u8> {
        self.check(1)?;
        Ok(self.data[self.offset])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    /// Read `n` bytes as text. Bytes outside ASCII are replaced rather than rejected.
    pub fn read_ascii(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_bytes(n)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a MIDI variable-length quantity: 7 bits per byte, high bit set on
    /// every byte except the last, at most 4 bytes.
    pub fn read_varlen(&mut self) -> Result<u32> {
        let start = self.offset;
        let mut value: u32 = 0;
        for _ in 0..MAX_VARLEN_BYTES {
            let byte = self.read_u8()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::MalformedVarlen { offset: start })
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.check(n)?;
        self.offset += n;
        Ok(())
    }
}

/// Append `value` as a variable-length quantity. Values above the 4-byte
/// maximum of 0x0FFF_FFFF are clamped to it.
pub fn write_varlen(buf: &mut Vec<u8>, value: u32) {
    let mut value = value.min(0x0FFF_FFFF);
    let mut stack = [0u8; MAX_VARLEN_BYTES];
    let mut len = 0;
    loop {
        stack[len] = (value & 0x7F) as u8;
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        buf.push(stack[i] | continuation);
    }
}
