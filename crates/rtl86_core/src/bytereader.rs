/*
    rtl86

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    bytereader.rs

    Implements the ByteReader trait. The reader's position is the
    instruction pointer: every read advances it past the consumed bytes.

*/

use crate::cpu_common::DecodeError;

pub trait ByteReader {
    fn seek(&mut self, pos: u32);
    fn tell(&self) -> u32;

    fn read_u8(&mut self) -> Result<u8, DecodeError>;
    fn peek_u8(&mut self) -> Result<u8, DecodeError>;

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | (hi << 8))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let lo = self.read_u16()? as u32;
        let hi = self.read_u16()? as u32;
        Ok(lo | (hi << 16))
    }

    /// Read an unsigned little-endian value of `width` bytes.
    fn read(&mut self, width: u8) -> Result<u32, DecodeError> {
        match width {
            1 => self.read_u8().map(|b| b as u32),
            2 => self.read_u16().map(|w| w as u32),
            4 => self.read_u32(),
            _ => panic!("Invalid fetch width: {}", width),
        }
    }
}

/// An instruction byte stream backed by a slice mapped at `base`.
pub struct InstructionStream<'a> {
    bytes: &'a [u8],
    base: u32,
    pos: u32,
}

impl<'a> InstructionStream<'a> {
    pub fn new(bytes: &'a [u8], base: u32) -> Self {
        Self { bytes, base, pos: base }
    }

    /// Return true if the cursor has reached the end of the mapped bytes.
    pub fn at_end(&self) -> bool {
        self.index(self.pos).is_none()
    }

    /// Return the mapped bytes in `[start, end)`, clamped to the mapping.
    pub fn slice(&self, start: u32, end: u32) -> &'a [u8] {
        let lo = (start.wrapping_sub(self.base) as usize).min(self.bytes.len());
        let hi = (end.wrapping_sub(self.base) as usize).clamp(lo, self.bytes.len());
        &self.bytes[lo..hi]
    }

    #[inline]
    fn index(&self, addr: u32) -> Option<usize> {
        let offset = addr.wrapping_sub(self.base) as usize;
        (offset < self.bytes.len()).then_some(offset)
    }
}

impl ByteReader for InstructionStream<'_> {
    fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.peek_u8()?;
        self.pos = self.pos.wrapping_add(1);
        Ok(byte)
    }

    fn peek_u8(&mut self) -> Result<u8, DecodeError> {
        match self.index(self.pos) {
            Some(i) => Ok(self.bytes[i]),
            None => Err(DecodeError::ReadOutOfBounds(self.pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_cursor() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut stream = InstructionStream::new(&bytes, 0x1000);

        assert_eq!(stream.tell(), 0x1000);
        assert_eq!(stream.peek_u8(), Ok(0x01));
        assert_eq!(stream.tell(), 0x1000);
        assert_eq!(stream.read_u8(), Ok(0x01));
        assert_eq!(stream.read_u16(), Ok(0x0302));
        assert_eq!(stream.read_u32(), Ok(0x0706_0504));
        assert_eq!(stream.tell(), 0x1007);
        assert!(stream.at_end());
    }

    #[test]
    fn test_read_out_of_bounds() {
        let bytes = [0xAA, 0xBB, 0xCC];
        let mut stream = InstructionStream::new(&bytes, 0x2000);
        stream.seek(0x2001);
        assert_eq!(stream.read(4), Err(DecodeError::ReadOutOfBounds(0x2003)));

        stream.seek(0x1FFF);
        assert_eq!(stream.read_u8(), Err(DecodeError::ReadOutOfBounds(0x1FFF)));
        assert_eq!(stream.tell(), 0x1FFF);
    }

    #[test]
    fn test_slice_is_clamped() {
        let bytes = [0x10, 0x20, 0x30];
        let stream = InstructionStream::new(&bytes, 0x100);
        assert_eq!(stream.slice(0x101, 0x103), &[0x20, 0x30]);
        assert_eq!(stream.slice(0x102, 0x110), &[0x30]);
        assert!(stream.slice(0x200, 0x210).is_empty());
    }
}
