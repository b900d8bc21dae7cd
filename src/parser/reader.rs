//! Byte reader for instruction immediates
//!
//! Instructions are handed a `Reader` positioned at their immediate operands
//! and must consume exactly the bytes their encoding defines. All integers
//! use LEB128; floats and v128 immediates are raw little-endian bytes.

use byteorder::{ByteOrder, LittleEndian};
use std::io;

pub struct Reader {
    bytes: Vec<u8>,
    pos: usize,
}

impl Reader {
    pub fn new(bytes: Vec<u8>) -> Reader {
        Reader { bytes, pos: 0 }
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "no more bytes to read")
}

fn overflow() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "integer representation too long")
}

impl Reader {
    // Basic operations --------------------------------------------------------
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, io::Error> {
        let byte = *self.bytes.get(self.pos).ok_or_else(eof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], io::Error> {
        let end = self.pos.checked_add(len).ok_or_else(eof)?;
        if end > self.bytes.len() {
            return Err(eof());
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    // Read and interpret types ------------------------------------------------

    pub fn read_vu32(&mut self) -> Result<u32, io::Error> {
        self.read_unsigned(32).map(|v| v as u32)
    }

    pub fn read_vu64(&mut self) -> Result<u64, io::Error> {
        self.read_unsigned(64)
    }

    pub fn read_vs32(&mut self) -> Result<i32, io::Error> {
        self.read_signed(32).map(|v| v as i32)
    }

    /// Signed 33-bit LEB128, used for block types and heap types.
    pub fn read_vs33(&mut self) -> Result<i64, io::Error> {
        self.read_signed(33)
    }

    pub fn read_vs64(&mut self) -> Result<i64, io::Error> {
        self.read_signed(64)
    }

    pub fn read_f32(&mut self) -> Result<f32, io::Error> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, io::Error> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    pub fn read_v128(&mut self) -> Result<[u8; 16], io::Error> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.read_bytes(16)?);
        Ok(buf)
    }

    fn read_unsigned(&mut self, size: u32) -> Result<u64, io::Error> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            let remaining_bits = size - shift;
            // the final byte may only carry the bits left in the target width
            if remaining_bits < 7 && (b & 0x7f) >> remaining_bits != 0 {
                return Err(overflow());
            }
            result |= ((b & 0x7f) as u64) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            if shift >= size {
                return Err(overflow());
            }
        }
    }

    fn read_signed(&mut self, size: u32) -> Result<i64, io::Error> {
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            let remaining_bits = size - shift;
            if remaining_bits < 7 {
                // unused bits must be a sign extension of the last used bit
                let sign_and_unused = ((b << 1) as i8) >> remaining_bits;
                if sign_and_unused != 0 && sign_and_unused != -1 {
                    return Err(overflow());
                }
            }
            result |= ((b & 0x7f) as i64) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                if shift < 64 && b & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
            if shift >= size {
                return Err(overflow());
            }
        }
    }
}

/// Emit an unsigned LEB128, mostly useful for building test inputs.
pub fn emit_vu32(v: u32) -> Vec<u8> {
    let mut result = vec![];
    let mut value = v;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            result.push(byte);
            return result;
        }
        result.push(byte | 0x80);
    }
}

pub fn emit_vs64(v: i64) -> Vec<u8> {
    let mut result = vec![];
    let mut value = v;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
            result.push(byte);
            return result;
        }
        result.push(byte | 0x80);
    }
}
