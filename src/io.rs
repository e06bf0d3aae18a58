//! Low-level byte codec shared by every protocol implementation.
//!
//! [`StreamWriter`] and [`StreamReader`] speak the primitive vocabulary both
//! wire families are built from: fixed-width little-endian integers and
//! floats, variable-length unsigned integers, raw byte runs, and UTF-16LE
//! code-unit runs. They know nothing about records or framing.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Width limit for a 16-bit variable-length integer: 7 + 7 + 2 bits.
const MAX_VAR16_BYTES: usize = 3;
/// Width limit for a 32-bit variable-length integer: 4 * 7 + 4 bits.
const MAX_VAR32_BYTES: usize = 5;

/// Bounded scratch sizes so wire-supplied lengths cannot force one huge
/// allocation before any payload byte has been read.
const READ_CHUNK: usize = 8 * 1024;
const SKIP_CHUNK: usize = 512;

fn eof_to_error(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEndOfStream
    } else {
        Error::Io(err)
    }
}

/// Writes primitives to an underlying byte sink.
///
/// Buffering is the caller's concern; wrap the sink in a
/// `std::io::BufWriter` when writing to files.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    inner: W,
}

impl<W: Write> StreamWriter<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Unwraps the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        Ok(())
    }

    /// Writes a signed byte.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.inner.write_i8(value)?;
        Ok(())
    }

    /// Writes a fixed 2-byte unsigned integer.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a fixed 2-byte signed integer.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.inner.write_i16::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a fixed 4-byte unsigned integer.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a fixed 4-byte signed integer.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a fixed 8-byte unsigned integer.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a fixed 8-byte signed integer.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.inner.write_i64::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes an IEEE single-precision float, bit-exact.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes an IEEE double-precision float, bit-exact.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.inner.write_f64::<LittleEndian>(value)?;
        Ok(())
    }

    /// Writes a bool as one byte, `false` = 0, `true` = 1.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Writes a raw byte run.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Writes a 16-bit variable-length unsigned integer.
    pub fn write_var_u16(&mut self, value: u16) -> Result<()> {
        self.write_var_u32(u32::from(value))
    }

    /// Writes a 32-bit variable-length unsigned integer.
    ///
    /// Each byte carries 7 data bits, least-significant group first; the
    /// high bit marks continuation.
    pub fn write_var_u32(&mut self, mut value: u32) -> Result<()> {
        while value >= 0x80 {
            self.write_u8((value as u8 & 0x7F) | 0x80)?;
            value >>= 7;
        }
        self.write_u8(value as u8)
    }

    /// Writes a run of UTF-16 code units, each little-endian.
    pub fn write_utf16_units(&mut self, units: &[u16]) -> Result<()> {
        for unit in units {
            self.write_u16(*unit)?;
        }
        Ok(())
    }
}

/// Reads primitives from an underlying byte source.
///
/// Exhausting the source mid-value yields
/// [`Error::UnexpectedEndOfStream`]; positioning after a failed read is
/// best-effort only, since the source is an arbitrary `io::Read`.
#[derive(Debug)]
pub struct StreamReader<R: Read> {
    inner: R,
}

impl<R: Read> StreamReader<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwraps the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().map_err(eof_to_error)
    }

    /// Reads a signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.inner.read_i8().map_err(eof_to_error)
    }

    /// Reads a fixed 2-byte unsigned integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.inner.read_u16::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a fixed 2-byte signed integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.inner.read_i16::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a fixed 4-byte unsigned integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.inner.read_u32::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a fixed 4-byte signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.inner.read_i32::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a fixed 8-byte unsigned integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.inner.read_u64::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a fixed 8-byte signed integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.inner.read_i64::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads an IEEE single-precision float, bit-exact.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.inner.read_f32::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads an IEEE double-precision float, bit-exact.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.inner.read_f64::<LittleEndian>().map_err(eof_to_error)
    }

    /// Reads a bool; any nonzero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads an exact byte run.
    ///
    /// Allocation grows chunk by chunk as bytes actually arrive, so a
    /// hostile length prefix cannot reserve memory the stream never backs.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(READ_CHUNK);
            let start = buf.len();
            buf.resize(start + take, 0);
            self.inner.read_exact(&mut buf[start..]).map_err(eof_to_error)?;
            remaining -= take;
        }
        Ok(buf)
    }

    /// Reads and discards an exact number of bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        let mut scratch = [0u8; SKIP_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(SKIP_CHUNK);
            self.inner
                .read_exact(&mut scratch[..take])
                .map_err(eof_to_error)?;
            remaining -= take;
        }
        Ok(())
    }

    /// Reads a 16-bit variable-length unsigned integer.
    pub fn read_var_u16(&mut self) -> Result<u16> {
        let mut value = 0u16;
        for group in 0..MAX_VAR16_BYTES {
            let byte = self.read_u8()?;
            value |= u16::from(byte & 0x7F) << (group * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::Encoding(format!(
            "variable-length integer exceeds {MAX_VAR16_BYTES} bytes"
        )))
    }

    /// Reads a 32-bit variable-length unsigned integer.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for group in 0..MAX_VAR32_BYTES {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (group * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::Encoding(format!(
            "variable-length integer exceeds {MAX_VAR32_BYTES} bytes"
        )))
    }

    /// Reads a run of UTF-16 code units, each little-endian.
    pub fn read_utf16_units(&mut self, count: usize) -> Result<Vec<u16>> {
        let byte_len = count
            .checked_mul(2)
            .ok_or_else(|| Error::Encoding("wide string length overflows".into()))?;
        let bytes = self.read_bytes(byte_len)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }
}

/// Encodes text as UTF-16LE code units for wide-string fields.
pub fn encode_utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// Decodes UTF-16 code units back into text.
pub fn decode_utf16(units: &[u16]) -> Result<String> {
    String::from_utf16(units)
        .map_err(|_| Error::Encoding("wide string is not valid UTF-16".into()))
}
