//! Self-describing binary encoding.
//!
//! Every value is written as a one-byte [`Kind`] tag followed by a
//! kind-specific payload:
//!
//! ```text
//! scalar:  [kind][raw native-endian bytes]
//! array:   [kind][u64 count][elem]...
//! slice:   [kind][u64 count][elem]...
//! string:  [kind][u64 len][utf-8 bytes]
//! map:     [kind][u64 pairs][key][value]...
//! struct:  [kind][u64 fields][field]...
//! ```
//!
//! Records carry no field names. Both sides must agree on field count, order
//! and types, and on byte order, since scalars are copied as they sit in
//! memory.
//!
//! Decoding always needs a destination of the expected shape: the tag read
//! from the stream must match the destination's kind.
//!
//! # Example
//!
//! ```
//! use postwire::wire::{from_bytes, to_bytes};
//!
//! let bytes = to_bytes(&vec![1i32, 2, 3]).unwrap();
//! let mut back: Vec<i32> = Vec::new();
//! from_bytes(&bytes, &mut back).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

mod container;
mod kind;
mod record;
mod scalar;

pub use kind::Kind;
pub use scalar::{Complex128, Complex64};

use crate::config::WireConfig;
use crate::error::WireError;
use std::io::{Read, Write};

/// Reports the kind tag a value is encoded under.
pub trait Kinded {
    fn kind(&self) -> Kind;
}

/// A value that can write its payload.
pub trait Encode: Kinded {
    /// Write everything that follows the kind tag.
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError>;
}

/// A destination that can be filled from a payload.
///
/// The destination's current shape decides how the payload is read; its
/// previous content is overwritten.
pub trait Decode: Kinded {
    /// Read everything that follows the kind tag.
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError>;
}

impl<T: Kinded + ?Sized> Kinded for &T {
    fn kind(&self) -> Kind {
        (**self).kind()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        (**self).encode_payload(enc)
    }
}

/// Writes tagged values to a byte sink.
pub struct Encoder<'a> {
    dst: &'a mut dyn Write,
}

impl<'a> Encoder<'a> {
    pub fn new(dst: &'a mut dyn Write) -> Self {
        Self { dst }
    }

    /// Encode one value: its kind tag, then its payload.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), WireError> {
        self.write_bytes(&[value.kind().tag()])?;
        value.encode_payload(self)
    }

    /// Write a count or length field.
    pub fn write_count(&mut self, count: usize) -> Result<(), WireError> {
        self.write_bytes(&(count as u64).to_ne_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.dst.write_all(bytes)?;
        Ok(())
    }
}

/// Reads tagged values from a byte source into existing destinations.
pub struct Decoder<'a> {
    src: &'a mut dyn Read,
}

impl<'a> Decoder<'a> {
    pub fn new(src: &'a mut dyn Read) -> Self {
        Self { src }
    }

    /// Decode the next value into `dst`.
    pub fn decode<T: Decode + ?Sized>(&mut self, dst: &mut T) -> Result<(), WireError> {
        let mut tag = [0u8; 1];
        self.read_exact(&mut tag)?;

        let found = Kind::from_tag(tag[0]).ok_or(WireError::UnsupportedType { tag: tag[0] })?;
        let expected = dst.kind();
        if found != expected {
            return Err(WireError::IncompatibleValue { expected, found });
        }

        dst.decode_payload(self)
    }

    /// Read a count or length field.
    pub fn read_count(&mut self) -> Result<u64, WireError> {
        let mut buf = [0u8; WireConfig::COUNT_WIDTH];
        self.read_exact(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Read a record's field count and check it against the destination.
    pub fn expect_fields(&mut self, expected: usize) -> Result<(), WireError> {
        let found = self.read_count()?;
        if found != expected as u64 {
            return Err(WireError::FieldCountMismatch { expected, found });
        }
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.src.read_exact(buf)?;
        Ok(())
    }

    /// Read `len` raw bytes, growing the buffer as data arrives.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(prealloc(len));
        let read = (&mut self.src).take(len).read_to_end(&mut buf)?;
        if (read as u64) < len {
            return Err(WireError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(buf)
    }
}

/// Capacity to reserve for a declared count.
pub(crate) fn prealloc(count: u64) -> usize {
    count.min(WireConfig::MAX_PREALLOC as u64) as usize
}

/// Encode a single value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    Encoder::new(&mut buf).encode(value)?;
    Ok(buf)
}

/// Decode a single value from `bytes` into `dst`.
pub fn from_bytes<T: Decode + ?Sized>(bytes: &[u8], dst: &mut T) -> Result<(), WireError> {
    let mut src = bytes;
    Decoder::new(&mut src).decode(dst)
}
