//! Symmetric serialization over a chunk.
//!
//! A type participating in persistence implements [`Persist`] once; the same
//! `persist` body reads when handed a [`ChunkReader`] and writes when handed a
//! [`ChunkWriter`], so the field order can never drift between directions.
//!
//! Readers carry the version of the file being decoded. Writers carry
//! [`CURRENT_VERSION`] unless built with [`ChunkWriter::at_version`], which
//! exists so old files can be produced for tests.

use crate::codec::writer::checked_len;
use crate::codec::{BinaryReader, BinaryWriter};
use crate::error::Result;
use crate::migrate::gates::CURRENT_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reading,
    Writing,
}

pub trait Stream {
    fn mode(&self) -> Mode;

    /// Format version of the data flowing through this stream
    fn version(&self) -> u32;

    /// Upper bound on how many bytes are left to read
    fn remaining_hint(&self) -> usize;

    fn is_reading(&self) -> bool {
        self.mode() == Mode::Reading
    }

    /// True if the data was written at or after `gate`
    fn has(&self, gate: u32) -> bool {
        self.version() >= gate
    }

    fn rw_u8(&mut self, v: &mut u8) -> Result<()>;
    fn rw_i8(&mut self, v: &mut i8) -> Result<()>;
    fn rw_bool(&mut self, v: &mut bool) -> Result<()>;
    fn rw_u16(&mut self, v: &mut u16) -> Result<()>;
    fn rw_i16(&mut self, v: &mut i16) -> Result<()>;
    fn rw_u32(&mut self, v: &mut u32) -> Result<()>;
    fn rw_i32(&mut self, v: &mut i32) -> Result<()>;
    fn rw_u64(&mut self, v: &mut u64) -> Result<()>;
    fn rw_i64(&mut self, v: &mut i64) -> Result<()>;
    fn rw_string(&mut self, v: &mut String) -> Result<()>;
    fn rw_bytes(&mut self, v: &mut Vec<u8>) -> Result<()>;
}

/// A value that serializes its own fields in a fixed order.
pub trait Persist {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()>;
}

macro_rules! persist_primitive {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
                    s.$method(self)
                }
            }
        )*
    };
}

persist_primitive! {
    u8 => rw_u8,
    i8 => rw_i8,
    bool => rw_bool,
    u16 => rw_u16,
    i16 => rw_i16,
    u32 => rw_u32,
    i32 => rw_i32,
    u64 => rw_u64,
    i64 => rw_i64,
    String => rw_string,
}

/// Count-prefixed sequence
pub fn rw_vec<S: Stream, T: Persist + Default>(s: &mut S, items: &mut Vec<T>) -> Result<()> {
    let mut count: u32 = if s.is_reading() { 0 } else { checked_len(items.len(), "sequence")? };
    s.rw_u32(&mut count)?;
    if s.is_reading() {
        items.clear();
        // Every element takes at least one byte, which bounds a corrupt count
        items.reserve((count as usize).min(s.remaining_hint()));
        for _ in 0..count {
            let mut item = T::default();
            item.persist(s)?;
            items.push(item);
        }
    } else {
        for item in items.iter_mut() {
            item.persist(s)?;
        }
    }
    Ok(())
}

/// Presence flag followed by the value
pub fn rw_option<S: Stream, T: Persist + Default>(s: &mut S, value: &mut Option<T>) -> Result<()> {
    let mut present = value.is_some();
    s.rw_bool(&mut present)?;
    if s.is_reading() {
        *value = if present {
            let mut v = T::default();
            v.persist(s)?;
            Some(v)
        } else {
            None
        };
    } else if let Some(v) = value {
        v.persist(s)?;
    }
    Ok(())
}

/// Reads a chunk payload decoded under `version`
pub struct ChunkReader<'a> {
    reader: BinaryReader<'a>,
    version: u32,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8], version: u32) -> Self {
        Self { reader: BinaryReader::new(data), version }
    }

    pub fn inner(&mut self) -> &mut BinaryReader<'a> {
        &mut self.reader
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Total length of the underlying chunk
    pub fn len(&self) -> usize {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// Carve out the next `len` bytes as a reader at the same version.
    pub fn sub(&mut self, len: usize) -> Result<ChunkReader<'a>> {
        Ok(ChunkReader { reader: self.reader.sub_reader(len)?, version: self.version })
    }
}

impl Stream for ChunkReader<'_> {
    fn mode(&self) -> Mode {
        Mode::Reading
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn remaining_hint(&self) -> usize {
        self.reader.remaining()
    }

    fn rw_u8(&mut self, v: &mut u8) -> Result<()> {
        *v = self.reader.read_u8()?;
        Ok(())
    }

    fn rw_i8(&mut self, v: &mut i8) -> Result<()> {
        *v = self.reader.read_i8()?;
        Ok(())
    }

    fn rw_bool(&mut self, v: &mut bool) -> Result<()> {
        *v = self.reader.read_bool()?;
        Ok(())
    }

    fn rw_u16(&mut self, v: &mut u16) -> Result<()> {
        *v = self.reader.read_u16_le()?;
        Ok(())
    }

    fn rw_i16(&mut self, v: &mut i16) -> Result<()> {
        *v = self.reader.read_i16_le()?;
        Ok(())
    }

    fn rw_u32(&mut self, v: &mut u32) -> Result<()> {
        *v = self.reader.read_u32_le()?;
        Ok(())
    }

    fn rw_i32(&mut self, v: &mut i32) -> Result<()> {
        *v = self.reader.read_i32_le()?;
        Ok(())
    }

    fn rw_u64(&mut self, v: &mut u64) -> Result<()> {
        *v = self.reader.read_u64_le()?;
        Ok(())
    }

    fn rw_i64(&mut self, v: &mut i64) -> Result<()> {
        *v = self.reader.read_i64_le()?;
        Ok(())
    }

    fn rw_string(&mut self, v: &mut String) -> Result<()> {
        *v = self.reader.read_string()?;
        Ok(())
    }

    fn rw_bytes(&mut self, v: &mut Vec<u8>) -> Result<()> {
        *v = self.reader.read_block()?.to_vec();
        Ok(())
    }
}

/// Writes a chunk payload in the current format
pub struct ChunkWriter {
    writer: BinaryWriter,
    version: u32,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::at_version(CURRENT_VERSION)
    }

    /// Writer producing the encoding of `version`
    pub(crate) fn at_version(version: u32) -> Self {
        Self { writer: BinaryWriter::new(), version }
    }

    pub fn inner(&mut self) -> &mut BinaryWriter {
        &mut self.writer
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_vec()
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ChunkWriter {
    fn mode(&self) -> Mode {
        Mode::Writing
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn remaining_hint(&self) -> usize {
        usize::MAX
    }

    fn rw_u8(&mut self, v: &mut u8) -> Result<()> {
        self.writer.write_u8(*v);
        Ok(())
    }

    fn rw_i8(&mut self, v: &mut i8) -> Result<()> {
        self.writer.write_i8(*v);
        Ok(())
    }

    fn rw_bool(&mut self, v: &mut bool) -> Result<()> {
        self.writer.write_bool(*v);
        Ok(())
    }

    fn rw_u16(&mut self, v: &mut u16) -> Result<()> {
        self.writer.write_u16_le(*v);
        Ok(())
    }

    fn rw_i16(&mut self, v: &mut i16) -> Result<()> {
        self.writer.write_i16_le(*v);
        Ok(())
    }

    fn rw_u32(&mut self, v: &mut u32) -> Result<()> {
        self.writer.write_u32_le(*v);
        Ok(())
    }

    fn rw_i32(&mut self, v: &mut i32) -> Result<()> {
        self.writer.write_i32_le(*v);
        Ok(())
    }

    fn rw_u64(&mut self, v: &mut u64) -> Result<()> {
        self.writer.write_u64_le(*v);
        Ok(())
    }

    fn rw_i64(&mut self, v: &mut i64) -> Result<()> {
        self.writer.write_i64_le(*v);
        Ok(())
    }

    fn rw_string(&mut self, v: &mut String) -> Result<()> {
        self.writer.write_string(v)
    }

    fn rw_bytes(&mut self, v: &mut Vec<u8>) -> Result<()> {
        self.writer.write_block(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Sample {
        id: u16,
        name: String,
        values: Vec<i32>,
        extra: Option<u64>,
    }

    impl Persist for Sample {
        fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
            s.rw_u16(&mut self.id)?;
            s.rw_string(&mut self.name)?;
            rw_vec(s, &mut self.values)?;
            rw_option(s, &mut self.extra)
        }
    }

    #[test]
    fn test_same_body_reads_and_writes() {
        let mut original = Sample {
            id: 7,
            name: "Go Karts".into(),
            values: vec![-1, 0, 300],
            extra: Some(42),
        };
        let mut writer = ChunkWriter::new();
        original.persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ChunkReader::new(&bytes, CURRENT_VERSION);
        let mut decoded = Sample::default();
        decoded.persist(&mut reader).unwrap();
        assert_eq!(decoded, original);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_writer_defaults_to_current_version() {
        let writer = ChunkWriter::new();
        assert_eq!(writer.version(), CURRENT_VERSION);
        assert!(!writer.is_reading());

        let reader = ChunkReader::new(&[], 12);
        assert_eq!(reader.version(), 12);
        assert!(reader.has(12));
        assert!(!reader.has(13));
    }

    #[test]
    fn test_corrupt_count_fails_without_huge_allocation() {
        // count = u32::MAX, no elements behind it
        let bytes = u32::MAX.to_le_bytes();
        let mut reader = ChunkReader::new(&bytes, CURRENT_VERSION);
        let mut values: Vec<u32> = Vec::new();
        assert!(rw_vec(&mut reader, &mut values).is_err());
    }
}
