use crc32fast::Hasher;

use crate::codec::reader::MAX_STRING_LEN;
use crate::error::{Error, Result};

/// Narrow `len` to the width of its length or count prefix.
pub fn checked_len<T: TryFrom<usize>>(len: usize, what: &str) -> Result<T> {
    T::try_from(len).map_err(|_| Error::InvalidData(format!("{what} of {len} overflows its length prefix")))
}

/// Binary writer for park file data (little-endian)
///
/// Every appended byte also feeds a running CRC-32, so the container can
/// checksum its body without a second pass.
pub struct BinaryWriter {
    data: Vec<u8>,
    hasher: Hasher,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { data: Vec::new(), hasher: Hasher::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), hasher: Hasher::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// CRC-32 of everything written so far
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_u8(v as u8);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(if v { 1 } else { 0 });
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16_le(&mut self, v: i16) {
        self.write_u16_le(v as u16);
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, v: i32) {
        self.write_u32_le(v as u32);
    }

    pub fn write_u64_le(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, v: i64) {
        self.write_u64_le(v as u64);
    }

    /// Write a length-prefixed (u32) byte block
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_u32_le(checked_len(bytes.len(), "byte block")?);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Write a length-prefixed (u32) UTF-8 string, no longer than readers accept
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if s.len() > MAX_STRING_LEN {
            return Err(Error::StringTooLong { len: s.len(), max: MAX_STRING_LEN });
        }
        self.write_block(s.as_bytes())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BinaryWriter> for Vec<u8> {
    fn from(writer: BinaryWriter) -> Self {
        writer.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader::BinaryReader;

    #[test]
    fn test_roundtrip_primitives() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0x42);
        writer.write_u16_le(0x1234);
        writer.write_u32_le(0xDEADBEEF);
        writer.write_i64_le(-5);

        let data = writer.into_vec();
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_i64_le().unwrap(), -5);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = BinaryWriter::new();
        writer.write_u32_le(0x0A0B0C0D);
        assert_eq!(writer.as_slice(), &[0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_roundtrip_string_and_block() {
        let mut writer = BinaryWriter::new();
        writer.write_string("hello world").unwrap();
        writer.write_block(&[1, 2, 3]).unwrap();

        let data = writer.into_vec();
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_string().unwrap(), "hello world");
        assert_eq!(reader.read_block().unwrap(), &[1, 2, 3]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_running_checksum_matches_one_shot_crc() {
        let mut writer = BinaryWriter::new();
        writer.write_string("park").unwrap();
        writer.write_u64_le(99);
        assert_eq!(writer.checksum(), crc32fast::hash(writer.as_slice()));

        // Checksum keeps tracking after being read
        writer.write_u8(1);
        assert_eq!(writer.checksum(), crc32fast::hash(writer.as_slice()));
    }

    #[test]
    fn test_string_longer_than_readers_accept_is_refused() {
        let mut writer = BinaryWriter::new();
        let long = "x".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            writer.write_string(&long),
            Err(Error::StringTooLong { max: MAX_STRING_LEN, .. })
        ));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_checked_len_refuses_narrowing() {
        assert_eq!(checked_len::<u16>(65_535, "tile").unwrap(), u16::MAX);
        assert!(matches!(checked_len::<u16>(65_536, "tile"), Err(Error::InvalidData(_))));
        assert_eq!(checked_len::<u32>(7, "sequence").unwrap(), 7u32);
    }
}
