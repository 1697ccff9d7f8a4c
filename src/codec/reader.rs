use crate::error::{Error, Result};

/// Longest string accepted from a park file.
pub const MAX_STRING_LEN: usize = 1024 * 1024;

/// Binary reader over a park file buffer (little-endian)
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::TruncatedInput {
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Split off the next `n` bytes as an independent reader and advance past them.
    pub fn sub_reader(&mut self, n: usize) -> Result<BinaryReader<'a>> {
        Ok(BinaryReader::new(self.read_bytes(n)?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(Error::InvalidData(format!("invalid bool byte {v:#04x}"))),
        }
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(self.read_u64_le()? as i64)
    }

    /// Read a length-prefixed (u32) byte block
    pub fn read_block(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32_le()? as usize;
        self.read_bytes(len)
    }

    /// Read a length-prefixed (u32) UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32_le()? as usize;
        if len > MAX_STRING_LEN {
            return Err(Error::StringTooLong { len, max: MAX_STRING_LEN });
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidData("invalid UTF-8 string".into()))
    }

    /// Read remaining bytes
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = self.remaining_slice();
        self.pos = self.data.len();
        slice
    }
}
