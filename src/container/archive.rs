use tracing::debug;

use crate::codec::{BinaryReader, BinaryWriter, ChunkReader, Compression};
use crate::error::{Error, Result};
use crate::migrate::gates::{CURRENT_VERSION, MIN_FORWARD_COMPATIBLE};

use super::directory::{ChunkDirectory, ChunkEntry, ChunkId, ENTRY_SIZE};
use super::header::{CompatibilityPolicy, ContainerHeader, HEADER_SIZE};

/// Assembles a container from finished chunk payloads.
pub struct ContainerWriter {
    compression: Compression,
    payload: Vec<u8>,
    directory: ChunkDirectory,
}

impl ContainerWriter {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            payload: Vec::new(),
            directory: ChunkDirectory::new(),
        }
    }

    /// Append a fully serialized chunk.
    pub fn add_chunk(&mut self, id: ChunkId, bytes: &[u8]) -> Result<()> {
        let entry = ChunkEntry {
            id,
            offset: self.payload.len() as u64,
            length: bytes.len() as u64,
        };
        self.directory.insert(entry)?;
        self.payload.extend_from_slice(bytes);
        debug!(chunk = id.name(), bytes = bytes.len(), "wrote chunk");
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.finish_as(CURRENT_VERSION, MIN_FORWARD_COMPATIBLE)
    }

    /// Stamp the container with an explicit version pair. Only chunk data
    /// encoded for `version` may have been added.
    pub(crate) fn finish_as(self, version: u32, min_version: u32) -> Result<Vec<u8>> {
        let stored = self.compression.compress(&self.payload)?;

        let mut body = BinaryWriter::with_capacity(self.directory.len() * ENTRY_SIZE + stored.len());
        self.directory.write(&mut body);
        body.write_bytes(&stored);

        let header = ContainerHeader {
            version,
            min_version,
            chunk_count: self.directory.len() as u32,
            compression: self.compression,
            uncompressed_size: self.payload.len() as u64,
            stored_size: stored.len() as u64,
            checksum: body.checksum(),
        };

        let mut out = BinaryWriter::with_capacity(HEADER_SIZE + body.len());
        header.write(&mut out);
        out.write_bytes(body.as_slice());
        debug!(
            chunks = header.chunk_count,
            uncompressed = header.uncompressed_size,
            stored = header.stored_size,
            "finished container"
        );
        Ok(out.into_vec())
    }
}

/// A validated container with random access to its chunks.
#[derive(Debug)]
pub struct ContainerReader {
    header: ContainerHeader,
    directory: ChunkDirectory,
    payload: Vec<u8>,
}

impl ContainerReader {
    /// Validate header, checksum and directory, then decompress the payload.
    pub fn open(bytes: &[u8], policy: &CompatibilityPolicy) -> Result<Self> {
        let header = ContainerHeader::parse(bytes, policy)?;

        let directory_len = (header.chunk_count as u64)
            .checked_mul(ENTRY_SIZE as u64)
            .ok_or_else(|| Error::CorruptDirectory("chunk count overflows".into()))?;
        let expected_len = (HEADER_SIZE as u64)
            .checked_add(directory_len)
            .and_then(|n| n.checked_add(header.stored_size))
            .ok_or_else(|| Error::CorruptDirectory("declared sizes overflow".into()))?;
        let actual_len = bytes.len() as u64;
        if actual_len < expected_len {
            return Err(Error::TruncatedInput {
                need: expected_len as usize,
                have: bytes.len(),
            });
        }
        if actual_len > expected_len {
            return Err(Error::CorruptDirectory(format!(
                "{} trailing bytes after payload",
                actual_len - expected_len
            )));
        }

        let body = &bytes[HEADER_SIZE..];
        let actual = crc32fast::hash(body);
        if actual != header.checksum {
            return Err(Error::ChecksumMismatch { expected: header.checksum, actual });
        }

        let mut reader = BinaryReader::new(body);
        let directory = ChunkDirectory::read(
            &mut reader,
            header.chunk_count as usize,
            header.uncompressed_size,
        )?;
        let stored = reader.read_remaining();
        let payload = header
            .compression
            .decompress(stored, header.uncompressed_size as usize)?;

        debug!(
            version = header.version,
            chunks = header.chunk_count,
            compression = ?header.compression,
            "opened container"
        );
        Ok(Self { header, directory, payload })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn directory(&self) -> &ChunkDirectory {
        &self.directory
    }

    /// Raw payload of a chunk, or `None` if the file does not carry it.
    pub fn chunk(&self, id: ChunkId) -> Option<&[u8]> {
        self.directory.get(id).map(|entry| &self.payload[entry.range()])
    }

    /// Stream over a chunk decoded at the file's version.
    pub fn chunk_reader(&self, id: ChunkId) -> Option<ChunkReader<'_>> {
        self.chunk(id).map(|data| ChunkReader::new(data, self.header.version))
    }

    pub fn require(&self, id: ChunkId) -> Result<ChunkReader<'_>> {
        self.chunk_reader(id).ok_or(Error::MissingChunk(id))
    }
}
