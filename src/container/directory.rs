use indexmap::IndexMap;

use crate::codec::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};

/// Size of one directory entry on disk: id (u32) + offset (u64) + length (u64)
pub const ENTRY_SIZE: usize = 20;

/// Chunk identifiers. Ids are never reused for a different meaning; new ids
/// are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[repr(u32)]
pub enum ChunkId {
    Authoring = 0x01,
    Objects = 0x02,
    Scenario = 0x03,
    General = 0x04,
    Park = 0x06,
    Research = 0x08,
    Tiles = 0x30,
    Entities = 0x31,
    Rides = 0x32,
    PeepNames = 0x33,
    PackedObjects = 0x80,
    Preview = 0x90,
}

impl ChunkId {
    pub const ALL: [ChunkId; 12] = [
        ChunkId::Authoring,
        ChunkId::Objects,
        ChunkId::Scenario,
        ChunkId::General,
        ChunkId::Park,
        ChunkId::Research,
        ChunkId::Tiles,
        ChunkId::Entities,
        ChunkId::Rides,
        ChunkId::PeepNames,
        ChunkId::PackedObjects,
        ChunkId::Preview,
    ];

    pub fn from_u32(v: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|id| *id as u32 == v)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChunkId::Authoring => "authoring",
            ChunkId::Objects => "objects",
            ChunkId::Scenario => "scenario",
            ChunkId::General => "general",
            ChunkId::Park => "park",
            ChunkId::Research => "research",
            ChunkId::Tiles => "tiles",
            ChunkId::Entities => "entities",
            ChunkId::Rides => "rides",
            ChunkId::PeepNames => "peep-names",
            ChunkId::PackedObjects => "packed-objects",
            ChunkId::Preview => "preview",
        }
    }
}

/// Location of one chunk inside the uncompressed payload area
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChunkEntry {
    pub id: ChunkId,
    pub offset: u64,
    pub length: u64,
}

impl ChunkEntry {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.length) as usize
    }
}

/// Chunk id -> extent table, kept in file order
#[derive(Debug, Clone, Default)]
pub struct ChunkDirectory {
    entries: IndexMap<ChunkId, ChunkEntry>,
}

impl ChunkDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ChunkId) -> Option<&ChunkEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkEntry> {
        self.entries.values()
    }

    pub fn insert(&mut self, entry: ChunkEntry) -> Result<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(Error::CorruptDirectory(format!("duplicate chunk {:?}", entry.id)));
        }
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    pub fn write(&self, writer: &mut BinaryWriter) {
        for entry in self.entries.values() {
            writer.write_u32_le(entry.id as u32);
            writer.write_u64_le(entry.offset);
            writer.write_u64_le(entry.length);
        }
    }

    /// Read `count` entries and check every extent lies inside a payload
    /// area of `payload_len` bytes.
    pub fn read(reader: &mut BinaryReader, count: usize, payload_len: u64) -> Result<Self> {
        let mut directory = Self::new();
        for _ in 0..count {
            let raw_id = reader.read_u32_le()?;
            let offset = reader.read_u64_le()?;
            let length = reader.read_u64_le()?;

            let id = ChunkId::from_u32(raw_id)
                .ok_or_else(|| Error::CorruptDirectory(format!("unknown chunk id {raw_id:#x}")))?;
            let end = offset.checked_add(length).filter(|end| *end <= payload_len);
            if end.is_none() {
                return Err(Error::CorruptDirectory(format!(
                    "chunk {id:?} at {offset}+{length} exceeds payload of {payload_len} bytes"
                )));
            }
            directory.insert(ChunkEntry { id, offset, length })?;
        }
        Ok(directory)
    }
}
