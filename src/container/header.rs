// Header format (40 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "PARK"
//   [4..8]   Format version (u32)
//   [8..12]  Minimum reader version (u32)
//   [12..16] Chunk count (u32)
//   [16..20] Compression (u32: 0 none, 1 zlib, 2 zstd)
//   [20..28] Uncompressed payload size (u64)
//   [28..36] Stored payload size (u64)
//   [36..40] CRC-32 of everything after the header
//
// Magic and version are validated before anything else, so a file outside
// the readable range is always reported as an incompatible version.

use crate::codec::{BinaryReader, BinaryWriter, Compression};
use crate::error::{Error, Result, VersionBound};
use crate::migrate::gates::{CURRENT_VERSION, DEFAULT_MIN_BACKWARD_COMPATIBLE};

/// Magic bytes identifying a park file.
pub const MAGIC: [u8; 4] = *b"PARK";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 40;

/// Which file versions a load accepts.
///
/// Files newer than [`CURRENT_VERSION`] are always refused. The lower bound
/// is optional; `None` accepts every historical version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityPolicy {
    min_backward: Option<u32>,
}

impl CompatibilityPolicy {
    pub const fn unbounded() -> Self {
        Self { min_backward: None }
    }

    /// Refuse files older than `min`.
    pub fn with_floor(min: u32) -> Result<Self> {
        if min > CURRENT_VERSION {
            return Err(Error::InvalidPolicy(format!(
                "minimum readable version {min} is above the current version {CURRENT_VERSION}"
            )));
        }
        Ok(Self { min_backward: Some(min) })
    }

    pub fn floor(&self) -> Option<u32> {
        self.min_backward
    }

    pub fn check(&self, version: u32) -> Result<()> {
        if version > CURRENT_VERSION {
            return Err(Error::IncompatibleVersion {
                version,
                bound: VersionBound::TooNew { max: CURRENT_VERSION },
            });
        }
        if let Some(min) = self.min_backward {
            if version < min {
                return Err(Error::IncompatibleVersion {
                    version,
                    bound: VersionBound::TooOld { min },
                });
            }
        }
        Ok(())
    }
}

impl Default for CompatibilityPolicy {
    fn default() -> Self {
        Self { min_backward: DEFAULT_MIN_BACKWARD_COMPATIBLE }
    }
}

/// Parsed container header
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerHeader {
    pub version: u32,
    pub min_version: u32,
    pub chunk_count: u32,
    pub compression: Compression,
    pub uncompressed_size: u64,
    pub stored_size: u64,
    pub checksum: u32,
}

impl ContainerHeader {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&MAGIC);
        writer.write_u32_le(self.version);
        writer.write_u32_le(self.min_version);
        writer.write_u32_le(self.chunk_count);
        writer.write_u32_le(self.compression as u32);
        writer.write_u64_le(self.uncompressed_size);
        writer.write_u64_le(self.stored_size);
        writer.write_u32_le(self.checksum);
    }

    /// Parse the header at the start of `bytes`, validating magic and version
    /// against `policy`. Does not verify the checksum.
    pub fn parse(bytes: &[u8], policy: &CompatibilityPolicy) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);

        let magic = reader.read_bytes(MAGIC.len())?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(Error::MagicMismatch { found });
        }

        let version = reader.read_u32_le()?;
        policy.check(version)?;

        let min_version = reader.read_u32_le()?;
        let chunk_count = reader.read_u32_le()?;
        let raw_compression = reader.read_u32_le()?;
        let compression = Compression::from_u32(raw_compression)
            .ok_or_else(|| Error::InvalidData(format!("unknown compression {raw_compression}")))?;
        let uncompressed_size = reader.read_u64_le()?;
        let stored_size = reader.read_u64_le()?;
        let checksum = reader.read_u32_le()?;

        if min_version > version {
            return Err(Error::InvalidData(format!(
                "minimum reader version {min_version} is above file version {version}"
            )));
        }

        Ok(Self {
            version,
            min_version,
            chunk_count,
            compression,
            uncompressed_size,
            stored_size,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32) -> ContainerHeader {
        ContainerHeader {
            version,
            min_version: version.min(10),
            chunk_count: 3,
            compression: Compression::Zlib,
            uncompressed_size: 1234,
            stored_size: 567,
            checksum: 0xDEAD_BEEF,
        }
    }

    fn encode(h: &ContainerHeader) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        h.write(&mut writer);
        writer.into_vec()
    }

    #[test]
    fn test_header_roundtrip() {
        let h = header(CURRENT_VERSION);
        let bytes = encode(&h);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..4], b"PARK");
        assert_eq!(ContainerHeader::parse(&bytes, &CompatibilityPolicy::default()).unwrap(), h);
    }

    #[test]
    fn test_wrong_magic_is_magic_mismatch() {
        let mut bytes = encode(&header(CURRENT_VERSION));
        bytes[..4].copy_from_slice(b"SV6\0");
        let err = ContainerHeader::parse(&bytes, &CompatibilityPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::MagicMismatch { found } if &found == b"SV6\0"));
    }

    #[test]
    fn test_newer_version_rejected_even_when_rest_is_missing() {
        let mut bytes = encode(&header(CURRENT_VERSION));
        bytes[4..8].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
        bytes.truncate(8);
        let err = ContainerHeader::parse(&bytes, &CompatibilityPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleVersion { bound: VersionBound::TooNew { max: CURRENT_VERSION }, .. }
        ));
    }

    #[test]
    fn test_floor_rejects_older_files() {
        let policy = CompatibilityPolicy::with_floor(20).unwrap();
        let bytes = encode(&header(19));
        let err = ContainerHeader::parse(&bytes, &policy).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleVersion { version: 19, bound: VersionBound::TooOld { min: 20 } }
        ));
        assert!(ContainerHeader::parse(&encode(&header(20)), &policy).is_ok());
    }

    #[test]
    fn test_unbounded_policy_accepts_version_zero() {
        assert!(CompatibilityPolicy::unbounded().check(0).is_ok());
    }

    #[test]
    fn test_floor_above_current_is_invalid() {
        assert!(matches!(
            CompatibilityPolicy::with_floor(CURRENT_VERSION + 1),
            Err(Error::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_short_header_is_truncated_input() {
        let bytes = encode(&header(CURRENT_VERSION));
        let err = ContainerHeader::parse(&bytes[..20], &CompatibilityPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { .. }));
    }
}
