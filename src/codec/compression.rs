use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Error, Result};

const ZSTD_LEVEL: i32 = 3;

/// Upper bound on buffer space reserved from an untrusted size field
const PREALLOC_LIMIT: usize = 16 << 20;

/// Codec applied to the chunk payload area of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Compression {
    None = 0,
    Zlib = 1,
    #[default]
    Zstd = 2,
}

impl Compression {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Compression::None),
            1 => Some(Compression::Zlib),
            2 => Some(Compression::Zstd),
            _ => None,
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Compression::Zstd => Ok(zstd::encode_all(data, ZSTD_LEVEL)?),
        }
    }

    /// Decompress `data`, which must expand to exactly `expected_size` bytes.
    pub fn decompress(self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let out = match self {
            Compression::None => data.to_vec(),
            Compression::Zlib => {
                let mut out = Vec::with_capacity(expected_size.min(PREALLOC_LIMIT));
                // Read one byte past the expected size so oversized payloads are noticed
                ZlibDecoder::new(data)
                    .take((expected_size as u64).saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Decompression(e.to_string()))?;
                out
            }
            Compression::Zstd => {
                let mut out = Vec::with_capacity(expected_size.min(PREALLOC_LIMIT));
                zstd::stream::read::Decoder::new(data)
                    .map_err(|e| Error::Decompression(e.to_string()))?
                    .take((expected_size as u64).saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Decompression(e.to_string()))?;
                out
            }
        };
        if out.len() != expected_size {
            return Err(Error::Decompression(format!(
                "payload expanded to {} bytes, header declares {}",
                out.len(),
                expected_size
            )));
        }
        Ok(out)
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "zlib" => Ok(Compression::Zlib),
            "zstd" => Ok(Compression::Zstd),
            other => Err(format!("unknown compression '{other}' (none, zlib, zstd)")),
        }
    }
}
