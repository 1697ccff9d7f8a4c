pub mod reader;
pub mod writer;
pub mod stream;
pub mod compression;

pub use reader::{BinaryReader, MAX_STRING_LEN};
pub use writer::{checked_len, BinaryWriter};
pub use stream::{rw_option, rw_vec, ChunkReader, ChunkWriter, Mode, Persist, Stream};
pub use compression::Compression;
