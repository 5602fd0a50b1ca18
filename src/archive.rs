//! Chunked container archive reader.
//!
//! An archive is an ordered set of independently compressed chunks plus a
//! filename directory chunk that maps human-readable asset names to chunk
//! positions. The reader decompresses every chunk up front (whole archives
//! are small enough to buffer) and exposes assets by name or raw index.
//!
//! Failure policy: a bad magic value or an unreadable directory aborts the
//! whole archive; a single corrupt chunk is logged, dropped and counted so
//! the conversion summary can report it.

use std::collections::HashMap;
use std::io::Read;

use flate2::read::ZlibDecoder;
use log::warn;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Magic value at byte offset 4 of every archive.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"PFS ";

/// Well-known checksum of the filename directory chunk.
pub const DIRECTORY_CHECKSUM: u32 = 0x6158_0AC9;

/// Upper bound on the decompressed size of a single deflate block. A chunk
/// larger than this is stored as several back-to-back blocks.
pub const BLOCK_SIZE: usize = 8192;

/// One directory row: a checksum, the absolute offset of the chunk's first
/// deflate block, and the declared decompressed size.
#[derive(Debug, Clone, Copy)]
struct ChunkEntry {
    checksum: u32,
    offset: u32,
    size: u32,
}

/// A fully decompressed archive with a name index.
pub struct Archive {
    /// Decompressed chunk payloads in offset order. `None` marks a chunk
    /// that failed to decompress and was dropped.
    chunks: Vec<Option<Vec<u8>>>,
    /// Lowercased asset name to position in `chunks`.
    names: HashMap<String, usize>,
    dropped: usize,
}

impl Archive {
    /// Parse and decompress a whole archive from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let directory_offset = cursor.read_u32()? as usize;
        let magic = cursor.read_magic()?;
        if magic != ARCHIVE_MAGIC {
            return Err(Error::BadMagic {
                expected: ARCHIVE_MAGIC,
                found: magic,
            });
        }

        let mut entries = read_directory(data, directory_offset)?;
        entries.sort_by_key(|e| e.offset);

        let directory_entry = entries
            .iter()
            .position(|e| e.checksum == DIRECTORY_CHECKSUM)
            .ok_or_else(|| Error::BadDirectory {
                offset: directory_offset,
                reason: "no filename directory chunk".into(),
            })?;
        let directory_chunk = entries.remove(directory_entry);

        let mut chunks = Vec::with_capacity(entries.len());
        let mut dropped = 0;
        for (index, entry) in entries.iter().enumerate() {
            match inflate_chunk(&data[entry.offset as usize..], entry.size as usize) {
                Ok(bytes) => chunks.push(Some(bytes)),
                Err(err) => {
                    warn!("dropping chunk {index} (checksum {:#010x}): {err}", entry.checksum);
                    dropped += 1;
                    chunks.push(None);
                }
            }
        }

        // The directory itself must decompress; without it no asset is
        // addressable by name and the archive is useless.
        let directory_bytes = inflate_chunk(
            &data[directory_chunk.offset as usize..],
            directory_chunk.size as usize,
        )
        .map_err(|err| Error::BadDirectory {
            offset: directory_chunk.offset as usize,
            reason: err.to_string(),
        })?;
        let names = read_names(&directory_bytes, chunks.len()).map_err(|err| Error::BadDirectory {
            offset: directory_chunk.offset as usize,
            reason: err.to_string(),
        })?;

        Ok(Self {
            chunks,
            names,
            dropped,
        })
    }

    /// Look up an asset by name (case-insensitive; archives store names
    /// lowercased).
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let index = *self.names.get(&name.to_ascii_lowercase())?;
        self.by_index(index)
    }

    /// Look up a chunk by raw position, for chunks the directory does not
    /// name.
    pub fn by_index(&self, index: usize) -> Option<&[u8]> {
        self.chunks.get(index)?.as_deref()
    }

    /// All asset names known to the directory, in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Number of chunks (excluding the directory chunk).
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks that failed to decompress and were dropped.
    pub fn dropped_chunks(&self) -> usize {
        self.dropped
    }
}

fn read_directory(data: &[u8], offset: usize) -> Result<Vec<ChunkEntry>> {
    let mut cursor = Cursor::new(data);
    cursor.seek(offset);
    let count = cursor.read_u32().map_err(|err| Error::BadDirectory {
        offset,
        reason: err.to_string(),
    })? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let entry = (|| -> Result<ChunkEntry> {
            Ok(ChunkEntry {
                checksum: cursor.read_u32()?,
                offset: cursor.read_u32()?,
                size: cursor.read_u32()?,
            })
        })()
        .map_err(|err| Error::BadDirectory {
            offset,
            reason: err.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Decompress one chunk: a run of `{deflated_len:u32, inflated_len:u32,
/// data}` deflate blocks, looped until `declared_size` bytes have been
/// produced. Pure function over the byte range, so blocks of different
/// chunks can be inflated independently.
pub fn inflate_chunk(data: &[u8], declared_size: usize) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(data);
    let mut out = Vec::with_capacity(declared_size);
    while out.len() < declared_size {
        let deflated_len = cursor.read_u32()? as usize;
        let inflated_len = cursor.read_u32()? as usize;
        let block = cursor.read_bytes(deflated_len)?;
        let mut decoder = ZlibDecoder::new(block);
        let before = out.len();
        decoder
            .read_to_end(&mut out)
            .map_err(|err| Error::ChunkDecode {
                reason: err.to_string(),
            })?;
        if out.len() - before != inflated_len {
            return Err(Error::ChunkDecode {
                reason: format!(
                    "block inflated to {} bytes, header declared {inflated_len}",
                    out.len() - before
                ),
            });
        }
    }
    if out.len() != declared_size {
        return Err(Error::ChunkDecode {
            reason: format!(
                "chunk inflated to {} bytes, directory declared {declared_size}",
                out.len()
            ),
        });
    }
    Ok(out)
}

/// Parse the filename directory chunk: a count followed by
/// `{len:u32, name:null-terminated}` rows naming chunks in offset order.
fn read_names(data: &[u8], chunk_count: usize) -> Result<HashMap<String, usize>> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u32()? as usize;
    let mut names = HashMap::with_capacity(count);
    for index in 0..count {
        let len = cursor.read_u32()? as usize;
        let name = cursor.read_c_str(len)?;
        if index < chunk_count {
            names.insert(name.to_ascii_lowercase(), index);
        } else {
            // More names than chunks: the directory is self-referential in
            // some writers. The extra names have nothing to point at.
            warn!("directory names {name:?} at position {index} but the archive has {chunk_count} chunks");
        }
    }
    Ok(names)
}
