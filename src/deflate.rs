//! Chunked deflate framing, independent of the container's own endianness.
//!
//! Each chunk is at most 512 KiB of plaintext before compression and is
//! framed on the wire as `[u32 LE chunk length][deflated bytes]`, repeated
//! until the input is exhausted. Chunking bounds peak memory for the
//! compressor and lets [`crate::perf`] compress independent chunks on
//! separate threads when the `parallel` feature is enabled.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

pub const CHUNK_SIZE: usize = 512 * 1024;

/// Compresses `data` into the chunked frame format.
pub fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    for chunk in data.chunks(CHUNK_SIZE) {
        let compressed = deflate_chunk(chunk)?;
        out.write_u32::<LittleEndian>(compressed.len() as u32)?;
        out.write_all(&compressed)?;
    }
    Ok(out)
}

pub fn deflate_chunk(chunk: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(chunk)?;
    encoder.finish()
}

/// Inflates a buffer previously produced by [`deflate`].
pub fn inflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    inflate_to(data, &mut out)?;
    Ok(out)
}

/// Like [`inflate`], but streams each chunk's decompressed bytes straight to
/// `sink` instead of accumulating the whole result in one buffer first — only
/// one chunk's decompressed bytes are ever held off to the side at a time,
/// regardless of how many chunks `data` frames.
pub fn inflate_to<W: Write>(data: &[u8], mut sink: W) -> io::Result<()> {
    let mut cursor = io::Cursor::new(data);
    while (cursor.position() as usize) < data.len() {
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let start = cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated deflate chunk"))?;
        let chunk = &data[start..end];
        let mut decoder = DeflateDecoder::new(chunk);
        io::copy(&mut decoder, &mut sink)?;
        cursor.set_position(end as u64);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_small() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = deflate(&data).unwrap();
        let restored = inflate(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn round_trip_empty() {
        let compressed = deflate(&[]).unwrap();
        let restored = inflate(&compressed).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn round_trip_multi_chunk() {
        let data = vec![0xAB; CHUNK_SIZE * 2 + 137];
        let compressed = deflate(&data).unwrap();
        let restored = inflate(&compressed).unwrap();
        assert_eq!(restored, data);
    }
}
