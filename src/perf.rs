//! Throughput helpers layered on top of [`crate::deflate`] and [`crate::stream`].
//!
//! [`WriteBuffer`] is a small growable-buffer wrapper used by the encoder
//! path to avoid repeated reallocation when a container's final size isn't
//! known up front. `compress_chunks_parallel` is only compiled with the
//! `parallel` feature, mirroring how the chunked deflate framing in
//! [`crate::deflate`] was designed to let independent chunks compress on
//! separate threads without changing the wire format at all.

use std::io;

use crate::deflate::{self, CHUNK_SIZE};

/// A `Vec<u8>` wrapper that pre-sizes itself from a caller's size hint, so
/// encoding a value whose rough output size is already known (e.g. when
/// re-encoding a container of known input size) doesn't pay for several
/// reallocations during the walk.
pub struct WriteBuffer {
    buf: Vec<u8>,
}

impl WriteBuffer {
    pub fn with_capacity_hint(hint: usize) -> Self {
        WriteBuffer { buf: Vec::with_capacity(hint) }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl io::Write for WriteBuffer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deflates `data` one 512 KiB chunk at a time, in order, on the calling
/// thread. This is what runs when the `parallel` feature is off.
pub fn compress_chunks_sequential(data: &[u8]) -> io::Result<Vec<u8>> {
    deflate::deflate(data)
}

#[cfg(feature = "parallel")]
pub fn compress_chunks_parallel(data: &[u8]) -> io::Result<Vec<u8>> {
    use byteorder::{LittleEndian, WriteBytesExt};
    use rayon::prelude::*;

    let compressed_chunks: Result<Vec<Vec<u8>>, io::Error> = data
        .chunks(CHUNK_SIZE)
        .collect::<Vec<_>>()
        .par_iter()
        .map(|chunk| deflate::deflate_chunk(chunk))
        .collect();
    let compressed_chunks = compressed_chunks?;

    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    for chunk in compressed_chunks {
        out.write_u32::<LittleEndian>(chunk.len() as u32)?;
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn write_buffer_accumulates() {
        let mut wb = WriteBuffer::with_capacity_hint(16);
        wb.write_all(b"hello ").unwrap();
        wb.write_all(b"world").unwrap();
        assert_eq!(wb.into_inner(), b"hello world");
    }

    #[test]
    fn sequential_matches_deflate_module() {
        let data = vec![7u8; CHUNK_SIZE + 100];
        let direct = deflate::deflate(&data).unwrap();
        let via_helper = compress_chunks_sequential(&data).unwrap();
        assert_eq!(direct, via_helper);
    }
}
