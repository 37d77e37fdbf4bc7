//! CRC32 (IEEE 802.3) checksums over the value-stream and string-stream.
//!
//! Thin wrapper over `crc32fast`, which already implements the reflected
//! polynomial 0xEDB88320 with init/final XOR 0xFFFFFFFF. The wrapper exists
//! so call sites read in terms of "stamp" / "continue" / "verify" rather than
//! the underlying hasher API, and so the continuation semantics (string
//! stream CRC continues from the value stream CRC rather than starting over)
//! stay in one place.

use crc32fast::Hasher;

/// A running CRC32 computation. `Crc32::new()` starts fresh; pass a prior
/// digest to [`Crc32::continuing_from`] to fold a second buffer into the same
/// checksum without concatenating the buffers first.
pub struct Crc32 {
    hasher: Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32 { hasher: Hasher::new() }
    }

    /// Resumes a CRC32 computation from a previously finalized digest, so
    /// that two buffers written separately (value stream, then string
    /// stream) can be checksummed as if they were one contiguous buffer.
    pub fn continuing_from(prev: u32) -> Self {
        Crc32 { hasher: Hasher::new_with_initial(prev) }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot digest of a single buffer.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finalize()
}
