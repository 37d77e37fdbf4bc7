//! Container header — magic, version, endianness, flags, section sizes, and
//! the optional CRC32/cipher-seed fields.
//!
//! Follows the buffer-then-write idiom the teacher's `superblock.rs` uses:
//! every field is accumulated into an in-memory buffer first, then written in
//! one call. Unlike a superblock checksum, the header's CRC32 field is *not*
//! a checksum of the header itself — spec.md §4.9 computes it over the
//! pre-compression, pre-encryption data payload (value stream + string
//! stream) and stores the result here verbatim; verifying it is
//! [`crate::stream::decode_buffered`]'s job, once the payload has been
//! decrypted and inflated, not this module's.
//!
//! # On-disk layout
//!
//! ```text
//! Offset  Size  Field
//!    0      2   magic            0x50 0x4A (little-endian) or 0x4A 0x50 (big-endian)
//!    2      1   version_major
//!    3      1   version_minor
//!    4      1   header_size      byte length of the fixed portion below (32)
//!    5      1   flags            see `Flags`
//!    6      2   reserved         must be zero
//!    8      8   value_size       byte length of the value stream, pre-pipeline
//!   16      8   str_size         byte length of the string stream, pre-pipeline
//!   24      8   data_size        byte length following the header
//!   32      4   crc32            present iff `Flags::CRC32`
//!   32|36    4   cipher_seed     present iff `Flags::ENCRYPTED && !Flags::ENCRYPTION_KEY_EXCLUDED`
//! ```
//!
//! Magic determines the byte order of every multi-byte field that follows it,
//! including `value_size`/`str_size`/`data_size`/`crc32`/`cipher_seed` — there
//! is no separate endianness flag bit, by design (spec.md §3's "Magic
//! determines byte order" invariant).

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

pub const MAGIC_LE: [u8; 2] = [0x50, 0x4A];
pub const MAGIC_BE: [u8; 2] = [0x4A, 0x50];
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// Byte length of the fixed portion of the header (through `data_size`),
/// independent of whether the trailing CRC32/seed fields are present. Stored
/// on the wire as `header_size` so a reader can always locate the start of
/// the optional trailer without first decoding `flags`.
pub const HEADER_SIZE_FIXED: u8 = 32;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("bad magic bytes {0:?}, expected {MAGIC_LE:?} or {MAGIC_BE:?}")]
    BadMagic([u8; 2]),
    #[error("flags byte {0:#04x} has bits set that are not defined by this version")]
    BadFlagsState(u8),
    #[error("EncryptionKeyExcluded is set but no out-of-band encryption_seed was supplied")]
    MissingEncryptionSeed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

bitflags::bitflags! {
    /// Bit positions follow spec.md §3 verbatim: 0=LargeFile, 1=Compressed,
    /// 2=CRC32, 3=Encrypted, 4=EncryptionKeyExcluded, 5=KeysStripped,
    /// 6/7 reserved. spec.md §6 flags an unresolved "MSB-to-LSB in the 010
    /// template" ambiguity for this byte; this implementation takes bit 0 to
    /// mean `1 << 0` (the conventional reading used for every other
    /// bitflagged byte in this format) — see DESIGN.md's Open Question
    /// Decisions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const LARGE_FILE              = 0b0000_0001;
        const COMPRESSED               = 0b0000_0010;
        const CRC32                    = 0b0000_0100;
        const ENCRYPTED                = 0b0000_1000;
        const ENCRYPTION_KEY_EXCLUDED  = 0b0001_0000;
        const KEYS_STRIPPED            = 0b0010_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    fn magic(self) -> [u8; 2] {
        match self {
            Endianness::Little => MAGIC_LE,
            Endianness::Big => MAGIC_BE,
        }
    }
}

/// The fixed-layout container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub endianness: Endianness,
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: Flags,
    pub value_size: u64,
    pub str_size: u64,
    pub data_size: u64,
    pub crc32: Option<u32>,
    pub cipher_seed: Option<u32>,
}

impl Header {
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), HeaderError> {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(&self.endianness.magic());
        buf.push(self.version_major);
        buf.push(self.version_minor);
        buf.push(HEADER_SIZE_FIXED);
        buf.push(self.flags.bits());
        buf.extend_from_slice(&[0, 0]); // reserved

        match self.endianness {
            Endianness::Little => {
                buf.write_u64::<LittleEndian>(self.value_size)?;
                buf.write_u64::<LittleEndian>(self.str_size)?;
                buf.write_u64::<LittleEndian>(self.data_size)?;
            }
            Endianness::Big => {
                buf.write_u64::<BigEndian>(self.value_size)?;
                buf.write_u64::<BigEndian>(self.str_size)?;
                buf.write_u64::<BigEndian>(self.data_size)?;
            }
        }

        if self.flags.contains(Flags::CRC32) {
            let crc = self.crc32.expect("crc32 required when Flags::CRC32 is set");
            match self.endianness {
                Endianness::Little => buf.write_u32::<LittleEndian>(crc)?,
                Endianness::Big => buf.write_u32::<BigEndian>(crc)?,
            }
        }

        if self.flags.contains(Flags::ENCRYPTED) && !self.flags.contains(Flags::ENCRYPTION_KEY_EXCLUDED) {
            let seed = self.cipher_seed.expect("cipher_seed required when ENCRYPTED && !ENCRYPTION_KEY_EXCLUDED");
            match self.endianness {
                Endianness::Little => buf.write_u32::<LittleEndian>(seed)?,
                Endianness::Big => buf.write_u32::<BigEndian>(seed)?,
            }
        }

        w.write_all(&buf)?;
        Ok(())
    }

    /// Reads a header. `supplied_seed` is consulted only when
    /// `EncryptionKeyExcluded` is set (the container carries no seed of its
    /// own in that mode); it is an error for it to be missing then.
    pub fn read<R: Read>(r: &mut R, supplied_seed: Option<u32>) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 2];
        r.read_exact(&mut magic)?;
        let endianness = if magic == MAGIC_LE {
            Endianness::Little
        } else if magic == MAGIC_BE {
            Endianness::Big
        } else {
            return Err(HeaderError::BadMagic(magic));
        };

        let version_major = r.read_u8()?;
        let version_minor = r.read_u8()?;
        if version_major > VERSION_MAJOR {
            // spec.md §7: UnsupportedVersion is a warn-and-continue
            // condition, not fatal — a newer minor/major writer is still
            // expected to produce a readable header shape.
            log::warn!(
                "container version {version_major}.{version_minor} is newer than this build ({VERSION_MAJOR}.{VERSION_MINOR}); continuing"
            );
        }

        let _header_size = r.read_u8()?;
        let flags_byte = r.read_u8()?;
        let flags = Flags::from_bits(flags_byte).ok_or(HeaderError::BadFlagsState(flags_byte))?;

        let mut reserved = [0u8; 2];
        r.read_exact(&mut reserved)?;

        let _ = &reserved;

        let (value_size, str_size, data_size) = match endianness {
            Endianness::Little => read_sizes::<_, LittleEndian>(r)?,
            Endianness::Big => read_sizes::<_, BigEndian>(r)?,
        };

        // This is the payload CRC (spec.md §4.9), not a header checksum —
        // verifying it against the reconstructed pre-pipeline bytes is
        // `crate::stream::decode_buffered`'s job, after decrypt+inflate.
        let crc32 = if flags.contains(Flags::CRC32) {
            Some(match endianness {
                Endianness::Little => r.read_u32::<LittleEndian>()?,
                Endianness::Big => r.read_u32::<BigEndian>()?,
            })
        } else {
            None
        };

        let cipher_seed = if flags.contains(Flags::ENCRYPTED) {
            if flags.contains(Flags::ENCRYPTION_KEY_EXCLUDED) {
                Some(supplied_seed.ok_or(HeaderError::MissingEncryptionSeed)?)
            } else {
                Some(match endianness {
                    Endianness::Little => r.read_u32::<LittleEndian>()?,
                    Endianness::Big => r.read_u32::<BigEndian>()?,
                })
            }
        } else {
            None
        };

        Ok(Header {
            endianness,
            version_major,
            version_minor,
            flags,
            value_size,
            str_size,
            data_size,
            crc32,
            cipher_seed,
        })
    }
}

fn read_sizes<R: Read, E: ByteOrder>(r: &mut R) -> Result<(u64, u64, u64), HeaderError> {
    let value_size = r.read_u64::<E>()?;
    let str_size = r.read_u64::<E>()?;
    let data_size = r.read_u64::<E>()?;

    Ok((value_size, str_size, data_size))
}
