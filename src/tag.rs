//! Tag alphabet — the one-byte wire vocabulary and its size-class rules.
//!
//! # Tag ranges
//!
//! ```text
//! 0x00–0x7F  Positive fixint        value = tag
//! 0x80–0x8F  Small object           size = tag - 0x80  (0..=15 pairs follow)
//! 0x90–0x9F  Small array            size = tag - 0x90  (0..=15 elements follow)
//! 0xA0–0xAF  Small key-by-index     index = tag - 0xA0
//! 0xB0–0xBF  Small string-by-index  index = tag - 0xB0
//! 0xC0       Null
//! 0xC1       Undefined
//! 0xC2/0xC3  Bool false/true
//! 0xC4       FINISHED                (stream terminator)
//! 0xC5       LIST-END                (forces the topmost open container closed)
//! 0xC6       reserved, decodes as LIST-END; never emitted
//! 0xC7/C8/C9 Object u8/u16/u32 size
//! 0xCA/0xCB  Float32 / Float64
//! 0xCC–0xCF  UInt 8/16/32/64
//! 0xD0–0xD3  Int 8/16/32/64
//! 0xD4/D5/D6 Key-index u8/u16/u32
//! 0xD7/D8/D9 String-index u8/u16/u32
//! 0xDA/DB/DC Array u8/u16/u32 size
//! 0xDD/DE/DF Ext u8/u16/u32 payload length, then ext-tag byte, then bytes
//! 0xE0–0xFF  Negative fixint        value = tag - 0x100
//! ```
//!
//! # Extension tag namespace
//!
//! The byte *inside* an Ext frame is a second namespace, independent of the
//! outer tag. `0x00..=0xCF` is reserved for user handlers registered through
//! [`crate::ext::ExtensionRegistry`]; `0xEE..=0xFF` is reserved for the
//! built-ins (Map, Set, Symbol, RegEx, the typed-array family, OpaqueBuffer,
//! Timestamp). `0xD0..=0xED` is presently unassigned.
//!
//! Two ext payloads break the "length = byte count" rule: Map and Set carry
//! an *element count* in the length field, with elements continuing inline in
//! the enclosing value stream — see [`crate::ext::MAP`] / [`crate::ext::SET`].

use thiserror::Error;

// ── Fixint ranges ───────────────────────────────────────────────────────────

pub const POSFIXINT_MAX: u8 = 0x7F;
pub const NEGFIXINT_MIN: u8 = 0xE0;

// ── Small-container ranges ──────────────────────────────────────────────────

pub const OBJ_FIX_BASE: u8 = 0x80;
pub const OBJ_FIX_MAX_COUNT: usize = 0x0F;
pub const ARR_FIX_BASE: u8 = 0x90;
pub const ARR_FIX_MAX_COUNT: usize = 0x0F;
pub const KEY_FIX_BASE: u8 = 0xA0;
pub const KEY_FIX_MAX_COUNT: usize = 0x0F;
pub const STR_FIX_BASE: u8 = 0xB0;
pub const STR_FIX_MAX_COUNT: usize = 0x0F;

// ── Singletons ───────────────────────────────────────────────────────────────

pub const NULL: u8 = 0xC0;
pub const UNDEFINED: u8 = 0xC1;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;
pub const FINISHED: u8 = 0xC4;
pub const LIST_END: u8 = 0xC5;
/// Reserved; decoders must accept it as [`LIST_END`], encoders must never emit it.
pub const RESERVED_LIST_END: u8 = 0xC6;

// ── Explicit-size object ─────────────────────────────────────────────────────

pub const OBJECT8: u8 = 0xC7;
pub const OBJECT16: u8 = 0xC8;
pub const OBJECT32: u8 = 0xC9;

// ── Numbers ──────────────────────────────────────────────────────────────────

pub const FLOAT32: u8 = 0xCA;
pub const FLOAT64: u8 = 0xCB;

pub const UINT8: u8 = 0xCC;
pub const UINT16: u8 = 0xCD;
pub const UINT32: u8 = 0xCE;
pub const UINT64: u8 = 0xCF;

pub const INT8: u8 = 0xD0;
pub const INT16: u8 = 0xD1;
pub const INT32: u8 = 0xD2;
pub const INT64: u8 = 0xD3;

// ── Explicit-index key / string ──────────────────────────────────────────────

pub const KEY8: u8 = 0xD4;
pub const KEY16: u8 = 0xD5;
pub const KEY32: u8 = 0xD6;

pub const STR8: u8 = 0xD7;
pub const STR16: u8 = 0xD8;
pub const STR32: u8 = 0xD9;

// ── Explicit-size array ──────────────────────────────────────────────────────

pub const ARRAY8: u8 = 0xDA;
pub const ARRAY16: u8 = 0xDB;
pub const ARRAY32: u8 = 0xDC;

// ── Extension frames ─────────────────────────────────────────────────────────

pub const EXT8: u8 = 0xDD;
pub const EXT16: u8 = 0xDE;
pub const EXT32: u8 = 0xDF;

// ── Built-in extension tag namespace (second byte, inside an Ext frame) ─────

pub const EXT_TAG_USER_MAX: u8 = 0xCF;
pub const EXT_TAG_BUILTIN_MIN: u8 = 0xEE;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Unknown tag byte {0:#04x}")]
    UnknownTag(u8),
    #[error("Container size {0} exceeds the maximum representable size (2^32 - 1)")]
    Overflow(u64),
}

/// The smallest size-class that can represent `n`, expressed as a byte width
/// (0 = fixed-form tag, 1/2/4 = the u8/u16/u32 explicit forms).
///
/// Containers fitting in the fixed form (`n <= 15` for object/array, or `n <=
/// 15` for key/string indices) are handled by the caller directly; this
/// function only distinguishes the explicit u8/u16/u32 forms used once a
/// count or index exceeds the fixed range.
#[inline]
pub fn smallest_width(n: u64) -> Result<u8, TagError> {
    if n <= u8::MAX as u64 {
        Ok(1)
    } else if n <= u16::MAX as u64 {
        Ok(2)
    } else if n <= u32::MAX as u64 {
        Ok(4)
    } else {
        Err(TagError::Overflow(n))
    }
}

/// Picks the fixint / explicit-width tag for an array of `len` elements.
#[inline]
pub fn array_tag_for_len(len: usize) -> Result<(u8, u8), TagError> {
    if len <= ARR_FIX_MAX_COUNT {
        Ok((ARR_FIX_BASE + len as u8, 0))
    } else {
        match smallest_width(len as u64)? {
            1 => Ok((ARRAY8, 1)),
            2 => Ok((ARRAY16, 2)),
            _ => Ok((ARRAY32, 4)),
        }
    }
}

/// Picks the fixint / explicit-width tag for an object of `len` pairs.
#[inline]
pub fn object_tag_for_len(len: usize) -> Result<(u8, u8), TagError> {
    if len <= OBJ_FIX_MAX_COUNT {
        Ok((OBJ_FIX_BASE + len as u8, 0))
    } else {
        match smallest_width(len as u64)? {
            1 => Ok((OBJECT8, 1)),
            2 => Ok((OBJECT16, 2)),
            _ => Ok((OBJECT32, 4)),
        }
    }
}

/// Picks the fixint / explicit-width tag for a string-table index.
#[inline]
pub fn str_index_tag(index: u32) -> Result<(u8, u8), TagError> {
    if (index as usize) <= STR_FIX_MAX_COUNT {
        Ok((STR_FIX_BASE + index as u8, 0))
    } else {
        match smallest_width(index as u64)? {
            1 => Ok((STR8, 1)),
            2 => Ok((STR16, 2)),
            _ => Ok((STR32, 4)),
        }
    }
}

/// Picks the fixint / explicit-width tag for a *literal* string of `len`
/// bytes as it appears inside the string-stream's own top-level array (see
/// `crate::encoder::write_interned_sequence`). This reuses the STR tag range
/// but the byte that follows a fixed-form tag here is raw UTF-8 data, not an
/// index — the string stream is the one place this tag range means "length
/// of the literal that follows" rather than "index into the string table".
#[inline]
pub fn str_literal_tag_for_len(len: u64) -> Result<(u8, u8), TagError> {
    if len as usize <= STR_FIX_MAX_COUNT {
        Ok((STR_FIX_BASE + len as u8, 0))
    } else {
        match smallest_width(len)? {
            1 => Ok((STR8, 1)),
            2 => Ok((STR16, 2)),
            _ => Ok((STR32, 4)),
        }
    }
}

/// Picks the fixint / explicit-width tag for a key-table index.
#[inline]
pub fn key_index_tag(index: u32) -> Result<(u8, u8), TagError> {
    if (index as usize) <= KEY_FIX_MAX_COUNT {
        Ok((KEY_FIX_BASE + index as u8, 0))
    } else {
        match smallest_width(index as u64)? {
            1 => Ok((KEY8, 1)),
            2 => Ok((KEY16, 2)),
            _ => Ok((KEY32, 4)),
        }
    }
}

/// Picks the fixint / explicit-width tag and payload-length width for an
/// extension frame of `len` bytes (or, for Map/Set, `len` elements).
#[inline]
pub fn ext_tag_for_len(len: u64) -> Result<(u8, u8), TagError> {
    match smallest_width(len)? {
        1 => Ok((EXT8, 1)),
        2 => Ok((EXT16, 2)),
        _ => Ok((EXT32, 4)),
    }
}
