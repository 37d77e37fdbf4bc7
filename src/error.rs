//! Crate-level error composition.
//!
//! Each module owns a narrow `thiserror` enum for the failures it can
//! produce; [`BvfError`] wraps them into one type so callers of the
//! top-level [`crate::container`] API only need to match on one thing.

use thiserror::Error;

use crate::cipher::CipherError;
use crate::ext::ExtensionError;
use crate::header::HeaderError;
use crate::tag::TagError;

#[derive(Error, Debug)]
pub enum BvfError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("string-stream index {0} exceeds the explicit 32-bit index range")]
    StringTableOverflow(u64),

    #[error("RegEx flags cannot contain an embedded NUL byte: it is the wire delimiter between flags and source")]
    RegExFlagsContainNul,

    #[error("open-container nesting exceeds the configured bound of {0}")]
    DepthOverflow(usize),

    #[error("deflate compression failed: {0}")]
    DeflateFailure(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unknown tag byte {0:#04x} at offset {1}")]
    UnknownTag(u8, u64),

    #[error("decoder stack underflow: a LIST-END or container-close arrived with no open frame")]
    StackUnderflow,

    #[error("string-stream index {0} has no matching entry")]
    MissingStringIndex(u32),

    #[error("key-table index {0} has no matching entry")]
    MissingKeyIndex(u32),

    #[error("object or map key {0:?} is forbidden")]
    ForbiddenKey(String),

    #[error("a Map key must be a string, number, or symbol; found something else")]
    KeyConversion,

    #[error("EncryptionKeyExcluded is set but no out-of-band encryption_seed was supplied")]
    MissingEncryptionSeed,

    #[error("KeysStripped is set but no out-of-band keys_array was supplied")]
    MissingKeyTable,

    #[error("inflate failed: {0}")]
    InflateFailure(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("unexpected end of input while decoding")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
