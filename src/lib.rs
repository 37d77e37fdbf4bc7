//! # bvf — a self-describing binary value container format and codec
//!
//! Format guarantees:
//! - Magic bytes select byte order for every multi-byte field that follows,
//!   including all section sizes, the CRC32, and the cipher seed — there is
//!   no separate endianness flag.
//! - A container holds exactly one top-level [`value::Value`]: null, bool,
//!   signed/unsigned integers up to 64 bits, f32/f64, strings, arrays,
//!   objects, and the extension family (ordered maps, sets, symbols,
//!   regexes, typed arrays, opaque buffers, timestamps).
//! - Strings and object keys are interned into a value stream and a
//!   separate string stream; both streams end with a `FINISHED` tag.
//! - An optional post-processing pipeline is applied in a fixed order on
//!   encode (CRC stamp -> deflate -> encrypt) and undone in the mirror
//!   order on decode (decrypt -> inflate -> CRC verify).
//! - Decoding reconstructs containers with an explicit stack machine, not
//!   recursion, so deeply nested input cannot blow the call stack.

pub mod cipher;
pub mod container;
pub mod crc;
pub mod decoder;
pub mod deflate;
pub mod encoder;
pub mod error;
pub mod ext;
pub mod header;
pub mod interner;
pub mod perf;
pub mod rng;
pub mod stream;
pub mod tag;
pub mod value;

// Flat re-exports for the most common types.
pub use container::{DecodeOptions, Decoded, Decoder, EncodeOptions, Encoder};
pub use error::BvfError;
pub use ext::{ExtensionHandler, ExtensionRegistry};
pub use value::{TypedArrayKind, Value};
