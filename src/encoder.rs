//! Tree-to-bytes encoder: walks a [`Value`] and emits the value stream plus
//! the interned key table and string stream that go with it.
//!
//! Encoding keeps three pieces of state alongside the output buffer: a key
//! interner (object keys only), a string interner (`Value::Str` contents
//! only — kept separate so a container with few distinct keys but many
//! distinct string values, or vice versa, doesn't pay for shared indices),
//! and the output buffer itself. Object keys are written as KEY-index tags
//! unless [`EncodeOptions::strip_keys`] is set, in which case the small
//! fixed-range 0xA0 forms are used and the key table is carried out-of-band
//! by the caller (the `KEYS_STRIPPED` header flag documents this mode).

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::error::EncodeError;
use crate::header::Endianness;
use crate::interner::Interner;
use crate::tag;
use crate::value::{TypedArrayKind, Value};
use crate::ext;

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub endianness: Endianness,
    /// Replace object keys with small fixed-index tags and omit the key
    /// table from the container, trusting the reader to supply it.
    pub strip_keys: bool,
    /// Open-container nesting bound (spec.md §9: "reject graphs whose
    /// open-container depth exceeds a configurable bound (default 512) with
    /// Overflow"). `write_value` recurses once per nested Array/Object/Map/
    /// Set, so this also caps the Rust call-stack depth the encoder ever
    /// reaches — the thing that bound exists to protect in the first place,
    /// since `Value` trees are owned (never cyclic) but can still be
    /// arbitrarily, and adversarially, deep.
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions { endianness: Endianness::Little, strip_keys: false, max_depth: 512 }
    }
}

pub struct Encoder {
    options: EncodeOptions,
    keys: Interner,
    strings: Interner,
    out: Vec<u8>,
    depth: usize,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Encoder { options, keys: Interner::new(), strings: Interner::new(), out: Vec::new(), depth: 0 }
    }

    /// Encodes `value` as the container's single top-level value. Returns
    /// the value-stream bytes, the string-stream bytes, and — only when
    /// `strip_keys` is set — the out-of-band key table the caller must
    /// persist separately (spec.md §3: the key table "is not persisted in
    /// the container and must be transmitted out of band").
    pub fn encode(mut self, value: &Value) -> Result<EncodedStreams, EncodeError> {
        self.write_value(value)?;
        self.out.push(tag::FINISHED);
        let string_stream = write_interned_sequence(&self.strings, self.options.endianness)?;
        let key_table = if self.options.strip_keys {
            Some(self.keys.entries().to_vec())
        } else {
            None
        };
        Ok(EncodedStreams { value_stream: self.out, string_stream, key_table })
    }

    /// Counts entry into one more level of nested Array/Object/Map/Set,
    /// rejecting input past `max_depth` rather than letting a sufficiently
    /// deep tree exhaust the real call stack (spec.md §9's "Overflow" bound
    /// on open-container depth). The caller decrements `self.depth` itself
    /// on the way back out, once its children have all been written.
    fn enter_container(&mut self) -> Result<(), EncodeError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(EncodeError::DepthOverflow(self.options.max_depth));
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.out.push(tag::NULL),
            Value::Undefined => self.out.push(tag::UNDEFINED),
            Value::Bool(false) => self.out.push(tag::FALSE),
            Value::Bool(true) => self.out.push(tag::TRUE),
            Value::Int(n) => self.write_int(*n)?,
            Value::UInt(n) => self.write_uint(*n)?,
            Value::F32(f) => {
                self.out.push(tag::FLOAT32);
                self.write_f32(*f)?;
            }
            Value::F64(f) => {
                self.out.push(tag::FLOAT64);
                self.write_f64(*f)?;
            }
            Value::Str(s) => self.write_str(s)?,
            Value::Array(items) => {
                let (t, width) = tag::array_tag_for_len(items.len())?;
                self.out.push(t);
                self.write_len_if_explicit(items.len() as u64, width)?;
                self.enter_container()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.depth -= 1;
            }
            Value::Object(pairs) => {
                let (t, width) = tag::object_tag_for_len(pairs.len())?;
                self.out.push(t);
                self.write_len_if_explicit(pairs.len() as u64, width)?;
                self.enter_container()?;
                for (k, v) in pairs {
                    self.write_key(k)?;
                    self.write_value(v)?;
                }
                self.depth -= 1;
            }
            Value::Map(pairs) => {
                self.write_ext_header(ext::MAP, pairs.len() as u64)?;
                self.enter_container()?;
                for (k, v) in pairs {
                    self.write_value(k)?;
                    self.write_value(v)?;
                }
                self.depth -= 1;
            }
            Value::Set(items) => {
                self.write_ext_header(ext::SET, items.len() as u64)?;
                self.enter_container()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.depth -= 1;
            }
            Value::Symbol { global, description } => {
                // Payload: one flag byte (1 = global registry symbol), then
                // the description's raw UTF-8 bytes.
                let desc_bytes = description.as_bytes();
                self.write_ext_header(ext::SYMBOL, desc_bytes.len() as u64 + 1)?;
                self.out.push(if *global { 1 } else { 0 });
                self.out.extend_from_slice(desc_bytes);
            }
            Value::RegEx { source, flags } => {
                // `flags` and `source` are joined by a single NUL byte on the
                // wire (see decoder.rs's split-on-first-NUL) — `source` can
                // contain embedded NULs freely since it is everything after
                // that delimiter, but a NUL inside `flags` itself would move
                // the split point and corrupt both fields on decode.
                if flags.as_bytes().contains(&0) {
                    return Err(EncodeError::RegExFlagsContainNul);
                }
                let mut payload = Vec::with_capacity(source.len() + flags.len() + 1);
                payload.extend_from_slice(flags.as_bytes());
                payload.push(0);
                payload.extend_from_slice(source.as_bytes());
                self.write_ext_header(ext::REGEX, payload.len() as u64)?;
                self.out.extend_from_slice(&payload);
            }
            Value::TypedArray { kind, bytes } => {
                self.write_ext_header(typed_array_tag(*kind), bytes.len() as u64)?;
                self.out.extend_from_slice(bytes);
            }
            Value::OpaqueBuffer(bytes) => {
                self.write_ext_header(ext::OPAQUE_BUFFER, bytes.len() as u64)?;
                self.out.extend_from_slice(bytes);
            }
            Value::Timestamp { sec, nsec } => self.write_timestamp(*sec, *nsec)?,
            Value::Ext { tag: t, bytes } => {
                self.write_ext_header(*t, bytes.len() as u64)?;
                self.out.extend_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Object keys route to the shared string table as ordinary STR-index
    /// tags, *unless* `strip_keys` is set, in which case they route to the
    /// separate out-of-band key interner and emit KEY-index tags instead
    /// (spec.md §3: "Key indices refer to the out-of-band key array
    /// if-and-only-if KeysStripped is set; otherwise keys are stored as
    /// ordinary interned strings").
    fn write_key(&mut self, key: &str) -> Result<(), EncodeError> {
        if self.options.strip_keys {
            let idx = self.keys.intern(key);
            let (t, width) = tag::key_index_tag(idx)?;
            self.out.push(t);
            self.write_len_if_explicit(idx as u64, width)?;
            Ok(())
        } else {
            self.write_str(key)
        }
    }

    fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        let idx = self.strings.intern(s);
        let (t, width) = tag::str_index_tag(idx)?;
        self.out.push(t);
        self.write_len_if_explicit(idx as u64, width)
    }

    /// Picks the narrowest of the three wire widths spec.md §4.6 defines for
    /// timestamps and emits it. `timestamp32` covers `sec` in `0..2^32` with
    /// no sub-second component; `timestamp64` covers `sec` in `0..2^34` with
    /// any nanosecond value (always true — `nsec` is always under 2^30 since
    /// it is constrained to `0..1_000_000_000` by construction); otherwise
    /// `timestamp96` carries a full signed 64-bit second count.
    fn write_timestamp(&mut self, sec: i64, nsec: u32) -> Result<(), EncodeError> {
        if nsec == 0 && (0..=u32::MAX as i64).contains(&sec) {
            self.write_ext_header(ext::TIMESTAMP, 4)?;
            self.write_u32_raw(sec as u32)?;
        } else if (0..(1i64 << 34)).contains(&sec) {
            self.write_ext_header(ext::TIMESTAMP, 8)?;
            let sec_high2 = ((sec >> 32) & 0b11) as u32;
            let sec_low32 = (sec & 0xFFFF_FFFF) as u32;
            let packed = (nsec << 2) | sec_high2;
            self.write_u32_raw(packed)?;
            self.write_u32_raw(sec_low32)?;
        } else {
            self.write_ext_header(ext::TIMESTAMP, 12)?;
            self.write_i64_raw(sec)?;
            self.write_u32_raw(nsec)?;
        }
        Ok(())
    }

    fn write_ext_header(&mut self, ext_tag: u8, len: u64) -> Result<(), EncodeError> {
        let (t, width) = tag::ext_tag_for_len(len)?;
        self.out.push(t);
        self.write_len_if_explicit(len, width)?;
        self.out.push(ext_tag);
        Ok(())
    }

    fn write_len_if_explicit(&mut self, len: u64, width: u8) -> Result<(), EncodeError> {
        match (width, self.options.endianness) {
            (0, _) => {}
            (1, _) => self.out.write_u8(len as u8)?,
            (2, Endianness::Little) => self.out.write_u16::<LittleEndian>(len as u16)?,
            (2, Endianness::Big) => self.out.write_u16::<BigEndian>(len as u16)?,
            (4, Endianness::Little) => self.out.write_u32::<LittleEndian>(len as u32)?,
            (4, Endianness::Big) => self.out.write_u32::<BigEndian>(len as u32)?,
            _ => unreachable!("tag module only produces widths 0/1/2/4"),
        }
        Ok(())
    }

    fn write_int(&mut self, n: i64) -> Result<(), EncodeError> {
        if (0..=tag::POSFIXINT_MAX as i64).contains(&n) {
            self.out.push(n as u8);
        } else if (tag::NEGFIXINT_MIN as i64 - 256..0).contains(&n) {
            self.out.push((n & 0xFF) as u8);
        } else if let Ok(v) = i8::try_from(n) {
            self.out.push(tag::INT8);
            self.out.write_i8(v)?;
        } else if let Ok(v) = i16::try_from(n) {
            self.out.push(tag::INT16);
            self.write_i16(v)?;
        } else if let Ok(v) = i32::try_from(n) {
            self.out.push(tag::INT32);
            self.write_i32(v)?;
        } else {
            self.out.push(tag::INT64);
            self.write_i64_raw(n)?;
        }
        Ok(())
    }

    fn write_uint(&mut self, n: u64) -> Result<(), EncodeError> {
        if n <= tag::POSFIXINT_MAX as u64 {
            self.out.push(n as u8);
        } else if let Ok(v) = u8::try_from(n) {
            self.out.push(tag::UINT8);
            self.out.write_u8(v)?;
        } else if let Ok(v) = u16::try_from(n) {
            self.out.push(tag::UINT16);
            self.write_u16_raw(v)?;
        } else if let Ok(v) = u32::try_from(n) {
            self.out.push(tag::UINT32);
            self.write_u32_raw(v)?;
        } else {
            self.out.push(tag::UINT64);
            self.write_u64_raw(n)?;
        }
        Ok(())
    }

    fn write_i16(&mut self, v: i16) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_i16::<LittleEndian>(v),
            Endianness::Big => self.out.write_i16::<BigEndian>(v),
        }
    }
    fn write_i32(&mut self, v: i32) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_i32::<LittleEndian>(v),
            Endianness::Big => self.out.write_i32::<BigEndian>(v),
        }
    }
    fn write_i64_raw(&mut self, v: i64) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_i64::<LittleEndian>(v),
            Endianness::Big => self.out.write_i64::<BigEndian>(v),
        }
    }
    fn write_u16_raw(&mut self, v: u16) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_u16::<LittleEndian>(v),
            Endianness::Big => self.out.write_u16::<BigEndian>(v),
        }
    }
    fn write_u32_raw(&mut self, v: u32) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_u32::<LittleEndian>(v),
            Endianness::Big => self.out.write_u32::<BigEndian>(v),
        }
    }
    fn write_u64_raw(&mut self, v: u64) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_u64::<LittleEndian>(v),
            Endianness::Big => self.out.write_u64::<BigEndian>(v),
        }
    }
    fn write_f32(&mut self, v: f32) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_f32::<LittleEndian>(v),
            Endianness::Big => self.out.write_f32::<BigEndian>(v),
        }
    }
    fn write_f64(&mut self, v: f64) -> io::Result<()> {
        match self.options.endianness {
            Endianness::Little => self.out.write_f64::<LittleEndian>(v),
            Endianness::Big => self.out.write_f64::<BigEndian>(v),
        }
    }
}

fn typed_array_tag(kind: TypedArrayKind) -> u8 {
    match kind {
        TypedArrayKind::Int8 => ext::TYPED_ARRAY_INT8,
        TypedArrayKind::Uint8 => ext::TYPED_ARRAY_UINT8,
        TypedArrayKind::Uint8Clamped => ext::TYPED_ARRAY_UINT8_CLAMPED,
        TypedArrayKind::Int16 => ext::TYPED_ARRAY_INT16,
        TypedArrayKind::Uint16 => ext::TYPED_ARRAY_UINT16,
        TypedArrayKind::Int32 => ext::TYPED_ARRAY_INT32,
        TypedArrayKind::Uint32 => ext::TYPED_ARRAY_UINT32,
        TypedArrayKind::Float32 => ext::TYPED_ARRAY_FLOAT32,
        TypedArrayKind::Float64 => ext::TYPED_ARRAY_FLOAT64,
        TypedArrayKind::BigInt64 => ext::TYPED_ARRAY_BIGINT64,
        TypedArrayKind::BigUint64 => ext::TYPED_ARRAY_BIGUINT64,
    }
}

/// Result of encoding one top-level value: the value stream and string
/// stream the container format stitches together, plus — only when
/// `strip_keys` is set — the out-of-band key table (never written to the
/// container itself; the caller persists it separately).
pub struct EncodedStreams {
    pub value_stream: Vec<u8>,
    pub string_stream: Vec<u8>,
    pub key_table: Option<Vec<String>>,
}

/// Serializes an interning table the way spec.md §3/§4.2 describes the
/// string stream: "exactly one top-level Array whose elements are raw
/// strings". The array-size tag (fixed 0x90.. form or ARRAY8/16/32) carries
/// the entry count, then each entry is written with the STR tag range
/// reinterpreted as a literal-length prefix rather than an index — see
/// [`tag::str_literal_tag_for_len`] — followed by the entry's raw UTF-8
/// bytes, and the whole sequence still ends with FINISHED per spec.md §3's
/// "a string stream terminates the same way" (same terminator as the value
/// stream, after the array's own elements).
fn write_interned_sequence(table: &Interner, endianness: Endianness) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    let (array_tag, array_width) = tag::array_tag_for_len(table.len())?;
    out.push(array_tag);
    write_len(&mut out, table.len() as u64, array_width, endianness)?;
    for entry in table.entries() {
        let bytes = entry.as_bytes();
        let (t, width) = tag::str_literal_tag_for_len(bytes.len() as u64)?;
        out.push(t);
        write_len(&mut out, bytes.len() as u64, width, endianness)?;
        out.extend_from_slice(bytes);
    }
    out.push(tag::FINISHED);
    Ok(out)
}

fn write_len(out: &mut Vec<u8>, len: u64, width: u8, endianness: Endianness) -> Result<(), EncodeError> {
    match (width, endianness) {
        (0, _) => {}
        (1, _) => out.write_u8(len as u8)?,
        (2, Endianness::Little) => out.write_u16::<LittleEndian>(len as u16)?,
        (2, Endianness::Big) => out.write_u16::<BigEndian>(len as u16)?,
        (4, Endianness::Little) => out.write_u32::<LittleEndian>(len as u32)?,
        (4, Endianness::Big) => out.write_u32::<BigEndian>(len as u32)?,
        _ => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fixint_and_string_index() {
        let value = Value::Array(vec![Value::UInt(5), Value::Str("hi".into()), Value::Str("hi".into())]);
        let encoder = Encoder::new(EncodeOptions::default());
        let streams = encoder.encode(&value).unwrap();
        assert_eq!(streams.value_stream[0], tag::ARR_FIX_BASE + 3);
        assert_eq!(streams.value_stream[1], 5);
        // both "hi" references should use the same interned index (0 -> fixed form 0xB0)
        assert_eq!(streams.value_stream[2], tag::STR_FIX_BASE);
        assert_eq!(streams.value_stream[3], tag::STR_FIX_BASE);
    }

    #[test]
    fn negative_fixint_range() {
        let value = Value::Int(-1);
        let encoder = Encoder::new(EncodeOptions::default());
        let streams = encoder.encode(&value).unwrap();
        assert_eq!(streams.value_stream, vec![0xFF, tag::FINISHED]);
    }

    #[test]
    fn regex_flags_containing_nul_is_rejected() {
        let value = Value::RegEx { source: "abc".into(), flags: "g\0i".into() };
        let encoder = Encoder::new(EncodeOptions::default());
        assert!(matches!(encoder.encode(&value), Err(EncodeError::RegExFlagsContainNul)));
    }

    #[test]
    fn regex_source_containing_nul_encodes_fine() {
        let value = Value::RegEx { source: "a\0b".into(), flags: "g".into() };
        let encoder = Encoder::new(EncodeOptions::default());
        assert!(encoder.encode(&value).is_ok());
    }

    #[test]
    fn key_containing_a_nul_byte_encodes_fine() {
        // Keys are length-prefixed interned strings, not NUL-terminated, so
        // an embedded NUL is ordinary data, not a wire-format hazard — only
        // the literal key "__proto__" is forbidden (checked on the decode
        // side, see decoder.rs).
        let value = Value::Object(vec![("bad\0key".into(), Value::Null)]);
        let encoder = Encoder::new(EncodeOptions::default());
        assert!(encoder.encode(&value).is_ok());
    }

    fn nest(depth: usize) -> Value {
        let mut value = Value::UInt(0);
        for _ in 0..depth {
            value = Value::Array(vec![value]);
        }
        value
    }

    #[test]
    fn nesting_within_the_default_depth_bound_encodes_fine() {
        let encoder = Encoder::new(EncodeOptions::default());
        assert!(encoder.encode(&nest(512)).is_ok());
    }

    #[test]
    fn nesting_past_the_default_depth_bound_is_rejected() {
        let encoder = Encoder::new(EncodeOptions::default());
        let err = encoder.encode(&nest(513)).unwrap_err();
        assert!(matches!(err, EncodeError::DepthOverflow(512)));
    }

    #[test]
    fn a_caller_supplied_max_depth_is_honored() {
        let options = EncodeOptions { max_depth: 4, ..EncodeOptions::default() };
        assert!(Encoder::new(options.clone()).encode(&nest(4)).is_ok());
        assert!(Encoder::new(options).encode(&nest(5)).is_err());
    }
}
