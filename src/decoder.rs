//! Bytes-to-tree decoder: an explicit stack machine rather than recursive
//! descent, so a deeply nested container (array-of-array-of-array...) cannot
//! blow the call stack regardless of how it was produced.
//!
//! Every open container becomes a [`Frame`] pushed onto `stack`. Reading a
//! scalar, or force-closing a frame at a `LIST_END`, produces a completed
//! [`Value`] that is folded into whatever frame is now on top — which can
//! itself complete and cascade further up, e.g. when the last element of the
//! last element of a doubly-nested array arrives.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::DecodeError;
use crate::ext;
use crate::header::Endianness;
use crate::interner::Interner;
use crate::tag;
use crate::value::{TypedArrayKind, Value};

enum Frame {
    Array { items: Vec<Value>, remaining: Option<usize> },
    Set { items: Vec<Value>, remaining: Option<usize> },
    Object { pairs: Vec<(String, Value)>, remaining: Option<usize>, key: Option<String> },
    Map { pairs: Vec<(Value, Value)>, remaining: Option<usize>, key: Option<Value> },
}

fn frame_to_value(frame: Frame) -> Value {
    match frame {
        Frame::Array { items, .. } => Value::Array(items),
        Frame::Set { items, .. } => Value::Set(items),
        Frame::Object { pairs, .. } => Value::Object(pairs),
        Frame::Map { pairs, .. } => Value::Map(pairs),
    }
}

/// Decodes a single top-level value out of `value_stream`, resolving string
/// and key references against the already-loaded `strings` / `keys` tables.
pub fn decode(
    value_stream: &[u8],
    strings: &Interner,
    keys: &Interner,
    endianness: Endianness,
) -> Result<Value, DecodeError> {
    let mut cursor = Cursor::new(value_stream);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    while root.is_none() {
        let awaiting_key = matches!(stack.last(), Some(Frame::Object { key: None, .. }));

        if awaiting_key {
            let key_tag = read_u8(&mut cursor)?;
            if key_tag == tag::LIST_END || key_tag == tag::RESERVED_LIST_END {
                cascade_close(&mut stack, &mut root)?;
                continue;
            }
            let key = decode_key(key_tag, &mut cursor, keys, strings, endianness)?;
            if key == "__proto__" {
                return Err(DecodeError::ForbiddenKey(key));
            }
            if let Some(Frame::Object { key: slot, .. }) = stack.last_mut() {
                *slot = Some(key);
            }
            continue;
        }

        let t = read_u8(&mut cursor)?;

        if t == tag::LIST_END || t == tag::RESERVED_LIST_END {
            cascade_close(&mut stack, &mut root)?;
            continue;
        }

        if let Some(remaining) = array_open_len(t, &mut cursor, endianness)? {
            push_frame(&mut stack, &mut root, Frame::Array { items: Vec::new(), remaining })?;
            continue;
        }
        if let Some(remaining) = object_open_len(t, &mut cursor, endianness)? {
            push_frame(&mut stack, &mut root, Frame::Object { pairs: Vec::new(), remaining, key: None })?;
            continue;
        }
        if is_ext_open(t) {
            let (ext_tag, len) = read_ext_header(t, &mut cursor, endianness)?;
            match ext_tag {
                ext::MAP => {
                    push_frame(&mut stack, &mut root, Frame::Map { pairs: Vec::new(), remaining: Some(len as usize), key: None })?;
                }
                ext::SET => {
                    push_frame(&mut stack, &mut root, Frame::Set { items: Vec::new(), remaining: Some(len as usize) })?;
                }
                other => {
                    let mut bytes = vec![0u8; len as usize];
                    cursor.read_exact(&mut bytes).map_err(|_| DecodeError::UnexpectedEof)?;
                    let value = decode_ext_payload(other, bytes, endianness)?;
                    complete(&mut stack, &mut root, value)?;
                }
            }
            continue;
        }

        let value = decode_scalar(t, &mut cursor, strings, endianness)?;
        complete(&mut stack, &mut root, value)?;
    }

    Ok(root.expect("loop only exits once root is set"))
}

fn push_frame(stack: &mut Vec<Frame>, root: &mut Option<Value>, frame: Frame) -> Result<(), DecodeError> {
    let empty = matches!(
        &frame,
        Frame::Array { remaining: Some(0), .. }
            | Frame::Set { remaining: Some(0), .. }
            | Frame::Object { remaining: Some(0), .. }
            | Frame::Map { remaining: Some(0), .. }
    );
    stack.push(frame);
    if empty {
        cascade_close(stack, root)?;
    }
    Ok(())
}

fn cascade_close(stack: &mut Vec<Frame>, root: &mut Option<Value>) -> Result<(), DecodeError> {
    let frame = stack.pop().ok_or(DecodeError::StackUnderflow)?;
    let value = frame_to_value(frame);
    complete(stack, root, value)
}

/// Folds a completed value into whatever frame is now on top, cascading
/// further closes if that completion brought a frame's count to zero.
fn complete(stack: &mut Vec<Frame>, root: &mut Option<Value>, mut value: Value) -> Result<(), DecodeError> {
    loop {
        match stack.last_mut() {
            None => {
                *root = Some(value);
                return Ok(());
            }
            Some(Frame::Array { items, remaining }) => {
                items.push(value);
                if let Some(r) = remaining {
                    *r -= 1;
                    if *r == 0 {
                        let frame = stack.pop().unwrap();
                        value = frame_to_value(frame);
                        continue;
                    }
                }
                return Ok(());
            }
            Some(Frame::Set { items, remaining }) => {
                items.push(value);
                if let Some(r) = remaining {
                    *r -= 1;
                    if *r == 0 {
                        let frame = stack.pop().unwrap();
                        value = frame_to_value(frame);
                        continue;
                    }
                }
                return Ok(());
            }
            Some(Frame::Object { pairs, remaining, key }) => {
                let k = key.take().ok_or(DecodeError::StackUnderflow)?;
                pairs.push((k, value));
                if let Some(r) = remaining {
                    *r -= 1;
                    if *r == 0 {
                        let frame = stack.pop().unwrap();
                        value = frame_to_value(frame);
                        continue;
                    }
                }
                return Ok(());
            }
            Some(Frame::Map { pairs, remaining, key }) => {
                if key.is_none() {
                    if !matches!(value, Value::Str(_) | Value::Int(_) | Value::UInt(_) | Value::Symbol { .. }) {
                        return Err(DecodeError::KeyConversion);
                    }
                    *key = Some(value);
                    return Ok(());
                }
                let k = key.take().unwrap();
                pairs.push((k, value));
                if let Some(r) = remaining {
                    *r -= 1;
                    if *r == 0 {
                        let frame = stack.pop().unwrap();
                        value = frame_to_value(frame);
                        continue;
                    }
                }
                return Ok(());
            }
        }
    }
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, DecodeError> {
    cursor.read_u8().map_err(|_| DecodeError::UnexpectedEof)
}

fn read_explicit_len(cursor: &mut Cursor<&[u8]>, width: u8, endianness: Endianness) -> Result<u64, DecodeError> {
    let v = match (width, endianness) {
        (1, _) => cursor.read_u8().map_err(|_| DecodeError::UnexpectedEof)? as u64,
        (2, Endianness::Little) => cursor.read_u16::<LittleEndian>().map_err(|_| DecodeError::UnexpectedEof)? as u64,
        (2, Endianness::Big) => cursor.read_u16::<BigEndian>().map_err(|_| DecodeError::UnexpectedEof)? as u64,
        (4, Endianness::Little) => cursor.read_u32::<LittleEndian>().map_err(|_| DecodeError::UnexpectedEof)? as u64,
        (4, Endianness::Big) => cursor.read_u32::<BigEndian>().map_err(|_| DecodeError::UnexpectedEof)? as u64,
        _ => unreachable!(),
    };
    Ok(v)
}

fn array_open_len(t: u8, cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<Option<Option<usize>>, DecodeError> {
    if (tag::ARR_FIX_BASE..=tag::ARR_FIX_BASE + tag::ARR_FIX_MAX_COUNT as u8).contains(&t) {
        return Ok(Some(Some((t - tag::ARR_FIX_BASE) as usize)));
    }
    let width = match t {
        tag::ARRAY8 => 1,
        tag::ARRAY16 => 2,
        tag::ARRAY32 => 4,
        _ => return Ok(None),
    };
    Ok(Some(Some(read_explicit_len(cursor, width, endianness)? as usize)))
}

fn object_open_len(t: u8, cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<Option<Option<usize>>, DecodeError> {
    if (tag::OBJ_FIX_BASE..=tag::OBJ_FIX_BASE + tag::OBJ_FIX_MAX_COUNT as u8).contains(&t) {
        return Ok(Some(Some((t - tag::OBJ_FIX_BASE) as usize)));
    }
    let width = match t {
        tag::OBJECT8 => 1,
        tag::OBJECT16 => 2,
        tag::OBJECT32 => 4,
        _ => return Ok(None),
    };
    Ok(Some(Some(read_explicit_len(cursor, width, endianness)? as usize)))
}

fn is_ext_open(t: u8) -> bool {
    matches!(t, tag::EXT8 | tag::EXT16 | tag::EXT32)
}

fn read_ext_header(t: u8, cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<(u8, u64), DecodeError> {
    let width = match t {
        tag::EXT8 => 1,
        tag::EXT16 => 2,
        tag::EXT32 => 4,
        _ => unreachable!(),
    };
    let len = read_explicit_len(cursor, width, endianness)?;
    let ext_tag = read_u8(cursor)?;
    Ok((ext_tag, len))
}

fn decode_ext_payload(ext_tag: u8, bytes: Vec<u8>, endianness: Endianness) -> Result<Value, DecodeError> {
    Ok(match ext_tag {
        ext::SYMBOL => {
            let global = *bytes.first().ok_or(DecodeError::UnexpectedEof)? != 0;
            let description = String::from_utf8_lossy(&bytes[1..]).to_string();
            Value::Symbol { global, description }
        }
        ext::REGEX => {
            // The encoder rejects a `flags` value containing a NUL byte
            // (`EncodeError::RegExFlagsContainNul`), so the first NUL in a
            // well-formed payload is always the flags/source delimiter, no
            // matter how many further NULs `source` itself contains.
            let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let flags = String::from_utf8_lossy(&bytes[..nul]).to_string();
            let source = String::from_utf8_lossy(&bytes[nul.saturating_add(1).min(bytes.len())..]).to_string();
            Value::RegEx { source, flags }
        }
        ext::TYPED_ARRAY_INT8 => Value::TypedArray { kind: TypedArrayKind::Int8, bytes },
        ext::TYPED_ARRAY_UINT8 => Value::TypedArray { kind: TypedArrayKind::Uint8, bytes },
        ext::TYPED_ARRAY_UINT8_CLAMPED => Value::TypedArray { kind: TypedArrayKind::Uint8Clamped, bytes },
        ext::TYPED_ARRAY_INT16 => Value::TypedArray { kind: TypedArrayKind::Int16, bytes },
        ext::TYPED_ARRAY_UINT16 => Value::TypedArray { kind: TypedArrayKind::Uint16, bytes },
        ext::TYPED_ARRAY_INT32 => Value::TypedArray { kind: TypedArrayKind::Int32, bytes },
        ext::TYPED_ARRAY_UINT32 => Value::TypedArray { kind: TypedArrayKind::Uint32, bytes },
        ext::TYPED_ARRAY_FLOAT32 => Value::TypedArray { kind: TypedArrayKind::Float32, bytes },
        ext::TYPED_ARRAY_FLOAT64 => Value::TypedArray { kind: TypedArrayKind::Float64, bytes },
        ext::TYPED_ARRAY_BIGINT64 => Value::TypedArray { kind: TypedArrayKind::BigInt64, bytes },
        ext::TYPED_ARRAY_BIGUINT64 => Value::TypedArray { kind: TypedArrayKind::BigUint64, bytes },
        ext::OPAQUE_BUFFER => Value::OpaqueBuffer(bytes),
        ext::TIMESTAMP => {
            let mut c = Cursor::new(bytes.as_slice());
            match bytes.len() {
                4 => {
                    let sec = read_u32(&mut c, endianness)? as i64;
                    Value::Timestamp { sec, nsec: 0 }
                }
                8 => {
                    let packed = read_u32(&mut c, endianness)?;
                    let sec_low32 = read_u32(&mut c, endianness)?;
                    let nsec = packed >> 2;
                    let sec_high2 = (packed & 0b11) as i64;
                    let sec = (sec_high2 << 32) | sec_low32 as i64;
                    Value::Timestamp { sec, nsec }
                }
                12 => {
                    let sec = read_i64(&mut c, endianness)?;
                    let nsec = read_u32(&mut c, endianness)?;
                    Value::Timestamp { sec, nsec }
                }
                _ => return Err(DecodeError::UnexpectedEof),
            }
        }
        other => Value::Ext { tag: other, bytes },
    })
}

/// Object keys arrive in one of two independent tag ranges depending on
/// whether the container was written with `strip_keys`: the KEY-index range
/// resolves against the out-of-band `keys` table; otherwise a key is an
/// ordinary STR-index tag resolving against the shared `strings` table
/// (spec.md §3: "Key indices refer to the out-of-band key array
/// if-and-only-if KeysStripped is set; otherwise keys are stored as ordinary
/// interned strings"). The tag byte itself, not any ambient flag, decides
/// which table applies.
fn decode_key(
    t: u8,
    cursor: &mut Cursor<&[u8]>,
    keys: &Interner,
    strings: &Interner,
    endianness: Endianness,
) -> Result<String, DecodeError> {
    if (tag::KEY_FIX_BASE..=tag::KEY_FIX_BASE + tag::KEY_FIX_MAX_COUNT as u8).contains(&t)
        || matches!(t, tag::KEY8 | tag::KEY16 | tag::KEY32)
    {
        let idx = resolve_index(t, tag::KEY_FIX_BASE, tag::KEY_FIX_MAX_COUNT, tag::KEY8, tag::KEY16, tag::KEY32, cursor, endianness)?;
        return keys.get(idx).map(str::to_string).ok_or(DecodeError::MissingKeyIndex(idx));
    }
    if (tag::STR_FIX_BASE..=tag::STR_FIX_BASE + tag::STR_FIX_MAX_COUNT as u8).contains(&t)
        || matches!(t, tag::STR8 | tag::STR16 | tag::STR32)
    {
        let idx = resolve_index(t, tag::STR_FIX_BASE, tag::STR_FIX_MAX_COUNT, tag::STR8, tag::STR16, tag::STR32, cursor, endianness)?;
        return strings.get(idx).map(str::to_string).ok_or(DecodeError::MissingStringIndex(idx));
    }
    Err(DecodeError::UnknownTag(t, cursor.position()))
}

fn decode_scalar(t: u8, cursor: &mut Cursor<&[u8]>, strings: &Interner, endianness: Endianness) -> Result<Value, DecodeError> {
    Ok(match t {
        tag::NULL => Value::Null,
        tag::UNDEFINED => Value::Undefined,
        tag::FALSE => Value::Bool(false),
        tag::TRUE => Value::Bool(true),
        tag::FLOAT32 => Value::F32(match endianness {
            Endianness::Little => cursor.read_f32::<LittleEndian>(),
            Endianness::Big => cursor.read_f32::<BigEndian>(),
        }.map_err(|_| DecodeError::UnexpectedEof)?),
        tag::FLOAT64 => Value::F64(match endianness {
            Endianness::Little => cursor.read_f64::<LittleEndian>(),
            Endianness::Big => cursor.read_f64::<BigEndian>(),
        }.map_err(|_| DecodeError::UnexpectedEof)?),
        tag::UINT8 => Value::UInt(cursor.read_u8().map_err(|_| DecodeError::UnexpectedEof)? as u64),
        tag::UINT16 => Value::UInt(read_u16(cursor, endianness)? as u64),
        tag::UINT32 => Value::UInt(read_u32(cursor, endianness)? as u64),
        tag::UINT64 => Value::UInt(read_u64(cursor, endianness)?),
        tag::INT8 => Value::Int(cursor.read_i8().map_err(|_| DecodeError::UnexpectedEof)? as i64),
        tag::INT16 => Value::Int(read_i16(cursor, endianness)? as i64),
        tag::INT32 => Value::Int(read_i32(cursor, endianness)? as i64),
        tag::INT64 => Value::Int(read_i64(cursor, endianness)?),
        _ if t <= tag::POSFIXINT_MAX => Value::UInt(t as u64),
        _ if t >= tag::NEGFIXINT_MIN => Value::Int(t as i64 - 256),
        _ if (tag::STR_FIX_BASE..=tag::STR_FIX_BASE + tag::STR_FIX_MAX_COUNT as u8).contains(&t)
            || matches!(t, tag::STR8 | tag::STR16 | tag::STR32) =>
        {
            let idx = resolve_index(t, tag::STR_FIX_BASE, tag::STR_FIX_MAX_COUNT, tag::STR8, tag::STR16, tag::STR32, cursor, endianness)?;
            let s = strings.get(idx).ok_or(DecodeError::MissingStringIndex(idx))?;
            Value::Str(s.to_string())
        }
        other => return Err(DecodeError::UnknownTag(other, cursor.position())),
    })
}

#[allow(clippy::too_many_arguments)]
fn resolve_index(
    t: u8,
    fix_base: u8,
    fix_max: usize,
    w8: u8,
    w16: u8,
    w32: u8,
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
) -> Result<u32, DecodeError> {
    if (fix_base..=fix_base + fix_max as u8).contains(&t) {
        return Ok((t - fix_base) as u32);
    }
    let width = if t == w8 {
        1
    } else if t == w16 {
        2
    } else if t == w32 {
        4
    } else {
        return Err(DecodeError::UnknownTag(t, cursor.position()));
    };
    Ok(read_explicit_len(cursor, width, endianness)? as u32)
}

fn read_u16(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<u16, DecodeError> {
    match e {
        Endianness::Little => cursor.read_u16::<LittleEndian>(),
        Endianness::Big => cursor.read_u16::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}
fn read_u32(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<u32, DecodeError> {
    match e {
        Endianness::Little => cursor.read_u32::<LittleEndian>(),
        Endianness::Big => cursor.read_u32::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}
fn read_u64(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<u64, DecodeError> {
    match e {
        Endianness::Little => cursor.read_u64::<LittleEndian>(),
        Endianness::Big => cursor.read_u64::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}
fn read_i16(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<i16, DecodeError> {
    match e {
        Endianness::Little => cursor.read_i16::<LittleEndian>(),
        Endianness::Big => cursor.read_i16::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}
fn read_i32(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<i32, DecodeError> {
    match e {
        Endianness::Little => cursor.read_i32::<LittleEndian>(),
        Endianness::Big => cursor.read_i32::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}
fn read_i64(cursor: &mut Cursor<&[u8]>, e: Endianness) -> Result<i64, DecodeError> {
    match e {
        Endianness::Little => cursor.read_i64::<LittleEndian>(),
        Endianness::Big => cursor.read_i64::<BigEndian>(),
    }
    .map_err(|_| DecodeError::UnexpectedEof)
}

use std::io::Read;

/// Loads a FINISHED-terminated sequence of literal strings — the format
/// written by [`crate::encoder`]'s interning-table serializer — into an
/// [`Interner`] that preserves the original insertion order and indices.
pub fn load_interned_sequence(bytes: &[u8], endianness: Endianness) -> Result<Interner, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let mut entries = Vec::new();
    loop {
        let t = read_u8(&mut cursor)?;
        if t == tag::FINISHED {
            break;
        }
        let width = match t {
            tag::EXT8 => 1,
            tag::EXT16 => 2,
            tag::EXT32 => 4,
            other => return Err(DecodeError::UnknownTag(other, cursor.position())),
        };
        let len = read_explicit_len(&mut cursor, width, endianness)? as usize;
        let mut buf = vec![0u8; len];
        cursor.read_exact(&mut buf).map_err(|_| DecodeError::UnexpectedEof)?;
        entries.push(String::from_utf8_lossy(&buf).to_string());
    }
    Ok(Interner::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeOptions, Encoder};

    fn round_trip(value: Value) -> Value {
        round_trip_with_depth(value, EncodeOptions::default().max_depth)
    }

    fn round_trip_with_depth(value: Value, max_depth: usize) -> Value {
        let options = EncodeOptions { strip_keys: true, max_depth, ..EncodeOptions::default() };
        let encoder = Encoder::new(options);
        let streams = encoder.encode(&value).unwrap();
        let strings = load_interned_sequence(&streams.string_stream, Endianness::Little).unwrap();
        let keys = Interner::from_entries(streams.key_table.unwrap());
        decode(&streams.value_stream, &strings, &keys, Endianness::Little).unwrap()
    }

    #[test]
    fn round_trips_nested_array() {
        let value = Value::Array(vec![
            Value::Array(vec![Value::UInt(1), Value::UInt(2)]),
            Value::Array(vec![]),
            Value::Str("deep".into()),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn round_trips_object_keys_without_key_stripping() {
        // Default encode options route object keys through the shared
        // string table as ordinary STR-index tags rather than the KEY range
        // — `decode_key` must recognize both tag families, not just KEY.
        let options = EncodeOptions::default();
        let value = Value::Object(vec![
            ("alpha".into(), Value::UInt(1)),
            ("beta".into(), Value::Bool(true)),
        ]);
        let encoder = Encoder::new(options);
        let streams = encoder.encode(&value).unwrap();
        let strings = load_interned_sequence(&streams.string_stream, Endianness::Little).unwrap();
        let keys = Interner::new();
        let decoded = decode(&streams.value_stream, &strings, &keys, Endianness::Little).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_object_with_repeated_keys() {
        let value = Value::Array(vec![
            Value::Object(vec![("a".into(), Value::Bool(true))]),
            Value::Object(vec![("a".into(), Value::Bool(false)), ("b".into(), Value::Null)]),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn round_trips_map_and_set() {
        let value = Value::Array(vec![
            Value::Map(vec![(Value::Str("k".into()), Value::UInt(1))]),
            Value::Set(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn round_trips_deeply_nested_without_recursion_panic() {
        // `max_depth` raised well past the default 512 bound (spec.md §9)
        // purely to exercise the *decoder's* explicit stack machine at a
        // depth that would overflow a recursive-descent implementation's
        // call stack; `encoder.rs`'s own tests cover the default-bound
        // rejection this test deliberately opts out of.
        let mut value = Value::UInt(0);
        for _ in 0..5000 {
            value = Value::Array(vec![value]);
        }
        let result = round_trip_with_depth(value.clone(), 10_000);
        assert_eq!(result, value);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let strings = Interner::new();
        let keys = Interner::new();
        let bytes = [0xD6 + 1]; // not a defined tag in isolation after KEY32 region misuse
        // use a genuinely undefined byte in the 0xD0-0xDF row gap instead:
        let bytes2 = [0xC6_u8 + 0]; // RESERVED_LIST_END alone, with empty stack: forces a StackUnderflow
        let _ = bytes;
        let err = decode(&bytes2, &strings, &keys, Endianness::Little).unwrap_err();
        assert!(matches!(err, DecodeError::StackUnderflow));
    }
}
