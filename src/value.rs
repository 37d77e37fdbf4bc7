//! The closed sum type every container ultimately holds.
//!
//! `Value` is the in-memory shape produced by [`crate::decoder`] and consumed
//! by [`crate::encoder`]. The core variants (Null through Object) have direct
//! tag-byte encodings; the extension variants (Map through Timestamp) share
//! the Ext frame and are told apart by the built-in tag byte documented in
//! [`crate::ext`].

use std::collections::BTreeMap;

/// Concrete element type of a [`Value::TypedArray`], mirroring the host
/// platform's typed-array family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(String),

    Array(Vec<Value>),
    /// Insertion-ordered key/value pairs. `BTreeMap` would re-sort keys and
    /// break the format's "stable insertion order" guarantee, so this is a
    /// plain `Vec` of pairs rather than a map type.
    Object(Vec<(String, Value)>),

    /// Insertion-ordered key/value pairs, keyed by arbitrary `Value`s rather
    /// than strings — the JS `Map` analog.
    Map(Vec<(Value, Value)>),
    /// Insertion-ordered unique values — the JS `Set` analog.
    Set(Vec<Value>),
    /// A symbol's description text plus whether it came from the global
    /// symbol registry (`Symbol.for(...)`) rather than a fresh `Symbol(...)`.
    /// Symbols are never equal across a round trip except by these two
    /// fields — there is no identity to preserve once serialized.
    Symbol { global: bool, description: String },
    /// A regular expression's source pattern and flags string, stored
    /// uninterpreted.
    RegEx { source: String, flags: String },
    TypedArray { kind: TypedArrayKind, bytes: Vec<u8> },
    /// An opaque byte buffer with no further structure (ArrayBuffer analog).
    OpaqueBuffer(Vec<u8>),
    /// Seconds and nanoseconds since the Unix epoch, signed on the seconds
    /// field to allow pre-1970 dates. `nsec` is always `0..1_000_000_000`.
    /// Encodes to one of three wire widths depending on range — see
    /// [`crate::ext`]'s timestamp handling.
    Timestamp { sec: i64, nsec: u32 },

    /// A payload tagged with a byte this build has no handler for. Decoders
    /// preserve it rather than erroring so a container produced with richer
    /// extensions than the reader knows about still round-trips losslessly
    /// through re-encoding.
    Ext { tag: u8, bytes: Vec<u8> },
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

/// Selects the narrower of the two float wire widths the way spec.md §8's
/// float policy requires: a finite value that survives a round trip through
/// `f32` encodes as `F32`, matching the source's "smallest width that loses
/// no precision" rule; NaN and ±Infinity also encode as `F32` since neither
/// carries meaningful mantissa precision to preserve. Everything else needs
/// the full `f64` width.
pub fn from_number(n: f64) -> Value {
    if n.is_nan() || n.is_infinite() || (n as f32) as f64 == n {
        Value::F32(n as f32)
    } else {
        Value::F64(n)
    }
}

/// Converts a decoded [`Value`] into a `serde_json::Value`, for the
/// `make_json` decode option. Types with no JSON equivalent (Map, Set,
/// Symbol, RegEx, TypedArray, OpaqueBuffer, Timestamp, unknown Ext) degrade
/// to the closest JSON-representable shape rather than failing, since the
/// option is documented as a lossy convenience view.
/// JS's `Number.MAX_SAFE_INTEGER` — spec.md §6's `make_json` converts a
/// 64-bit integer to a JSON number only inside this range, falling back to a
/// decimal string otherwise so precision survives the lossy view.
const JSON_SAFE_INTEGER_MAX: i64 = (1i64 << 53) - 1;

/// `enforce_bigint` mirrors spec.md §6's `make_json` interaction with the
/// decode-side `enforce_bigint` option: when set, every 64-bit integer is
/// rendered as a decimal string regardless of whether it would fit losslessly
/// in a JSON number, so a caller who asked for wide-integer enforcement never
/// gets silently narrowed precision through the JSON view either.
pub fn to_json(value: &Value, enforce_bigint: bool) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        Value::Null => J::Null,
        // spec.md §6: `make_json` converts Undefined -> the string "undefined"
        // rather than JSON `null`, so the two are distinguishable in the view.
        Value::Undefined => J::String("undefined".to_string()),
        Value::Bool(b) => J::Bool(*b),
        Value::Int(n) => {
            if !enforce_bigint && n.unsigned_abs() <= JSON_SAFE_INTEGER_MAX as u64 {
                J::Number((*n).into())
            } else {
                J::String(n.to_string())
            }
        }
        Value::UInt(n) => {
            if !enforce_bigint && *n <= JSON_SAFE_INTEGER_MAX as u64 {
                J::Number((*n).into())
            } else {
                J::String(n.to_string())
            }
        }
        Value::F32(n) => serde_json::Number::from_f64(*n as f64)
            .map(J::Number)
            .unwrap_or(J::Null),
        Value::F64(n) => serde_json::Number::from_f64(*n).map(J::Number).unwrap_or(J::Null),
        Value::Str(s) => J::String(s.clone()),
        Value::Array(items) => J::Array(items.iter().map(|v| to_json(v, enforce_bigint)).collect()),
        Value::Object(pairs) => {
            let mut map = serde_json::Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                map.insert(k.clone(), to_json(v, enforce_bigint));
            }
            J::Object(map)
        }
        // spec.md §6: `make_json` turns a Map into an array of `[key, value]`
        // pairs rather than a JSON object, since Map keys aren't restricted
        // to strings and an object would have to lossily coerce them.
        Value::Map(pairs) => J::Array(
            pairs
                .iter()
                .map(|(k, v)| J::Array(vec![to_json(k, enforce_bigint), to_json(v, enforce_bigint)]))
                .collect(),
        ),
        Value::Set(items) => J::Array(items.iter().map(|v| to_json(v, enforce_bigint)).collect()),
        Value::Symbol { global, description } => {
            let mut map = serde_json::Map::with_capacity(2);
            map.insert("symbolGlobal".to_string(), J::Bool(*global));
            map.insert("symbolKey".to_string(), J::String(description.clone()));
            J::Object(map)
        }
        Value::RegEx { source, flags } => {
            let mut map = serde_json::Map::with_capacity(2);
            map.insert("regexSrc".to_string(), J::String(source.clone()));
            map.insert("regexFlags".to_string(), J::String(flags.clone()));
            J::Object(map)
        }
        Value::TypedArray { bytes, .. } => J::Array(
            bytes.iter().map(|b| J::Number((*b as u64).into())).collect(),
        ),
        Value::OpaqueBuffer(bytes) => {
            J::Array(bytes.iter().map(|b| J::Number((*b as u64).into())).collect())
        }
        Value::Timestamp { sec, nsec } => {
            let mut map = serde_json::Map::with_capacity(2);
            map.insert("sec".to_string(), J::Number((*sec).into()));
            map.insert("nsec".to_string(), J::Number((*nsec).into()));
            J::Object(map)
        }
        Value::Ext { tag, bytes } => {
            let mut map = serde_json::Map::new();
            map.insert("ext_tag".to_string(), J::Number((*tag as u64).into()));
            map.insert(
                "bytes".to_string(),
                J::Array(bytes.iter().map(|b| J::Number((*b as u64).into())).collect()),
            );
            J::Object(map)
        }
    }
}

/// Used only by `#[cfg(test)]` BTreeMap-keyed fixtures; production code keeps
/// objects as ordered `Vec` pairs so key order is never lost.
#[cfg(test)]
pub fn sorted_keys(obj: &[(String, Value)]) -> BTreeMap<&str, &Value> {
    obj.iter().map(|(k, v)| (k.as_str(), v)).collect()
}

/// Walks a decoded tree collecting every [`Value::Symbol`] description, in
/// encounter order — the post-decode `symbol_list` surface spec.md §6 names.
pub fn collect_symbols(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Symbol { description, .. } => out.push(description.clone()),
        Value::Array(items) | Value::Set(items) => {
            for item in items {
                collect_symbols(item, out);
            }
        }
        Value::Object(pairs) => {
            for (_, v) in pairs {
                collect_symbols(v, out);
            }
        }
        Value::Map(pairs) => {
            for (k, v) in pairs {
                collect_symbols(k, out);
                collect_symbols(v, out);
            }
        }
        _ => {}
    }
}

/// True if `value` or anything nested inside it uses one of the extension
/// variants (Map, Set, Symbol, RegEx, TypedArray, OpaqueBuffer, Timestamp, or
/// an unrecognized `Ext` passthrough) — the post-decode `has_extensions` flag.
pub fn has_extensions(value: &Value) -> bool {
    match value {
        Value::Map(_)
        | Value::Set(_)
        | Value::Symbol { .. }
        | Value::RegEx { .. }
        | Value::TypedArray { .. }
        | Value::OpaqueBuffer(_)
        | Value::Timestamp { .. }
        | Value::Ext { .. } => true,
        Value::Array(items) => items.iter().any(has_extensions),
        Value::Object(pairs) => pairs.iter().any(|(_, v)| has_extensions(v)),
        _ => false,
    }
}

/// True if `value` is representable in plain JSON without any lossy
/// conversion — i.e. `make_json` would be a no-op on it. The post-decode
/// `valid_json` flag spec.md §6 names.
pub fn is_valid_json(value: &Value) -> bool {
    match value {
        Value::Undefined
        | Value::Map(_)
        | Value::Set(_)
        | Value::Symbol { .. }
        | Value::RegEx { .. }
        | Value::TypedArray { .. }
        | Value::OpaqueBuffer(_)
        | Value::Timestamp { .. }
        | Value::Ext { .. } => false,
        Value::Array(items) => items.iter().all(is_valid_json),
        Value::Object(pairs) => pairs.iter().all(|(_, v)| is_valid_json(v)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_preserves_insertion_order() {
        let obj = Value::Object(vec![
            ("z".into(), Value::Int(1)),
            ("a".into(), Value::Int(2)),
        ]);
        match obj {
            Value::Object(pairs) => {
                assert_eq!(pairs[0].0, "z");
                assert_eq!(pairs[1].0, "a");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn json_conversion_of_basic_shapes() {
        let v = Value::Object(vec![("k".into(), Value::UInt(7))]);
        let j = to_json(&v, false);
        assert_eq!(j["k"], serde_json::json!(7));
    }

    #[test]
    fn enforce_bigint_forces_decimal_strings() {
        let v = Value::UInt(7);
        assert_eq!(to_json(&v, false), serde_json::json!(7));
        assert_eq!(to_json(&v, true), serde_json::json!("7"));
    }

    #[test]
    fn extension_and_json_validity_flags() {
        let plain = Value::Array(vec![Value::UInt(1), Value::Str("x".into())]);
        assert!(!has_extensions(&plain));
        assert!(is_valid_json(&plain));

        let with_set = Value::Array(vec![Value::Set(vec![Value::UInt(1)])]);
        assert!(has_extensions(&with_set));
        assert!(!is_valid_json(&with_set));
    }

    #[test]
    fn collects_nested_symbol_descriptions() {
        let value = Value::Array(vec![
            Value::Symbol { global: false, description: "a".into() },
            Value::Object(vec![("k".into(), Value::Symbol { global: true, description: "b".into() })]),
        ]);
        let mut symbols = Vec::new();
        collect_symbols(&value, &mut symbols);
        assert_eq!(symbols, vec!["a".to_string(), "b".to_string()]);
    }
}
