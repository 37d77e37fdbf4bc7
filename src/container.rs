//! Top-level embedding API: a small facade over [`crate::encoder`],
//! [`crate::decoder`], [`crate::stream`], and [`crate::ext`] so callers don't
//! have to wire the pipeline stages together themselves.

use std::cell::Cell;

use crate::decoder::{self, load_interned_sequence};
use crate::encoder::{EncodeOptions as TreeEncodeOptions, Encoder as TreeEncoder};
use crate::error::{BvfError, DecodeError};
use crate::ext::ExtensionRegistry;
use crate::header::{Endianness, Flags, Header, MAGIC_BE, MAGIC_LE};
use crate::interner::Interner;
use crate::stream::{decode_buffered_with_seed, decode_streamed_with_seed, encode_buffered, encode_streamed, PipelineOptions};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub endianness: Endianness,
    pub compress: bool,
    pub checksum: bool,
    /// Derives the CBC cipher key/IV from a caller-supplied 32-bit seed.
    /// `None` leaves the container unencrypted.
    pub encryption_seed: Option<u32>,
    /// Omit `encryption_seed` from the header trailer even though encryption
    /// is on — the caller persists it out of band and supplies it back via
    /// [`DecodeOptions::encryption_seed`] (spec.md §3's `EncryptionKeyExcluded`
    /// flag).
    pub strip_encryption_seed: bool,
    /// Replace object keys with an out-of-band key table (`KeysStripped`).
    pub strip_keys: bool,
    /// Spill intermediate compression output to a sidecar temp file instead
    /// of a second in-memory buffer. Only useful for inputs large enough
    /// that doubling memory use would matter.
    pub stream_mode: bool,
    /// Sets `Flags::LARGE_FILE` regardless of payload size — a caller who
    /// knows it is about to feed a multi-gigabyte value sets this alongside
    /// `stream_mode` so the header documents which path produced the bytes.
    pub large_file: bool,
    /// Open-container nesting bound passed through to
    /// [`crate::encoder::EncodeOptions::max_depth`] (spec.md §9).
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            endianness: Endianness::Little,
            compress: true,
            checksum: true,
            encryption_seed: None,
            strip_encryption_seed: false,
            strip_keys: false,
            stream_mode: false,
            large_file: false,
            max_depth: TreeEncodeOptions::default().max_depth,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Convert the decoded tree into a `serde_json::Value` view alongside
    /// the native `Value`. Lossy for types with no JSON equivalent.
    pub make_json: bool,
    /// Supplied out of band when the container was written with
    /// `EncryptionKeyExcluded` set — required in that case, ignored
    /// otherwise.
    pub encryption_seed: Option<u32>,
    /// Supplied out of band when the container was written with
    /// `KeysStripped` set — required in that case, ignored otherwise.
    pub keys_array: Option<Vec<String>>,
    /// Forces every 64-bit integer through the `make_json` view as a decimal
    /// string rather than a JSON number, even when it would fit the safe
    /// range losslessly (spec.md §6's `enforce_bigint`). Has no effect on the
    /// native `Value` returned — `Value::Int`/`Value::UInt` are always wide.
    pub enforce_bigint: bool,
}

/// Encodes a single top-level [`Value`] into a complete container.
pub struct Encoder {
    options: EncodeOptions,
    registry: ExtensionRegistry,
}

thread_local! {
    // Tracks whether an `Encoder::encode` call is already running on this
    // thread. `Encoder` itself carries no mutable state across the call
    // (each invocation builds a fresh `TreeEncoder`), so a nested call —
    // e.g. a registered extension handler that calls back into `encode` —
    // is already safe to run straight through; this guard exists so that
    // invariant stays true if a future handler stashes state on `self`
    // instead of threading it through return values.
    static ENCODE_DEPTH: Cell<u32> = Cell::new(0);
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Encoder { options, registry: ExtensionRegistry::new() }
    }

    pub fn with_registry(options: EncodeOptions, registry: ExtensionRegistry) -> Self {
        Encoder { options, registry }
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, BvfError> {
        self.encode_full(value).map(|encoded| encoded.bytes)
    }

    /// Like [`Encoder::encode`], but also surfaces the out-of-band material
    /// spec.md §6 says a caller must persist when it asked for it to be
    /// stripped out of the container itself (`encryption_seed`, `keys_array`)
    /// plus the CRC32 that was stamped into the header, if any.
    pub fn encode_full(&self, value: &Value) -> Result<Encoded, BvfError> {
        let depth = ENCODE_DEPTH.with(|d| {
            let prev = d.get();
            d.set(prev + 1);
            prev
        });
        let result = self.encode_inner(value, depth > 0);
        ENCODE_DEPTH.with(|d| d.set(d.get() - 1));
        result
    }

    fn encode_inner(&self, value: &Value, _nested: bool) -> Result<Encoded, BvfError> {
        log::debug!(
            "encoding: mode={} compress={} checksum={} encrypted={}",
            if self.options.stream_mode { "stream" } else { "buffer" },
            self.options.compress,
            self.options.checksum,
            self.options.encryption_seed.is_some()
        );
        let transformed = apply_user_extensions_encode(value, &self.registry);

        let tree_options = TreeEncodeOptions {
            endianness: self.options.endianness,
            strip_keys: self.options.strip_keys,
            max_depth: self.options.max_depth,
        };
        let streams = TreeEncoder::new(tree_options).encode(&transformed).map_err(BvfError::Encode)?;

        let pipeline_options = PipelineOptions {
            endianness: self.options.endianness,
            compress: self.options.compress,
            checksum: self.options.checksum,
            cipher_seed: self.options.encryption_seed,
            strip_encryption_seed: self.options.strip_encryption_seed,
            large_file: self.options.large_file || self.options.stream_mode,
        };

        let value_and_string = if self.options.stream_mode {
            encode_streamed(&streams.value_stream, &streams.string_stream, &pipeline_options)
        } else {
            encode_buffered(&streams.value_stream, &streams.string_stream, &pipeline_options)
        }
        .map_err(BvfError::Encode)?;

        let crc32_hash = if self.options.checksum {
            let mut payload = streams.value_stream.clone();
            payload.extend_from_slice(&streams.string_stream);
            Some(crate::crc::checksum(&payload))
        } else {
            None
        };

        // The key table (when present) is appended after the pipeline body;
        // it is neither compressed nor encrypted, since it is almost always
        // small relative to the payload and keeping it legible lets a
        // container be partially inspected without running the cipher. A
        // trailing 4-byte footer records its byte length so the decoder can
        // find its start without needing a delimiter that might collide with
        // arbitrary ciphertext bytes earlier in the container.
        let mut out = value_and_string;
        let keys_array = streams.key_table.clone();
        if let Some(key_table) = streams.key_table {
            let table_bytes = write_key_table(&key_table, self.options.endianness);
            out.extend_from_slice(&table_bytes);
            let footer = match self.options.endianness {
                Endianness::Little => (table_bytes.len() as u32).to_le_bytes(),
                Endianness::Big => (table_bytes.len() as u32).to_be_bytes(),
            };
            out.extend_from_slice(&footer);
        }

        Ok(Encoded { bytes: out, crc32_hash, encryption_seed: self.options.encryption_seed, keys_array })
    }
}

/// Decodes a container previously produced by [`Encoder::encode`].
pub struct Decoder {
    options: DecodeOptions,
    registry: ExtensionRegistry,
}

pub struct Decoded {
    pub value: Value,
    pub json: Option<serde_json::Value>,
    /// Descriptions of every `Value::Symbol` found anywhere in the decoded
    /// tree, in encounter order (spec.md §6's post-decode `symbol_list`).
    pub symbol_list: Vec<String>,
    /// Whether the decoded tree uses any extension variant (Map, Set,
    /// Symbol, RegEx, TypedArray, OpaqueBuffer, Timestamp, or an opaque
    /// `Ext` passthrough) anywhere — spec.md §6's `has_extensions`.
    pub has_extensions: bool,
    /// Whether the decoded tree is representable in plain JSON without any
    /// lossy conversion, i.e. whether `make_json` would be a no-op on it —
    /// spec.md §6's `valid_json`.
    pub valid_json: bool,
    /// The CRC32 value stored in the header, if the `CRC32` flag was set —
    /// spec.md §6's `crc32_on_file`.
    pub crc32_on_file: Option<u32>,
    /// The CRC32 actually recomputed over the reconstructed pre-pipeline
    /// payload — spec.md §6's `crc32_hash`. Compared against
    /// `crc32_on_file` by [`crate::stream::decode_buffered_with_seed`]
    /// during the pipeline; exposed again here so a caller can inspect it
    /// directly without re-running the checksum.
    pub crc32_hash: Option<u32>,
}

/// Result of [`Encoder::encode_full`]: the container bytes plus the
/// out-of-band material spec.md §6 says a caller must persist when it was
/// stripped from the container itself.
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// The CRC32 stamped into the header, if `checksum` was requested —
    /// spec.md §6's post-encode `crc32_hash`.
    pub crc32_hash: Option<u32>,
    /// The cipher seed used, whether or not it was written into the header
    /// — spec.md §6: "required persistence if `strip_encryption_seed`".
    pub encryption_seed: Option<u32>,
    /// The out-of-band key table, present only when `strip_keys` was set —
    /// spec.md §6: "required persistence if `strip_keys`". This is also
    /// appended to `bytes` as a footer for convenience (see
    /// `Encoder::encode_inner`'s doc comment), but a caller following the
    /// spec's out-of-band contract strictly should persist this field
    /// instead of relying on the footer.
    pub keys_array: Option<Vec<String>>,
}

thread_local! {
    static DECODE_DEPTH: Cell<u32> = Cell::new(0);
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Decoder { options, registry: ExtensionRegistry::new() }
    }

    pub fn with_registry(options: DecodeOptions, registry: ExtensionRegistry) -> Self {
        Decoder { options, registry }
    }

    pub fn decode(&self, container: &[u8]) -> Result<Decoded, BvfError> {
        let depth = DECODE_DEPTH.with(|d| {
            let prev = d.get();
            d.set(prev + 1);
            prev
        });
        let result = self.decode_inner(container, depth > 0);
        DECODE_DEPTH.with(|d| d.set(d.get() - 1));
        result
    }

    /// Thin async shell over [`Decoder::decode`] — the decoder has no I/O of
    /// its own to suspend on (the whole container is already in memory by
    /// the time this runs), so there is nothing to gain from a real async
    /// state machine here; this exists purely so an async caller doesn't
    /// need a `spawn_blocking` wrapper of its own.
    pub async fn decode_async(&self, container: &[u8]) -> Result<Decoded, BvfError> {
        self.decode(container)
    }

    fn decode_inner(&self, container: &[u8], _nested: bool) -> Result<Decoded, BvfError> {
        log::debug!("decoding: {} byte container", container.len());
        // The header's flags byte sits at a fixed offset (5), and endianness
        // is determined by the 2-byte magic at offset 0 — both have to be
        // known before the key-table footer can be split off, since that has
        // to happen before `decode_buffered_with_seed` runs (it reads to the
        // end of whatever slice it's given, and would otherwise swallow the
        // unprocessed key table as part of the pipeline payload).
        if container.len() < 2 {
            return Err(BvfError::Decode(DecodeError::UnexpectedEof));
        }
        let endianness = if container[0..2] == MAGIC_LE {
            Endianness::Little
        } else if container[0..2] == MAGIC_BE {
            Endianness::Big
        } else {
            return Err(BvfError::Header(crate::header::HeaderError::BadMagic([container[0], container[1]])));
        };
        let flags_byte = *container.get(5).ok_or(BvfError::Decode(DecodeError::UnexpectedEof))?;
        let flags = Flags::from_bits(flags_byte).unwrap_or(Flags::empty());
        let keys_stripped = flags.contains(Flags::KEYS_STRIPPED);

        // The footer only exists when the container was written with
        // `strip_keys` — that is the one case `Encoder::encode_inner` appends
        // one, so this split must mirror that condition exactly, not its
        // negation.
        let (main_part, key_table_bytes): (&[u8], &[u8]) = if keys_stripped {
            if container.len() < 4 {
                return Err(BvfError::Decode(DecodeError::UnexpectedEof));
            }
            let footer_at = container.len() - 4;
            let footer = &container[footer_at..];
            let key_table_len = match endianness {
                Endianness::Little => u32::from_le_bytes(footer.try_into().unwrap()),
                Endianness::Big => u32::from_be_bytes(footer.try_into().unwrap()),
            } as usize;
            let key_table_start = footer_at.checked_sub(key_table_len).ok_or(BvfError::Decode(DecodeError::UnexpectedEof))?;
            (&container[..key_table_start], &container[key_table_start..footer_at])
        } else {
            (container, &[][..])
        };

        // `LARGE_FILE` records which path produced the container (spec.md
        // §5's mode-selection rule), so decode mirrors whichever one encode
        // used rather than always taking the simpler buffered path.
        let (header, payload) = if flags.contains(Flags::LARGE_FILE) {
            decode_streamed_with_seed(main_part, self.options.encryption_seed).map_err(BvfError::Decode)?
        } else {
            decode_buffered_with_seed(main_part, self.options.encryption_seed).map_err(BvfError::Decode)?
        };

        let value_stream = &payload[..header.value_size as usize];
        let string_stream_start = header.value_size as usize;
        let string_stream_end = string_stream_start + header.str_size as usize;
        let string_stream = &payload[string_stream_start..string_stream_end];

        let strings = load_interned_sequence(string_stream, header.endianness).map_err(BvfError::Decode)?;

        // An empty interner is fine whenever `keys_stripped` is false: the
        // tree encoder only emits KEY-index tags when `strip_keys` was set,
        // so `decoder::decode`'s key-tag dispatch never consults `keys` in
        // that case — object keys arrive as ordinary STR-index tags instead
        // and resolve against `strings`.
        let keys = if keys_stripped {
            if let Some(names) = self.options.keys_array.clone() {
                Interner::from_entries(names)
            } else {
                load_key_table(key_table_bytes, header.endianness).map_err(BvfError::Decode)?
            }
        } else {
            Interner::new()
        };

        let value = decoder::decode(value_stream, &strings, &keys, header.endianness).map_err(BvfError::Decode)?;
        let value = apply_user_extensions_decode(&value, &self.registry);

        let json = if self.options.make_json {
            Some(crate::value::to_json(&value, self.options.enforce_bigint))
        } else {
            None
        };

        let mut symbol_list = Vec::new();
        crate::value::collect_symbols(&value, &mut symbol_list);
        let has_extensions = crate::value::has_extensions(&value);
        let valid_json = crate::value::is_valid_json(&value);
        let crc32_hash = Some(crate::crc::checksum(&payload[..string_stream_end]));

        Ok(Decoded {
            value,
            json,
            symbol_list,
            has_extensions,
            valid_json,
            crc32_on_file: header.crc32,
            crc32_hash,
        })
    }
}

/// The out-of-band key table uses the same length-prefixed-string shape as
/// the in-container string stream, minus the FINISHED terminator — it is
/// just a flat array of literal strings, since there is no interning to
/// cross-reference once keys are stripped out of the value stream itself.
fn write_key_table(entries: &[String], endianness: Endianness) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        let len = entry.len() as u32;
        match endianness {
            Endianness::Little => out.extend_from_slice(&len.to_le_bytes()),
            Endianness::Big => out.extend_from_slice(&len.to_be_bytes()),
        }
        out.extend_from_slice(entry.as_bytes());
    }
    out
}

fn load_key_table(bytes: &[u8], endianness: Endianness) -> Result<Interner, DecodeError> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let len_bytes = bytes.get(pos..pos + 4).ok_or(DecodeError::UnexpectedEof)?;
        let len = match endianness {
            Endianness::Little => u32::from_le_bytes(len_bytes.try_into().unwrap()),
            Endianness::Big => u32::from_be_bytes(len_bytes.try_into().unwrap()),
        } as usize;
        pos += 4;
        let str_bytes = bytes.get(pos..pos + len).ok_or(DecodeError::UnexpectedEof)?;
        entries.push(String::from_utf8_lossy(str_bytes).to_string());
        pos += len;
    }
    Ok(Interner::from_entries(entries))
}

fn apply_user_extensions_encode(value: &Value, registry: &ExtensionRegistry) -> Value {
    if let Some((tag, bytes)) = registry.try_encode(value) {
        return Value::Ext { tag, bytes };
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| apply_user_extensions_encode(v, registry)).collect()),
        Value::Object(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), apply_user_extensions_encode(v, registry)))
                .collect(),
        ),
        Value::Map(pairs) => Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (apply_user_extensions_encode(k, registry), apply_user_extensions_encode(v, registry)))
                .collect(),
        ),
        Value::Set(items) => Value::Set(items.iter().map(|v| apply_user_extensions_encode(v, registry)).collect()),
        other => other.clone(),
    }
}

fn apply_user_extensions_decode(value: &Value, registry: &ExtensionRegistry) -> Value {
    match value {
        Value::Ext { tag, bytes } => registry.decode(*tag, bytes).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(|v| apply_user_extensions_decode(v, registry)).collect()),
        Value::Object(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), apply_user_extensions_decode(v, registry)))
                .collect(),
        ),
        Value::Map(pairs) => Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (apply_user_extensions_decode(k, registry), apply_user_extensions_decode(v, registry)))
                .collect(),
        ),
        Value::Set(items) => Value::Set(items.iter().map(|v| apply_user_extensions_decode(v, registry)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_container() {
        let value = Value::Object(vec![
            ("name".into(), Value::Str("bvf".into())),
            ("count".into(), Value::UInt(3)),
            ("items".into(), Value::Array(vec![Value::Bool(true), Value::Null])),
        ]);

        let encoder = Encoder::new(EncodeOptions::default());
        let bytes = encoder.encode(&value).unwrap();

        let decoder = Decoder::new(DecodeOptions::default());
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn round_trips_encrypted_uncompressed_container() {
        let value = Value::Array(vec![Value::UInt(1), Value::Str("secret".into())]);
        let options = EncodeOptions { compress: false, encryption_seed: Some(0x7788_99AA), ..EncodeOptions::default() };
        let encoder = Encoder::new(options);
        let bytes = encoder.encode(&value).unwrap();

        let decoder = Decoder::new(DecodeOptions::default());
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn round_trips_container_with_stripped_keys() {
        let value = Value::Array(vec![
            Value::Object(vec![("alpha".into(), Value::UInt(1))]),
            Value::Object(vec![("beta".into(), Value::UInt(2)), ("alpha".into(), Value::UInt(3))]),
        ]);
        let options = EncodeOptions { strip_keys: true, ..EncodeOptions::default() };
        let encoder = Encoder::new(options);
        let bytes = encoder.encode(&value).unwrap();

        let decoder = Decoder::new(DecodeOptions::default());
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn stripped_encryption_seed_requires_caller_supplied_value() {
        let value = Value::Str("secret".into());
        let options = EncodeOptions {
            encryption_seed: Some(0x1234_5678),
            strip_encryption_seed: true,
            ..EncodeOptions::default()
        };
        let encoder = Encoder::new(options);
        let bytes = encoder.encode(&value).unwrap();

        assert!(Decoder::new(DecodeOptions::default()).decode(&bytes).is_err());

        let decoder = Decoder::new(DecodeOptions { encryption_seed: Some(0x1234_5678), ..DecodeOptions::default() });
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn make_json_option_populates_json_view() {
        let value = Value::Object(vec![("k".into(), Value::UInt(9))]);
        let encoder = Encoder::new(EncodeOptions::default());
        let bytes = encoder.encode(&value).unwrap();

        let decoder = Decoder::new(DecodeOptions { make_json: true, ..DecodeOptions::default() });
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.json.unwrap()["k"], serde_json::json!(9));
    }

    #[test]
    fn enforce_bigint_option_forces_decimal_string_in_json_view() {
        let value = Value::Object(vec![("big".into(), Value::UInt(9))]);
        let bytes = Encoder::new(EncodeOptions::default()).encode(&value).unwrap();

        let plain = Decoder::new(DecodeOptions { make_json: true, ..DecodeOptions::default() }).decode(&bytes).unwrap();
        assert_eq!(plain.json.unwrap()["big"], serde_json::json!(9));

        let forced = Decoder::new(DecodeOptions { make_json: true, enforce_bigint: true, ..DecodeOptions::default() })
            .decode(&bytes)
            .unwrap();
        assert_eq!(forced.json.unwrap()["big"], serde_json::json!("9"));
    }

    #[test]
    fn encode_full_surfaces_out_of_band_material() {
        let value = Value::Array(vec![Value::Object(vec![("a".into(), Value::UInt(1))])]);
        let options = EncodeOptions {
            strip_keys: true,
            checksum: false,
            encryption_seed: Some(0x1234_5678),
            strip_encryption_seed: true,
            ..EncodeOptions::default()
        };
        let encoded = Encoder::new(options).encode_full(&value).unwrap();
        assert_eq!(encoded.crc32_hash, None, "checksum was not requested");
        assert_eq!(encoded.encryption_seed, Some(0x1234_5678));
        assert_eq!(encoded.keys_array, Some(vec!["a".to_string()]));

        let decoder = Decoder::new(DecodeOptions {
            encryption_seed: encoded.encryption_seed,
            keys_array: encoded.keys_array.clone(),
            ..DecodeOptions::default()
        });
        let decoded = decoder.decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.value, value);
        assert_eq!(decoded.crc32_on_file, None, "checksum was not requested");
    }

    #[test]
    fn decode_reports_symbols_and_extension_presence() {
        let value = Value::Array(vec![
            Value::Symbol { global: false, description: "shared".into() },
            Value::Str("plain".into()),
        ]);
        let bytes = Encoder::new(EncodeOptions::default()).encode(&value).unwrap();
        let decoded = Decoder::new(DecodeOptions::default()).decode(&bytes).unwrap();

        assert_eq!(decoded.symbol_list, vec!["shared".to_string()]);
        assert!(decoded.has_extensions);
        assert!(!decoded.valid_json);

        let plain = Value::Array(vec![Value::Str("plain".into())]);
        let plain_bytes = Encoder::new(EncodeOptions::default()).encode(&plain).unwrap();
        let plain_decoded = Decoder::new(DecodeOptions::default()).decode(&plain_bytes).unwrap();
        assert!(plain_decoded.symbol_list.is_empty());
        assert!(!plain_decoded.has_extensions);
        assert!(plain_decoded.valid_json);
    }

    #[test]
    fn crc32_on_file_and_recomputed_hash_agree_when_checksum_enabled() {
        let value = Value::Str("integrity".into());
        let options = EncodeOptions { checksum: true, ..EncodeOptions::default() };
        let bytes = Encoder::new(options).encode(&value).unwrap();

        let decoded = Decoder::new(DecodeOptions::default()).decode(&bytes).unwrap();
        assert!(decoded.crc32_on_file.is_some());
        assert_eq!(decoded.crc32_on_file, decoded.crc32_hash);
    }
}
