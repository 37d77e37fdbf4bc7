//! Extension dispatch: built-in types dispatched directly by [`crate::value::Value`]
//! variant, user extensions resolved through an ordered probe list.
//!
//! The built-in tag namespace (`0xEE..=0xFF`) is reserved so a decoder never
//! needs to consult the registry for Map, Set, Symbol, RegEx, the typed-array
//! family, OpaqueBuffer, or Timestamp — the encoder and decoder match on
//! these `Value` variants directly, which is both faster and means a
//! container with no registered extensions still round-trips every built-in
//! type. The user namespace (`0x00..=0xCF`) is first-match-wins across
//! whatever handlers were registered, in registration order.

use thiserror::Error;

use crate::value::Value;

pub const MAP: u8 = 0xEE;
pub const SET: u8 = 0xEF;
pub const SYMBOL: u8 = 0xF0;
pub const REGEX: u8 = 0xF1;
pub const TYPED_ARRAY_INT8: u8 = 0xF2;
pub const TYPED_ARRAY_UINT8: u8 = 0xF3;
pub const TYPED_ARRAY_UINT8_CLAMPED: u8 = 0xF4;
pub const TYPED_ARRAY_INT16: u8 = 0xF5;
pub const TYPED_ARRAY_UINT16: u8 = 0xF6;
pub const TYPED_ARRAY_INT32: u8 = 0xF7;
pub const TYPED_ARRAY_UINT32: u8 = 0xF8;
pub const TYPED_ARRAY_FLOAT32: u8 = 0xF9;
pub const TYPED_ARRAY_FLOAT64: u8 = 0xFA;
pub const TYPED_ARRAY_BIGINT64: u8 = 0xFB;
pub const TYPED_ARRAY_BIGUINT64: u8 = 0xFC;
pub const OPAQUE_BUFFER: u8 = 0xFD;
// 0xFE reserved for future built-ins.
pub const TIMESTAMP: u8 = 0xFF;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("extension tag {0:#04x} falls in the built-in namespace (0xEE..=0xFF) and cannot be user-registered")]
    TagInBuiltinNamespace(u8),
    #[error("extension tag {0:#04x} is outside the representable tag byte range")]
    InvalidExtensionTag(u8),
}

/// A user-registered extension handler: encodes a `Value` it recognizes into
/// raw bytes, and decodes those bytes back. Handlers never see built-in tags.
pub trait ExtensionHandler: Send + Sync {
    fn tag(&self) -> u8;
    /// Returns `Some(bytes)` if this handler owns `value`, `None` to let the
    /// next handler in the probe list try.
    fn try_encode(&self, value: &Value) -> Option<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Value;
}

/// Ordered probe list of user extension handlers. Built-ins never go through
/// this registry — they are matched directly in [`crate::encoder`] and
/// [`crate::decoder`].
#[derive(Default)]
pub struct ExtensionRegistry {
    handlers: Vec<Box<dyn ExtensionHandler>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn ExtensionHandler>) -> Result<(), ExtensionError> {
        let tag = handler.tag();
        if tag >= EXT_TAG_BUILTIN_MIN {
            return Err(ExtensionError::TagInBuiltinNamespace(tag));
        }
        if tag > EXT_TAG_USER_MAX {
            return Err(ExtensionError::InvalidExtensionTag(tag));
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Tries each registered handler in order, returning the first that
    /// claims the value.
    pub fn try_encode(&self, value: &Value) -> Option<(u8, Vec<u8>)> {
        for handler in &self.handlers {
            if let Some(bytes) = handler.try_encode(value) {
                return Some((handler.tag(), bytes));
            }
        }
        None
    }

    /// Looks up the handler registered for `tag` and decodes with it. Returns
    /// `None` if no handler is registered for the tag — the caller is
    /// expected to fall back to [`Value::Ext`] passthrough rather than treat
    /// this as an error, since an unrecognized user extension is not
    /// malformed data.
    pub fn decode(&self, tag: u8, bytes: &[u8]) -> Option<Value> {
        self.handlers
            .iter()
            .find(|h| h.tag() == tag)
            .map(|h| h.decode(bytes))
    }
}

use crate::tag::{EXT_TAG_BUILTIN_MIN, EXT_TAG_USER_MAX};

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;
    impl ExtensionHandler for EchoHandler {
        fn tag(&self) -> u8 {
            0x01
        }
        fn try_encode(&self, value: &Value) -> Option<Vec<u8>> {
            match value {
                Value::Str(s) if s.starts_with("echo:") => Some(s.as_bytes().to_vec()),
                _ => None,
            }
        }
        fn decode(&self, bytes: &[u8]) -> Value {
            Value::Str(String::from_utf8_lossy(bytes).to_string())
        }
    }

    #[test]
    fn registers_and_round_trips_user_handler() {
        let mut reg = ExtensionRegistry::new();
        reg.register(Box::new(EchoHandler)).unwrap();

        let value = Value::Str("echo:hi".to_string());
        let (tag, bytes) = reg.try_encode(&value).unwrap();
        assert_eq!(tag, 0x01);
        let decoded = reg.decode(tag, &bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn rejects_builtin_namespace_registration() {
        struct Bad;
        impl ExtensionHandler for Bad {
            fn tag(&self) -> u8 {
                MAP
            }
            fn try_encode(&self, _: &Value) -> Option<Vec<u8>> {
                None
            }
            fn decode(&self, _: &[u8]) -> Value {
                Value::Null
            }
        }
        let mut reg = ExtensionRegistry::new();
        assert!(reg.register(Box::new(Bad)).is_err());
    }

    #[test]
    fn unclaimed_value_falls_through() {
        let reg = ExtensionRegistry::new();
        assert!(reg.try_encode(&Value::Str("nope".to_string())).is_none());
    }

    #[test]
    fn rejects_tag_in_unassigned_gap_between_user_and_builtin_ranges() {
        struct Gap;
        impl ExtensionHandler for Gap {
            fn tag(&self) -> u8 {
                0xD0
            }
            fn try_encode(&self, _: &Value) -> Option<Vec<u8>> {
                None
            }
            fn decode(&self, _: &[u8]) -> Value {
                Value::Null
            }
        }
        let mut reg = ExtensionRegistry::new();
        assert!(matches!(reg.register(Box::new(Gap)), Err(ExtensionError::InvalidExtensionTag(0xD0))));
    }

    #[test]
    fn accepts_boundary_tag_at_top_of_user_range() {
        struct Boundary;
        impl ExtensionHandler for Boundary {
            fn tag(&self) -> u8 {
                EXT_TAG_USER_MAX
            }
            fn try_encode(&self, _: &Value) -> Option<Vec<u8>> {
                None
            }
            fn decode(&self, _: &[u8]) -> Value {
                Value::Null
            }
        }
        let mut reg = ExtensionRegistry::new();
        assert!(reg.register(Box::new(Boundary)).is_ok());
    }
}
