//! Canonical binary encoding.
//!
//! This is the single encoding used for every hash preimage in the crate:
//! fixed-width integers are little-endian, byte strings and element lists are
//! length-prefixed with a little-endian `u64`. It intentionally has nothing to
//! do with `serde`/RPC serialization (see the crate's `serde` derives) — those
//! are ambient conveniences for downstream consumers, while this module is
//! what every `BlockID`/`SiacoinOutputID`/etc. is actually hashed from.
//!
//! Changing the encoding of any type that is hashed anywhere retroactively
//! changes every id derived from it, so new types must have their encoding
//! nailed down before they are ever hashed.

/// Anything that can be written into the canonical hash preimage.
pub trait Encodable {
    fn encode(&self, buf: &mut Vec<u8>);
}

pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

impl Encodable for u8 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }
}

impl Encodable for u64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Encodable for i64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Encodable for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

impl<const N: usize> Encodable for [u8; N] {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

/// A length-prefixed byte string (distinct from a fixed-size array: the
/// length is part of the preimage).
pub fn encode_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
    (bytes.len() as u64).encode(buf);
    buf.extend_from_slice(bytes);
}

/// A length-prefixed list of encodable elements.
pub fn encode_list<T: Encodable>(items: &[T], buf: &mut Vec<u8>) {
    (items.len() as u64).encode(buf);
    for item in items {
        item.encode(buf);
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_list(self, buf);
    }
}

impl<T: Encodable> Encodable for Option<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Some(v) => {
                true.encode(buf);
                v.encode(buf);
            }
            None => false.encode(buf),
        }
    }
}
