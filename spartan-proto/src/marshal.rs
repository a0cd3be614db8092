// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Deterministic binary codec.
//!
//! Layout rules:
//! - integers and floats are fixed width, little-endian
//! - `bool` is one byte, 0 or 1
//! - strings, byte blobs and sequences carry a `u32` length prefix
//! - maps are `BTreeMap`s, written in ascending key order
//! - records are their fields in declaration order, no tags or padding
//!
//! Decoding rejects truncated input, oversized length prefixes, invalid
//! UTF-8, out-of-range enum values and non-canonical maps with
//! `SerializationError`.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use spartan_common::id::TileId;
use spartan_common::status::{SpartanError, SpartanResult};

/// A type with a fixed wire encoding.
pub trait Marshal: Sized {
    fn encode(&self, buf: &mut BytesMut);
    fn decode(buf: &mut Bytes) -> SpartanResult<Self>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a complete payload. Trailing bytes are an error.
    fn from_bytes(mut bytes: Bytes) -> SpartanResult<Self> {
        let value = Self::decode(&mut bytes)?;
        if bytes.has_remaining() {
            return Err(SpartanError::serialization_error(format!(
                "{} trailing bytes after {}",
                bytes.remaining(),
                std::any::type_name::<Self>()
            )));
        }
        Ok(value)
    }
}

/// Generates a field-by-field `Marshal` impl. Encoder and decoder share the
/// one field list, so they cannot drift apart.
macro_rules! impl_marshal {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::marshal::Marshal for $name {
            fn encode(&self, buf: &mut ::bytes::BytesMut) {
                $( $crate::marshal::Marshal::encode(&self.$field, buf); )+
            }

            fn decode(
                buf: &mut ::bytes::Bytes,
            ) -> ::spartan_common::status::SpartanResult<Self> {
                Ok(Self {
                    $( $field: $crate::marshal::Marshal::decode(buf)?, )+
                })
            }
        }
    };
}
pub(crate) use impl_marshal;

fn need(buf: &Bytes, len: usize, what: &str) -> SpartanResult<()> {
    if buf.remaining() < len {
        return Err(SpartanError::serialization_error(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) {
    debug_assert!(len <= u32::MAX as usize, "length {len} exceeds wire limit");
    buf.put_u32_le(len as u32);
}

fn get_len(buf: &mut Bytes, what: &str) -> SpartanResult<usize> {
    need(buf, 4, what)?;
    Ok(buf.get_u32_le() as usize)
}

macro_rules! impl_marshal_number {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Marshal for $ty {
            fn encode(&self, buf: &mut BytesMut) {
                buf.$put(*self);
            }

            fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
                need(buf, std::mem::size_of::<$ty>(), stringify!($ty))?;
                Ok(buf.$get())
            }
        }
    };
}

impl_marshal_number!(i8, put_i8, get_i8);
impl_marshal_number!(i32, put_i32_le, get_i32_le);
impl_marshal_number!(i64, put_i64_le, get_i64_le);
impl_marshal_number!(f64, put_f64_le, get_f64_le);

impl Marshal for bool {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i8(i8::from(*self));
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        match i8::decode(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SpartanError::serialization_error(format!(
                "invalid bool byte {other}"
            ))),
        }
    }
}

impl Marshal for Bytes {
    fn encode(&self, buf: &mut BytesMut) {
        put_len(buf, self.len());
        buf.put_slice(self);
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        let len = get_len(buf, "bytes length")?;
        need(buf, len, "bytes body")?;
        Ok(buf.split_to(len))
    }
}

impl Marshal for String {
    fn encode(&self, buf: &mut BytesMut) {
        put_len(buf, self.len());
        buf.put_slice(self.as_bytes());
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        let raw = Bytes::decode(buf)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| SpartanError::serialization_error(format!("invalid UTF-8: {e}")))
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        put_len(buf, self.len());
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        let count = get_len(buf, "sequence length")?;
        // Every element takes at least one byte; cap the preallocation so a
        // hostile count cannot reserve unbounded memory.
        let mut items = Vec::with_capacity(count.min(buf.remaining()));
        for _ in 0..count {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

impl<K: Marshal + Ord, V: Marshal> Marshal for BTreeMap<K, V> {
    fn encode(&self, buf: &mut BytesMut) {
        put_len(buf, self.len());
        for (key, value) in self {
            key.encode(buf);
            value.encode(buf);
        }
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        let count = get_len(buf, "map length")?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::decode(buf)?;
            let value = V::decode(buf)?;
            if map.last_key_value().is_some_and(|(last, _)| *last >= key) {
                return Err(SpartanError::serialization_error(
                    "map keys not in ascending order",
                ));
            }
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl Marshal for TileId {
    fn encode(&self, buf: &mut BytesMut) {
        self.worker.encode(buf);
        self.local_id.encode(buf);
    }

    fn decode(buf: &mut Bytes) -> SpartanResult<Self> {
        let worker = i32::decode(buf)?;
        let local_id = i32::decode(buf)?;
        Ok(TileId::new(worker, local_id))
    }
}
