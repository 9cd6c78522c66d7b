// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Binary TLV codec and file envelope (spec §4.8).
//!
//! A chunk is `uvlq64 size ∥ u8 type ∥ size bytes of payload`. A file is a
//! fixed 20-byte envelope followed by exactly one expression chunk, plus any
//! number of auxiliary chunks with unrecognized type codes, which are
//! skipped rather than rejected.

use bytes::Bytes;
use wexpr_types::{Error, ErrorKind, Expression, ExpressionMap};

use crate::uvlq64;

const TYPE_NULL: u8 = 0x00;
const TYPE_VALUE: u8 = 0x01;
const TYPE_ARRAY: u8 = 0x02;
const TYPE_MAP: u8 = 0x03;
const TYPE_BINARY_DATA: u8 = 0x04;

const MAGIC_START: u8 = 0x83;
const MAGIC_ASCII: &[u8; 6] = b"BWEXPR";
const MAGIC_NEWLINE: u8 = 0x0A;
const FILE_VERSION: u32 = 0x0000_1000;
const ENVELOPE_LEN: usize = 20;

fn chunk_not_big_enough() -> Error {
    Error::binary(ErrorKind::BinaryChunkNotBigEnough, "chunk not big enough for header")
}

/// Write `expr` as a single chunk, appending to `out`.
fn write_chunk(expr: &Expression, out: &mut Vec<u8>) {
    match expr {
        Expression::Null => {
            uvlq64::write_to_vec(out, 0);
            out.push(TYPE_NULL);
        }
        Expression::Value(v) => {
            let bytes = v.as_bytes();
            uvlq64::write_to_vec(out, bytes.len() as u64);
            out.push(TYPE_VALUE);
            out.extend_from_slice(bytes);
        }
        Expression::Array(items) => {
            let mut payload = Vec::new();
            for item in items {
                write_chunk(item, &mut payload);
            }
            uvlq64::write_to_vec(out, payload.len() as u64);
            out.push(TYPE_ARRAY);
            out.extend_from_slice(&payload);
        }
        Expression::Map(map) => {
            let mut payload = Vec::new();
            for (key, value) in map.iter() {
                write_chunk(&Expression::value(key), &mut payload);
                write_chunk(value, &mut payload);
            }
            uvlq64::write_to_vec(out, payload.len() as u64);
            out.push(TYPE_MAP);
            out.extend_from_slice(&payload);
        }
        Expression::BinaryData(data) => {
            let mut payload = Vec::with_capacity(1 + data.len());
            payload.push(0x00); // compression: raw, the only defined method
            payload.extend_from_slice(data);
            uvlq64::write_to_vec(out, payload.len() as u64);
            out.push(TYPE_BINARY_DATA);
            out.extend_from_slice(&payload);
        }
    }
}

/// Read one chunk from the front of `data`.
///
/// Returns the parsed expression and the number of bytes consumed.
fn read_chunk(data: &[u8]) -> Result<(Expression, usize), Error> {
    if data.len() < 2 {
        return Err(chunk_not_big_enough());
    }

    let (size, size_len) = uvlq64::read(data).ok_or_else(chunk_not_big_enough)?;
    if data.len() <= size_len {
        return Err(chunk_not_big_enough());
    }
    let chunk_type = data[size_len];
    let header_len = size_len + 1;
    let size = size as usize;

    if header_len + size > data.len() {
        return Err(Error::binary(
            ErrorKind::BinaryChunkBiggerThanData,
            "chunk size extends past the available data",
        ));
    }
    let payload = &data[header_len..header_len + size];

    let expr = match chunk_type {
        TYPE_NULL => Expression::Null,
        TYPE_VALUE => Expression::Value(
            String::from_utf8(payload.to_vec())
                .map_err(|_| Error::binary(ErrorKind::InvalidUTF8, "value chunk is not valid UTF-8"))?,
        ),
        TYPE_ARRAY => {
            let mut items = Vec::new();
            let mut pos = 0;
            while pos < payload.len() {
                let (child, consumed) = read_chunk(&payload[pos..])?;
                items.push(child);
                pos += consumed;
            }
            Expression::Array(items)
        }
        TYPE_MAP => {
            let mut map = ExpressionMap::new();
            let mut pos = 0;
            while pos < payload.len() {
                let (key_expr, key_consumed) = read_chunk(&payload[pos..])?;
                pos += key_consumed;
                let key = key_expr
                    .as_value()
                    .ok_or_else(|| Error::binary(ErrorKind::BinaryChunkNotBigEnough, "map key chunk must be a value"))?
                    .to_owned();

                let (value_expr, value_consumed) = read_chunk(&payload[pos..])?;
                pos += value_consumed;
                map.set(key, value_expr);
            }
            Expression::Map(map)
        }
        TYPE_BINARY_DATA => {
            if payload.is_empty() {
                return Err(chunk_not_big_enough());
            }
            let compression = payload[0];
            if compression != 0x00 {
                return Err(Error::binary(ErrorKind::BinaryUnknownCompression, "unknown compression method to use"));
            }
            Expression::BinaryData(Bytes::copy_from_slice(&payload[1..]))
        }
        _ => return Err(Error::binary(ErrorKind::BinaryChunkNotBigEnough, "unknown chunk type to read")),
    };

    Ok((expr, header_len + size))
}

/// Encode `expr` as a single standalone chunk (no file envelope).
pub fn write_chunk_bytes(expr: &Expression) -> Vec<u8> {
    let mut out = Vec::new();
    write_chunk(expr, &mut out);
    out
}

/// Decode a single chunk, with no file envelope, ignoring trailing bytes.
pub fn read_chunk_bytes(data: &[u8]) -> Result<Expression, Error> {
    read_chunk(data).map(|(expr, _)| expr)
}

/// Write `expr` as a complete binary file: the 20-byte envelope followed by
/// one expression chunk.
pub fn write_file(expr: &Expression) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_LEN + 32);
    out.push(MAGIC_START);
    out.extend_from_slice(MAGIC_ASCII);
    out.push(MAGIC_NEWLINE);
    out.extend_from_slice(&FILE_VERSION.to_be_bytes());
    out.extend_from_slice(&[0u8; 8]);
    write_chunk(expr, &mut out);
    out
}

/// Read a complete binary file: validate the envelope, then read exactly one
/// expression chunk, skipping any auxiliary chunks with unrecognized type
/// codes along the way.
pub fn read_file(data: &[u8]) -> Result<Expression, Error> {
    if data.len() < ENVELOPE_LEN {
        return Err(Error::binary(ErrorKind::BinaryInvalidHeader, "binary envelope is shorter than the file header"));
    }
    if data[0] != MAGIC_START || &data[1..7] != MAGIC_ASCII || data[7] != MAGIC_NEWLINE {
        return Err(Error::binary(ErrorKind::BinaryInvalidHeader, "binary file header has an invalid magic"));
    }

    let version = u32::from_be_bytes(data[8..12].try_into().unwrap());
    if version != FILE_VERSION {
        return Err(Error::binary(ErrorKind::BinaryUnknownVersion, "binary file has an unsupported version"));
    }
    if data[12..20].iter().any(|&b| b != 0) {
        return Err(Error::binary(ErrorKind::BinaryInvalidHeader, "binary file header's reserved bytes must be zero"));
    }

    let mut pos = ENVELOPE_LEN;
    let mut found = None;

    while pos < data.len() {
        let (size, size_len) = uvlq64::read(&data[pos..]).ok_or_else(chunk_not_big_enough)?;
        if pos + size_len >= data.len() {
            return Err(chunk_not_big_enough());
        }
        let chunk_type = data[pos + size_len];
        let total = size_len + 1 + size as usize;
        if pos + total > data.len() {
            return Err(Error::binary(
                ErrorKind::BinaryChunkBiggerThanData,
                "chunk size extends past the available data",
            ));
        }

        if (TYPE_NULL..=TYPE_BINARY_DATA).contains(&chunk_type) {
            if found.is_some() {
                return Err(Error::binary(
                    ErrorKind::BinaryMultipleExpressions,
                    "binary envelope contains more than one expression chunk",
                ));
            }
            let (expr, consumed) = read_chunk(&data[pos..])?;
            found = Some(expr);
            pos += consumed;
        } else {
            log::warn!("skipping unknown auxiliary binary chunk (type {chunk_type:#04x})");
            pos += total;
        }
    }

    found.ok_or_else(|| Error::binary(ErrorKind::BinaryChunkNotBigEnough, "binary envelope contained no expression chunk"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tree_to_binary_to_tree_is_structurally_equal() {
        let mut inner = ExpressionMap::new();
        inner.set("id", Expression::value("1"));
        inner.set("payload", Expression::binary_data(b"\x00\x01\xff".to_vec()));
        inner.set("children", Expression::array());

        let mut outer = Expression::array();
        outer.array_append(Expression::Map(inner));
        outer.array_append(Expression::null());
        outer.array_append(Expression::value("trailing"));

        let bytes = write_file(&outer);
        let decoded = read_file(&bytes).unwrap();
        assert_eq!(outer, decoded);
    }

    #[test]
    fn round_trips_array_of_values() {
        let mut arr = Expression::array();
        arr.array_append(Expression::value("1"));
        arr.array_append(Expression::value("2"));
        arr.array_append(Expression::value("3"));

        let bytes = write_file(&arr);
        assert_eq!(bytes[8..12], FILE_VERSION.to_be_bytes());
        assert_eq!(bytes[ENVELOPE_LEN], TYPE_ARRAY);

        let decoded = read_file(&bytes).unwrap();
        assert_eq!(decoded.array_count(), 3);
        assert_eq!(decoded.array_at(0).unwrap().as_value(), Some("1"));
    }

    #[test]
    fn round_trips_map_and_binary_data() {
        let mut map = ExpressionMap::new();
        map.set("key", Expression::binary_data(b"\x00\x01\xff".to_vec()));
        let expr = Expression::Map(map);

        let bytes = write_file(&expr);
        let decoded = read_file(&bytes).unwrap();
        assert_eq!(
            decoded.map_get("key").unwrap().as_binary_data().unwrap().as_ref(),
            &[0x00, 0x01, 0xff]
        );
    }

    #[test]
    fn short_envelope_is_rejected() {
        assert_eq!(read_file(&[0u8; 10]).unwrap_err().kind, ErrorKind::BinaryInvalidHeader);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write_file(&Expression::null());
        bytes[0] = 0x00;
        assert_eq!(read_file(&bytes).unwrap_err().kind, ErrorKind::BinaryInvalidHeader);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = write_file(&Expression::null());
        bytes[8..12].copy_from_slice(&0x00002000u32.to_be_bytes());
        assert_eq!(read_file(&bytes).unwrap_err().kind, ErrorKind::BinaryUnknownVersion);
    }

    #[test]
    fn chunk_bigger_than_data_is_rejected() {
        let mut bytes = write_file(&Expression::value("hi"));
        let last = bytes.len() - 1;
        bytes.truncate(last);
        assert_eq!(read_file(&bytes).unwrap_err().kind, ErrorKind::BinaryChunkBiggerThanData);
    }

    #[test]
    fn standalone_chunk_round_trip() {
        let expr = Expression::value("standalone");
        let bytes = write_chunk_bytes(&expr);
        assert_eq!(read_chunk_bytes(&bytes).unwrap().as_value(), Some("standalone"));
    }
}
