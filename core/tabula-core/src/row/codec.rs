//! Row Codec — byte-exact row serialization.
//!
//! A row is stored as a flat sequence of `(name, value)` pairs. Each byte
//! string is prefixed by its length as an unsigned LEB128 varint, so names
//! and values may contain any byte, including NUL.
//!
//! Rows are persisted inside a record frame: an 8-byte big-endian scan
//! sequence number followed by the encoded row. The sequence number fixes
//! the row's position in full-table scans.

use crate::error::{TabulaError, TabulaResult};
use crate::row::Row;

/// Length of the record frame header (scan sequence number).
pub(crate) const FRAME_HEADER_LEN: usize = 8;

/// Encode a row into its stored byte form.
pub fn encode_row(row: &Row) -> Vec<u8> {
    let payload: usize = row.iter().map(|(n, v)| n.len() + v.len() + 4).sum();
    let mut buf = Vec::with_capacity(payload);
    for (name, value) in row.iter() {
        write_varint(&mut buf, name.len() as u64);
        buf.extend_from_slice(name);
        write_varint(&mut buf, value.len() as u64);
        buf.extend_from_slice(value);
    }
    buf
}

/// Decode a stored row.
///
/// Truncated input and empty column names are reported as
/// [`TabulaError::Corrupted`].
pub fn decode_row(bytes: &[u8]) -> TabulaResult<Row> {
    let mut row = Row::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let name = read_chunk(bytes, &mut pos)?;
        if name.is_empty() {
            return Err(TabulaError::Corrupted(format!(
                "empty column name at offset {pos}"
            )));
        }
        let value = read_chunk(bytes, &mut pos)?;
        row.set(name, value);
    }
    Ok(row)
}

/// Wrap an encoded row into a record frame.
pub(crate) fn frame(seq: u64, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(body);
    buf
}

/// Split a record frame into `(seq, encoded row)`.
pub(crate) fn unframe(record: &[u8]) -> TabulaResult<(u64, &[u8])> {
    if record.len() < FRAME_HEADER_LEN {
        return Err(TabulaError::Corrupted(format!(
            "record frame of {} bytes is shorter than its header",
            record.len()
        )));
    }
    let (header, body) = record.split_at(FRAME_HEADER_LEN);
    let mut seq = [0u8; FRAME_HEADER_LEN];
    seq.copy_from_slice(header);
    Ok((u64::from_be_bytes(seq), body))
}

fn read_chunk(bytes: &[u8], pos: &mut usize) -> TabulaResult<Vec<u8>> {
    let len = read_varint(bytes, pos)? as usize;
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            TabulaError::Corrupted(format!(
                "chunk of {len} bytes at offset {pos} overruns {} byte row",
                bytes.len()
            ))
        })?;
    let chunk = bytes[*pos..end].to_vec();
    *pos = end;
    Ok(chunk)
}

fn write_varint(buf: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        buf.push((n as u8) | 0x80);
        n >>= 7;
    }
    buf.push(n as u8);
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> TabulaResult<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| TabulaError::Corrupted("truncated length prefix".to_string()))?;
        *pos += 1;
        if shift >= 64 {
            return Err(TabulaError::Corrupted("length prefix overflow".to_string()));
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_nul_bytes() {
        let row = Row::new()
            .with(b"\0a".to_vec(), b"a\0".to_vec())
            .with("profession", "poser");
        let decoded = decode_row(&encode_row(&row)).unwrap();
        assert_eq!(decoded, row);
        let names: Vec<&[u8]> = decoded.column_names().collect();
        assert_eq!(names, vec![b"\0a".as_slice(), b"profession".as_slice()]);
    }

    #[test]
    fn empty_values_and_rows() {
        let row = Row::new().with("empty", "");
        assert_eq!(decode_row(&encode_row(&row)).unwrap(), row);
        assert!(encode_row(&Row::new()).is_empty());
        assert!(decode_row(&[]).unwrap().is_empty());
    }

    #[test]
    fn long_values_use_multibyte_prefix() {
        let value = vec![b'x'; 300];
        let row = Row::new().with("blob", value.clone());
        let encoded = encode_row(&row);
        // 1-byte name prefix + name + 2-byte value prefix + value
        assert_eq!(encoded.len(), 1 + 4 + 2 + 300);
        assert_eq!(decode_row(&encoded).unwrap().get("blob"), Some(value.as_slice()));
    }

    #[test]
    fn truncated_input_is_corrupted() {
        let encoded = encode_row(&Row::new().with("name", "Chopin"));
        let err = decode_row(&encoded[..encoded.len() - 2]).unwrap_err();
        assert!(matches!(err, TabulaError::Corrupted(_)));
    }

    #[test]
    fn empty_name_is_corrupted() {
        // name length 0, value length 1
        let err = decode_row(&[0x00, 0x01, b'x']).unwrap_err();
        assert!(matches!(err, TabulaError::Corrupted(_)));
    }

    #[test]
    fn frame_roundtrip() {
        let framed = frame(42, b"body");
        let (seq, body) = unframe(&framed).unwrap();
        assert_eq!(seq, 42);
        assert_eq!(body, b"body");
        assert!(unframe(&[1, 2, 3]).is_err());
    }
}
