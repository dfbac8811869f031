//! Index entry encodings.
//!
//! Text is stored memcomparable: `0x00` is escaped as `00 FF` and the value
//! is terminated by `00 01`, so encoded values never prefix one another and
//! byte order is preserved. Decimals are 8 big-endian bytes with the sign
//! bit flipped (negative values fully inverted).

use crate::index::IndexType;
use crate::row::numeric::parse_decimal;
use smallvec::SmallVec;

/// Q-gram width in bytes.
pub const GRAM: usize = 3;

const ESCAPE: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Escape a text value without terminating it (for prefix probes).
pub fn escape_text(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 2);
    for &b in value {
        out.push(b);
        if b == 0x00 {
            out.push(ESCAPE);
        }
    }
    out
}

/// Full order-preserving encoding of a text value.
pub fn encode_text(value: &[u8]) -> Vec<u8> {
    let mut out = escape_text(value);
    out.push(0x00);
    out.push(TERMINATOR);
    out
}

/// Order-preserving encoding of a decimal.
pub fn encode_decimal(n: f64) -> [u8; 8] {
    // -0.0 and 0.0 compare equal, so they must encode equal
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
    ordered.to_be_bytes()
}

/// Distinct tokens of a value, split on ASCII whitespace and commas.
pub fn tokens(value: &[u8]) -> SmallVec<[&[u8]; 8]> {
    let mut out: SmallVec<[&[u8]; 8]> = SmallVec::new();
    for token in value.split(|b| b.is_ascii_whitespace() || *b == b',') {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Distinct q-grams of a value; none when it is shorter than [`GRAM`].
pub fn qgrams(value: &[u8]) -> SmallVec<[&[u8]; 16]> {
    let mut out: SmallVec<[&[u8]; 16]> = SmallVec::new();
    for gram in value.windows(GRAM) {
        if !out.contains(&gram) {
            out.push(gram);
        }
    }
    out
}

/// Entry prefixes a column value contributes to an index of `kind`.
pub(crate) fn value_prefixes(kind: IndexType, value: &[u8]) -> SmallVec<[Vec<u8>; 4]> {
    match kind {
        IndexType::Lexical => smallvec::smallvec![encode_text(value)],
        IndexType::Decimal => smallvec::smallvec![encode_decimal(parse_decimal(value)).to_vec()],
        IndexType::Token => tokens(value).into_iter().map(encode_text).collect(),
        IndexType::QGram => qgrams(value).into_iter().map(<[u8]>::to_vec).collect(),
    }
}

/// Entry key: encoded value followed by the row key.
pub(crate) fn entry_key(prefix: &[u8], row_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + row_key.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(row_key);
    key
}

/// Keyspace holding the entries of the index on `column`.
pub(crate) fn keyspace_name(column: &[u8]) -> String {
    let mut name = String::with_capacity(6 + column.len() * 2);
    name.push_str("index/");
    for b in column {
        name.push_str(&format!("{b:02x}"));
    }
    name
}
