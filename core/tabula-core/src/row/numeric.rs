//! Decimal interpretation of stored column values.
//!
//! Stored values are plain byte strings. Numeric comparisons, decimal
//! indices and numeric ordering read them with C `atof` rules: leading
//! whitespace, optional sign, digits with an optional fraction, optional
//! exponent. Whatever follows the longest numeric prefix is ignored and a
//! value with no numeric prefix reads as `0`.

/// Parse the leading decimal number of `value`, `0.0` when there is none.
pub fn parse_decimal(value: &[u8]) -> f64 {
    let start = skip_space(value, 0);
    match numeric_end(value, start) {
        Some(end) => to_f64(&value[start..end]).unwrap_or(0.0),
        None => 0.0,
    }
}

/// Parse `value` only when the whole of it (modulo surrounding whitespace)
/// is a decimal number.
pub fn parse_exact_number(value: &[u8]) -> Option<f64> {
    let start = skip_space(value, 0);
    let end = numeric_end(value, start)?;
    if skip_space(value, end) != value.len() {
        return None;
    }
    to_f64(&value[start..end])
}

fn to_f64(digits: &[u8]) -> Option<f64> {
    std::str::from_utf8(digits).ok()?.parse::<f64>().ok()
}

fn skip_space(value: &[u8], mut pos: usize) -> usize {
    while pos < value.len() && is_c_space(value[pos]) {
        pos += 1;
    }
    pos
}

// isspace() in the C locale also treats \v as whitespace
fn is_c_space(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0x0b
}

/// End offset of the longest `[sign] digits [. digits] [e [sign] digits]`
/// prefix starting at `start`; `None` when the mantissa has no digit.
fn numeric_end(value: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    if matches!(value.get(pos), Some(b'+' | b'-')) {
        pos += 1;
    }

    let int_digits = count_digits(value, pos);
    pos += int_digits;

    let mut frac_digits = 0;
    if value.get(pos) == Some(&b'.') {
        frac_digits = count_digits(value, pos + 1);
        if int_digits + frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(value.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(value.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(value, exp);
        if exp_digits > 0 {
            pos = exp + exp_digits;
        }
    }

    Some(pos)
}

fn count_digits(value: &[u8], from: usize) -> usize {
    value
        .get(from..)
        .map(|rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atof_prefix_rules() {
        assert_eq!(parse_decimal(b"180"), 180.0);
        assert_eq!(parse_decimal(b"  -2.5e2xyz"), -250.0);
        assert_eq!(parse_decimal(b"12abc"), 12.0);
        assert_eq!(parse_decimal(b".5"), 0.5);
        assert_eq!(parse_decimal(b"7."), 7.0);
        assert_eq!(parse_decimal(b"3e"), 3.0);
        assert_eq!(parse_decimal(b"Chopin"), 0.0);
        assert_eq!(parse_decimal(b""), 0.0);
        assert_eq!(parse_decimal(b"-"), 0.0);
        assert_eq!(parse_decimal(b"."), 0.0);
    }

    #[test]
    fn exact_numbers_only() {
        assert_eq!(parse_exact_number(b"180"), Some(180.0));
        assert_eq!(parse_exact_number(b" 1.5 "), Some(1.5));
        assert_eq!(parse_exact_number(b"12abc"), None);
        assert_eq!(parse_exact_number(b""), None);
        assert_eq!(parse_exact_number(b"   "), None);
    }

    #[test]
    fn overflow_is_infinite_not_nan() {
        let n = parse_decimal(b"1e400");
        assert!(n.is_infinite());
        assert!(!n.is_nan());
    }
}
