//! CPF (Brazilian taxpayer id) checks.
//!
//! The identifier is used as the enrollment identity key; the checksum is the
//! validity gate applied by the finalization worker.

/// Keep only the ASCII digits of `value`.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `true` when `value` is laid out as `DDD.DDD.DDD-DD`.
pub fn is_display_format(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 14
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            3 | 7 => *byte == b'.',
            11 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Validate both check digits. Never panics; any input that is not eleven
/// digits once punctuation is removed is simply invalid.
pub fn is_valid(identifier: &str) -> bool {
    let digits: Vec<u32> = identifier.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let dv1 = check_digit(weighted_sum(&digits[..9], 10));
    if dv1 != digits[9] {
        return false;
    }

    let dv2 = check_digit(weighted_sum(&digits[..9], 11) + dv1 * 2);
    dv2 == digits[10]
}

fn weighted_sum(digits: &[u32], first_weight: u32) -> u32 {
    digits
        .iter()
        .zip((0..first_weight).rev())
        .map(|(digit, offset)| digit * (offset + 1))
        .sum()
}

fn check_digit(sum: u32) -> u32 {
    match (sum * 10) % 11 {
        10 => 0,
        dv => dv,
    }
}
