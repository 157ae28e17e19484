//! Phone number helpers. A customer's phone number is their loyalty card,
//! so every surface normalizes to the same 10-digit form before touching
//! the database.

/// Strip everything but digits, capped at 10 digits.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(10)
        .collect()
}

/// Format a phone number progressively as `(XXX) XXX-XXXX`.
///
/// Partial input renders as far as the available digits allow, which lets
/// a client format on every keystroke.
pub fn format(input: &str) -> String {
    let digits = normalize(input);
    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Last four digits, for log redaction.
pub fn last_four(digits: &str) -> &str {
    &digits[digits.len().saturating_sub(4)..]
}
