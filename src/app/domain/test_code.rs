/// Prefix of codes allocated from the project counter.
pub const TEST_CODE_PREFIX: &str = "TC";

/// Code for counter value `n`, e.g. `TC-12`.
pub fn format_test_code(n: i64) -> String {
    format!("{}-{}", TEST_CODE_PREFIX, n)
}

/// Numeric part of a code: the digits after the last `-` (or the whole code).
/// Returns None for codes without a numeric tail.
pub fn code_number(code: &str) -> Option<i64> {
    let tail = code.rsplit('-').next()?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}
