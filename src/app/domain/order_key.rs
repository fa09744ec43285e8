//! Fractional order keys for sibling lists (suite tree, suite items).
//!
//! Keys are strings over `a`..=`z` compared with plain lexicographic ordering.
//! A new key can always be placed between two neighbours without renumbering
//! the rest of the list. Keys produced by [`key_between`] never end in `a`, so
//! there is always room below them.

use thiserror::Error;

const BASE: u8 = 26;
const FLOOR: char = 'a';
const MID: char = 'm';

/// Minimum width of seeded keys.
pub const MIN_KEY_LEN: usize = 3;

/// Longest key ever written. Lists whose tail would grow past this are re-seeded.
pub const MAX_ORDER_KEY_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderKeyError {
    #[error("invalid order key {0:?}")]
    InvalidKey(String),
    #[error("order key bounds out of order: {before:?} must sort before {after:?}")]
    Unordered { before: String, after: String },
    #[error("no order key fits below {0:?}")]
    NoRoom(String),
}

fn digit(c: u8) -> u8 {
    c - b'a'
}

fn char_for(d: u8) -> char {
    (b'a' + d) as char
}

fn check(key: &str) -> Result<(), OrderKeyError> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(OrderKeyError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Key for position `index` of a freshly seeded list: base-26 digits, left-padded with `a`
/// to at least [`MIN_KEY_LEN`] characters.
pub fn key_at(index: usize) -> String {
    key_at_width(index, MIN_KEY_LEN)
}

fn key_at_width(mut index: usize, width: usize) -> String {
    let base = usize::from(BASE);
    let mut digits = Vec::new();
    loop {
        // index % 26 always fits in a u8
        digits.push(char_for((index % base) as u8));
        index /= base;
        if index == 0 {
            break;
        }
    }
    while digits.len() < width {
        digits.push(FLOOR);
    }
    digits.iter().rev().collect()
}

/// `count` keys in ascending order, all padded to the same width so that lexicographic
/// order matches index order even past 26^3 entries. Seeding starts one step above the
/// floor so a key still fits before the first one.
pub fn seed_keys(count: usize) -> Vec<String> {
    let width = key_at(count).len();
    (1..=count).map(|i| key_at_width(i, width)).collect()
}

/// Returns a key strictly between `before` and `after`. `None` means unbounded on that side.
///
/// Repeated insertion into the same gap grows the key by at most one character per call.
pub fn key_between(before: Option<&str>, after: Option<&str>) -> Result<String, OrderKeyError> {
    match (before, after) {
        (None, None) => Ok(MID.to_string()),
        (Some(before), None) => {
            check(before)?;
            Ok(format!("{before}{MID}"))
        }
        (None, Some(after)) => {
            check(after)?;
            key_below(after)
        }
        (Some(before), Some(after)) => {
            check(before)?;
            check(after)?;
            if before >= after {
                return Err(OrderKeyError::Unordered {
                    before: before.to_string(),
                    after: after.to_string(),
                });
            }
            midpoint(before, after)
        }
    }
}

fn key_below(after: &str) -> Result<String, OrderKeyError> {
    let mut key = String::with_capacity(after.len() + 1);
    for c in after.bytes() {
        match digit(c) {
            0 => key.push(FLOOR),
            1 => {
                key.push(FLOOR);
                key.push(MID);
                return Ok(key);
            }
            d => {
                key.push(char_for(d / 2));
                return Ok(key);
            }
        }
    }
    Err(OrderKeyError::NoRoom(after.to_string()))
}

fn midpoint(before: &str, after: &str) -> Result<String, OrderKeyError> {
    let len = before.len().max(after.len());
    let pad = |s: &str| -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(len, FLOOR as u8);
        v
    };
    let (lo, hi) = (pad(before), pad(after));
    if lo == hi {
        return Err(OrderKeyError::NoRoom(after.to_string()));
    }

    let mut key = String::with_capacity(len + 1);
    for (&l, &h) in lo.iter().zip(hi.iter()) {
        let (l, h) = (digit(l), digit(h));
        if h > l + 1 {
            key.push(char_for((l + h) / 2));
            return Ok(key);
        }
        key.push(char_for(l));
    }
    key.push(MID);
    Ok(key)
}

/// Keys to give `count` items appended after the tail of a sibling list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendKeys {
    /// Keys for the new items only; existing keys are untouched.
    Appended(Vec<String>),
    /// The tail would outgrow [`MAX_ORDER_KEY_LEN`]: keys for the whole list,
    /// existing items first (in their current order), then the new items.
    Reseeded(Vec<String>),
}

/// Plan keys for appending `count` items to a list of `existing` items whose greatest key
/// is `last` (`None` for an empty list).
pub fn append_keys(
    last: Option<&str>,
    existing: usize,
    count: usize,
) -> Result<AppendKeys, OrderKeyError> {
    let mut keys: Vec<String> = Vec::with_capacity(count);
    let mut prev = last.map(str::to_string);
    for _ in 0..count {
        let next = key_between(prev.as_deref(), None)?;
        if next.len() > MAX_ORDER_KEY_LEN {
            return Ok(AppendKeys::Reseeded(seed_keys(existing + count)));
        }
        keys.push(next.clone());
        prev = Some(next);
    }
    Ok(AppendKeys::Appended(keys))
}
