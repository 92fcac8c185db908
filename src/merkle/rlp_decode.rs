//! RLP splitting primitives.
//!
//! The decode side of the codec works by splitting: each call peels the first
//! item off a buffer and returns its payload together with the remaining
//! bytes. Node decoding is layered on top in `decode`.

use thiserror::Error;

/// Errors raised while splitting RLP input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("rlp: value size exceeds available input length")]
    ValueTooLarge,
    #[error("rlp: input too short")]
    ValueTooShort,
    #[error("rlp: non-canonical size information")]
    NonCanonicalSize,
    #[error("rlp: non-canonical integer format")]
    NonCanonicalInteger,
    #[error("rlp: expected string or byte")]
    ExpectedString,
    #[error("rlp: expected list")]
    ExpectedList,
    #[error("rlp: integer too large")]
    IntegerOverflow,
}

/// The kind of the first RLP item in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A single byte below 0x80, encoded as itself.
    Byte,
    /// A string item.
    Str,
    /// A list item.
    List,
}

/// Reads the kind and size tags of the first item.
///
/// Returns `(kind, tag_size, content_size)`.
fn read_kind(buf: &[u8]) -> Result<(Kind, usize, usize), RlpError> {
    let b = *buf.first().ok_or(RlpError::ValueTooShort)?;
    let (kind, tag_size, content_size) = match b {
        0x00..=0x7f => (Kind::Byte, 0, 1),
        0x80..=0xb7 => {
            let size = (b - 0x80) as usize;
            // A single byte below 0x80 must be encoded as itself.
            if size == 1 && buf.len() > 1 && buf[1] < 0x80 {
                return Err(RlpError::NonCanonicalSize);
            }
            (Kind::Str, 1, size)
        }
        0xb8..=0xbf => {
            let size_len = (b - 0xb7) as usize;
            (Kind::Str, 1 + size_len, read_size(&buf[1..], size_len)?)
        }
        0xc0..=0xf7 => (Kind::List, 1, (b - 0xc0) as usize),
        _ => {
            let size_len = (b - 0xf7) as usize;
            (Kind::List, 1 + size_len, read_size(&buf[1..], size_len)?)
        }
    };
    if content_size > buf.len().saturating_sub(tag_size) {
        return Err(RlpError::ValueTooLarge);
    }
    Ok((kind, tag_size, content_size))
}

/// Decodes a multi-byte size field, enforcing canonical form.
fn read_size(buf: &[u8], size_len: usize) -> Result<usize, RlpError> {
    if buf.len() < size_len {
        return Err(RlpError::ValueTooShort);
    }
    if size_len > core::mem::size_of::<usize>() {
        return Err(RlpError::IntegerOverflow);
    }
    let mut size = 0usize;
    for &byte in &buf[..size_len] {
        size = (size << 8) | byte as usize;
    }
    // Sizes below 56 and leading zero bytes must use the short form.
    if size < 56 || buf[0] == 0 {
        return Err(RlpError::NonCanonicalSize);
    }
    Ok(size)
}

/// Splits off the first item, returning `(kind, payload, rest)`.
pub fn split(buf: &[u8]) -> Result<(Kind, &[u8], &[u8]), RlpError> {
    let (kind, tag_size, content_size) = read_kind(buf)?;
    Ok((
        kind,
        &buf[tag_size..tag_size + content_size],
        &buf[tag_size + content_size..],
    ))
}

/// Splits off the first item, which must be a string (or single byte).
/// Returns `(payload, rest)`.
pub fn split_string(buf: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    match split(buf)? {
        (Kind::List, _, _) => Err(RlpError::ExpectedString),
        (_, content, rest) => Ok((content, rest)),
    }
}

/// Splits off the first item, which must be a list.
/// Returns `(payload, rest)`.
pub fn split_list(buf: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    match split(buf)? {
        (Kind::List, content, rest) => Ok((content, rest)),
        _ => Err(RlpError::ExpectedList),
    }
}

/// Splits off the first item as a canonical unsigned integer.
pub fn split_u64(buf: &[u8]) -> Result<(u64, &[u8]), RlpError> {
    let (content, rest) = split_string(buf)?;
    let value = decode_u64(content)?;
    Ok((value, rest))
}

/// Decodes a big-endian canonical integer payload.
fn decode_u64(content: &[u8]) -> Result<u64, RlpError> {
    if content.len() > 8 {
        return Err(RlpError::IntegerOverflow);
    }
    if content.first() == Some(&0) {
        return Err(RlpError::NonCanonicalInteger);
    }
    let mut value = 0u64;
    for &byte in content {
        value = (value << 8) | byte as u64;
    }
    Ok(value)
}

/// Counts the encoded items in a buffer of concatenated RLP items.
pub fn count_values(mut buf: &[u8]) -> Result<usize, RlpError> {
    let mut count = 0;
    while !buf.is_empty() {
        let (_, tag_size, content_size) = read_kind(buf)?;
        buf = &buf[tag_size + content_size..];
        count += 1;
    }
    Ok(count)
}

/// Length in bytes of the first encoded item, including its size tags.
pub fn item_len(buf: &[u8]) -> Result<usize, RlpError> {
    let (_, tag_size, content_size) = read_kind(buf)?;
    Ok(tag_size + content_size)
}
