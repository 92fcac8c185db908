//! Node decoding.
//!
//! Parses the canonical RLP form of trie nodes back into the in-memory model,
//! dispatching on the element count of the outer list (2 for short, 17 for
//! full). Failures carry a stack of enclosing contexts for diagnostics.

use std::fmt;

use primitive_types::H256;

use super::node::{FullNode, Node, NodeFlag, ShortNode, HASH_SIZE};
use super::rlp_decode::{count_values, split, split_list, split_string, Kind, RlpError};
use crate::data::nibbles::{compact_to_hex, has_term};

/// A malformed node serialization, with the path of enclosing decode
/// contexts (innermost first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
    stack: Vec<String>,
}

impl DecodeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    fn context(mut self, ctx: impl Into<String>) -> Self {
        self.stack.push(ctx.into());
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stack.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (decode path: {})", self.message, self.stack.join(" <- "))
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<RlpError> for DecodeError {
    fn from(err: RlpError) -> Self {
        Self::new(err.to_string())
    }
}

/// Parses the RLP encoding of a trie node.
///
/// `hash` is the digest the blob was retrieved under and seeds the decoded
/// node's cache flag; embedded nodes are decoded with no hash. The input is
/// copied into an owned tree, so the buffer may be reused afterwards.
pub fn decode_node(hash: Option<H256>, buf: &[u8]) -> Result<Node, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::new("unexpected end of input"));
    }
    let (elems, _) = split_list(buf)?;
    match count_values(elems)? {
        2 => decode_short(hash, elems).map_err(|e| e.context("short")),
        17 => decode_full(hash, elems).map_err(|e| e.context("full")),
        n => Err(DecodeError::new(format!(
            "invalid number of list elements: {n}"
        ))),
    }
}

fn decode_short(hash: Option<H256>, elems: &[u8]) -> Result<Node, DecodeError> {
    let (kbuf, rest) = split_string(elems)?;
    let flags = NodeFlag::decoded(hash);
    let key = compact_to_hex(kbuf);
    if has_term(&key) {
        // The key terminates here, so the child is an inline value.
        let (val, _) = split_string(rest)
            .map_err(|e| DecodeError::new(format!("invalid value node: {e}")))?;
        return Ok(Node::Short(Box::new(ShortNode {
            key,
            val: Node::Value(val.to_vec()),
            flags,
        })));
    }
    let (child, _) = decode_ref(rest).map_err(|e| e.context("val"))?;
    let val = child.ok_or_else(|| DecodeError::new("empty child reference in short node"))?;
    Ok(Node::Short(Box::new(ShortNode { key, val, flags })))
}

fn decode_full(hash: Option<H256>, elems: &[u8]) -> Result<Node, DecodeError> {
    let mut node = FullNode {
        children: Default::default(),
        flags: NodeFlag::decoded(hash),
    };
    let mut elems = elems;
    for i in 0..16 {
        let (child, rest) = decode_ref(elems).map_err(|e| e.context(format!("[{i}]")))?;
        node.children[i] = child;
        elems = rest;
    }
    let (val, _) = split_string(elems)?;
    if !val.is_empty() {
        node.children[16] = Some(Node::Value(val.to_vec()));
    }
    Ok(Node::Full(Box::new(node)))
}

/// Decodes one child reference: an embedded list (at most 32 encoded bytes),
/// an empty string (no child), or a 32-byte string (hash reference).
fn decode_ref(buf: &[u8]) -> Result<(Option<Node>, &[u8]), DecodeError> {
    let (kind, val, rest) = split(buf)?;
    match kind {
        Kind::List => {
            let size = buf.len() - rest.len();
            if size > HASH_SIZE {
                return Err(DecodeError::new(format!(
                    "oversized embedded node (size is {size} bytes, want size < {HASH_SIZE})"
                )));
            }
            let node = decode_node(None, &buf[..size])?;
            Ok((Some(node), rest))
        }
        _ if val.is_empty() => Ok((None, rest)),
        _ if val.len() == HASH_SIZE => Ok((Some(Node::Hash(H256::from_slice(val))), rest)),
        _ => Err(DecodeError::new(format!(
            "invalid RLP string size {} (want 0 or 32)",
            val.len()
        ))),
    }
}
