//! RLP (Recursive Length Prefix) encoding.
//!
//! RLP is the canonical byte form used for hashing trie nodes and for the
//! on-disk node blobs.

/// RLP encoder for building RLP-encoded data.
///
/// The internal buffer is reusable: `clear` keeps the allocation, which lets
/// the hasher pool encoders across calls.
#[derive(Clone, Debug, Default)]
pub struct RlpEncoder {
    buffer: Vec<u8>,
}

impl RlpEncoder {
    /// Creates a new empty encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates an encoder with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the encoder, keeping its allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Encodes a byte slice as a string item.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            self.buffer.push(bytes[0]);
        } else if bytes.len() < 56 {
            self.buffer.push(0x80 + bytes.len() as u8);
            self.buffer.extend_from_slice(bytes);
        } else {
            let len_bytes = Self::encode_length(bytes.len());
            self.buffer.push(0xb7 + len_bytes.len() as u8);
            self.buffer.extend_from_slice(&len_bytes);
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Encodes an empty string item.
    pub fn encode_empty(&mut self) {
        self.buffer.push(0x80);
    }

    /// Appends already-encoded RLP verbatim. Used for embedded child nodes
    /// whose encoding was produced separately.
    pub fn encode_raw(&mut self, rlp: &[u8]) {
        self.buffer.extend_from_slice(rlp);
    }

    /// Encodes a u64 value as a canonical integer item.
    pub fn encode_u64(&mut self, value: u64) {
        if value == 0 {
            self.buffer.push(0x80);
        } else if value < 0x80 {
            self.buffer.push(value as u8);
        } else {
            let bytes = Self::encode_length(value as usize);
            self.encode_bytes(&bytes);
        }
    }

    /// Starts encoding a list, returning the position of the header byte.
    pub fn start_list(&mut self) -> usize {
        let pos = self.buffer.len();
        self.buffer.push(0); // placeholder header
        pos
    }

    /// Finishes encoding a list started at the given position.
    pub fn finish_list(&mut self, start_pos: usize) {
        let content_len = self.buffer.len() - start_pos - 1;

        if content_len < 56 {
            self.buffer[start_pos] = 0xc0 + content_len as u8;
        } else {
            let len_bytes = Self::encode_length(content_len);
            let header_len = 1 + len_bytes.len();

            // Make room for the longer header and shift the payload right.
            let extra = header_len - 1;
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + extra, 0);
            self.buffer
                .copy_within(start_pos + 1..old_len, start_pos + header_len);

            self.buffer[start_pos] = 0xf7 + len_bytes.len() as u8;
            self.buffer[start_pos + 1..start_pos + header_len].copy_from_slice(&len_bytes);
        }
    }

    /// Encodes a list of items.
    pub fn encode_list<F>(&mut self, encode_items: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.start_list();
        encode_items(self);
        self.finish_list(start);
    }

    /// Encodes the length as big-endian bytes without leading zeros.
    fn encode_length(len: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut n = len;

        if n == 0 {
            return vec![0];
        }

        while n > 0 {
            bytes.push((n & 0xff) as u8);
            n >>= 8;
        }

        bytes.reverse();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_empty_string() {
        let mut enc = RlpEncoder::new();
        enc.encode_empty();
        assert_eq!(enc.as_bytes(), &[0x80]);
    }

    #[test]
    fn encode_single_byte() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&[0x7f]);
        assert_eq!(enc.as_bytes(), &[0x7f]);

        enc.clear();
        enc.encode_bytes(&[0x80]);
        assert_eq!(enc.as_bytes(), &[0x81, 0x80]);
    }

    #[test]
    fn encode_short_string() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(b"dog");
        assert_eq!(enc.as_bytes(), &[0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn encode_long_string() {
        let data = [0xaau8; 60];
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&data);
        assert_eq!(enc.as_bytes()[0], 0xb8);
        assert_eq!(enc.as_bytes()[1], 60);
        assert_eq!(&enc.as_bytes()[2..], &data);
    }

    #[test]
    fn encode_short_list() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_bytes(b"cat");
            e.encode_bytes(b"dog");
        });
        assert_eq!(
            enc.as_bytes(),
            &[0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn encode_long_list_header_shift() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            for _ in 0..20 {
                e.encode_bytes(b"ab");
            }
        });
        // 20 items of 3 bytes each: payload 60 bytes, long-list header.
        assert_eq!(enc.as_bytes()[0], 0xf8);
        assert_eq!(enc.as_bytes()[1], 60);
        assert_eq!(enc.len(), 62);
    }

    #[test]
    fn encode_u64_values() {
        let mut enc = RlpEncoder::new();
        enc.encode_u64(0);
        assert_eq!(enc.as_bytes(), &[0x80]);

        enc.clear();
        enc.encode_u64(127);
        assert_eq!(enc.as_bytes(), &[127]);

        enc.clear();
        enc.encode_u64(256);
        assert_eq!(enc.as_bytes(), &[0x82, 0x01, 0x00]);
    }

    #[test]
    fn encode_raw_passthrough() {
        let mut inner = RlpEncoder::new();
        inner.encode_list(|e| {
            e.encode_bytes(b"k");
            e.encode_bytes(b"v");
        });
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| e.encode_raw(inner.as_bytes()));
        assert_eq!(enc.as_bytes()[1..], *inner.as_bytes());
    }
}
