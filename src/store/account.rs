//! Account records.
//!
//! The trie database only understands accounts far enough to link a storage
//! trie to its owning account node at update time: leaf blobs of the account
//! trie decode to this record and the storage root is pulled out of it.

use primitive_types::{H256, U256};

use crate::merkle::decode::DecodeError;
use crate::merkle::rlp_decode::{split_list, split_string, split_u64};
use crate::merkle::{RlpEncoder, EMPTY_ROOT, HASH_SIZE};

/// Hash of empty account code, keccak256 of no bytes.
pub const EMPTY_CODE_HASH: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
]);

/// An account as stored in the top-level trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Account {
    /// Creates an account with no balance, no code and an empty storage trie.
    pub fn empty() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_ROOT,
            code_hash: EMPTY_CODE_HASH,
        }
    }

    /// RLP encodes the account.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_u64(self.nonce);
            let balance = self.balance.to_big_endian();
            let trimmed: Vec<u8> = balance.iter().skip_while(|&&b| b == 0).copied().collect();
            e.encode_bytes(&trimmed);
            e.encode_bytes(self.storage_root.as_bytes());
            e.encode_bytes(self.code_hash.as_bytes());
        });
        enc.into_bytes()
    }

    /// Decodes an account from its RLP form.
    pub fn decode(blob: &[u8]) -> Result<Self, DecodeError> {
        let (elems, _) = split_list(blob)?;
        let (nonce, rest) = split_u64(elems)?;
        let (balance, rest) = split_string(rest)?;
        if balance.len() > 32 {
            return Err(DecodeError::new("account balance exceeds 32 bytes"));
        }
        let (root, rest) = split_string(rest)?;
        let (code_hash, _) = split_string(rest)?;
        if root.len() != HASH_SIZE || code_hash.len() != HASH_SIZE {
            return Err(DecodeError::new("account hash field is not 32 bytes"));
        }
        Ok(Self {
            nonce,
            balance: U256::from_big_endian(balance),
            storage_root: H256::from_slice(root),
            code_hash: H256::from_slice(code_hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let account = Account {
            nonce: 42,
            balance: U256::from(1_000_000_007u64),
            storage_root: H256::repeat_byte(0xaa),
            code_hash: EMPTY_CODE_HASH,
        };
        assert_eq!(Account::decode(&account.encode()).unwrap(), account);
    }

    #[test]
    fn empty_account_roundtrip() {
        let account = Account::empty();
        let decoded = Account::decode(&account.encode()).unwrap();
        assert_eq!(decoded, account);
        assert_eq!(decoded.storage_root, EMPTY_ROOT);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Account::decode(&[0x01, 0x02]).is_err());
        assert!(Account::decode(&[]).is_err());
    }
}
