//! Disk-resident block-index record, keyed by block hash in the store.

use blocktree_consensus::Hash256;
use blocktree_primitives::encoding::{Decoder, Encoder};

use crate::status::BlockStatus;

/// Where a block's payload and undo data live in the flat files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BlockLocation {
    pub file: u32,
    /// Byte offset of the payload itself; the 8-byte magic/length preamble
    /// sits immediately before it.
    pub data_pos: u64,
    pub undo_pos: u64,
}

/// Persisted summary of one block header: position in the tree, storage
/// location, header fields, and derived status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiskBlockIndex {
    pub prev_hash: Hash256,
    pub height: i32,
    pub status: BlockStatus,
    pub tx_count: u64,
    pub location: BlockLocation,
    pub version: i32,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl DiskBlockIndex {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_hash_le(&self.prev_hash);
        encoder.write_i32_le(self.height);
        encoder.write_u32_le(self.status.raw());
        encoder.write_u64_le(self.tx_count);
        encoder.write_u32_le(self.location.file);
        encoder.write_u64_le(self.location.data_pos);
        encoder.write_u64_le(self.location.undo_pos);
        encoder.write_i32_le(self.version);
        encoder.write_hash_le(&self.merkle_root);
        encoder.write_u32_le(self.time);
        encoder.write_u32_le(self.bits);
        encoder.write_u32_le(self.nonce);
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut decoder = Decoder::new(bytes);
        let prev_hash = decoder.read_hash_le().ok()?;
        let height = decoder.read_i32_le().ok()?;
        let status = BlockStatus::from_raw(decoder.read_u32_le().ok()?);
        let tx_count = decoder.read_u64_le().ok()?;
        let file = decoder.read_u32_le().ok()?;
        let data_pos = decoder.read_u64_le().ok()?;
        let undo_pos = decoder.read_u64_le().ok()?;
        let version = decoder.read_i32_le().ok()?;
        let merkle_root = decoder.read_hash_le().ok()?;
        let time = decoder.read_u32_le().ok()?;
        let bits = decoder.read_u32_le().ok()?;
        let nonce = decoder.read_u32_le().ok()?;
        if !decoder.is_empty() {
            return None;
        }
        Some(Self {
            prev_hash,
            height,
            status,
            tx_count,
            location: BlockLocation {
                file,
                data_pos,
                undo_pos,
            },
            version,
            merkle_root,
            time,
            bits,
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::VALID_TRANSACTIONS;

    fn sample() -> DiskBlockIndex {
        DiskBlockIndex {
            prev_hash: [0x11; 32],
            height: 42,
            status: BlockStatus::default()
                .with_validity(VALID_TRANSACTIONS)
                .with_data(),
            tx_count: 7,
            location: BlockLocation {
                file: 3,
                data_pos: 8192,
                undo_pos: 1024,
            },
            version: 4,
            merkle_root: [0x22; 32],
            time: 1_700_000_000,
            bits: 0x1d00ffff,
            nonce: 12345,
        }
    }

    #[test]
    fn record_roundtrip() {
        let record = sample();
        assert_eq!(DiskBlockIndex::decode(&record.encode()), Some(record));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert_eq!(DiskBlockIndex::decode(&bytes), None);
    }

    #[test]
    fn short_record_rejected() {
        let bytes = sample().encode();
        assert_eq!(DiskBlockIndex::decode(&bytes[..bytes.len() - 1]), None);
    }
}
