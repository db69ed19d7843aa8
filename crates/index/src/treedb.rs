//! Typed wrapper over the index store: block-index cursor, reindexing flag,
//! last-file counter, and per-file statistics records.

use blocktree_consensus::Hash256;
use blocktree_primitives::encoding::{Decoder, Encoder};
use blocktree_storage::{Column, KeyValueStore, PrefixVisitor, StoreError};

pub const META_REINDEXING_KEY: &[u8] = b"reindexing";
pub const META_LAST_BLOCK_FILE_KEY: &[u8] = b"last_block_file";

/// Aggregate statistics for one `blkNNNNN.dat` file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BlockFileInfo {
    pub blocks: u32,
    pub size: u64,
    pub height_first: i32,
    pub height_last: i32,
    pub time_first: u32,
    pub time_last: u32,
}

impl BlockFileInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_u32_le(self.blocks);
        encoder.write_u64_le(self.size);
        encoder.write_i32_le(self.height_first);
        encoder.write_i32_le(self.height_last);
        encoder.write_u32_le(self.time_first);
        encoder.write_u32_le(self.time_last);
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut decoder = Decoder::new(bytes);
        let blocks = decoder.read_u32_le().ok()?;
        let size = decoder.read_u64_le().ok()?;
        let height_first = decoder.read_i32_le().ok()?;
        let height_last = decoder.read_i32_le().ok()?;
        let time_first = decoder.read_u32_le().ok()?;
        let time_last = decoder.read_u32_le().ok()?;
        if !decoder.is_empty() {
            return None;
        }
        Some(Self {
            blocks,
            size,
            height_first,
            height_last,
            time_first,
            time_last,
        })
    }
}

pub fn block_file_info_key(file: u32) -> [u8; 4] {
    file.to_le_bytes()
}

/// Block-tree database: the persisted side of the block-index graph.
pub struct BlockTreeDb<S> {
    store: S,
}

impl<S> BlockTreeDb<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore> BlockTreeDb<S> {
    /// Visits every block-index record in ascending hash order.
    pub fn for_each_index_record<'a>(
        &self,
        visitor: &mut PrefixVisitor<'a>,
    ) -> Result<(), StoreError> {
        self.store.for_each_prefix(Column::BlockIndex, &[], visitor)
    }

    pub fn read_index_record(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(Column::BlockIndex, hash)
    }

    /// The reindexing marker is an existence flag: present means a reindex
    /// was in progress when the process stopped.
    pub fn read_reindexing(&self) -> Result<bool, StoreError> {
        self.store.exists(Column::Meta, META_REINDEXING_KEY)
    }

    pub fn write_reindexing(&self, reindexing: bool) -> Result<(), StoreError> {
        if reindexing {
            self.store.put(Column::Meta, META_REINDEXING_KEY, b"1")
        } else {
            self.store.delete(Column::Meta, META_REINDEXING_KEY)
        }
    }

    pub fn read_last_block_file(&self) -> Result<Option<u32>, StoreError> {
        let bytes = match self.store.get(Column::Meta, META_LAST_BLOCK_FILE_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let raw: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Backend("invalid last block file record".to_string()))?;
        Ok(Some(u32::from_le_bytes(raw)))
    }

    pub fn write_last_block_file(&self, file: u32) -> Result<(), StoreError> {
        self.store
            .put(Column::Meta, META_LAST_BLOCK_FILE_KEY, &file.to_le_bytes())
    }

    pub fn read_block_file_info(&self, file: u32) -> Result<Option<BlockFileInfo>, StoreError> {
        let bytes = match self.store.get(Column::FileInfo, &block_file_info_key(file))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        BlockFileInfo::decode(&bytes)
            .ok_or_else(|| StoreError::Backend("invalid block file info record".to_string()))
            .map(Some)
    }

    pub fn write_block_file_info(
        &self,
        file: u32,
        info: &BlockFileInfo,
    ) -> Result<(), StoreError> {
        self.store
            .put(Column::FileInfo, &block_file_info_key(file), &info.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocktree_storage::memory::MemoryStore;

    #[test]
    fn reindexing_flag_roundtrip() {
        let db = BlockTreeDb::new(MemoryStore::new());
        assert!(!db.read_reindexing().expect("read"));
        db.write_reindexing(true).expect("set");
        assert!(db.read_reindexing().expect("read"));
        db.write_reindexing(false).expect("clear");
        assert!(!db.read_reindexing().expect("read"));
    }

    #[test]
    fn last_block_file_roundtrip() {
        let db = BlockTreeDb::new(MemoryStore::new());
        assert_eq!(db.read_last_block_file().expect("read"), None);
        db.write_last_block_file(17).expect("write");
        assert_eq!(db.read_last_block_file().expect("read"), Some(17));
    }

    #[test]
    fn block_file_info_roundtrip() {
        let db = BlockTreeDb::new(MemoryStore::new());
        let info = BlockFileInfo {
            blocks: 12,
            size: 1 << 20,
            height_first: 100,
            height_last: 111,
            time_first: 1_600_000_000,
            time_last: 1_600_007_200,
        };
        db.write_block_file_info(2, &info).expect("write");
        assert_eq!(db.read_block_file_info(2).expect("read"), Some(info));
        assert_eq!(db.read_block_file_info(3).expect("read"), None);
    }
}
