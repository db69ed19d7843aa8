//! Reads block payloads back from the numbered flat data files.
//!
//! Each payload in `blocks/blkNNNNN.dat` is preceded by a 4-byte network
//! magic tag and a 4-byte little-endian length.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blocktree_consensus::constants::MAX_BLOCK_SIZE;
use blocktree_consensus::ChainParams;
use blocktree_primitives::block::Block;
use blocktree_primitives::encoding::DecodeError;
use blocktree_pow::validation::check_header_proof_of_work;

use crate::record::BlockLocation;

pub const BLOCKS_SUBDIR: &str = "blocks";

/// Bytes reserved immediately before each payload: magic tag plus length.
const PAYLOAD_PREAMBLE: u64 = 8;

#[derive(Debug)]
pub enum BlockReadError {
    FileNotFound {
        file: u32,
    },
    FileOpenFailure {
        file: u32,
        source: io::Error,
    },
    /// The recorded payload offset cannot carry the 8-byte preamble.
    InvalidLocation {
        file: u32,
        data_pos: u64,
    },
    MagicMismatch {
        file: u32,
        data_pos: u64,
        expected: [u8; 4],
        actual: [u8; 4],
    },
    OversizedBlock {
        file: u32,
        data_pos: u64,
        size: u32,
    },
    TruncatedRead {
        file: u32,
        data_pos: u64,
    },
    DeserializationFailure {
        file: u32,
        data_pos: u64,
        source: DecodeError,
    },
    ProofOfWorkInvalid {
        file: u32,
        data_pos: u64,
    },
    Io {
        file: u32,
        source: io::Error,
    },
}

impl std::fmt::Display for BlockReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReadError::FileNotFound { file } => {
                write!(f, "block file {file} not found")
            }
            BlockReadError::FileOpenFailure { file, source } => {
                write!(f, "failed to open block file {file}: {source}")
            }
            BlockReadError::InvalidLocation { file, data_pos } => {
                write!(f, "invalid payload offset {data_pos} in block file {file}")
            }
            BlockReadError::MagicMismatch {
                file,
                data_pos,
                expected,
                actual,
            } => write!(
                f,
                "magic mismatch in block file {file} at {data_pos}: {} versus expected {}",
                hex4(actual),
                hex4(expected)
            ),
            BlockReadError::OversizedBlock {
                file,
                data_pos,
                size,
            } => write!(
                f,
                "block size {size} exceeds limit in block file {file} at {data_pos}"
            ),
            BlockReadError::TruncatedRead { file, data_pos } => {
                write!(f, "truncated read in block file {file} at {data_pos}")
            }
            BlockReadError::DeserializationFailure {
                file,
                data_pos,
                source,
            } => write!(
                f,
                "block deserialization failed in file {file} at {data_pos}: {source}"
            ),
            BlockReadError::ProofOfWorkInvalid { file, data_pos } => write!(
                f,
                "block in file {file} at {data_pos} fails proof of work"
            ),
            BlockReadError::Io { file, source } => {
                write!(f, "i/o error in block file {file}: {source}")
            }
        }
    }
}

impl std::error::Error for BlockReadError {}

/// Read-side handle on the `blocks/` directory of a data dir.
pub struct BlockFiles {
    dir: PathBuf,
}

impl BlockFiles {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join(BLOCKS_SUBDIR),
        }
    }

    pub fn file_path(&self, file: u32) -> PathBuf {
        self.dir.join(format!("blk{file:05}.dat"))
    }

    /// Raw-bytes mode: locates and validates the payload but returns it
    /// undecoded, for relay use.
    pub fn read_raw(
        &self,
        location: &BlockLocation,
        params: &ChainParams,
    ) -> Result<Vec<u8>, BlockReadError> {
        let file = location.file;
        let data_pos = location.data_pos;
        if data_pos < PAYLOAD_PREAMBLE {
            return Err(BlockReadError::InvalidLocation { file, data_pos });
        }

        let path = self.file_path(file);
        let mut handle = File::open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                BlockReadError::FileNotFound { file }
            } else {
                BlockReadError::FileOpenFailure { file, source: err }
            }
        })?;

        handle
            .seek(SeekFrom::Start(data_pos - PAYLOAD_PREAMBLE))
            .map_err(|err| BlockReadError::Io { file, source: err })?;

        let mut magic = [0u8; 4];
        read_exact(&mut handle, &mut magic, file, data_pos)?;
        if magic != params.message_start {
            return Err(BlockReadError::MagicMismatch {
                file,
                data_pos,
                expected: params.message_start,
                actual: magic,
            });
        }

        let mut size_bytes = [0u8; 4];
        read_exact(&mut handle, &mut size_bytes, file, data_pos)?;
        let size = u32::from_le_bytes(size_bytes);
        if size > MAX_BLOCK_SIZE {
            return Err(BlockReadError::OversizedBlock {
                file,
                data_pos,
                size,
            });
        }

        let mut payload = vec![0u8; size as usize];
        read_exact(&mut handle, &mut payload, file, data_pos)?;
        Ok(payload)
    }

    /// Decoded mode: raw-bytes retrieval followed by deserialization and a
    /// proof-of-work check on the recomputed header hash.
    pub fn read_block(
        &self,
        location: &BlockLocation,
        params: &ChainParams,
    ) -> Result<Block, BlockReadError> {
        let payload = self.read_raw(location, params)?;
        let block =
            Block::consensus_decode(&payload).map_err(|err| BlockReadError::DeserializationFailure {
                file: location.file,
                data_pos: location.data_pos,
                source: err,
            })?;
        check_header_proof_of_work(&block.header, &params.consensus).map_err(|_| {
            BlockReadError::ProofOfWorkInvalid {
                file: location.file,
                data_pos: location.data_pos,
            }
        })?;
        Ok(block)
    }
}

fn read_exact(
    handle: &mut File,
    buf: &mut [u8],
    file: u32,
    data_pos: u64,
) -> Result<(), BlockReadError> {
    handle.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            BlockReadError::TruncatedRead { file, data_pos }
        } else {
            BlockReadError::Io { file, source: err }
        }
    })
}

fn hex4(bytes: &[u8; 4]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
