//! Block-index graph engine: rebuilds the header graph from the persisted
//! index, derives chain-selection state, and reads block payloads back from
//! the flat block files.

pub mod blockfiles;
pub mod load;
pub mod record;
pub mod shutdown;
pub mod status;
pub mod tree;
pub mod treedb;

pub use blockfiles::{BlockFiles, BlockReadError};
pub use load::{load_block_tree, LoadError};
pub use record::{BlockLocation, DiskBlockIndex};
pub use shutdown::ShutdownToken;
pub use status::BlockStatus;
pub use tree::{skip_height, BlockNode, BlockTree, CandidateKey, NodeId};
pub use treedb::{BlockFileInfo, BlockTreeDb};
