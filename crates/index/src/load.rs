//! Rebuilds the block-index graph from the persisted store and derives all
//! chain-selection state in a single height-ordered pass.

use std::time::Instant;

use blocktree_consensus::{ConsensusParams, Hash256};
use blocktree_log::log_info;
use blocktree_pow::difficulty::block_proof;
use blocktree_pow::validation::check_proof_of_work;
use blocktree_storage::{KeyValueStore, ScanControl, StoreError};
use primitive_types::U256;

use crate::record::DiskBlockIndex;
use crate::shutdown::ShutdownToken;
use crate::status::{VALID_TRANSACTIONS, VALID_TREE};
use crate::tree::{BlockTree, NodeId};
use crate::treedb::BlockTreeDb;

#[derive(Debug)]
pub enum LoadError {
    /// The underlying store failed or returned a malformed record.
    StoreRead(StoreError),
    /// A persisted header fails its own proof of work; the index is corrupt.
    CorruptIndexRecord { hash: Hash256 },
    /// Shutdown was requested mid-pass; the partial graph was discarded.
    Interrupted,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::StoreRead(err) => write!(f, "block index read failed: {err}"),
            LoadError::CorruptIndexRecord { hash } => {
                write!(
                    f,
                    "block index record fails proof of work: {}",
                    blocktree_primitives::hash::hash_to_hex(hash)
                )
            }
            LoadError::Interrupted => write!(f, "block index load interrupted"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        LoadError::StoreRead(err)
    }
}

/// Loads every block-index record, links the header graph, and derives
/// cumulative work, tx counts, status propagation, skip pointers, and the
/// candidate/best-header/best-invalid bookkeeping.
///
/// On any error the partial graph is dropped; the caller never observes it.
pub fn load_block_tree<S: KeyValueStore>(
    db: &BlockTreeDb<S>,
    params: &ConsensusParams,
    shutdown: &ShutdownToken,
) -> Result<BlockTree, LoadError> {
    let started = Instant::now();
    let mut tree = BlockTree::new();

    materialize(db, params, shutdown, &mut tree)?;
    log_info!(
        "loaded {} block index entries in {}ms",
        tree.len(),
        started.elapsed().as_millis()
    );

    if shutdown.is_requested() {
        return Err(LoadError::Interrupted);
    }

    // Height order guarantees every parent is derived before its children;
    // the hash tie-break keeps the order deterministic.
    let mut order: Vec<NodeId> = tree.ids().collect();
    order.sort_by(|&a, &b| {
        let left = tree.node(a);
        let right = tree.node(b);
        left.height
            .cmp(&right.height)
            .then_with(|| left.hash.cmp(&right.hash))
    });

    for &id in &order {
        if shutdown.is_requested() {
            return Err(LoadError::Interrupted);
        }
        derive_node(&mut tree, id)?;
    }

    Ok(tree)
}

/// Materialization pass: walks the index cursor, creating nodes on first
/// reference (a record's own hash or its parent hash) and filling fields
/// from each record. Every stored header must pass proof of work.
fn materialize<S: KeyValueStore>(
    db: &BlockTreeDb<S>,
    params: &ConsensusParams,
    shutdown: &ShutdownToken,
    tree: &mut BlockTree,
) -> Result<(), LoadError> {
    let mut failure: Option<LoadError> = None;
    db.for_each_index_record(&mut |key, value| {
        if shutdown.is_requested() {
            failure = Some(LoadError::Interrupted);
            return Ok(ScanControl::Stop);
        }

        let hash: Hash256 = match key.try_into() {
            Ok(hash) => hash,
            Err(_) => {
                failure = Some(LoadError::StoreRead(StoreError::Backend(
                    "block index key is not a hash".to_string(),
                )));
                return Ok(ScanControl::Stop);
            }
        };
        let record = match DiskBlockIndex::decode(value) {
            Some(record) => record,
            None => {
                failure = Some(LoadError::StoreRead(StoreError::Backend(
                    "malformed block index record".to_string(),
                )));
                return Ok(ScanControl::Stop);
            }
        };

        let id = tree.insert_or_get(&hash);
        let parent = if record.prev_hash == [0u8; 32] {
            None
        } else {
            Some(tree.insert_or_get(&record.prev_hash))
        };

        let node = tree.node_mut(id);
        node.parent = parent;
        node.height = record.height;
        node.location = Some(record.location);
        node.version = record.version;
        node.merkle_root = record.merkle_root;
        node.time = record.time;
        node.bits = record.bits;
        node.nonce = record.nonce;
        node.status = record.status;
        node.tx_count = record.tx_count;

        if check_proof_of_work(&hash, record.bits, params).is_err() {
            failure = Some(LoadError::CorruptIndexRecord { hash });
            return Ok(ScanControl::Stop);
        }

        Ok(ScanControl::Continue)
    })?;

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// One derivation step. Parents are always derived first, so their
/// cumulative values can be read off directly.
fn derive_node(tree: &mut BlockTree, id: NodeId) -> Result<(), LoadError> {
    let parent = tree.node(id).parent;
    let proof = block_proof(tree.node(id).bits).map_err(|_| LoadError::CorruptIndexRecord {
        hash: tree.node(id).hash,
    })?;

    let (parent_work, parent_time_max, parent_chain_tx, parent_downloaded, parent_failed) =
        match parent {
            Some(parent_id) => {
                let parent_node = tree.node(parent_id);
                (
                    parent_node.chain_work,
                    parent_node.time_max,
                    parent_node.chain_tx,
                    parent_node.have_txs_downloaded(),
                    parent_node.status.is_failed(),
                )
            }
            None => (U256::zero(), 0, 0, false, false),
        };

    let mut blocked_edge = None;
    let mut newly_failed_child = false;
    {
        let node = tree.node_mut(id);
        let (chain_work, _) = parent_work.overflowing_add(proof);
        node.chain_work = chain_work;
        node.time_max = match parent {
            Some(_) => parent_time_max.max(node.time),
            None => node.time,
        };

        // Cumulative tx count only flows across edges whose ancestors all
        // have their transactions; otherwise the edge waits in the unlinked
        // set until the gap fills.
        if node.tx_count > 0 {
            match parent {
                None => node.chain_tx = node.tx_count,
                Some(parent_id) => {
                    if parent_downloaded {
                        node.chain_tx = parent_chain_tx.saturating_add(node.tx_count);
                    } else {
                        node.chain_tx = 0;
                        blocked_edge = Some(parent_id);
                    }
                }
            }
        }

        if parent_failed && !node.status.is_failed() {
            node.status = node.status.with_failed_child();
            newly_failed_child = true;
        }
    }
    if let Some(parent_id) = blocked_edge {
        tree.note_unlinked(parent_id, id);
    }
    if newly_failed_child {
        tree.mark_dirty(id);
    }

    let node_status = tree.node(id).status;
    if node_status.is_valid(VALID_TRANSACTIONS)
        && (tree.node(id).have_txs_downloaded() || parent.is_none())
    {
        tree.add_candidate(id);
    }

    if node_status.is_failed() {
        let is_new_best = match tree.best_invalid() {
            Some(best) => tree.node(id).chain_work > tree.node(best).chain_work,
            None => true,
        };
        if is_new_best {
            tree.set_best_invalid(id);
        }
    }

    if parent.is_some() {
        tree.build_skip(id);
    }

    if node_status.is_valid(VALID_TREE) {
        let is_new_best = match tree.best_header() {
            Some(best) => tree.compare_work(id, best) == std::cmp::Ordering::Greater,
            None => true,
        };
        if is_new_best {
            tree.set_best_header(id);
        }
    }

    Ok(())
}
