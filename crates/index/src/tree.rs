//! In-memory block-index graph and its derived chain-selection state.
//!
//! Nodes live in an arena owned by [`BlockTree`]; every cross-reference
//! (parent, skip pointer, set membership) is a [`NodeId`] resolved through
//! the tree, so the graph can be moved and dropped as one value.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use blocktree_consensus::Hash256;
use blocktree_primitives::block::BlockHeader;
use primitive_types::U256;

use crate::record::BlockLocation;
use crate::status::BlockStatus;

pub type NodeId = usize;

/// Per-block metadata. Created bare on first reference to the hash and
/// filled in when the block's own record is visited.
#[derive(Clone, Debug)]
pub struct BlockNode {
    pub hash: Hash256,
    pub parent: Option<NodeId>,
    /// Ancestor shortcut at the height chosen by [`skip_height`].
    pub skip: Option<NodeId>,
    pub height: i32,
    pub location: Option<BlockLocation>,
    pub version: i32,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Transactions in this block alone; 0 while not downloaded.
    pub tx_count: u64,
    /// Cumulative transactions from the root; 0 until every ancestor has
    /// delivered its transactions.
    pub chain_tx: u64,
    pub chain_work: U256,
    /// Running maximum of header timestamps along the path from the root.
    pub time_max: u32,
    /// Arrival order tie-break; 0 for nodes loaded from the persisted index.
    pub sequence_id: u64,
    pub status: BlockStatus,
}

impl BlockNode {
    fn bare(hash: Hash256) -> Self {
        Self {
            hash,
            parent: None,
            skip: None,
            height: 0,
            location: None,
            version: 0,
            merkle_root: [0u8; 32],
            time: 0,
            bits: 0,
            nonce: 0,
            tx_count: 0,
            chain_tx: 0,
            chain_work: U256::zero(),
            time_max: 0,
            sequence_id: 0,
            status: BlockStatus::default(),
        }
    }

    /// True once this block and all its ancestors have their transactions.
    pub fn have_txs_downloaded(&self) -> bool {
        self.chain_tx != 0
    }
}

/// Ordering key for the candidate set and best-header selection: more chain
/// work ranks higher, then earlier arrival (lower sequence id), then earlier
/// creation. The creation-order clause only makes the order total; nothing
/// semantic may depend on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CandidateKey {
    pub chain_work: U256,
    pub sequence_id: u64,
    pub id: NodeId,
}

impl Ord for CandidateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chain_work
            .cmp(&other.chain_work)
            .then_with(|| other.sequence_id.cmp(&self.sequence_id))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for CandidateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The block-index graph plus the chain-selection state derived from it.
#[derive(Debug, Default)]
pub struct BlockTree {
    nodes: Vec<BlockNode>,
    by_hash: HashMap<Hash256, NodeId>,
    /// Nodes whose status changed during derivation and should be persisted
    /// on the next index flush.
    dirty: BTreeSet<NodeId>,
    /// Parent → children edges whose cumulative tx count is blocked on a
    /// download gap at or above the parent.
    unlinked: BTreeMap<NodeId, Vec<NodeId>>,
    /// Tip candidates, best last.
    candidates: BTreeSet<CandidateKey>,
    best_invalid: Option<NodeId>,
    best_header: Option<NodeId>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node for `hash`, creating a bare one on first reference.
    pub fn insert_or_get(&mut self, hash: &Hash256) -> NodeId {
        if let Some(&id) = self.by_hash.get(hash) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(BlockNode::bare(*hash));
        self.by_hash.insert(*hash, id);
        id
    }

    pub fn get(&self, hash: &Hash256) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    pub fn node(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut BlockNode {
        &mut self.nodes[id]
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// Reconstructs the full header of a node; the parent link supplies the
    /// previous-block hash.
    pub fn header_of(&self, id: NodeId) -> BlockHeader {
        let node = &self.nodes[id];
        BlockHeader {
            version: node.version,
            prev_block: node
                .parent
                .map(|parent| self.nodes[parent].hash)
                .unwrap_or([0u8; 32]),
            merkle_root: node.merkle_root,
            time: node.time,
            bits: node.bits,
            nonce: node.nonce,
        }
    }

    pub fn candidate_key(&self, id: NodeId) -> CandidateKey {
        let node = &self.nodes[id];
        CandidateKey {
            chain_work: node.chain_work,
            sequence_id: node.sequence_id,
            id,
        }
    }

    /// Total order used for tip selection: `Greater` means `a` is the
    /// better chain tip.
    pub fn compare_work(&self, a: NodeId, b: NodeId) -> Ordering {
        self.candidate_key(a).cmp(&self.candidate_key(b))
    }

    /// Candidates in comparator order, worst first.
    pub fn candidates(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.candidates.iter().map(|key| key.id)
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn best_candidate(&self) -> Option<NodeId> {
        self.candidates.iter().next_back().map(|key| key.id)
    }

    pub(crate) fn add_candidate(&mut self, id: NodeId) {
        let key = self.candidate_key(id);
        self.candidates.insert(key);
    }

    pub fn best_header(&self) -> Option<NodeId> {
        self.best_header
    }

    pub(crate) fn set_best_header(&mut self, id: NodeId) {
        self.best_header = Some(id);
    }

    pub fn best_invalid(&self) -> Option<NodeId> {
        self.best_invalid
    }

    pub(crate) fn set_best_invalid(&mut self, id: NodeId) {
        self.best_invalid = Some(id);
    }

    pub fn dirty(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dirty.iter().copied()
    }

    pub(crate) fn mark_dirty(&mut self, id: NodeId) {
        self.dirty.insert(id);
    }

    /// All blocked parent → child edges.
    pub fn unlinked(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.unlinked
            .iter()
            .flat_map(|(&parent, children)| children.iter().map(move |&child| (parent, child)))
    }

    pub fn unlinked_children(&self, parent: NodeId) -> &[NodeId] {
        self.unlinked
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn note_unlinked(&mut self, parent: NodeId, child: NodeId) {
        self.unlinked.entry(parent).or_default().push(child);
    }

    /// Attaches the skip pointer for a non-root node. Relies on ancestors
    /// having their own skip pointers already built.
    pub(crate) fn build_skip(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent {
            let target = skip_height(self.nodes[id].height);
            self.nodes[id].skip = self.ancestor(parent, target);
        }
    }

    /// The ancestor of `id` at exactly `height`, in O(log Δh) hops.
    ///
    /// Follows the skip pointer whenever doing so cannot overshoot and does
    /// not strand the walk just above the target, otherwise steps to the
    /// parent; height strictly decreases each step.
    pub fn ancestor(&self, id: NodeId, height: i32) -> Option<NodeId> {
        if height < 0 || height > self.nodes[id].height {
            return None;
        }

        let mut walk = id;
        let mut walk_height = self.nodes[walk].height;
        while walk_height > height {
            let height_skip = skip_height(walk_height);
            let height_skip_prev = skip_height(walk_height - 1);
            let node = &self.nodes[walk];
            let take_skip = node.skip.is_some()
                && (height_skip == height
                    || (height_skip > height
                        && !(height_skip_prev < height_skip - 2 && height_skip_prev >= height)));
            if take_skip {
                walk = node.skip.unwrap_or(walk);
                walk_height = height_skip;
            } else {
                walk = node.parent?;
                walk_height -= 1;
            }
        }
        Some(walk)
    }
}

fn invert_lowest_one(n: i32) -> i32 {
    n & (n - 1)
}

/// Height targeted by a node's skip pointer.
///
/// Heights below 2 skip to the root; even heights clear the lowest set bit
/// once; odd heights clear it twice on `h - 1` and add one back. The mix
/// keeps skip paths between any two heights logarithmic.
pub fn skip_height(height: i32) -> i32 {
    if height < 2 {
        return 0;
    }
    if height & 1 != 0 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_height_known_values() {
        for (height, expected) in [
            (0, 0),
            (1, 0),
            (2, 0),
            (3, 1),
            (95, 89),
            (96, 64),
            (10_000, 9_984),
            (580_000, 579_968),
        ] {
            assert_eq!(skip_height(height), expected, "height {height}");
        }
    }

    #[test]
    fn skip_height_always_decreases() {
        for height in 2..10_000 {
            let skip = skip_height(height);
            assert!(skip < height, "height {height} skipped to {skip}");
            assert!(skip >= 0);
        }
    }

    fn chain_hash(height: i32) -> Hash256 {
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&height.to_le_bytes());
        hash
    }

    fn linear_chain(length: i32) -> BlockTree {
        let mut tree = BlockTree::new();
        let mut parent: Option<NodeId> = None;
        for height in 0..length {
            let id = tree.insert_or_get(&chain_hash(height));
            {
                let node = tree.node_mut(id);
                node.height = height;
                node.parent = parent;
            }
            tree.build_skip(id);
            parent = Some(id);
        }
        tree
    }

    #[test]
    fn ancestor_matches_naive_parent_walk() {
        let tree = linear_chain(200);
        let tip = tree.get(&chain_hash(199)).expect("tip");

        for target in 0..200 {
            // Reference: walk parents one at a time.
            let mut walk = tip;
            while tree.node(walk).height > target {
                walk = tree.node(walk).parent.expect("parent");
            }
            assert_eq!(tree.ancestor(tip, target), Some(walk), "height {target}");
        }
    }

    #[test]
    fn ancestor_rejects_out_of_range_heights() {
        let tree = linear_chain(10);
        let tip = tree.get(&chain_hash(9)).expect("tip");
        assert_eq!(tree.ancestor(tip, -1), None);
        assert_eq!(tree.ancestor(tip, 10), None);
        assert_eq!(tree.ancestor(tip, 9), Some(tip));
    }

    #[test]
    fn header_of_takes_prev_hash_from_the_parent_link() {
        let mut tree = BlockTree::new();
        let root = tree.insert_or_get(&chain_hash(0));
        let child = tree.insert_or_get(&chain_hash(1));
        {
            let node = tree.node_mut(child);
            node.parent = Some(root);
            node.height = 1;
            node.version = 2;
            node.merkle_root = [0x44; 32];
            node.time = 1234;
            node.bits = 0x207fffff;
            node.nonce = 9;
        }

        let header = tree.header_of(child);
        assert_eq!(header.prev_block, chain_hash(0));
        assert_eq!(header.version, 2);
        assert_eq!(header.nonce, 9);

        let root_header = tree.header_of(root);
        assert_eq!(root_header.prev_block, [0u8; 32]);
    }

    #[test]
    fn insert_or_get_is_idempotent() {
        let mut tree = BlockTree::new();
        let id = tree.insert_or_get(&[0xab; 32]);
        assert_eq!(tree.insert_or_get(&[0xab; 32]), id);
        assert_eq!(tree.len(), 1);
    }

    fn key(work: u64, sequence_id: u64, id: NodeId) -> CandidateKey {
        CandidateKey {
            chain_work: U256::from(work),
            sequence_id,
            id,
        }
    }

    #[test]
    fn comparator_prefers_more_work_then_earlier_arrival() {
        assert!(key(2, 5, 1) > key(1, 0, 0));
        // Equal work: lower sequence id ranks higher.
        assert!(key(1, 0, 1) > key(1, 5, 0));
        // Full tie on work and sequence: earlier creation ranks higher.
        assert!(key(1, 0, 0) > key(1, 0, 1));
    }

    #[test]
    fn comparator_is_a_strict_total_order() {
        let keys = [
            key(1, 0, 0),
            key(1, 0, 1),
            key(1, 1, 2),
            key(2, 0, 3),
            key(2, 1, 4),
        ];
        for a in &keys {
            assert_eq!(a.cmp(a), Ordering::Equal);
            for b in &keys {
                if a.id != b.id {
                    assert_ne!(a.cmp(b), Ordering::Equal);
                    assert_eq!(a.cmp(b), b.cmp(a).reverse());
                }
                for c in &keys {
                    if a < b && b < c {
                        assert!(a < c);
                    }
                }
            }
        }
    }
}
