use blocktree_consensus::hash256_from_hex;
use blocktree_primitives::block::{Block, BlockHeader, HEADER_SIZE};
use blocktree_primitives::hash::hash_to_hex;
use blocktree_primitives::outpoint::OutPoint;
use blocktree_primitives::transaction::{Transaction, TxIn, TxOut};

fn mainnet_genesis_header() -> BlockHeader {
    BlockHeader {
        version: 1,
        prev_block: [0u8; 32],
        merkle_root: hash256_from_hex(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
        )
        .expect("genesis merkle root"),
        time: 1_231_006_505,
        bits: 0x1d00ffff,
        nonce: 2_083_236_893,
    }
}

#[test]
fn genesis_header_hashes_to_known_block_hash() {
    let header = mainnet_genesis_header();
    let encoded = header.consensus_encode();
    assert_eq!(encoded.len(), HEADER_SIZE);
    assert_eq!(
        hash_to_hex(&header.hash()),
        "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
    );
}

#[test]
fn header_roundtrip() {
    let header = mainnet_genesis_header();
    let decoded = BlockHeader::consensus_decode(&header.consensus_encode()).expect("decode");
    assert_eq!(decoded, header);
}

#[test]
fn block_roundtrip() {
    let block = Block {
        header: mainnet_genesis_header(),
        transactions: vec![Transaction {
            version: 1,
            inputs: vec![TxIn {
                prevout: OutPoint::null(),
                script_sig: vec![0x04, 0xff, 0xff, 0x00, 0x1d],
                sequence: u32::MAX,
            }],
            outputs: vec![TxOut {
                value: 50 * 100_000_000,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        }],
    };
    let decoded = Block::consensus_decode(&block.consensus_encode()).expect("decode");
    assert_eq!(decoded, block);
}
