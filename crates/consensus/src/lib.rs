//! Consensus constants and chain parameters.

pub mod constants;
pub mod params;

pub use params::{
    chain_params, consensus_params, hash256_from_hex, ChainParams, ConsensusParams, HexError,
    Network,
};

pub type Hash256 = [u8; 32];
