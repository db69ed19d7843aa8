//! Consensus parameter definitions.

use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Some(Self::Mainnet),
            "test" | "testnet" => Some(Self::Testnet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConsensusParams {
    pub network: Network,
    pub hash_genesis_block: Hash256,
    pub genesis_time: u32,
    /// Easiest admissible proof-of-work target, little-endian.
    pub pow_limit: Hash256,
    pub pow_target_spacing: i64,
}

/// Chain-level parameters: consensus rules plus network framing.
#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    pub consensus: ConsensusParams,
    /// Four magic bytes preceding every payload in the block files and on
    /// the wire.
    pub message_start: [u8; 4],
    pub default_port: u16,
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

impl std::fmt::Display for HexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HexError::InvalidLength => write!(f, "hex string has invalid length"),
            HexError::InvalidHex => write!(f, "invalid hex digit"),
        }
    }
}

impl std::error::Error for HexError {}

/// Parses a big-endian hex string (as hashes are displayed) into the
/// little-endian byte order used internally.
pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let mut hex = input.trim();
    if let Some(stripped) = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")) {
        hex = stripped;
    }

    if hex.is_empty() || hex.len() > 64 || hex.len() % 2 == 1 {
        return Err(HexError::InvalidLength);
    }

    let mut padded = String::with_capacity(64);
    for _ in 0..(64 - hex.len()) {
        padded.push('0');
    }
    padded.push_str(hex);

    let mut bytes = [0u8; 32];
    for (i, byte_out) in bytes.iter_mut().enumerate() {
        let start = i * 2;
        *byte_out =
            u8::from_str_radix(&padded[start..start + 2], 16).map_err(|_| HexError::InvalidHex)?;
    }
    bytes.reverse();

    Ok(bytes)
}

pub fn consensus_params(network: Network) -> ConsensusParams {
    match network {
        Network::Mainnet => mainnet_consensus_params(),
        Network::Testnet => testnet_consensus_params(),
        Network::Regtest => regtest_consensus_params(),
    }
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => ChainParams {
            network: Network::Mainnet,
            consensus: mainnet_consensus_params(),
            message_start: [0xf9, 0xbe, 0xb4, 0xd9],
            default_port: 8333,
        },
        Network::Testnet => ChainParams {
            network: Network::Testnet,
            consensus: testnet_consensus_params(),
            message_start: [0x0b, 0x11, 0x09, 0x07],
            default_port: 18333,
        },
        Network::Regtest => ChainParams {
            network: Network::Regtest,
            consensus: regtest_consensus_params(),
            message_start: [0xfa, 0xbf, 0xb5, 0xda],
            default_port: 18444,
        },
    }
}

fn mainnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Mainnet,
        hash_genesis_block: hash256_from_hex(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        )
        .expect("mainnet genesis hash"),
        genesis_time: 1_231_006_505,
        pow_limit: hash256_from_hex(
            "00000000ffff0000000000000000000000000000000000000000000000000000",
        )
        .expect("mainnet pow limit"),
        pow_target_spacing: 600,
    }
}

fn testnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Testnet,
        hash_genesis_block: hash256_from_hex(
            "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943",
        )
        .expect("testnet genesis hash"),
        genesis_time: 1_296_688_602,
        pow_limit: hash256_from_hex(
            "00000000ffff0000000000000000000000000000000000000000000000000000",
        )
        .expect("testnet pow limit"),
        pow_target_spacing: 600,
    }
}

fn regtest_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Regtest,
        hash_genesis_block: hash256_from_hex(
            "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206",
        )
        .expect("regtest genesis hash"),
        genesis_time: 1_296_688_602,
        pow_limit: hash256_from_hex(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .expect("regtest pow limit"),
        pow_target_spacing: 600,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_reverses_byte_order() {
        let hash = hash256_from_hex(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        )
        .expect("parse");
        assert_eq!(hash[31], 0x00);
        assert_eq!(hash[0], 0x6f);
    }

    #[test]
    fn hex_parsing_rejects_bad_input() {
        assert!(matches!(hash256_from_hex(""), Err(HexError::InvalidLength)));
        assert!(matches!(
            hash256_from_hex("123"),
            Err(HexError::InvalidLength)
        ));
        assert!(matches!(hash256_from_hex("zz"), Err(HexError::InvalidHex)));
    }

    #[test]
    fn networks_have_distinct_magic() {
        let main = chain_params(Network::Mainnet).message_start;
        let test = chain_params(Network::Testnet).message_start;
        let reg = chain_params(Network::Regtest).message_start;
        assert_ne!(main, test);
        assert_ne!(main, reg);
        assert_ne!(test, reg);
    }
}
