//! Loads the block index from a data directory, reports chain-selection
//! state, and fetches the best candidate block from the flat files.

use std::path::PathBuf;
use std::process::ExitCode;

use blocktree_consensus::{chain_params, ChainParams, Network};
use blocktree_index::{load_block_tree, BlockFiles, BlockTreeDb, LoadError, ShutdownToken};
use blocktree_log::{log_error, log_info, log_warn, Format, Level, LogConfig};
use blocktree_primitives::hash::hash_to_hex;
use blocktree_storage::fjall::FjallStore;

struct Options {
    data_dir: PathBuf,
    network: Network,
    log_level: Level,
    log_format: Format,
}

fn usage() -> &'static str {
    "usage: blocktreed --datadir <dir> [--network mainnet|testnet|regtest] \
     [--log-level error|warn|info|debug|trace] [--log-format text|json]"
}

fn parse_options() -> Result<Options, String> {
    let mut data_dir: Option<PathBuf> = None;
    let mut network = Network::Mainnet;
    let mut log_level = Level::Info;
    let mut log_format = Format::Text;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--datadir" => {
                let value = args.next().ok_or("--datadir requires a path")?;
                data_dir = Some(PathBuf::from(value));
            }
            "--network" => {
                let value = args.next().ok_or("--network requires a value")?;
                network = Network::parse(&value).ok_or_else(|| format!("unknown network {value}"))?;
            }
            "--log-level" => {
                let value = args.next().ok_or("--log-level requires a value")?;
                log_level =
                    Level::parse(&value).ok_or_else(|| format!("unknown log level {value}"))?;
            }
            "--log-format" => {
                let value = args.next().ok_or("--log-format requires a value")?;
                log_format =
                    Format::parse(&value).ok_or_else(|| format!("unknown log format {value}"))?;
            }
            "--help" | "-h" => return Err(usage().to_string()),
            other => return Err(format!("unknown argument {other}")),
        }
    }

    Ok(Options {
        data_dir: data_dir.ok_or(usage())?,
        network,
        log_level,
        log_format,
    })
}

fn main() -> ExitCode {
    let options = match parse_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    blocktree_log::init(LogConfig {
        level: options.log_level,
        format: options.log_format,
        timestamps: true,
    });

    let params = chain_params(options.network);
    match run(&options, &params) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log_error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options, params: &ChainParams) -> Result<(), String> {
    let index_path = options.data_dir.join("blocks").join("index");
    log_info!(
        "opening block index at {} ({})",
        index_path.display(),
        params.network.as_str()
    );
    let store = FjallStore::open(&index_path)
        .map_err(|err| format!("failed to open index store: {err}"))?;
    let db = BlockTreeDb::new(store);

    if db
        .read_reindexing()
        .map_err(|err| format!("failed to read reindexing flag: {err}"))?
    {
        log_warn!("index was mid-reindex at last shutdown; entries may be incomplete");
    }

    let shutdown = ShutdownToken::new();
    let tree = match load_block_tree(&db, &params.consensus, &shutdown) {
        Ok(tree) => tree,
        Err(LoadError::Interrupted) => {
            log_warn!("block index load interrupted");
            return Ok(());
        }
        Err(err) => return Err(format!("block index load failed: {err}")),
    };

    log_info!(
        "block tree: {} entries, {} candidates, {} unlinked edges",
        tree.len(),
        tree.candidate_count(),
        tree.unlinked().count()
    );
    if let Some(best) = tree.best_header() {
        let node = tree.node(best);
        log_info!(
            "best header {} at height {}",
            hash_to_hex(&node.hash),
            node.height
        );
    }
    if let Some(invalid) = tree.best_invalid() {
        log_warn!(
            "best invalid block {} at height {}",
            hash_to_hex(&tree.node(invalid).hash),
            tree.node(invalid).height
        );
    }

    let Some(tip) = tree.best_candidate() else {
        log_info!("no tip candidates; nothing to fetch");
        return Ok(());
    };
    let tip_node = tree.node(tip);
    let Some(location) = tip_node.location else {
        log_info!(
            "best candidate {} has no stored payload",
            hash_to_hex(&tip_node.hash)
        );
        return Ok(());
    };

    let files = BlockFiles::new(&options.data_dir);
    let block = files
        .read_block(&location, params)
        .map_err(|err| format!("failed to read best candidate block: {err}"))?;
    log_info!(
        "best candidate {} at height {}: {} transactions, {} bytes on disk",
        hash_to_hex(&block.header.hash()),
        tip_node.height,
        block.transactions.len(),
        block.consensus_encode().len()
    );

    Ok(())
}
