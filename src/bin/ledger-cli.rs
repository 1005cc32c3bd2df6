use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use ledger_tx_engine::config::load_config;
use ledger_tx_engine::confirmation::{ConfirmationTarget, Progress};
use ledger_tx_engine::ledger::provider::LedgerProvider;
use ledger_tx_engine::ledger::rpc::LedgerRpc;
use ledger_tx_engine::ledger::types::{AccountBlock, Address, LedgerError, LedgerResult, Network};
use ledger_tx_engine::ledger::wallet::{Keystore, SigningKey};
use ledger_tx_engine::ledger::{Amount, Unit};
use ledger_tx_engine::observability::logging;
use ledger_tx_engine::submission::{DirectSender, SendStrategy, TransferRequest};
use ledger_tx_engine::{DeployInfo, Session};

#[derive(Parser)]
#[command(name = "ledger-cli")]
#[command(about = "Query and transact against ledger nodes", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "engine.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot height of every configured node
    Status,
    /// Quota and native balance of the wallet addresses on a network
    Balances {
        #[arg(short, long)]
        network: Network,
    },
    /// Read-only contract call
    Query {
        #[arg(short, long)]
        network: Network,
        #[arg(long)]
        contract: Address,
        /// Hex-encoded call data
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Stake entries of an address
    Stakes {
        #[arg(short, long)]
        network: Network,
        address: Address,
        /// Page index
        #[arg(long, default_value_t = 0)]
        index: u64,
        /// Entries per page
        #[arg(long, default_value_t = 100)]
        count: u64,
    },
    /// Account block by hash
    Block {
        #[arg(short, long)]
        network: Network,
        hash: String,
    },
    /// Most recent account blocks of an address
    Blocks {
        #[arg(short, long)]
        network: Network,
        address: Address,
        #[arg(long, default_value_t = 10)]
        count: u64,
    },
    /// Stream a contract's logs until interrupted
    Watch {
        #[arg(short, long)]
        network: Network,
        #[arg(long)]
        contract: Address,
        #[arg(long, default_value = "contract")]
        name: String,
    },
    /// Send a transfer or contract call and follow it to confirmation
    Send {
        #[arg(short, long)]
        network: Network,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        /// Amount in `unit`
        #[arg(long, default_value = "0")]
        amount: String,
        #[arg(long, default_value = "VITE")]
        unit: Unit,
        /// Hex-encoded payload
        #[arg(long, default_value = "")]
        data: String,
        /// Treat as a contract call and wait for the receipt
        #[arg(long)]
        call: Option<String>,
    },
}

/// Direct sends need the ledger SDK's signer, which this binary does not
/// link; only relay (bridge) sends succeed from here.
struct NoSigner;

#[async_trait]
impl DirectSender for NoSigner {
    async fn send(
        &self,
        _provider: &dyn LedgerProvider,
        _block: AccountBlock,
        _key: &SigningKey,
        _strategy: SendStrategy,
    ) -> LedgerResult<AccountBlock> {
        Err(LedgerError::Signer(
            "no block signer available; send through the bridge network".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability.log_level);

    let keystore = Keystore::from_env(&config.wallet.keys_env)?;
    let bridge_enabled = config.bridge.enabled;
    let session = Session::new(config, keystore, Arc::new(NoSigner));
    if bridge_enabled {
        session.connect_bridge()?;
    }

    let result = run(&session, cli.command).await;
    session.shutdown().await;
    result
}

async fn run(session: &Session, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let router = session.router();
    match command {
        Commands::Status => {
            let mut nodes = Vec::new();
            for node in router.nodes().iter() {
                let height = if node.network.is_bridge() {
                    json!(null)
                } else {
                    match router.provider_for_node(&node.name)?.snapshot_chain_height().await {
                        Ok(h) => json!(h),
                        Err(e) => json!({ "error": e.to_string() }),
                    }
                };
                nodes.push(json!({
                    "name": node.name,
                    "network": node.network,
                    "url": node.url,
                    "height": height,
                }));
            }
            print_json(&json!({
                "bridge": router.bridge_state().status.as_str(),
                "nodes": nodes,
            }))?;
        }
        Commands::Balances { network } => {
            let summaries = session.account_summaries(network).await?;
            print_json(&serde_json::to_value(summaries)?)?;
        }
        Commands::Query {
            network,
            contract,
            data,
        } => {
            let payload = decode_hex(&data)?;
            let result = session.query(network, &contract, &payload).await?;
            println!("0x{}", alloy::primitives::hex::encode(result));
        }
        Commands::Stakes {
            network,
            address,
            index,
            count,
        } => {
            let stakes = session.stake_list(network, &address, index, count).await?;
            print_json(&serde_json::to_value(stakes)?)?;
        }
        Commands::Block { network, hash } => {
            let provider = router.request_provider_for(network)?;
            let block = provider.account_block_by_hash(&hash).await?;
            print_json(&serde_json::to_value(block)?)?;
        }
        Commands::Blocks {
            network,
            address,
            count,
        } => {
            let provider = router.request_provider_for(network)?;
            let blocks = provider.account_blocks(&address, 0, count).await?;
            print_json(&serde_json::to_value(blocks)?)?;
        }
        Commands::Watch {
            network,
            contract,
            name,
        } => {
            let info = DeployInfo {
                contract_name: name,
                address: contract,
                abi: Value::Null,
                network,
            };
            if let Some(mut subscription) = session.load_contract(info).await? {
                eprintln!("watching filter {} (Ctrl-C to stop)", subscription.id);
                loop {
                    tokio::select! {
                        event = subscription.events.recv() => match event {
                            Some(event) => print_json(&serde_json::to_value(event)?)?,
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
        }
        Commands::Send {
            network,
            from,
            to,
            amount,
            unit,
            data,
            call,
        } => {
            let mut request = TransferRequest::new(network, from, to)
                .amount(Amount::parse_human(&amount, unit)?)
                .payload(decode_hex(&data)?);
            let target = match call {
                Some(method) => {
                    request = request.call(method, None);
                    ConfirmationTarget::Receipt
                }
                None => ConfirmationTarget::Send,
            };

            let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
            let printer = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    eprintln!("{:?}", progress);
                }
            });
            let outcome = session.send(&request, target, &tx).await;
            drop(tx);
            let _ = printer.await;

            let confirmation = outcome?;
            print_json(&json!({
                "sendBlock": confirmation.send_block,
                "receiveBlock": confirmation.receive_block,
            }))?;
        }
    }
    Ok(())
}

fn decode_hex(data: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = data.strip_prefix("0x").unwrap_or(data);
    Ok(alloy::primitives::hex::decode(data)?)
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
