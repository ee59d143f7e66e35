//! paywatch daemon: runs the payment engine and administers its store.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use paywatch_chain::Erc20RpcClient;
use paywatch_engine::{
    AddressPool, ChatDispatcher, ChatEventServer, EngineConfig, EngineError, PaymentEngine,
};
use paywatch_notify::{LogNotifier, Notifier, WebhookNotifier};
use paywatch_store::{OfferStore, ServiceStore};
use paywatch_store_lmdb::{check_data_dir, check_integrity, LmdbStore, DEFAULT_MAP_SIZE};
use paywatch_types::{ChainAddress, ChatTarget, NetworkProfile, ServiceRecord, SystemClock};
use paywatch_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "paywatch", about = "Address leasing and payment confirmation daemon")]
struct Cli {
    /// Chain profile: "dev" (Sepolia, 6 decimals) or "prod" (BSC, 18 decimals).
    #[arg(long, env = "PAYWATCH_NETWORK")]
    network: Option<NetworkProfile>,

    /// JSON-RPC endpoint of the chain.
    #[arg(long, env = "PAYWATCH_RPC_URL")]
    rpc_url: Option<String>,

    /// ERC-20 token contract to watch.
    #[arg(long, env = "PAYWATCH_TOKEN_CONTRACT")]
    token_contract: Option<String>,

    /// Override the token decimals of the network profile.
    #[arg(long, env = "PAYWATCH_DECIMALS")]
    decimals: Option<u8>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "PAYWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Chat bridge endpoint that receives outbound messages.
    #[arg(long, env = "PAYWATCH_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Bind address of the listener that receives chat events, e.g. "127.0.0.1:8088".
    #[arg(long, env = "PAYWATCH_LISTEN")]
    listen: Option<SocketAddr>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PAYWATCH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PAYWATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "PAYWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the payment engine until SIGINT/SIGTERM.
    Run,
    /// Manage the address pool.
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },
    /// Manage offers.
    Offer {
        #[command(subcommand)]
        action: OfferAction,
    },
    /// Inspect payment records.
    Services {
        /// Only show records still waiting for payment.
        #[arg(long)]
        waiting: bool,
    },
}

#[derive(clap::Subcommand)]
enum PoolAction {
    /// Add addresses to the pool as free.
    Add {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// List every address and whether it is leased.
    List,
}

#[derive(clap::Subcommand)]
enum OfferAction {
    /// Publish an offer and announce it in a chat.
    Create {
        /// Price as a decimal token amount, e.g. "1.5".
        #[arg(long)]
        price: String,
        #[arg(long)]
        description: String,
        /// Chat the offer is announced in.
        #[arg(long)]
        chat: String,
        /// Text handed to the buyer once payment is confirmed.
        #[arg(long)]
        delivery: Option<String>,
    },
    /// List published offers.
    List,
}

/// Merge the optional config file with CLI flags and environment variables.
fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            EngineConfig::from_toml_file(&path)
                .with_context(|| format!("failed to load config file {path}"))?
        }
        None => EngineConfig::default(),
    };

    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = Some(rpc_url.clone());
    }
    if let Some(token) = &cli.token_contract {
        config.token_contract = Some(token.clone());
    }
    if let Some(decimals) = cli.decimals {
        config.decimals = Some(decimals);
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(webhook_url) = &cli.webhook_url {
        config.webhook_url = Some(webhook_url.clone());
    }
    if let Some(listen) = cli.listen {
        config.listen_addr = Some(listen);
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_store(data_dir: &Path) -> Result<Arc<LmdbStore>, EngineError> {
    if let Err(e) = check_data_dir(data_dir) {
        tracing::warn!("{e}");
    }
    let store = LmdbStore::open(data_dir, DEFAULT_MAP_SIZE)
        .map_err(|e| EngineError::StoreUnavailable(format!("{}: {e}", data_dir.display())))?;
    let report = check_integrity(&store)?;
    if report.is_healthy() {
        tracing::info!(
            addresses = report.addresses,
            services = report.services,
            waiting = report.waiting,
            "store opened"
        );
    } else {
        for problem in &report.errors {
            tracing::warn!("store integrity: {problem}");
        }
    }
    Ok(Arc::new(store))
}

/// The configured chat bridge, or the log when none is set.
enum ChatBridge {
    Webhook(Arc<WebhookNotifier>),
    Log(Arc<LogNotifier>),
}

impl ChatBridge {
    fn from_config(config: &EngineConfig) -> Self {
        match &config.webhook_url {
            Some(url) => Self::Webhook(Arc::new(
                WebhookNotifier::new(url).with_timeout(config.rpc_timeout()),
            )),
            None => Self::Log(Arc::new(LogNotifier)),
        }
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        match self {
            Self::Webhook(n) => Arc::clone(n) as _,
            Self::Log(n) => Arc::clone(n) as _,
        }
    }

    async fn flush(&self) {
        if let Self::Webhook(n) = self {
            n.flush().await;
        }
    }
}

fn build_engine(
    config: &EngineConfig,
    store: Arc<LmdbStore>,
    bridge: &ChatBridge,
) -> anyhow::Result<PaymentEngine> {
    let token = config.token_contract()?;
    let chain = Erc20RpcClient::new(config.rpc_url(), token).with_timeout(config.rpc_timeout());
    let engine = PaymentEngine::new(
        config.settings()?,
        store,
        Arc::new(chain),
        bridge.notifier(),
        Arc::new(SystemClock),
    )?;
    Ok(engine)
}

fn print_service(record: &ServiceRecord, decimals: u8) {
    println!(
        "{}\t{}\t{}\t{}\t{}\tdeadline={}",
        record.id,
        record.status,
        record.buyer,
        record.address,
        record.amount.format_units(decimals),
        record.deadline.as_secs()
    );
}

async fn run(config: EngineConfig) -> anyhow::Result<()> {
    tracing::info!(
        network = config.network.as_str(),
        chain = config.network.chain_name(),
        rpc_url = config.rpc_url(),
        decimals = config.decimals(),
        data_dir = %config.data_dir.display(),
        "starting paywatch"
    );

    let store = open_store(&config.data_dir)?;
    let bridge = ChatBridge::from_config(&config);
    let engine = Arc::new(build_engine(&config, store, &bridge)?);

    let report = engine.start().await?;
    tracing::info!(
        expired = report.expired,
        resumed = report.scheduled,
        "startup reconciliation complete"
    );

    let listener = match config.listen_addr {
        Some(addr) => {
            let dispatcher = Arc::new(ChatDispatcher::new(Arc::clone(&engine)));
            let shutdown_rx = engine.shutdown_handle().subscribe();
            Some(ChatEventServer::bind(addr, dispatcher, shutdown_rx).await?)
        }
        None => {
            tracing::warn!("listen_addr is not set; chat events will not be received");
            None
        }
    };

    engine.shutdown_handle().wait_for_signal().await?;
    if let Some(listener) = listener {
        listener.join().await;
    }
    engine.stop().await;
    bridge.flush().await;

    match engine.metrics().render() {
        Ok(text) => tracing::info!("final metrics:\n{text}"),
        Err(e) => tracing::warn!("failed to render metrics: {e}"),
    }
    tracing::info!("paywatch exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    match cli.command {
        Command::Run => run(config).await?,
        Command::Pool { action } => {
            let pool = AddressPool::new(open_store(&config.data_dir)?);
            match action {
                PoolAction::Add { addresses } => {
                    let parsed = addresses
                        .iter()
                        .map(|raw| ChainAddress::parse(raw))
                        .collect::<Result<Vec<_>, _>>()?;
                    let added = pool.provision(&parsed)?;
                    println!("added {added} of {} addresses", parsed.len());
                }
                PoolAction::List => {
                    for entry in pool.snapshot()? {
                        let state = if entry.leased { "leased" } else { "free" };
                        println!("{}\t{state}", entry.address);
                    }
                    println!("free: {}", pool.free_count()?);
                }
            }
        }
        Command::Offer { action } => match action {
            OfferAction::Create {
                price,
                description,
                chat,
                delivery,
            } => {
                let store = open_store(&config.data_dir)?;
                let bridge = ChatBridge::from_config(&config);
                let engine = build_engine(&config, store, &bridge)?;
                let offer =
                    engine.publish_offer(&price, &description, ChatTarget::new(chat), delivery)?;
                bridge.flush().await;
                println!(
                    "{}\t{}\t{}",
                    offer.id,
                    offer.price.format_units(config.decimals()),
                    offer.description
                );
            }
            OfferAction::List => {
                let store = open_store(&config.data_dir)?;
                for offer in store.list_offers()? {
                    println!(
                        "{}\t{}\t{}\t{}",
                        offer.id,
                        offer.price.format_units(config.decimals()),
                        offer.chat,
                        offer.description
                    );
                }
            }
        },
        Command::Services { waiting } => {
            let store = open_store(&config.data_dir)?;
            let records = if waiting {
                store.waiting_services()?
            } else {
                store.list_services()?
            };
            for record in &records {
                print_service(record, config.decimals());
            }
        }
    }

    Ok(())
}
