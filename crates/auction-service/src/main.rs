use alloy::primitives::U256;
use anyhow::{Context, Result};
use auction_account::implementations::eip5792::create_account;
use auction_config::{Config, ConfigLoader};
use auction_core::{AuctionEngine, EngineBuilder};
use auction_delivery::implementations::eip5792::create_delivery;
use auction_discovery::implementations::{contract::create_contract_source, indexer::create_indexer};
use auction_types::current_timestamp;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "auction-relay")]
#[command(about = "Sponsored auction relay", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/relay.toml")]
	config: PathBuf,

	#[arg(long, env = "AUCTION_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Run the refresh loop and the HTTP API
	Start,
	/// Validate the configuration file
	Validate,
	/// Print the current auction
	Status,
	/// Bid on the current auction
	Bid {
		/// Amount in wei, decimal or 0x-prefixed hex
		#[arg(long)]
		amount: String,
	},
	/// Settle the current auction
	Settle,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(&cli).await,
		Some(Commands::Validate) => validate_config(&cli).await,
		Some(Commands::Status) => print_status(&cli).await,
		Some(Commands::Bid { ref amount }) => place_bid(&cli, amount).await,
		Some(Commands::Settle) => settle(&cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<Config> {
	info!("Loading configuration from: {:?}", cli.config);
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

fn build_engine(config: Config) -> Result<AuctionEngine> {
	EngineBuilder::new(config)
		.with_account_factory(create_account)
		.with_delivery_factory(create_delivery)
		.with_contract_factory(create_contract_source)
		.with_indexer_factory(create_indexer)
		.build()
		.context("Failed to build engine")
}

async fn start_service(cli: &Cli) -> Result<()> {
	info!("Starting auction relay");
	let config = load_config(cli).await?;
	let api_config = config.api.clone();
	let engine = Arc::new(build_engine(config)?);

	if let Err(e) = engine.refetch().await {
		error!("Initial auction read failed: {}", e);
	}

	let http_handle = match api_config.filter(|api| api.enabled) {
		Some(api) => {
			let engine = engine.clone();
			Some(tokio::spawn(async move {
				if let Err(e) = api::serve(engine, &api.host, api.port).await {
					error!("API server stopped: {:#}", e);
				}
			}))
		}
		None => {
			info!("HTTP API disabled");
			None
		}
	};

	engine
		.run(shutdown_signal())
		.await
		.context("Engine stopped with an error")?;

	if let Some(handle) = http_handle {
		handle.abort();
	}
	info!("Auction relay stopped");
	Ok(())
}

async fn validate_config(cli: &Cli) -> Result<()> {
	let config = load_config(cli).await?;

	info!("Configuration is valid");
	info!("Relay name: {}", config.relay.name);
	info!("Chain: {}", config.network.chain_id);
	info!("Auction house: {}", config.auction.house_address);
	info!(
		"Indexer: {}",
		config.indexer.as_ref().map(|i| i.url.as_str()).unwrap_or("none (contract reads only)")
	);
	info!(
		"Sponsor: {}",
		config
			.sponsor
			.as_ref()
			.map(|s| s.paymaster_url.as_str())
			.unwrap_or("none (sponsorship unavailable)")
	);
	Ok(())
}

async fn print_status(cli: &Cli) -> Result<()> {
	let engine = build_engine(load_config(cli).await?)?;
	engine.refetch().await.context("Failed to read auction state")?;

	let view = engine
		.view(current_timestamp())
		.await
		.context("Failed to read protocol parameters")?;
	println!("{}", serde_json::to_string_pretty(&view)?);
	Ok(())
}

async fn place_bid(cli: &Cli, amount: &str) -> Result<()> {
	let amount: U256 = amount
		.parse()
		.with_context(|| format!("Invalid bid amount: {}", amount))?;
	let engine = build_engine(load_config(cli).await?)?;
	engine.refetch().await.context("Failed to read auction state")?;

	let result = engine.place_bid(amount).await.context("Bid failed")?;
	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}

async fn settle(cli: &Cli) -> Result<()> {
	let engine = build_engine(load_config(cli).await?)?;
	let settled = engine.settle().await.context("Settlement failed")?;

	println!(
		"{}",
		serde_json::to_string_pretty(&api::SettleResponse::from(settled))?
	);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to install tracing subscriber")
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut term) => {
				term.recv().await;
			}
			Err(e) => {
				error!("Failed to install signal handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
