use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use panel_core::{Config, NodeEndpoint, OpenChannelOptions};
use panel_http::BitcoinRpc;
use panel_nodes::{
    EventPoller, NodeClient, OPEN_AND_WAIT_TIMEOUT, ONLINE_POLL_INTERVAL, ONLINE_TIMEOUT,
    READY_TIMEOUT,
};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "panel")]
#[command(author, version, about = "Control panel for Lightning payment nodes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Node profile to talk to (defaults to the selected one)
    #[arg(short, long, global = true)]
    node: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show node identity, sync state and channel counts
    Info,
    /// Wait until the node answers
    WaitOnline {
        /// Give up after this many seconds
        #[arg(long, default_value_t = ONLINE_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
    /// Show on-chain balances
    Balances,
    /// Generate a new on-chain address
    Address,
    /// List connected peers
    Peers,
    /// Connect to peers, best effort
    Connect {
        /// Peers as pubkey@host
        #[arg(required = true)]
        peers: Vec<String>,
    },
    /// List channels
    Channels,
    /// Open a channel
    Open {
        /// Peer as pubkey@host
        peer: String,
        /// Channel size in sats
        amount: u64,
        /// Do not announce the channel
        #[arg(long)]
        private: bool,
        /// Wait until the channel is ready
        #[arg(long)]
        wait: bool,
    },
    /// Close the channel funded at txid:vout
    Close {
        /// Funding outpoint
        channel_point: String,
    },
    /// Check whether the channel funded at txid:vout is open
    Ready {
        /// Funding outpoint
        channel_point: String,
    },
    /// Wait until a channel is open
    WaitReady {
        /// Funding txid or channel correlation id
        id: String,
        /// Give up after this many seconds
        #[arg(long, default_value_t = READY_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
    /// Create an invoice
    Invoice {
        /// Amount in sats
        amount: u64,
        /// Invoice description
        #[arg(long)]
        memo: Option<String>,
    },
    /// Pay an invoice
    Pay {
        /// BOLT11 invoice
        invoice: String,
        /// Amount in sats, for invoices without one
        #[arg(long)]
        amount: Option<u64>,
    },
    /// Decode an invoice
    Decode {
        /// BOLT11 invoice
        invoice: String,
    },
    /// Print channel events until interrupted
    Watch,
    /// Mine blocks on the regtest chain
    Mine {
        /// Number of blocks
        #[arg(default_value_t = 1)]
        blocks: u32,
    },
    /// Select the default node profile
    Select {
        /// Profile name
        profile: String,
    },
    /// Clear the selected node profile
    Reset,
    /// List node profiles
    Nodes,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Profile named on the command line, else the selected one, else the first.
fn resolve_node(config: &Config, name: Option<&str>) -> Result<NodeEndpoint> {
    let endpoint = match name {
        Some(name) => config.node(name)?,
        None => match config.selected() {
            Some(node) => node,
            None => config
                .nodes
                .first()
                .context("no node profiles configured")?,
        },
    };
    Ok(endpoint.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = Config::load()?;

    match cli.command {
        Commands::Select { profile } => {
            config.select(&profile)?;
            config.save()?;
            println!("Selected {profile}");
        }
        Commands::Reset => {
            config.reset();
            config.save()?;
            println!("Selection cleared");
        }
        Commands::Nodes => {
            let selected = config.selected().map(|n| n.name.clone());
            for node in &config.nodes {
                let marker = if selected.as_ref() == Some(&node.name) { "*" } else { " " };
                println!("{marker} {:<12} {:<10} {}", node.name, node.network, node.base_url);
            }
        }
        Commands::Mine { blocks } => {
            let hashes = BitcoinRpc::new(config.bitcoin.clone())
                .mine_blocks(blocks)
                .await?;
            println!("Mined {} blocks", hashes.len());
            for hash in hashes {
                println!("  {hash}");
            }
        }
        command => {
            let endpoint = resolve_node(&config, cli.node.as_deref())?;
            tracing::info!(node = %endpoint.key(), "using {}", endpoint.base_url);
            run_node_command(&NodeClient::http(endpoint), command).await?;
        }
    }

    Ok(())
}

async fn run_node_command(node: &NodeClient, command: Commands) -> Result<()> {
    match command {
        Commands::Info => print_json(&node.get_info().await?)?,
        Commands::WaitOnline { timeout_secs } => {
            node.wait_until_online(ONLINE_POLL_INTERVAL, Duration::from_secs(timeout_secs))
                .await?;
            println!("{} is online", node.endpoint().name);
        }
        Commands::Balances => print_json(&node.get_balances().await?)?,
        Commands::Address => println!("{}", node.get_new_address().await?),
        Commands::Peers => print_json(&node.get_peers().await?)?,
        Commands::Connect { peers } => {
            node.connect_peers(peers.as_slice()).await;
            print_json(&node.get_peers().await?)?;
        }
        Commands::Channels => print_json(&node.get_channels().await?)?,
        Commands::Open {
            peer,
            amount,
            private,
            wait,
        } => {
            let options = OpenChannelOptions {
                to_rpc_url: peer,
                amount_sats: amount,
                is_private: private,
            };
            if wait {
                let channel = node
                    .open_channel_and_wait(&options, OPEN_AND_WAIT_TIMEOUT)
                    .await?;
                print_json(&channel)?;
            } else {
                println!("{}", node.open_channel(&options).await?);
            }
        }
        Commands::Close { channel_point } => {
            node.close_channel(&channel_point).await?;
            println!("Closing {channel_point}");
        }
        Commands::Ready { channel_point } => {
            ensure_ready(node, &channel_point).await?;
            println!("Channel {channel_point} is ready");
        }
        Commands::WaitReady { id, timeout_secs } => {
            let channel = node
                .wait_for_channel_ready(&id, Duration::from_secs(timeout_secs))
                .await?;
            print_json(&channel)?;
        }
        Commands::Invoice { amount, memo } => {
            println!("{}", node.create_invoice(amount, memo.as_deref()).await?);
        }
        Commands::Pay { invoice, amount } => {
            print_json(&node.pay_invoice_and_wait(&invoice, amount).await?)?;
        }
        Commands::Decode { invoice } => print_json(&node.decode_invoice(&invoice).await?)?,
        Commands::Watch => watch(node).await?,
        other => bail!("{other:?} does not talk to a node"),
    }

    Ok(())
}

/// Fails unless the channel at `channel_point` is open, so the exit status
/// reflects readiness.
async fn ensure_ready(node: &NodeClient, channel_point: &str) -> Result<()> {
    if !node.is_channel_ready(channel_point).await {
        bail!("channel {channel_point} is not ready");
    }
    Ok(())
}

async fn watch(node: &NodeClient) -> Result<()> {
    let poller = EventPoller::new();
    let Some(mut events) = poller.subscribe_stream(node) else {
        bail!("already watching {}", node.endpoint().key());
    };
    println!("Watching channel events on {} (Ctrl-C to stop)", node.endpoint().name);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => println!("{event}"),
                None => break,
            },
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}
