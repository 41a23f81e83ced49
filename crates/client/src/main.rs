//! CLI for driving the silent auction server.
//!
//! This binary provides commands for:
//! - Starting auctions
//! - Placing bids
//! - Listing running auctions
//! - Polling the notification log

use anyhow::Result;
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for silent channel auctions")]
struct Cli {
    /// Auction server RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new auction in a channel
    Start {
        /// Hosting channel ID
        #[arg(long)]
        channel: u64,

        /// Item being auctioned
        #[arg(long)]
        item: String,

        /// Duration, e.g. `5m` or `2h`
        #[arg(long)]
        duration: String,
    },

    /// Place a bid on a running auction
    Bid {
        /// Hosting channel ID
        #[arg(long)]
        channel: u64,

        /// Bidder user ID
        #[arg(long)]
        bidder: u64,

        /// Bid text, e.g. `1m 50p 100g 500s`
        #[arg(long)]
        bid: String,
    },

    /// List running auctions
    List,

    /// Print notifications delivered after a sequence number
    Events {
        /// Only events with seq greater than this
        #[arg(long, default_value_t = 0)]
        since: u64,
    },

    /// Follow the notification log
    Watch {
        /// Starting cursor
        #[arg(long, default_value_t = 0)]
        since: u64,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

// Mirrors of the server's RPC types; the CLI only needs their JSON
// shape, not the engine crates.

#[derive(Serialize)]
struct StartAuctionParams {
    channel_id: u64,
    item: String,
    duration: String,
}

#[derive(Serialize)]
struct PlaceBidParams {
    channel_id: u64,
    bidder_id: u64,
    bid: String,
}

#[derive(Deserialize)]
struct AuctionInfo {
    channel_id: u64,
    item: String,
    remaining_secs: u64,
    num_bids: usize,
}

#[derive(Deserialize)]
struct EventRecord {
    seq: u64,
    target: String,
    event: serde_json::Value,
}

fn print_event(record: &EventRecord) {
    println!("[{:>4}] {} {}", record.seq, record.target, record.event);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client: HttpClient = HttpClientBuilder::default().build(&cli.rpc)?;

    match cli.command {
        Commands::Start {
            channel,
            item,
            duration,
        } => {
            let params = StartAuctionParams {
                channel_id: channel,
                item: item.clone(),
                duration,
            };
            let _: bool = client.request("auction_start", rpc_params![params]).await?;
            println!("Auction started in channel {channel}: {item}");
        }

        Commands::Bid {
            channel,
            bidder,
            bid,
        } => {
            let params = PlaceBidParams {
                channel_id: channel,
                bidder_id: bidder,
                bid,
            };
            let _: bool = client.request("auction_bid", rpc_params![params]).await?;
            println!("Bid accepted for user {bidder} in channel {channel}");
        }

        Commands::List => {
            let auctions: Vec<AuctionInfo> =
                client.request("query_listAuctions", rpc_params![]).await?;
            if auctions.is_empty() {
                println!("No running auctions");
            }
            for auction in auctions {
                println!(
                    "channel {}: {} ({}s remaining, {} bidders)",
                    auction.channel_id, auction.item, auction.remaining_secs, auction.num_bids
                );
            }
        }

        Commands::Events { since } => {
            let events: Vec<EventRecord> =
                client.request("query_getEvents", rpc_params![since]).await?;
            for record in &events {
                print_event(record);
            }
        }

        Commands::Watch { since, interval_ms } => {
            let mut cursor = since;
            loop {
                let events: Vec<EventRecord> =
                    client.request("query_getEvents", rpc_params![cursor]).await?;
                for record in &events {
                    print_event(record);
                    cursor = cursor.max(record.seq);
                }
                tokio::time::sleep(std::time::Duration::from_millis(interval_ms)).await;
            }
        }
    }

    Ok(())
}
