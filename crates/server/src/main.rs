//! JSON-RPC server hosting the silent auction engine.
//!
//! Commands that a chat front end would issue (`!auction`, `!bid`) map
//! onto the `auction_*` methods; every notification the engine emits is
//! captured in an in-memory log that clients poll via `query_getEvents`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use tracing::info;

use auction_engine::{AuctionError, AuctionService, ServiceConfig};
use auction_types::{ChannelId, UserId};

mod notifier;
mod types;

use notifier::RecordingNotifier;
use types::*;

#[derive(Parser, Debug)]
#[command(name = "auction-server", about = "Silent auction JSON-RPC server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Channel that receives settlement results in addition to the
    /// hosting channel. Results are dropped if unset.
    #[arg(long)]
    results_channel: Option<u64>,

    /// Expiry scan interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Minimum auction lifetime in seconds.
    #[arg(long, default_value_t = 10)]
    floor_secs: u64,

    /// Anti-snipe extension window in seconds.
    #[arg(long, default_value_t = 15)]
    extension_secs: u64,
}

/// RPC API surface.
#[rpc(server)]
pub trait AuctionApi {
    // ============ Auction Methods ============

    /// Open a new auction in a channel.
    #[method(name = "auction_start")]
    async fn auction_start(&self, params: StartAuctionParams) -> Result<bool, ErrorObjectOwned>;

    /// Place a bid on a running auction.
    #[method(name = "auction_bid")]
    async fn auction_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// List all running auctions.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionInfoRpc>, ErrorObjectOwned>;

    /// Notifications delivered after the given sequence number.
    #[method(name = "query_getEvents")]
    async fn query_get_events(&self, since: u64) -> Result<Vec<EventRecordRpc>, ErrorObjectOwned>;
}

struct AuctionRpcServer {
    service: AuctionService,
    notifier: Arc<RecordingNotifier>,
}

impl AuctionRpcServer {
    fn rpc_error(err: AuctionError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, err.to_string(), None::<()>)
    }
}

#[async_trait]
impl AuctionApiServer for AuctionRpcServer {
    async fn auction_start(&self, params: StartAuctionParams) -> Result<bool, ErrorObjectOwned> {
        self.service
            .start_auction(ChannelId(params.channel_id), &params.item, &params.duration)
            .await
            .map_err(Self::rpc_error)?;
        Ok(true)
    }

    async fn auction_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned> {
        self.service
            .place_bid(
                ChannelId(params.channel_id),
                UserId(params.bidder_id),
                &params.bid,
            )
            .await
            .map_err(Self::rpc_error)?;
        Ok(true)
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionInfoRpc>, ErrorObjectOwned> {
        let listing = self
            .service
            .active_auctions()
            .into_iter()
            .map(|(channel_id, item, remaining, num_bids)| AuctionInfoRpc {
                channel_id: channel_id.0,
                item,
                remaining_secs: remaining.as_secs(),
                num_bids,
            })
            .collect();
        Ok(listing)
    }

    async fn query_get_events(&self, since: u64) -> Result<Vec<EventRecordRpc>, ErrorObjectOwned> {
        Ok(self.notifier.events_since(since))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_server=info".parse().unwrap())
                .add_directive("auction_engine=info".parse().unwrap())
                .add_directive("jsonrpsee=warn".parse().unwrap()),
        )
        .init();

    let config = ServiceConfig {
        floor_duration: Duration::from_secs(cli.floor_secs),
        extension_window: Duration::from_secs(cli.extension_secs),
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
    };

    let notifier = Arc::new(RecordingNotifier::new(
        cli.results_channel.map(ChannelId),
    ));
    let service = AuctionService::new(notifier.clone(), config);

    let expiry = service.clone().spawn_expiry_loop();

    info!("Starting auction server on {}", cli.listen);

    let server = Server::builder().build(cli.listen).await?;
    let handle = server.start(AuctionRpcServer { service, notifier }.into_rpc());

    info!("Auction server running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    expiry.abort();
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
