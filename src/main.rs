//! Roon MPRIS bridge
//!
//! Pairs with a Roon Core and exposes one of its zones as an MPRIS player.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roon_mpris::adapters::mpris::MprisSurface;
use roon_mpris::adapters::roon::RoonAdapter;
use roon_mpris::adapters::AdapterHandle;
use roon_mpris::config;
use roon_mpris::sync::{anchor_channel, ArtworkCache, Synchronizer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;

    // Initialize logging
    let default_filter = if config.debug {
        "roon_mpris=debug"
    } else {
        "roon_mpris=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Roon MPRIS bridge");
    tracing::info!(?config, "Configuration loaded");

    let shutdown = CancellationToken::new();
    let (events, rx) = mpsc::unbounded_channel();
    let (anchor, position) = anchor_channel();

    let surface = MprisSurface::connect(events.clone(), position).await?;
    let synchronizer = Synchronizer::new(
        Arc::new(surface),
        anchor,
        ArtworkCache::new(config::artwork_cache_dir()),
        config.zone.clone(),
        events.clone(),
        shutdown.clone(),
    );

    let roon = AdapterHandle::new(
        RoonAdapter::new(config::roon_state_path()),
        events,
        shutdown.clone(),
    );
    let roon_task = tokio::spawn(roon.run());

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted, shutting down");
                ctrl_c_shutdown.cancel();
            }
            Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    synchronizer.run(rx).await;
    shutdown.cancel();

    match roon_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Roon adapter failed: {}", e),
        Err(e) => tracing::error!("Roon adapter task panicked: {}", e),
    }

    tracing::info!("Stopped");
    Ok(())
}
