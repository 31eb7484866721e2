//! Greenroom - demo-environment lifecycle manager

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greenroom::{
    config::Args,
    coordinator::ResetCoordinator,
    ids::SystemClock,
    services::{InMemoryFeed, InMemoryMessaging},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("greenroom={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("{}", greenroom::GreenroomError::Config(e));
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Greenroom - demo lifecycle manager");
    info!("======================================");
    info!("Run ID: {}", args.run_id);
    info!("Session user: {}", args.session_user);
    info!("Anchor: {}", args.anchor_id);
    info!("Personas: {}", args.persona_count);
    info!("Settle delay: {}ms", args.settle_delay_ms);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Backends: in-memory (smoke run)");
    info!("Cycle: {}", if args.reset { "reset" } else { "seed" });
    info!("======================================");

    // The concrete service SDKs live behind the request layer; this binary
    // drives a full cycle against the in-memory backends for smoke runs.
    let messaging = Arc::new(InMemoryMessaging::new());
    let feed = Arc::new(InMemoryFeed::new());
    let coordinator = ResetCoordinator::new(
        messaging,
        feed,
        Arc::new(SystemClock),
        args.coordinator_config(),
    );

    let result = if args.reset {
        coordinator.reset_demo(&args.session_user).await
    } else {
        coordinator.seed_demo(&args.session_user).await
    };

    match result {
        Ok(counts) => {
            info!(
                users = counts.user_count,
                channels = counts.channel_count,
                activities = counts.activity_count,
                follow_edges = counts.follow_edge_count,
                "Cycle complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Cycle failed: {}", e);
            std::process::exit(1);
        }
    }
}
