//! Alert dispatcher binary.
//!
//! Polls the alert queue and serves Slack interactive callbacks and direct
//! Grafana webhooks from one process.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alert_dispatcher::{
    interactive::InteractionProcessor,
    queue::{Poller, SqsQueue},
    server, ChannelRouter, Config, Dispatcher, SignatureVerifier, SlackClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("alert_dispatcher=info".parse()?))
        .init();

    info!("Starting alert dispatcher...");

    let config = Config::from_env().context("Failed to load configuration")?;
    let table = config
        .routing_table()
        .context("Failed to build routing table")?;

    info!(
        default_channel = %table.default_channel(),
        mappings = table.alert_mapping_count(),
        "Routing table loaded"
    );

    let slack = Arc::new(
        SlackClient::new(
            config.slack_bot_token.clone(),
            config.slack_api_url.clone(),
            config.slack_timeout,
        )
        .context("Failed to create Slack client")?,
    );

    let dispatcher = Dispatcher::new(ChannelRouter::new(Arc::new(table)), slack.clone());
    let interactions = InteractionProcessor::new(
        SignatureVerifier::new(config.slack_signing_secret.clone()),
        slack,
    );

    let queue = SqsQueue::from_env(
        config.queue_url.clone(),
        config.sqs_batch_size,
        config.sqs_wait_time_secs,
    )
    .await;
    let poller = Poller::new(queue, dispatcher.clone(), config.poll_interval);

    let app = server::build_router(server::AppState {
        dispatcher,
        interactions,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = config.port, queue_url = %config.queue_url, "Alert dispatcher listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")?;
        }
        () = poller.run() => {
            error!("Queue poller exited unexpectedly");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}
