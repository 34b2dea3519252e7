//! guildline - event replay binary.
//!
//! Reads decoded events as JSON lines from stdin and runs them through the
//! update coordinator, logging what listeners receive.

use std::io::{self, BufRead};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guildline::events::{Dispatched, Event, Update};
use guildline::{Client, Config};

fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guildline=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting guildline...");

    let config = Config::from_env().context("failed to load configuration")?;
    info!("Configuration loaded successfully");

    let client = Client::new(&config);
    let me = client.me().context("failed to resolve own account")?;
    info!("Logged in as {} ({})", me.full_name(), me.id());

    client.coordinator().register(log_event);

    let stdin = io::stdin();
    let mut delivered = 0usize;
    let mut dropped = 0usize;
    for (number, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping undecodable line {}: {}", number + 1, e);
                dropped += 1;
                continue;
            }
        };
        if client.coordinator().dispatch(event) {
            delivered += 1;
        } else {
            dropped += 1;
        }
    }

    info!("Input exhausted: {} events delivered, {} dropped", delivered, dropped);
    Ok(())
}

fn log_event(event: &Dispatched) {
    match &event.update {
        Update::MessageCreated(message) => info!(
            "[{}] message {} in {}: {}",
            event.timestamp,
            message.id(),
            message.channel_id().unwrap_or("-"),
            message.content()
        ),
        Update::MemberJoined { guild, user } => {
            info!("[{}] {} joined {}", event.timestamp, user.full_name(), guild.name())
        }
        Update::Other { kind, .. } => info!("[{}] unhandled {}", event.timestamp, kind),
        update => info!("[{}] {}", event.timestamp, update.name()),
    }
}
