use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod audit;
mod config;
mod prompt;

use audit::AuditListener;
use config::Config;
use prompt::TerminalPrompt;

use toolgate_channel::RequestChannel;
use toolgate_core::{ArbitrationEngine, DecisionSource};
use toolgate_memory::DecisionMemory;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load("toolgate.yaml")?;
    let mailbox_dir = config.mailbox_dir();

    let channel = Arc::new(RequestChannel::new(&mailbox_dir));
    channel
        .initialize()
        .await
        .context("Failed to create mailbox directory")?;

    let memory = Arc::new(DecisionMemory::new());
    // No front-end dialog capability in the terminal host; arbitration
    // falls back to the blocking prompt.
    let source = DecisionSource::Fallback(Arc::new(TerminalPrompt::new()));

    let engine = ArbitrationEngine::new(channel, memory, source);

    let audit = AuditListener::new(&config.audit_log)
        .with_context(|| format!("Failed to open audit log {}", config.audit_log.display()))?;
    engine.set_listener(Arc::new(audit));

    engine.start();
    info!("toolgate broker watching {}", mailbox_dir.display());
    println!("toolgate permission broker");
    println!("Mailbox: {}", mailbox_dir.display());
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    engine.stop().await;

    Ok(())
}
