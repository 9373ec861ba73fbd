use anyhow::Context;
use std::sync::Arc;
use webclip::panel::PanelView;
use webclip::{relay, CaptureSettings, Config, Host, Panel, SnapshotStorage, SnapshotStore};

/// Captures that may queue up while the panel is writing.
const RELAY_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    // stdout carries the native messaging protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("webclip host error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("Configuration error")?;

    // The host and the panel are separate surfaces; each owns its own engine
    // over the same database file.
    let host_store = Arc::new(SnapshotStore::from_config(&config));
    let panel_store = Arc::new(SnapshotStore::from_config(&config));

    if let Err(e) = host_store.initialize().await {
        // Keep serving so every request reports the failure to the extension.
        tracing::error!("Failed to initialize snapshot store: {}", e);
    }

    let (relay, inbox) = relay::channel(RELAY_CAPACITY);

    let mut panel = Panel::new(panel_store.clone());
    if let PanelView::Error { headline, detail } = panel.open().await {
        tracing::error!("{}: {}", headline, detail);
    }
    let worker = tokio::spawn(async move { panel.run(inbox).await });

    let host = Host::new(host_store.clone(), relay, CaptureSettings::from(&config));
    let handled = host
        .serve(&mut tokio::io::stdin(), &mut tokio::io::stdout())
        .await
        .context("Native messaging transport failed")?;

    // Dropping the host drops the relay, which lets the panel worker drain and exit.
    drop(host);
    let stored = worker.await.context("Panel worker panicked")?;
    tracing::info!(handled, stored, "Shutting down");

    host_store.close().await;
    panel_store.close().await;
    Ok(())
}
