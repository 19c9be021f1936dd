use std::sync::Arc;
use std::time::Duration;

use queuelink::common::types::AnyResult;
use queuelink::config::Config;
use queuelink::connection::ConnectionManager;
use queuelink::gateway::CommandGateway;
use queuelink::rest::{CommandTransport, RestClient};
use queuelink::session::SessionStateStore;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;

    let default_level = config
        .logging
        .as_ref()
        .and_then(|l| l.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let (store, notices) = SessionStateStore::new();
    let store = Arc::new(store);
    let rest = Arc::new(RestClient::new(&config.api)?);
    let gateway = CommandGateway::new(
        store.clone(),
        rest.clone(),
        Duration::from_millis(config.sync.command_expiry_ms),
    );
    let manager = Arc::new(ConnectionManager::new(
        store.clone(),
        rest,
        config.socket.clone(),
        config.sync.clone(),
    ));

    // Notices are the UI surface; headless, we just log them.
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv_async().await {
            info!("notice: {notice:?}");
        }
    });

    // Expiry sweep for unconfirmed optimistic deltas.
    let sweep_store = store.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        loop {
            tick.tick().await;
            sweep_store.expire_stale();
        }
    });

    // Line-oriented command surface on stdin.
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Err(e) = run_command(&gateway, line.trim()).await {
                warn!("command failed: {e}");
            }
        }
    });

    info!("connecting to session at {}", config.socket.url);
    tokio::select! {
        _ = manager.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            store.reset();
        }
    }

    Ok(())
}

async fn run_command<T: CommandTransport>(
    gateway: &CommandGateway<T>,
    line: &str,
) -> AnyResult<()> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(());
    };
    match verb {
        "play" => {
            gateway
                .play(parts.next().ok_or("usage: play <resource>")?)
                .await?
        }
        "enqueue" => gateway.enqueue(parts.map(str::to_string).collect()).await?,
        "previous" => gateway.previous().await?,
        "pause" => gateway.pause().await?,
        "skip" => gateway.skip().await?,
        "shuffle" => gateway.shuffle().await?,
        "clear" => gateway.clear_queue().await?,
        "jump" => {
            gateway
                .jump(parts.next().ok_or("usage: jump <index>")?.parse()?)
                .await?
        }
        "remove" => {
            gateway
                .remove_index(parts.next().ok_or("usage: remove <index>")?.parse()?)
                .await?
        }
        "reorder" => {
            let usage = "usage: reorder <i,j,..> <pos>";
            let selected = parts
                .next()
                .ok_or(usage)?
                .split(',')
                .map(str::parse)
                .collect::<Result<Vec<usize>, _>>()?;
            let pos = parts.next().ok_or(usage)?.parse()?;
            gateway.reorder(&selected, pos).await?;
        }
        other => return Err(format!("unknown command {other:?}").into()),
    }
    Ok(())
}
