use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use mc_swarm_client::config::SwarmConfig;
use mc_swarm_client::connection::Lifecycle;
use mc_swarm_client::executor::ExecutorManager;
use mc_swarm_client::factory::BotConnectionFactory;
use mc_swarm_client::identity::NoIdentityService;
use mc_swarm_client::BotHandle;
use mc_swarm_proto::packets::GAME_VERSION;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mc-swarm.toml".to_string());
    let config = match SwarmConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "mc-swarm v{} targeting {}:{} (Java {GAME_VERSION}, protocol {})",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port,
        config.server.protocol_version
    );
    info!(
        "Bots: {}, intent: {:?}, join delay: {}ms",
        config.bots.amount, config.server.intent, config.bots.join_delay_ms
    );
    if let Some(proxy) = &config.proxy {
        info!("Proxy: {}", proxy.address);
    }

    let factory = match BotConnectionFactory::from_config(&config, Arc::new(NoIdentityService)).await {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to prepare connections to {}: {e}", config.server.host);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let executors = ExecutorManager::new(config.bots.thread_prefix.clone());
    let lifecycles: Arc<Mutex<Vec<Arc<Lifecycle>>>> = Arc::new(Mutex::new(Vec::new()));
    match executors.new_scheduled_executor("stats") {
        Ok(stats) => {
            let lifecycles = Arc::clone(&lifecycles);
            let total = factory.bot_count();
            let scheduled = stats.schedule_at_fixed_rate(STATS_INTERVAL, STATS_INTERVAL, move || {
                let online = lifecycles.lock().iter().filter(|l| l.is_running()).count();
                info!("{online}/{total} bots online");
                Ok(())
            });
            if let Err(e) = scheduled {
                warn!("Stats reporting disabled: {e}");
            }
        }
        Err(e) => warn!("Stats reporting disabled: {e}"),
    }

    let join_delay = Duration::from_millis(config.bots.join_delay_ms);
    let mut handles: Vec<BotHandle> = Vec::with_capacity(factory.bot_count());
    for index in 0..factory.bot_count() {
        if *shutdown_rx.borrow() {
            break;
        }
        if index > 0 {
            tokio::select! {
                _ = tokio::time::sleep(join_delay) => {}
                _ = shutdown_rx.changed() => break,
            }
        }
        match factory.connect(index).await {
            Ok(handle) => {
                lifecycles.lock().push(Arc::clone(handle.lifecycle()));
                handles.push(handle);
            }
            Err(e) => error!("Bot {} failed to connect: {e}", factory.accounts()[index].name),
        }
    }

    let mut poll = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if handles.iter().all(|h| !h.is_running()) {
                    info!("All bots disconnected");
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    let mut stopping = JoinSet::new();
    for handle in handles {
        stopping.spawn(async move {
            handle.graceful_disconnect("Shutting down").await;
            handle.wait().await
        });
    }
    while let Some(result) = stopping.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Bot worker ended abnormally: {e}"),
            Err(e) => warn!("Bot shutdown task failed: {e}"),
        }
    }

    executors.shutdown_all();
    info!("Swarm stopped.");
}
