//! schedd — the scheduling core daemon.
//!
//! Single binary that wires the store, repository, instance tracker,
//! health manager, deployment manager, and scheduler actor together, and
//! runs the periodic reconcile/scale timers the actor doesn't drive itself.
//!
//! # Usage
//!
//! ```text
//! schedd standalone --data-dir /var/lib/sched --node-id node-1
//! ```

mod config;
mod local_broker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use local_broker::{LocalBrokerDriver, LocalKillService, LocalLaunchQueue};
use sched_actor::{ActorHandle, SchedulerActor};
use sched_broker::{EventBus, StandaloneLeaderElection};
use sched_deploy::DeploymentManager;
use sched_health::HealthCheckManager;
use sched_instance::InstanceTracker;
use sched_repo::GroupRepository;
use sched_store::RedbStore;

use config::SchedConfig;

#[derive(Parser)]
#[command(name = "schedd", about = "Scheduling core daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a single-node standalone instance (no Raft cluster; the
    /// daemon elects itself leader immediately).
    Standalone {
        /// Path to a `sched.toml` config file. Overrides the other flags.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Node identifier, used only for log context in standalone mode.
        #[arg(long, default_value = "standalone")]
        node_id: String,

        /// Data directory for the persistent store.
        #[arg(long, default_value = "/var/lib/sched")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sched_actor=debug,sched_deploy=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone { config, node_id, data_dir } => {
            let config = match config {
                Some(path) => SchedConfig::from_file(&path)?,
                None => SchedConfig::scaffold(&node_id, data_dir),
            };
            run_standalone(config).await
        }
    }
}

async fn run_standalone(config: SchedConfig) -> anyhow::Result<()> {
    info!(node_id = %config.node.id, "scheduling core starting in standalone mode");

    std::fs::create_dir_all(&config.store.data_dir)?;
    let db_path = config.store.data_dir.join("sched.redb");
    let store: Arc<dyn sched_store::PersistentStore> = Arc::new(RedbStore::open(&db_path)?);
    info!(path = ?db_path, "persistent store opened");

    let repo = Arc::new(GroupRepository::new(store.clone()));
    let tracker = Arc::new(InstanceTracker::new());
    let kill_service: Arc<dyn sched_broker::KillService> = Arc::new(LocalKillService);
    let launch_queue: Arc<dyn sched_broker::LaunchQueue> = Arc::new(LocalLaunchQueue::new());
    let driver: Arc<dyn sched_broker::BrokerDriver> = Arc::new(LocalBrokerDriver);
    let health = Arc::new(HealthCheckManager::new(kill_service.clone()));
    let events = EventBus::default();
    let deploy_manager = Arc::new(
        DeploymentManager::new(tracker.clone(), kill_service.clone(), launch_queue.clone(), health.clone(), events.clone())
            .with_cancellation_timeout(config.actor.cancellation_timeout()),
    );
    let leader_election = Arc::new(StandaloneLeaderElection::new());

    let actor = SchedulerActor::new(
        repo,
        tracker,
        deploy_manager,
        health,
        kill_service,
        launch_queue,
        driver,
        store,
        leader_election.clone(),
        events,
    )
    .with_cancellation_timeout(config.actor.cancellation_timeout());

    let (handle, commands_rx) = ActorHandle::channel();
    let actor_handle = tokio::spawn(actor.run(commands_rx));
    // Give the actor's run loop a chance to subscribe before we announce —
    // a broadcast sent before any receiver exists is silently dropped.
    tokio::task::yield_now().await;

    // A standalone node has no Raft cluster to wait on: elect itself
    // leader immediately.
    leader_election.announce(sched_broker::LeadershipEvent::ElectedAsLeader);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let reconcile_handle = tokio::spawn(periodic_reconcile(
        handle.clone(),
        config.actor.reconcile_interval(),
        shutdown_rx.clone(),
    ));
    let scale_handle = tokio::spawn(periodic_scale(handle.clone(), config.actor.scale_interval(), shutdown_rx.clone()));

    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = reconcile_handle.await;
    let _ = scale_handle.await;
    drop(handle);
    let _ = actor_handle.await;

    info!("scheduling core stopped");
    Ok(())
}

async fn periodic_reconcile(handle: ActorHandle, interval: std::time::Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = handle.reconcile_tasks().await {
                    tracing::warn!(%err, "periodic reconcile failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn periodic_scale(handle: ActorHandle, interval: std::time::Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = handle.scale_apps().await {
                    tracing::warn!(%err, "periodic scale failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
