use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use d_monitor::metrics;
use d_monitor::Check;
use d_monitor::Entity;
use d_monitor::Error;
use d_monitor::Event;
use d_monitor::LeaseStore;
use d_monitor::LoggingErrorHandler;
use d_monitor::LoggingFailureHandler;
use d_monitor::MemLeaseStore;
use d_monitor::MonitorFactory;
use d_monitor::MonitorService;
use d_monitor::Result;
use d_monitor::Settings;
use d_monitor::StoreBackend;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let mut settings = Settings::new()?;
    if let Some(path) = std::env::args().nth(1) {
        settings = settings.with_override_config(&path)?;
    }
    let settings = settings.validate()?;

    // Initializing Logs
    init_observability();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    match settings.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemLeaseStore::new(&settings.store));
            store.start();
            run(settings, store.clone(), graceful_rx).await?;
            store.stop().await;
        }
        StoreBackend::Etcd => run_etcd(settings, graceful_rx).await?,
    }

    info!("Exiting program.");
    Ok(())
}

#[cfg(feature = "etcd")]
async fn run_etcd(
    settings: Settings,
    graceful_rx: watch::Receiver<()>,
) -> Result<()> {
    let store = d_monitor::EtcdLeaseStore::connect(&settings.store).await?;
    run(settings, Arc::new(store), graceful_rx).await
}

#[cfg(not(feature = "etcd"))]
async fn run_etcd(
    _settings: Settings,
    _graceful_rx: watch::Receiver<()>,
) -> Result<()> {
    Err(Error::Config(config::ConfigError::Message(
        "store.backend = \"etcd\" requires the `etcd` feature".into(),
    )))
}

/// Heartbeat every configured entity until the shutdown signal fires.
async fn run<S: LeaseStore>(
    settings: Settings,
    store: Arc<S>,
    mut graceful_rx: watch::Receiver<()>,
) -> Result<()> {
    if settings.monitoring.prometheus_enabled {
        let port = settings.monitoring.prometheus_port;
        let rx = graceful_rx.clone();
        tokio::spawn(async move {
            metrics::start_server(port, rx).await;
        });
        info!("Prometheus metrics served on port {}", port);
    }

    let factory = MonitorFactory::new(store, settings.monitor.clone());
    let service = factory.build(Arc::new(LoggingFailureHandler), Arc::new(LoggingErrorHandler));

    let heartbeat = settings.heartbeat;
    if heartbeat.entities.is_empty() {
        warn!("No heartbeat entities configured; waiting for shutdown");
    }

    let mut ticker = tokio::time::interval(heartbeat.interval());
    loop {
        tokio::select! {
            _ = graceful_rx.changed() => {
                info!("Shutdown signal received, stopping monitors");
                break;
            }
            _ = ticker.tick() => {
                let now = unix_now();
                for name in &heartbeat.entities {
                    let entity = Entity {
                        last_seen: now,
                        ..Entity::new(name.as_str(), "agent")
                    };
                    let event = Event::for_entity(entity.clone(), now).with_check(Check {
                        name: "keepalive".to_string(),
                        status: 0,
                        output: String::new(),
                    });
                    if let Err(e) = service.refresh_monitor(name, &entity, &event, heartbeat.ttl_secs).await {
                        warn!(entity = %name, "monitor refresh failed: {}", e);
                    }
                }
            }
        }
    }

    service.shutdown().await;
    factory.cancel_all();
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(base_subscriber).init();
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
