use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use std::sync::Once;
use tokio::sync::watch;
use tracing::error;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref MONITORS_CREATED: IntCounter = IntCounter::with_opts(Opts::new(
        "monitors_created_total",
        "Leases granted and bound to a monitor key"
    ))
    .expect("metric can not be created");

    pub static ref MONITOR_RENEWALS: IntCounter = IntCounter::with_opts(Opts::new(
        "monitor_renewals_total",
        "Successful keep-alives on an existing monitor lease"
    ))
    .expect("metric can not be created");

    pub static ref MONITOR_FAILURES: IntCounter = IntCounter::with_opts(Opts::new(
        "monitor_failures_total",
        "Monitor leases that expired and triggered the failure handler"
    ))
    .expect("metric can not be created");

    pub static ref MONITOR_SUPERSEDED: IntCounter = IntCounter::with_opts(Opts::new(
        "monitor_superseded_total",
        "Watchers that stepped aside for a newer lease"
    ))
    .expect("metric can not be created");

    pub static ref FAILURE_HANDLER_ERRORS: IntCounter = IntCounter::with_opts(Opts::new(
        "failure_handler_errors_total",
        "Errors returned by failure handlers"
    ))
    .expect("metric can not be created");

    pub static ref ACTIVE_WATCHERS: IntGauge = IntGauge::with_opts(Opts::new(
        "active_watchers",
        "Watcher tasks currently waiting on a monitor key"
    ))
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Increments a gauge on creation and decrements it when dropped
pub(crate) struct GaugeGuard {
    gauge: IntGauge,
}

impl GaugeGuard {
    pub(crate) fn inc(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self { gauge: gauge.clone() }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(MONITORS_CREATED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(MONITOR_RENEWALS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(MONITOR_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(MONITOR_SUPERSEDED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FAILURE_HANDLER_ERRORS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_WATCHERS.clone()))
        .expect("collector can be registered");
}

/// Serve `/metrics` on `port` until the shutdown signal changes.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics_body(&REGISTRY))
}

/// Text exposition of every collector in `registry`
pub(crate) fn gather_metrics_body(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
