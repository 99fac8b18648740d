use std::sync::Arc;
use std::sync::Once;

use d_monitor::Check;
use d_monitor::Entity;
use d_monitor::Error;
use d_monitor::ErrorHandler;
use d_monitor::Event;
use d_monitor::FailureHandler;
use d_monitor::LeaseMonitorService;
use d_monitor::MemLeaseStore;
use d_monitor::Result;
use d_monitor::StoreConfig;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const TTL_SECS: u64 = 30;

static LOGGER_INIT: Once = Once::new();

pub fn enable_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub type Failures = mpsc::UnboundedReceiver<(Entity, Event)>;

/// Sends every reported failure to the paired receiver.
pub struct ChannelFailureHandler {
    sender: mpsc::UnboundedSender<(Entity, Event)>,
    fail_with: Option<String>,
}

impl ChannelFailureHandler {
    pub fn new() -> (Self, Failures) {
        let (sender, failures) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                fail_with: None,
            },
            failures,
        )
    }
}

#[async_trait::async_trait]
impl FailureHandler for ChannelFailureHandler {
    async fn handle_failure(
        &self,
        entity: &Entity,
        event: &Event,
    ) -> Result<()> {
        let _ = self.sender.send((entity.clone(), event.clone()));
        match &self.fail_with {
            Some(message) => Err(Error::Handler(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct CollectingErrorHandler {
    pub errors: Mutex<Vec<String>>,
}

impl ErrorHandler for CollectingErrorHandler {
    fn handle_error(
        &self,
        error: Error,
    ) {
        self.errors.lock().push(error.to_string());
    }
}

pub fn entity(id: &str) -> Entity {
    Entity {
        subscriptions: vec![format!("entity:{id}")],
        ..Entity::new(id, "agent")
    }
}

pub fn keepalive_event(entity: &Entity) -> Event {
    Event::for_entity(entity.clone(), 1_700_000_000).with_check(Check {
        name: "keepalive".to_string(),
        status: 0,
        output: String::new(),
    })
}

/// In-memory store with its expiry sweeper running
pub fn started_store() -> Arc<MemLeaseStore> {
    let store = Arc::new(MemLeaseStore::new(&StoreConfig::default()));
    store.start();
    store
}

pub fn monitor_service(store: Arc<MemLeaseStore>) -> (LeaseMonitorService<MemLeaseStore>, Failures) {
    let (service, failures, _) = monitor_service_with(store, None);
    (service, failures)
}

pub fn monitor_service_with(
    store: Arc<MemLeaseStore>,
    fail_with: Option<&str>,
) -> (
    LeaseMonitorService<MemLeaseStore>,
    Failures,
    Arc<CollectingErrorHandler>,
) {
    let (sender, failures) = mpsc::unbounded_channel();
    let failure_handler = ChannelFailureHandler {
        sender,
        fail_with: fail_with.map(str::to_string),
    };
    let error_handler = Arc::new(CollectingErrorHandler::default());
    let service = LeaseMonitorService::new(store, Arc::new(failure_handler), error_handler.clone());
    (service, failures, error_handler)
}
