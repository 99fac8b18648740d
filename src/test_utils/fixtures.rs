use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Check;
use crate::Entity;
use crate::Event;
use crate::WatchEvent;
use crate::WatchStream;

pub fn fixture_entity(id: &str) -> Entity {
    Entity {
        id: id.to_string(),
        class: "agent".to_string(),
        subscriptions: vec!["linux".to_string(), format!("entity:{id}")],
        last_seen: 1_700_000_000,
    }
}

pub fn fixture_event(entity: &Entity) -> Event {
    Event::for_entity(entity.clone(), 1_700_000_000).with_check(Check {
        name: "keepalive".to_string(),
        status: 0,
        output: "alive".to_string(),
    })
}

/// Watch stream fed by the returned sender; ends when the sender is dropped.
pub fn channel_watch_stream() -> (mpsc::UnboundedSender<WatchEvent>, WatchStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream: Pin<Box<dyn Stream<Item = WatchEvent> + Send>> = Box::pin(UnboundedReceiverStream::new(rx));
    (tx, stream)
}
