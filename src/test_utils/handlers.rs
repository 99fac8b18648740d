use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::Entity;
use crate::Error;
use crate::ErrorHandler;
use crate::Event;
use crate::FailureHandler;
use crate::Result;

/// Forwards every failure to a channel, optionally failing afterwards.
pub struct RecordingFailureHandler {
    sender: mpsc::UnboundedSender<(Entity, Event)>,
    fail_with: Option<String>,
}

impl RecordingFailureHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Entity, Event)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                fail_with: None,
            },
            receiver,
        )
    }

    pub fn failing(message: &str) -> (Self, mpsc::UnboundedReceiver<(Entity, Event)>) {
        let (mut handler, receiver) = Self::new();
        handler.fail_with = Some(message.to_string());
        (handler, receiver)
    }
}

#[async_trait::async_trait]
impl FailureHandler for RecordingFailureHandler {
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
pub struct RecordingErrorHandler {
    errors: Mutex<Vec<String>>,
}

impl RecordingErrorHandler {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn handle_error(
        &self,
        error: Error,
    ) {
        self.errors.lock().push(error.to_string());
    }
}
