use std::sync::Arc;

use ibk_requests::RequestRepository;
use ibk_schemas::LogRecord;
use tracing::{debug, error, info, trace, warn};

use crate::{classify, Action, Category, Classification, HistoricalOutcome};

/// Session-level reactions to classified messages.
pub trait ErrorHooks: Send + Sync {
    /// Every classified message.
    fn on_log(&self, record: &LogRecord);

    /// A message with no request to blame.
    fn on_session_error(&self, record: &LogRecord);

    /// A critical message. The session is expected to disconnect.
    fn on_fatal_error(&self, record: &LogRecord);
}

pub struct ErrorRouter {
    requests: RequestRepository,
    hooks: Arc<dyn ErrorHooks>,
}

impl ErrorRouter {
    pub fn new(requests: RequestRepository, hooks: Arc<dyn ErrorHooks>) -> Self {
        Self { requests, hooks }
    }

    /// Classify one broker message and apply the outcome.
    pub fn handle(&self, id: i32, code: i32, message: &str) -> Classification {
        trace!(id, code, message, "message from broker");
        let classification = classify(id, code, message);
        self.hooks.on_log(&classification.record);

        if classification.historical == Some(HistoricalOutcome::Unexpected) {
            error!(id, message, "unexpected message for historical data request");
        }

        match &classification.action {
            Action::None => {}
            Action::FailRequest {
                key,
                failure,
                should_exist,
            } => {
                self.requests
                    .deliver_error(*key, failure.clone().into(), *should_exist);
            }
            Action::CompleteRequest { key } => {
                self.requests.deliver_next_and_complete(*key, true, true);
            }
            Action::SessionError => self.hooks.on_session_error(&classification.record),
            Action::Fatal => self.hooks.on_fatal_error(&classification.record),
        }

        match classification.category {
            Category::Custom => {}
            Category::Debug => debug!(id, code, "broker: {message}"),
            Category::Info => info!(id, code, "broker: {message}"),
            Category::Warning => warn!(id, code, "broker: {message}"),
            Category::RequestError => debug!(id, code, "broker request error: {message}"),
            Category::Error => error!(id, code, "broker: {message}"),
            Category::Critical => error!(id, code, "broker critical: {message}. Disconnecting."),
        }

        classification
    }
}
