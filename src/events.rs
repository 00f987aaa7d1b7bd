//! Completion notifications.
//!
//! Every client operation returns a `Result`. Hosts that prefer a push model (a game loop
//! polling a queue, for instance) can also hand a client an [`EventSender`] and drain the
//! matching receiver.

use crate::auth::models::{LoginCredentials, TokenRefreshResult};
use crate::firestore::models::Document;
use tokio::sync::mpsc;

/// Notification emitted when a client call completes.
#[derive(Debug, Clone, PartialEq)]
pub enum FirebaseEvent {
    /// Anonymous sign-up succeeded.
    LoggedIn(LoginCredentials),
    /// The refresh endpoint issued a new token.
    TokenRefreshed(TokenRefreshResult),
    /// Cached credentials were removed.
    LoggedOut,
    /// The server accepted a new document.
    DocumentCreated(Document),
    /// A document was read.
    DocumentFetched(Document),
    /// A document update was applied.
    DocumentPatched(Document),
    /// The collect endpoint accepted a batch.
    AnalyticsSent,
    /// A batch was rejected locally or by the collect endpoint.
    AnalyticsFailed,
}

pub type EventSender = mpsc::UnboundedSender<FirebaseEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<FirebaseEvent>;

/// Creates a connected sender/receiver pair.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Optional outlet for [`FirebaseEvent`]s owned by each client.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    sender: Option<EventSender>,
}

impl EventSink {
    pub(crate) fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub(crate) fn emit(&self, event: FirebaseEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::debug!("event receiver dropped, discarding notification");
            }
        }
    }
}
