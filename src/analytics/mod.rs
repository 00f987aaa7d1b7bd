//! Google Analytics Measurement Protocol module.
//!
//! Sends batches of events to the GA4 collect endpoint for an app stream.
//!
//! The collect endpoint answers `204 No Content` for payloads it silently drops, so a 204 is
//! reported as a failure here. Any other success status counts as delivered.

pub mod models;

#[cfg(test)]
mod tests;

use self::models::{AnalyticsBatch, Event};
use crate::core::parse_error_response;
use crate::events::{EventSender, EventSink, FirebaseEvent};
use reqwest::{header, Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const MEASUREMENT_PROTOCOL_API: &str = "https://www.google-analytics.com";

/// Upper bound on events per request imposed by the Measurement Protocol.
pub const MAX_EVENTS_PER_BATCH: usize = 25;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("Batch of {0} events exceeds the limit of 25")]
    BatchTooLarge(usize),
    #[error("Collect endpoint rejected the batch (204 No Content)")]
    Rejected,
    #[error("API error {status}: {message}")]
    ApiError { status: StatusCode, message: String },
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for the Measurement Protocol.
pub struct FirebaseAnalytics {
    client: ClientWithMiddleware,
    base_url: String,
    api_secret: String,
    measurement_id: String,
    app_instance_id: String,
    user_id: Option<String>,
    events: EventSink,
}

impl FirebaseAnalytics {
    pub fn new(api_secret: String, measurement_id: String, app_instance_id: String) -> Self {
        let client = ClientBuilder::new(Client::new()).build();
        Self::new_with_client(
            client,
            MEASUREMENT_PROTOCOL_API.to_string(),
            api_secret,
            measurement_id,
            app_instance_id,
        )
    }

    pub fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        api_secret: String,
        measurement_id: String,
        app_instance_id: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_secret,
            measurement_id,
            app_instance_id,
            user_id: None,
            events: EventSink::default(),
        }
    }

    /// Routes completion events to `sender`.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    /// Attaches a user ID to subsequent batches, enabling active-user reports.
    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub async fn send_screen_view(&self, screen_name: &str) -> Result<(), AnalyticsError> {
        self.send_event(Event::screen_view(screen_name)).await
    }

    pub async fn send_event(&self, event: Event) -> Result<(), AnalyticsError> {
        self.send_events(&[event]).await
    }

    /// Uploads up to [`MAX_EVENTS_PER_BATCH`] events in one request.
    ///
    /// Larger batches are refused without touching the network.
    pub async fn send_events(&self, events: &[Event]) -> Result<(), AnalyticsError> {
        let result = self.post_batch(events).await;
        match &result {
            Ok(()) => self.events.emit(FirebaseEvent::AnalyticsSent),
            Err(e) => {
                warn!(error = %e, "analytics batch not delivered");
                self.events.emit(FirebaseEvent::AnalyticsFailed);
            }
        }
        result
    }

    async fn post_batch(&self, events: &[Event]) -> Result<(), AnalyticsError> {
        if events.len() > MAX_EVENTS_PER_BATCH {
            return Err(AnalyticsError::BatchTooLarge(events.len()));
        }

        let url = Url::parse_with_params(
            &format!("{}/mp/collect", self.base_url),
            &[
                ("api_secret", self.api_secret.as_str()),
                ("measurement_id", self.measurement_id.as_str()),
            ],
        )?;
        let batch = AnalyticsBatch {
            app_instance_id: &self.app_instance_id,
            user_id: self.user_id.as_deref(),
            events,
        };
        debug!(count = events.len(), "sending analytics batch");

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&batch)?)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Err(AnalyticsError::Rejected);
        }
        if !status.is_success() {
            return Err(AnalyticsError::ApiError {
                status,
                message: parse_error_response(response, "Analytics collect failed").await,
            });
        }

        Ok(())
    }
}
