//! Cloud Firestore module.
//!
//! Creates, reads and patches documents through the Firestore REST API on behalf of a
//! signed-in user. The user's ID token is bound when the client is built; build a new
//! client after the token is refreshed.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_lite::firestore::{FirebaseFirestore, models::Document};
//! # async fn run(id_token: &str) -> Result<(), firebase_lite::firestore::FirestoreError> {
//! let db = FirebaseFirestore::new("my-project", id_token)?;
//!
//! let doc = Document::default().with_field("level", 3).with_field("name", "Ada");
//! let created = db.create_document("players", "user-123", &doc).await?;
//!
//! let fetched = db.get_document("players/user-123").await?;
//! assert!(fetched.is_some());
//!
//! db.patch_document("players/user-123", &doc.with_field("level", 4), "level").await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```

pub mod models;


use self::models::{DecodeError, Document};
use crate::core::middleware::BearerTokenMiddleware;
use crate::core::parse_error_response;
use crate::events::{EventSender, EventSink, FirebaseEvent};
use reqwest::{header, Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// The Firestore API answered with a non-success status.
    #[error("API error {status}: {message}")]
    ApiError { status: StatusCode, message: String },
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The response body did not match the document format.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The ID token contains bytes that cannot go into an HTTP header.
    #[error("Invalid ID token: {0}")]
    InvalidToken(#[from] header::InvalidHeaderValue),
    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// A patch without field paths would replace the whole document.
    #[error("Update mask names no fields")]
    EmptyUpdateMask,
}

/// Client for reading and writing Firestore documents.
///
/// Not internally synchronized. Concurrent calls on one instance are the caller's concern.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
    events: EventSink,
}

impl FirebaseFirestore {
    /// Creates a client for `project_id` that authenticates as the holder of `id_token`.
    pub fn new(project_id: &str, id_token: &str) -> Result<Self, FirestoreError> {
        let base_url = FIRESTORE_V1_API.replace("{project_id}", project_id);
        Self::new_with_url(id_token, base_url)
    }

    /// Creates a client against a custom documents root (useful for testing or the emulator).
    pub fn new_with_url(id_token: &str, base_url: String) -> Result<Self, FirestoreError> {
        let client = ClientBuilder::new(Client::new())
            .with(BearerTokenMiddleware::new(id_token)?)
            .build();

        Ok(Self::new_with_client(client, base_url))
    }

    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            events: EventSink::default(),
        }
    }

    /// Routes completion events to `sender`.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    /// Creates `document` under `collection_id` with the given ID.
    ///
    /// Firestore creates the collection if it does not exist yet. Returns the stored document,
    /// including its resource name and timestamps.
    pub async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        document: &Document,
    ) -> Result<Document, FirestoreError> {
        let mut url = self.url_for(collection_id)?;
        url.query_pairs_mut().append_pair("documentId", document_id);
        debug!(collection_id, document_id, "creating Firestore document");

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&document.encode())?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(FirestoreError::ApiError {
                status,
                message: parse_error_response(response, "Create document failed").await,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let created = Document::decode(&body)?;
        self.events.emit(FirebaseEvent::DocumentCreated(created.clone()));
        Ok(created)
    }

    /// Fetches a document by path, e.g. `"players/user-123"`.
    ///
    /// Any status other than 200 yields `Ok(None)`, server errors included. Transport
    /// failures and undecodable bodies are still returned as errors.
    pub async fn get_document(&self, document_path: &str) -> Result<Option<Document>, FirestoreError> {
        let url = self.document_url(document_path)?;

        let response = self.client.get(url).send().await?;

        if response.status() != StatusCode::OK {
            warn!(
                document_path,
                status = %response.status(),
                "Firestore document not returned"
            );
            return Ok(None);
        }

        let body: serde_json::Value = response.json().await?;
        let document = Document::decode(&body)?;
        self.events.emit(FirebaseEvent::DocumentFetched(document.clone()));
        Ok(Some(document))
    }

    /// Updates the fields named in `update_mask` (comma separated, e.g. `"score,level"`).
    ///
    /// Fields outside the mask are left untouched on the server even if they are present in
    /// `document`. A masked field missing from `document` is deleted. A mask with no field
    /// names is refused with [`FirestoreError::EmptyUpdateMask`] before any request is made.
    pub async fn patch_document(
        &self,
        document_path: &str,
        document: &Document,
        update_mask: &str,
    ) -> Result<Document, FirestoreError> {
        let url = self.patch_url(document_path, update_mask)?;
        debug!(document_path, update_mask, "patching Firestore document");

        let response = self
            .client
            .patch(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&document.encode())?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(FirestoreError::ApiError {
                status,
                message: parse_error_response(response, "Patch document failed").await,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let patched = Document::decode(&body)?;
        self.events.emit(FirebaseEvent::DocumentPatched(patched.clone()));
        Ok(patched)
    }

    // Accepts paths relative to the documents root as well as full resource names
    // (`projects/{p}/databases/(default)/documents/...`) as returned in `Document::name`.
    fn document_url(&self, document_path: &str) -> Result<Url, FirestoreError> {
        let path = document_path.trim_matches('/');
        let relative = match path.split_once("/documents/") {
            Some((prefix, rest)) if prefix.starts_with("projects/") => rest,
            _ => path,
        };
        self.url_for(relative)
    }

    // Each path segment is percent-encoded, so IDs containing `#` or `?` stay in the path.
    fn url_for(&self, relative_path: &str) -> Result<Url, FirestoreError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .extend(relative_path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn patch_url(&self, document_path: &str, update_mask: &str) -> Result<Url, FirestoreError> {
        let params = update_mask_params(update_mask);
        if params.is_empty() {
            return Err(FirestoreError::EmptyUpdateMask);
        }

        let mut url = self.document_url(document_path)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }
}

/// One `updateMask.fieldPaths` query pair per comma-separated mask entry, in order.
fn update_mask_params(update_mask: &str) -> Vec<(&'static str, &str)> {
    update_mask
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| ("updateMask.fieldPaths", field))
        .collect()
}
