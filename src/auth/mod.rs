//! Firebase anonymous authentication.
//!
//! Signs players up without user-supplied credentials, refreshes their ID token and keeps
//! the session in a [`CredentialStore`] between launches.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use firebase_lite::auth::{FirebaseAuth, AuthError, store::EncryptedFileStore};
//! # async fn run() -> Result<(), AuthError> {
//! let store = Arc::new(EncryptedFileStore::new("./save", "api-key"));
//! let mut auth = FirebaseAuth::new("api-key".to_string(), store);
//!
//! let credentials = match auth.load_cached_credentials().await {
//!     Ok(credentials) => credentials,
//!     Err(AuthError::NoCachedCredentials) => auth.sign_up_anonymously(true).await?,
//!     Err(e) => return Err(e),
//! };
//! println!("signed in as {}", credentials.user_id);
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod store;

#[cfg(test)]
mod tests;

use self::models::{LoginCredentials, RefreshTokenRequest, SignUpRequest, TokenRefreshResult};
use self::store::{CredentialStore, StoreError};
use crate::core::parse_error_response;
use crate::events::{EventSender, EventSink, FirebaseEvent};
use reqwest::{header, Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const IDENTITY_TOOLKIT_API: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_API: &str = "https://securetoken.googleapis.com";

/// Store key the session is cached under.
pub const USER_AUTH_KEY: &str = "user.auth";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error {status}: {message}")]
    ApiError { status: StatusCode, message: String },
    #[error("No cached credentials")]
    NoCachedCredentials,
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Where the client is in the sign-in lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    SigningUp,
    Authenticated,
    RefreshingToken,
    LoggedOut,
}

/// Client for Firebase anonymous authentication.
///
/// Methods take `&mut self`; the client is not internally synchronized.
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    api_key: String,
    identity_url: String,
    token_url: String,
    store: Arc<dyn CredentialStore>,
    state: AuthState,
    credentials: Option<LoginCredentials>,
    events: EventSink,
}

impl FirebaseAuth {
    pub fn new(api_key: String, store: Arc<dyn CredentialStore>) -> Self {
        let client = ClientBuilder::new(Client::new()).build();
        Self::new_with_client(
            client,
            api_key,
            IDENTITY_TOOLKIT_API.to_string(),
            SECURE_TOKEN_API.to_string(),
            store,
        )
    }

    /// Creates a client with custom endpoints (useful for testing or the emulator).
    pub fn new_with_client(
        client: ClientWithMiddleware,
        api_key: String,
        identity_url: String,
        token_url: String,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            api_key,
            identity_url: identity_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            store,
            state: AuthState::Anonymous,
            credentials: None,
            events: EventSink::default(),
        }
    }

    /// Routes completion events to `sender`.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn credentials(&self) -> Option<&LoginCredentials> {
        self.credentials.as_ref()
    }

    /// Creates a new anonymous account.
    ///
    /// With `persist` set, the session is written to the credential store. On failure the
    /// state is left as it was.
    pub async fn sign_up_anonymously(&mut self, persist: bool) -> Result<LoginCredentials, AuthError> {
        let previous = std::mem::replace(&mut self.state, AuthState::SigningUp);

        match self.request_sign_up().await {
            Ok(credentials) => {
                if persist {
                    if let Err(e) = self.save(&credentials) {
                        self.state = previous;
                        return Err(e);
                    }
                }
                debug!(user_id = %credentials.user_id, "anonymous sign-up succeeded");
                self.state = AuthState::Authenticated;
                self.credentials = Some(credentials.clone());
                self.events.emit(FirebaseEvent::LoggedIn(credentials.clone()));
                Ok(credentials)
            }
            Err(e) => {
                warn!(error = %e, "anonymous sign-up failed");
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Exchanges `refresh_token` for a fresh ID token.
    ///
    /// The refresh endpoint does not report `kind`, so the returned credentials carry an
    /// empty one.
    pub async fn refresh_token(
        &mut self,
        refresh_token: &str,
        persist: bool,
    ) -> Result<LoginCredentials, AuthError> {
        let previous = std::mem::replace(&mut self.state, AuthState::RefreshingToken);

        match self.request_refresh(refresh_token).await {
            Ok(result) => {
                let credentials = LoginCredentials::from(&result);
                if persist {
                    if let Err(e) = self.save(&credentials) {
                        self.state = previous;
                        return Err(e);
                    }
                }
                debug!(user_id = %credentials.user_id, "token refreshed");
                self.state = AuthState::Authenticated;
                self.credentials = Some(credentials.clone());
                self.events.emit(FirebaseEvent::TokenRefreshed(result));
                Ok(credentials)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Restores the cached session by refreshing its token.
    ///
    /// The cached ID token is never used as is. The refresh always costs one round trip and
    /// the new credentials are persisted.
    pub async fn load_cached_credentials(&mut self) -> Result<LoginCredentials, AuthError> {
        let raw = self
            .store
            .get(USER_AUTH_KEY)?
            .ok_or(AuthError::NoCachedCredentials)?;
        let cached: LoginCredentials = serde_json::from_str(&raw)?;

        self.refresh_token(&cached.refresh_token, true).await
    }

    /// Removes the cached session. Safe to call when nothing is cached.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.store.delete(USER_AUTH_KEY)?;
        self.credentials = None;
        self.state = AuthState::LoggedOut;
        self.events.emit(FirebaseEvent::LoggedOut);
        Ok(())
    }

    async fn request_sign_up(&self) -> Result<LoginCredentials, AuthError> {
        let url = Url::parse_with_params(
            &format!("{}/v1/accounts:signUp", self.identity_url),
            &[("key", &self.api_key)],
        )?;
        let request = SignUpRequest {
            return_secure_token: true,
        };

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::ApiError {
                status,
                message: parse_error_response(response, "Sign up failed").await,
            });
        }

        Ok(response.json().await?)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenRefreshResult, AuthError> {
        let url = Url::parse_with_params(
            &format!("{}/v1/token", self.token_url),
            &[("key", &self.api_key)],
        )?;
        let request = RefreshTokenRequest {
            grant_type: "refresh_token",
            refresh_token,
        };

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::ApiError {
                status,
                message: parse_error_response(response, "Token refresh failed").await,
            });
        }

        Ok(response.json().await?)
    }

    fn save(&self, credentials: &LoginCredentials) -> Result<(), AuthError> {
        let serialized = serde_json::to_string(credentials)?;
        self.store.set(USER_AUTH_KEY, &serialized)?;
        Ok(())
    }
}
