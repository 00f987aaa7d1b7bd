//! Thin async clients for Firebase anonymous authentication, Firestore documents and the
//! Google Analytics Measurement Protocol.
//!
//! ```rust,no_run
//! # use firebase_lite::{FirebaseApp, FirebaseConfig};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = FirebaseApp::new(FirebaseConfig::from_env()?);
//!
//! let mut auth = app.auth();
//! let credentials = auth.sign_up_anonymously(true).await?;
//!
//! let db = app.firestore(&credentials)?;
//! let player = db.get_document(&format!("players/{}", credentials.user_id)).await?;
//!
//! let analytics = app.analytics("install-1234")?;
//! analytics.send_screen_view("main_menu").await?;
//! # let _ = player;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod auth;
pub mod config;
pub mod core;
pub mod events;
pub mod firestore;

pub use config::{ConfigError, FirebaseConfig};
pub use events::FirebaseEvent;

use analytics::FirebaseAnalytics;
use auth::models::LoginCredentials;
use auth::store::EncryptedFileStore;
use auth::FirebaseAuth;
use firestore::{FirebaseFirestore, FirestoreError};
use std::sync::Arc;

pub struct FirebaseApp {
    config: FirebaseConfig,
}

impl FirebaseApp {
    pub fn new(config: FirebaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    /// Auth client caching credentials in an encrypted file under `credential_dir`.
    pub fn auth(&self) -> FirebaseAuth {
        let store = EncryptedFileStore::new(&self.config.credential_dir, &self.config.api_key);
        FirebaseAuth::new(self.config.api_key.clone(), Arc::new(store))
    }

    /// Firestore client acting as the signed-in user.
    pub fn firestore(&self, credentials: &LoginCredentials) -> Result<FirebaseFirestore, FirestoreError> {
        FirebaseFirestore::new(&self.config.project_id, &credentials.id_token)
    }

    pub fn analytics(&self, app_instance_id: &str) -> Result<FirebaseAnalytics, ConfigError> {
        let measurement_id = self
            .config
            .measurement_id
            .clone()
            .ok_or(ConfigError::Missing("FIREBASE_MEASUREMENT_ID"))?;
        let api_secret = self
            .config
            .api_secret
            .clone()
            .ok_or(ConfigError::Missing("FIREBASE_API_SECRET"))?;

        Ok(FirebaseAnalytics::new(
            api_secret,
            measurement_id,
            app_instance_id.to_string(),
        ))
    }
}
