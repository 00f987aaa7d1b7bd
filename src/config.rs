//! Project configuration.

use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_CREDENTIAL_DIR: &str = ".firebase";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Identifiers and secrets for one Firebase project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Web API key. Also the passphrase for the credential file.
    pub api_key: String,
    pub project_id: String,
    /// GA4 measurement ID (`G-XXXXXXX`), needed for analytics only.
    pub measurement_id: Option<String>,
    /// Measurement Protocol API secret, needed for analytics only.
    pub api_secret: Option<String>,
    /// Directory holding the encrypted credential file.
    pub credential_dir: PathBuf,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            measurement_id: None,
            api_secret: None,
            credential_dir: PathBuf::from(DEFAULT_CREDENTIAL_DIR),
        }
    }

    pub fn with_analytics(
        mut self,
        measurement_id: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.measurement_id = Some(measurement_id.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_credential_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credential_dir = dir.into();
        self
    }

    /// Reads `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID`, and optionally
    /// `FIREBASE_MEASUREMENT_ID`, `FIREBASE_API_SECRET`, `FIREBASE_CREDENTIAL_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("FIREBASE_API_KEY").ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?;
        let project_id =
            non_empty("FIREBASE_PROJECT_ID").ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?;

        let mut config = Self::new(api_key, project_id);
        config.measurement_id = non_empty("FIREBASE_MEASUREMENT_ID");
        config.api_secret = non_empty("FIREBASE_API_SECRET");
        if let Some(dir) = non_empty("FIREBASE_CREDENTIAL_DIR") {
            config.credential_dir = PathBuf::from(dir);
        }
        Ok(config)
    }
}
