use crate::core::{string_from_number_or_string, u64_from_number_or_string};
use serde::{Deserialize, Serialize};

/// Session issued by the sign-up endpoint, or rebuilt from a token refresh.
///
/// This is also the shape written to the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    #[serde(default)]
    pub kind: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub expires_in: u64,
    #[serde(rename = "localId")]
    pub user_id: String,
}

/// Response of the secure token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRefreshResult {
    pub access_token: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub expires_in: u64,
    pub token_type: String,
    pub refresh_token: String,
    pub id_token: String,
    pub user_id: String,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub project_id: String,
}

impl From<&TokenRefreshResult> for LoginCredentials {
    // The refresh endpoint has no `kind`; it is left empty.
    fn from(result: &TokenRefreshResult) -> Self {
        Self {
            kind: String::new(),
            id_token: result.access_token.clone(),
            refresh_token: result.refresh_token.clone(),
            expires_in: result.expires_in,
            user_id: result.user_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpRequest {
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshTokenRequest<'a> {
    pub grant_type: &'a str,
    pub refresh_token: &'a str,
}
