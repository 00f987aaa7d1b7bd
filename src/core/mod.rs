pub mod middleware;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[cfg(test)]
mod tests;

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl FirebaseErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!("{} ({}, code: {})", self.error.message, status, self.error.code),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Turns a failed response body into a readable message.
///
/// Google APIs wrap failures in `{"error": {"code", "message", "status"}}`. Bodies that do not
/// follow that shape are reported verbatim, or as `default_msg` when empty.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    error_message_from_body(&text, default_msg, status)
}

pub(crate) fn error_message_from_body(
    text: &str,
    default_msg: &str,
    status: reqwest::StatusCode,
) -> String {
    match serde_json::from_str::<FirebaseErrorResponse>(text) {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) if text.trim().is_empty() => format!("{}: {}", default_msg, status),
        Err(_) => format!("{} {}: {}", default_msg, status, text.trim()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Firebase token endpoints send `expiresIn` as a JSON string (`"3600"`); cached credentials
/// store it as a number. Both are accepted.
pub(crate) fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(|e| {
            de::Error::custom(format!("expected an unsigned integer, got '{}': {}", s, e))
        }),
    }
}

pub(crate) fn string_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n.to_string()),
        NumberOrString::String(s) => Ok(s),
    }
}
