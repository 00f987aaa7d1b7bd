use super::*;
use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
struct Expiry {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    expires_in: u64,
}

#[test]
fn test_error_message_from_firebase_envelope() {
    let body = r#"{"error":{"code":400,"message":"INVALID_API_KEY","status":"INVALID_ARGUMENT"}}"#;
    let msg = error_message_from_body(body, "Sign up failed", StatusCode::BAD_REQUEST);
    assert_eq!(msg, "INVALID_API_KEY (INVALID_ARGUMENT, code: 400)");
}

#[test]
fn test_error_message_falls_back_to_status() {
    let msg = error_message_from_body("", "Create document failed", StatusCode::NOT_FOUND);
    assert_eq!(msg, "Create document failed: 404 Not Found");

    let msg = error_message_from_body("oops", "Create document failed", StatusCode::BAD_GATEWAY);
    assert_eq!(msg, "Create document failed 502 Bad Gateway: oops");
}

#[test]
fn test_expiry_accepts_string_and_number() {
    let from_string: Expiry = serde_json::from_str(r#"{"expires_in":"3600"}"#).unwrap();
    assert_eq!(from_string.expires_in, 3600);

    let from_number: Expiry = serde_json::from_str(r#"{"expires_in":3600}"#).unwrap();
    assert_eq!(from_number.expires_in, 3600);

    assert!(serde_json::from_str::<Expiry>(r#"{"expires_in":"soon"}"#).is_err());
}
