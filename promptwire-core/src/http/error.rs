//! HTTP error mapping utilities

use crate::providers::error::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failures creating the transport itself
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to create HTTP client: {0}")]
    Build(String),
}

/// Map HTTP status code, headers and response body to a ProviderError
pub fn map_http_error(
    status: StatusCode,
    headers: Option<&HeaderMap>,
    body: Option<String>,
    request_id: Uuid,
) -> ProviderError {
    let error_details = body
        .as_ref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v));

    let error_message = error_details
        .as_ref()
        .map(|d| d.message.clone())
        .or_else(|| body.clone().filter(|b| !b.is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError,

        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .and_then(|h| h.get(RETRY_AFTER))
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .or_else(|| {
                    error_details
                        .and_then(|d| d.retry_after_seconds)
                        .map(Duration::from_secs)
                });

            ProviderError::RateLimit { retry_after }
        }

        StatusCode::BAD_REQUEST => ProviderError::InvalidRequest {
            message: message_with_id,
        },

        StatusCode::NOT_FOUND => ProviderError::ModelNotAvailable {
            model: extract_model_from_error(&error_message).unwrap_or_else(|| "unknown".to_string()),
        },

        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,

        status if status.is_server_error() => ProviderError::ServerError {
            status_code: status.as_u16(),
            message: message_with_id,
        },

        status if status.is_client_error() => ProviderError::InvalidRequest {
            message: message_with_id,
        },

        _ => ProviderError::Custom {
            code: format!("HTTP_{}", status.as_u16()),
            message: message_with_id,
        },
    }
}

/// Error details extracted from response body
struct ErrorDetails {
    message: String,
    retry_after_seconds: Option<u64>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI format: { "error": { "message": "...", "type": "...", "code": "..." } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after_seconds: error.get("retry_after").and_then(|v| v.as_u64()),
            });
        }
    }

    // Generic format: { "message": "...", "error": "..." }
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: message.to_string(),
            retry_after_seconds: json.get("retry_after").and_then(|v| v.as_u64()),
        });
    }

    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: error.to_string(),
            retry_after_seconds: None,
        });
    }

    None
}

/// Try to extract model name from error message
fn extract_model_from_error(message: &str) -> Option<String> {
    for quote in ['\'', '"', '`'] {
        let pattern = format!("model {}", quote);
        if let Some(start) = message.find(&pattern) {
            let start = start + pattern.len();
            if let Some(end) = message[start..].find(quote) {
                return Some(message[start..start + end].to_string());
            }
        }
    }
    None
}

/// Parse Retry-After header value (seconds; HTTP dates are not supported)
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    header_value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use test_case::test_case;

    #[test_case(401 => "auth" ; "unauthorized")]
    #[test_case(403 => "auth" ; "forbidden")]
    #[test_case(429 => "rate_limit" ; "too many requests")]
    #[test_case(400 => "invalid" ; "bad request")]
    #[test_case(422 => "invalid" ; "unprocessable")]
    #[test_case(404 => "model" ; "not found")]
    #[test_case(408 => "timeout" ; "request timeout")]
    #[test_case(504 => "timeout" ; "gateway timeout")]
    #[test_case(500 => "server" ; "internal error")]
    #[test_case(503 => "server" ; "unavailable")]
    fn test_status_mapping(code: u16) -> &'static str {
        let status = StatusCode::from_u16(code).unwrap();
        match map_http_error(status, None, None, Uuid::new_v4()) {
            ProviderError::AuthenticationError => "auth",
            ProviderError::RateLimit { .. } => "rate_limit",
            ProviderError::InvalidRequest { .. } => "invalid",
            ProviderError::ModelNotAvailable { .. } => "model",
            ProviderError::Timeout => "timeout",
            ProviderError::ServerError { .. } => "server",
            _ => "other",
        }
    }

    #[test]
    fn test_retry_after_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let body = r#"{"error": {"message": "slow down", "retry_after": 30}}"#.to_string();

        let error = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(&headers),
            Some(body.clone()),
            Uuid::new_v4(),
        );
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));

        let error = map_http_error(StatusCode::TOO_MANY_REQUESTS, None, Some(body), Uuid::new_v4());
        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_openai_error_body_message() {
        let body = r#"{"error": {"message": "Invalid 'messages'", "type": "invalid_request_error"}}"#;
        let error = map_http_error(
            StatusCode::BAD_REQUEST,
            None,
            Some(body.to_string()),
            Uuid::nil(),
        );
        match error {
            ProviderError::InvalidRequest { message } => {
                assert!(message.starts_with("Invalid 'messages'"));
                assert!(message.contains("request_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_model_extraction() {
        let body = r#"{"error": {"message": "The model `gpt-9` does not exist"}}"#;
        let error = map_http_error(StatusCode::NOT_FOUND, None, Some(body.to_string()), Uuid::nil());
        assert_eq!(
            error,
            ProviderError::ModelNotAvailable {
                model: "gpt-9".to_string()
            }
        );
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("1e30"), None);
    }

    #[test]
    fn test_huge_retry_after_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e30"));

        let error = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(&headers),
            None,
            Uuid::new_v4(),
        );
        assert_eq!(error, ProviderError::RateLimit { retry_after: None });
    }
}
