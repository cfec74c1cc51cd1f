//! Error payloads and the mapping from domain errors to HTTP responses.
//!
//! Every API failure is rendered as an [`ErrorResponse`] JSON body. Error
//! types opt in by implementing [`IntoErrorResponse`], which also decides the
//! log level the failure is reported at.
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Standard error response format for all API endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "game_not_found")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Error classification for logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Rejected requests (4xx): part of normal play
    Client,
    /// Unexpected failures (5xx)
    Server,
    /// Stored state can no longer be trusted
    Critical,
}

pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error code
    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// Logs at the severity's level and renders the JSON body.
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let severity = self.severity();
        let error_response = self.to_error_response();
        log_error(severity, status, &error_response);
        error_response.into_response(status)
    }
}

fn log_error(severity: ErrorSeverity, status: StatusCode, error: &ErrorResponse) {
    match severity {
        ErrorSeverity::Client => tracing::info!(
            status = status.as_u16(),
            error_code = %error.error,
            message = %error.message,
            "request rejected"
        ),
        ErrorSeverity::Server => tracing::error!(
            status = status.as_u16(),
            error_code = %error.error,
            message = %error.message,
            "request failed"
        ),
        ErrorSeverity::Critical => tracing::error!(
            status = status.as_u16(),
            error_code = %error.error,
            message = %error.message,
            critical = true,
            "critical failure"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_response_serialization() {
        let error = ErrorResponse::new("not_your_turn", "It's not bob's turn");
        let json = serde_json::to_value(&error).expect("serialize");

        assert_eq!(json["error"], "not_your_turn");
        assert_eq!(json["message"], "It's not bob's turn");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn error_response_with_details() {
        let details = json!({ "from": { "row": 5, "col": 0 }, "reason": "not adjacent" });
        let error = ErrorResponse::with_details("illegal_move", "Illegal move", details);
        let json = serde_json::to_value(&error).expect("serialize");

        assert_eq!(json["error"], "illegal_move");
        assert_eq!(json["details"]["from"]["row"], 5);
    }

    #[test]
    fn error_response_display() {
        let error = ErrorResponse::new("game_not_found", "Game not found: g-1");
        assert_eq!(format!("{}", error), "game_not_found: Game not found: g-1");
    }
}
