//! Failure categories for delivery attempts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::event::ParseEnumError;

/// Why a delivery attempt failed, as far as retry policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Timeout,
    ClientError,
    ServerError,
    Authentication,
    RateLimit,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::ClientError,
        ErrorCategory::ServerError,
        ErrorCategory::Authentication,
        ErrorCategory::RateLimit,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "error category",
                value: s.to_string(),
            })
    }
}

const TIMEOUT_MARKERS: [&str; 2] = ["timeout", "timed out"];
const NETWORK_MARKERS: [&str; 5] = ["network", "connection", "econnrefused", "enotfound", "dns"];

/// Map an HTTP status and/or transport error text onto a category.
///
/// The status code wins when present; message matching is case-insensitive.
/// 1xx/2xx/3xx codes carry no category of their own and fall through to the
/// message.
pub fn categorize(status: Option<u16>, error_message: Option<&str>) -> ErrorCategory {
    if let Some(code) = status {
        match code {
            401 | 403 => return ErrorCategory::Authentication,
            429 => return ErrorCategory::RateLimit,
            400..=499 => return ErrorCategory::ClientError,
            500.. => return ErrorCategory::ServerError,
            _ => {}
        }
    }

    let message = error_message.unwrap_or_default().to_lowercase();
    if TIMEOUT_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Timeout
    } else if NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    }
}
