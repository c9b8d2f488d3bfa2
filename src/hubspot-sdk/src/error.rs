use serde::Deserialize;

/// Errors from the HubSpot API, classified by HTTP status
#[derive(Debug, thiserror::Error)]
pub enum HubSpotError {
    /// Network-level failure; no response was received
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// 4xx other than 409 and 429
    #[error("HubSpot API client error: {status} - {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },
    /// 429
    #[error("HubSpot API rate limit exceeded{}", retry_hint(.retry_after))]
    RateLimited {
        /// Seconds from the `Retry-After` header, when present
        retry_after: Option<u64>,
    },
    /// 409
    #[error("HubSpot API conflict: {message}")]
    Duplicate {
        message: String,
        /// The `duplicateProperties` object from the response body
        duplicate_properties: serde_json::Value,
    },
    /// 5xx
    #[error("HubSpot API server error: {status} - {message}")]
    Server { status: u16, message: String },
    /// Successful response whose body did not match the expected shape
    #[error("Deserialization error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The request URL could not be built; nothing was sent
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl HubSpotError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, HubSpotError::RateLimited { .. })
    }

    /// Retry hint carried by a 429; no caller acts on it automatically.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            HubSpotError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            HubSpotError::Transport(e) => e.status().map(|s| s.as_u16()),
            HubSpotError::Client { status, .. } | HubSpotError::Server { status, .. } => {
                Some(*status)
            }
            HubSpotError::RateLimited { .. } => Some(429),
            HubSpotError::Duplicate { .. } => Some(409),
            HubSpotError::Decode(_) | HubSpotError::InvalidUrl(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(default)]
    duplicate_properties: Option<serde_json::Value>,
}

/// Map a non-success response onto the error taxonomy.
pub(crate) fn classify(status: u16, retry_after: Option<&str>, body: &str) -> HubSpotError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.to_string());

    match status {
        429 => HubSpotError::RateLimited {
            retry_after: retry_after.and_then(|v| v.trim().parse().ok()),
        },
        409 => HubSpotError::Duplicate {
            message,
            duplicate_properties: parsed
                .and_then(|b| b.duplicate_properties)
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        },
        400..=499 => HubSpotError::Client { status, message },
        _ => HubSpotError::Server { status, message },
    }
}
