// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing expected field: {0}")]
    MissingField(&'static str),

    #[error("malformed identifier: {0}")]
    MalformedId(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}
