use std::time::Duration;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("No data available for {0}")]
    EmptyResult(String),
}

/// Coarse classification of a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    NetworkError,
    MalformedPayload,
    EmptyResult,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Request(_) | FetchError::Timeout(_) => FetchErrorKind::NetworkError,
            FetchError::MalformedPayload(_) => FetchErrorKind::MalformedPayload,
            FetchError::EmptyResult(_) => FetchErrorKind::EmptyResult,
        }
    }
}

impl From<xmltree::ParseError> for FetchError {
    fn from(err: xmltree::ParseError) -> Self {
        FetchError::MalformedPayload(format!("invalid XML: {}", err))
    }
}
