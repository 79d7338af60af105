//! Error types for the library API.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised by a prompt store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened.
    #[error("Failed to initialize store: {0}")]
    Init(String),

    /// A definition or few-shot row does not exist (or is inactive).
    #[error("{0} not found")]
    NotFound(String),

    /// An underlying file I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sealing or opening the encrypted snapshot failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Failed to serialize or deserialize data.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-readable error codes shared by single-shot and streaming calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    RateLimited,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    /// HTTP-style status associated with the code.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::NotFound => 404,
            ErrorCode::RateLimited => 429,
            ErrorCode::UpstreamError => 502,
            ErrorCode::InternalError => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "Bad request",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::NotFound => "Not found",
            ErrorCode::RateLimited => "Rate limited",
            ErrorCode::UpstreamError => "Upstream provider error",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure expressed in the shared taxonomy.
///
/// Single-shot calls return it as `Err`; streaming calls turn it into a
/// terminal `error` event.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Map<String, Value>,
}

impl AppError {
    /// Creates an error with the code's default message and no details.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: Map::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest).with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound).with_message(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds one entry to the details map.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.code.status()
    }

    /// The `{code, message, details}` body used by error responses and
    /// `error` stream events.
    pub fn body(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "details": self.details,
        })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::not_found(format!("{} not found", what)),
            other => AppError::internal("Prompt store failure")
                .with_detail("error", other.to_string()),
        }
    }
}
