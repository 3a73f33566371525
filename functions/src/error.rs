use std::{fmt, io, num::ParseIntError, str::Utf8Error};

use http::{header::ToStrError, StatusCode};

use crate::http::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request head")]
    InvalidFormat,
    #[error("unsupported http version")]
    UnsupportedVersion,
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error(transparent)]
    HttpError(#[from] http::Error),
    #[error("request head is not valid utf-8: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] ToStrError),
    #[error("invalid content-length: {0}")]
    ContentLength(#[from] ParseIntError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("failed to write response head: {0}")]
    Format(#[from] fmt::Error),
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] ToStrError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::HeadTooLarge(_) | Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Failures a handler reports back to the caller instead of crashing.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The request body could not be decoded.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// A required field was absent or empty.
    #[error("{0}")]
    MissingParameter(&'static str),
    #[error("Error executing command: {0}")]
    ExecutionError(String),
    #[error("Error making request: {0}")]
    UpstreamError(String),
    #[error("Bad StatusCode: {0}")]
    UpstreamBadStatus(u16),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::ExecutionError(_) | Self::UpstreamError(_) | Self::UpstreamBadStatus(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        tracing::warn!(err = %self, "handler failed");
        (self.status(), self.to_string()).into_response()
    }
}
