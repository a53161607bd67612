#![allow(non_shorthand_field_patterns)]
#![doc = "Error taxonomy shared by the transport, fetch, merge and report layers."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.
//!
//! Variants split into three groups. Transport failures (`Network`,
//! `Timeout`, `HttpStatus`) are produced by a single HTTP call and may be
//! retried. Policy outcomes (`Client`, `RetryExhausted`) are produced by the
//! retry layer once it has decided to stop. Everything else is local: bad
//! configuration, undecodable payloads, and file system failures.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Unified error type returned by every fallible operation in the crate.
#[derive(Debug, masterror::Error,)]
pub enum Error
{
    /// Connection-level failure before a status code was received.
    #[error("network error calling {endpoint}: {message}")]
    Network {
        /// Endpoint or path that was being requested.
        endpoint: String,
        /// Description reported by the HTTP client.
        message:  String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {endpoint} timed out")]
    Timeout {
        /// Endpoint or path that was being requested.
        endpoint: String,
    },
    /// Non-success status returned by the remote service.
    #[error("{endpoint} responded with HTTP {code}")]
    HttpStatus {
        /// Endpoint or path that was being requested.
        endpoint:    String,
        /// HTTP status code.
        code:        u16,
        /// Raw response body, possibly empty.
        body:        String,
        /// Delay advised by the server through `Retry-After`.
        retry_after: Option<Duration,>,
    },
    /// Non-retryable client error surfaced by the retry policy.
    ///
    /// Build through [`Error::client`] so the body is redacted where needed.
    #[error("{endpoint} rejected the request with HTTP {code} ({reason}): {body}")]
    Client {
        /// Endpoint or path that was being requested.
        endpoint: String,
        /// HTTP status code.
        code:     u16,
        /// Short description of the status code.
        reason:   &'static str,
        /// Response body, redacted for `401`.
        body:     String,
    },
    /// Retry budget exhausted for a transient failure.
    #[error("{endpoint} still failing after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Endpoint or path that was being requested.
        endpoint: String,
        /// Number of attempts made, including the first one.
        attempts: u32,
        /// Last transient error observed.
        source:   Box<Error,>,
    },
    /// Invalid configuration detected before or during the run.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Human readable message describing the problem.
        message: String,
    },
    /// Response payload did not have the expected shape.
    #[error("unexpected payload from {endpoint}: {message}")]
    Decode {
        /// Endpoint or path whose payload failed to decode.
        endpoint: String,
        /// Human readable message describing the problem.
        message:  String,
    },
    /// Wraps I/O errors raised while reading configuration or writing
    /// reports.
    #[error("I/O failure at {path:?}: {source}")]
    Io {
        /// Location involved in the failing operation.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Wraps YAML decoding errors.
    #[error("failed to parse configuration: {source}")]
    ConfigParse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error,
    },
    /// Report emitter failure other than plain I/O.
    #[error("failed to render report: {message}")]
    Report {
        /// Human readable message describing the problem.
        message: String,
    },
}

impl Error
{
    /// Constructs a configuration error from the provided message.
    pub fn configuration<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Constructs a decode error for the given endpoint.
    pub fn decode<E, M,>(endpoint: E, message: M,) -> Self
    where
        E: Into<String,>,
        M: Into<String,>,
    {
        Self::Decode {
            endpoint: endpoint.into(),
            message:  message.into(),
        }
    }

    /// Constructs a client error, dropping bodies that may echo credentials.
    pub fn client<E,>(endpoint: E, code: u16, body: String,) -> Self
    where
        E: Into<String,>,
    {
        let body = if code == 401 {
            "<sensitive data removed>".to_owned()
        } else {
            body
        };
        Self::Client {
            endpoint: endpoint.into(),
            code,
            reason:   describe_status(code,),
            body,
        }
    }

    /// Constructs a report error from the provided message.
    pub fn report<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::Report {
            message: message.into(),
        }
    }

    /// Returns `true` when the failure is transient and worth retrying.
    ///
    /// Network failures, timeouts, `429 Too Many Requests` and every `5xx`
    /// status qualify. Everything else is final.
    pub fn is_retryable(&self,) -> bool
    {
        match self {
            Self::Network {
                ..
            }
            | Self::Timeout {
                ..
            } => true,
            Self::HttpStatus {
                code, ..
            } => *code == 429 || (500..600).contains(code,),
            _ => false,
        }
    }

    /// Returns the HTTP status code carried by the error, if any.
    pub fn status_code(&self,) -> Option<u16,>
    {
        match self {
            Self::HttpStatus {
                code, ..
            }
            | Self::Client {
                code, ..
            } => Some(*code,),
            Self::RetryExhausted {
                source, ..
            } => source.status_code(),
            _ => None,
        }
    }

    /// Server-advised delay before the next attempt.
    pub fn retry_after(&self,) -> Option<Duration,>
    {
        match self {
            Self::HttpStatus {
                retry_after, ..
            } => *retry_after,
            _ => None,
        }
    }

    /// Formats the error for diagnostics without the variant name.
    pub fn to_display_string(&self,) -> String
    {
        format!("{self}")
    }
}

impl From<serde_yaml::Error,> for Error
{
    fn from(source: serde_yaml::Error,) -> Self
    {
        Self::ConfigParse {
            source,
        }
    }
}

impl From<csv::Error,> for Error
{
    fn from(error: csv::Error,) -> Self
    {
        Self::Report {
            message: error.to_string(),
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error,) -> Error
{
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Short description of common status codes returned by the inventory API.
pub fn describe_status(code: u16,) -> &'static str
{
    match code {
        400 => "Bad Request - invalid parameter passed",
        401 => "Unauthorized - invalid credentials or URI",
        403 => "Forbidden - operation not allowed for this token",
        404 => "Not Found - resource does not exist",
        409 => "Conflict - resource already exists",
        429 => "Too Many Requests - rate limit exceeded",
        500 => "Internal Server Error - error within the API",
        503 => "Service Unavailable - try again later",
        _ => "unexpected HTTP status",
    }
}
