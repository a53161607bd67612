// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Single authenticated HTTP call against the inventory API.
//!
//! The transport performs exactly one request per invocation and reports
//! failures without interpreting them; retry decisions belong to
//! [`crate::retry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, RETRY_AFTER},
};
use serde_json::Value;
use tracing::debug;

use crate::{config::ApiConfig, error::Error};

/// Response bodies embedded in errors are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Headers carrying rate-limit diagnostics worth logging.
const RATE_LIMIT_HEADERS: &[&str] =
    &["ot-period", "ot-ratelimit-event-id", "ot-requests-allowed", "ot-request-made",];

/// GET request relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct ApiRequest
{
    /// Absolute path starting with `/`.
    pub path:  String,
    /// Query parameters in the order they are sent.
    pub query: Vec<(String, String,),>,
}

impl ApiRequest
{
    pub fn new<P,>(path: P,) -> Self
    where
        P: Into<String,>,
    {
        Self {
            path:  path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn query<K, V,>(mut self, key: K, value: V,) -> Self
    where
        K: Into<String,>,
        V: ToString,
    {
        self.query.push((key.into(), value.to_string(),),);
        self
    }

    /// Path and query rendered for logs and error messages.
    pub fn describe(&self,) -> String
    {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String,> =
            self.query.iter().map(|(key, value,)| format!("{key}={value}"),).collect();
        format!("{}?{}", self.path, query.join("&",))
    }
}

/// Successful response with its decoded JSON body.
#[derive(Debug, Clone, PartialEq,)]
pub struct ApiResponse
{
    /// HTTP status code in the 2xx range.
    pub status: u16,
    /// Decoded body; `Value::Null` for empty responses.
    pub body:   Value,
}

/// Performs one HTTP GET and reports the outcome.
#[async_trait]
pub trait Transport: Send + Sync
{
    /// Issues `request` once.
    ///
    /// # Errors
    ///
    /// * [`Error::Network`] for connection-level failures.
    /// * [`Error::Timeout`] when the configured timeout elapses.
    /// * [`Error::HttpStatus`] for any non-2xx status.
    /// * [`Error::Decode`] when a 2xx body is not valid JSON.
    async fn get(&self, request: &ApiRequest,) -> Result<ApiResponse, Error,>;
}

/// [`Transport`] backed by `reqwest` with bearer authentication.
#[derive(Debug, Clone,)]
pub struct HttpTransport
{
    client:   Client,
    base_url: String,
    token:    String,
}

impl HttpTransport
{
    /// Builds a transport from API settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: &ApiConfig,) -> Result<Self, Error,>
    {
        let client = Client::builder()
            .timeout(config.timeout(),)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}"),),)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/',).to_owned(),
            token:    config.token.clone(),
        },)
    }
}

#[async_trait]
impl Transport for HttpTransport
{
    async fn get(&self, request: &ApiRequest,) -> Result<ApiResponse, Error,>
    {
        let endpoint = request.describe();
        let url = format!("{}{}", self.base_url, request.path);
        debug!(endpoint = %endpoint, "sending request");

        let response = self
            .client
            .get(&url,)
            .bearer_auth(&self.token,)
            .header(ACCEPT, "application/json",)
            .query(&request.query,)
            .send()
            .await
            .map_err(|e| classify(&endpoint, e,),)?;

        let status = response.status();
        log_rate_limit_headers(&endpoint, response.headers(),);
        let retry_after = parse_retry_after(response.headers(),);
        let text = response.text().await.map_err(|e| classify(&endpoint, e,),)?;
        debug!(endpoint = %endpoint, status = status.as_u16(), "received response");

        if !status.is_success() {
            return Err(Error::HttpStatus {
                endpoint,
                code: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS,).collect(),
                retry_after,
            },);
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text,).map_err(|e| Error::decode(endpoint.as_str(), e.to_string(),),)?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        },)
    }
}

fn classify(endpoint: &str, error: reqwest::Error,) -> Error
{
    if error.is_timeout() {
        Error::Timeout {
            endpoint: endpoint.to_owned(),
        }
    } else {
        Error::Network {
            endpoint: endpoint.to_owned(),
            message:  error.to_string(),
        }
    }
}

/// Reads an integer-seconds `Retry-After` header.
///
/// HTTP-date values are ignored and leave the computed backoff in charge.
pub(crate) fn parse_retry_after(headers: &HeaderMap,) -> Option<Duration,>
{
    headers
        .get(RETRY_AFTER,)
        .and_then(|value| value.to_str().ok(),)
        .and_then(|value| value.trim().parse::<u64,>().ok(),)
        .map(Duration::from_secs,)
}

fn log_rate_limit_headers(endpoint: &str, headers: &HeaderMap,)
{
    for name in RATE_LIMIT_HEADERS {
        if let Some(value,) = headers.get(*name,).and_then(|value| value.to_str().ok(),) {
            debug!(endpoint, header = *name, value, "rate limit header");
        }
    }
}
