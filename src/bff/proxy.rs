//! Outbound half of the BFF: forwards one inbound request to the upstream service.

use axum::body::Bytes;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::BffError;
use crate::api::client::normalize_base;

/// Inbound request data that is relayed upstream.
#[derive(Debug, Default)]
pub struct Forward {
  pub authorization: Option<axum::http::HeaderValue>,
  pub query: Option<String>,
  pub body: Option<Value>,
}

impl Forward {
  /// Carry the caller's `Authorization` header verbatim.
  pub fn from_headers(headers: &HeaderMap) -> Self {
    Self {
      authorization: headers.get(AUTHORIZATION).cloned(),
      ..Default::default()
    }
  }

  pub fn with_query(mut self, query: Option<String>) -> Self {
    self.query = query.filter(|q| !q.is_empty());
    self
  }

  /// JSON body; a missing or unparseable body becomes `{}`.
  pub fn with_body(mut self, body: &Bytes) -> Self {
    self.body = Some(serde_json::from_slice(body).unwrap_or_else(|_| json!({})));
    self
  }
}

/// Upstream JSON response, read in full.
#[derive(Debug)]
pub struct Relayed {
  pub status: StatusCode,
  pub body: Option<Value>,
}

impl Relayed {
  /// The body's `message`, or `fallback` when there is none.
  pub fn message_or(&self, fallback: &str) -> String {
    self
      .body
      .as_ref()
      .and_then(|b| b.get("message"))
      .and_then(Value::as_str)
      .filter(|m| !m.is_empty())
      .unwrap_or(fallback)
      .to_string()
  }

  /// Relay the status and body unchanged.
  pub fn into_response_as(self, status: StatusCode) -> Response {
    match self.body {
      Some(body) => (status, Json(body)).into_response(),
      None => status.into_response(),
    }
  }
}

impl IntoResponse for Relayed {
  fn into_response(self) -> Response {
    let status = self.status;
    self.into_response_as(status)
  }
}

/// Error payload in the dashboard's `{"message": ...}` shape.
pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
  (status, Json(json!({ "message": message.into() }))).into_response()
}

#[derive(Clone)]
pub struct Upstream {
  http: reqwest::Client,
  base_url: Url,
  timeout: Duration,
}

impl Upstream {
  /// `timeout` bounds connecting and each read on every request, and the
  /// whole exchange for everything except streamed downloads.
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let base_url = normalize_base(base_url)?;
    let http = reqwest::Client::builder()
      .connect_timeout(timeout)
      .read_timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create upstream HTTP client: {}", e))?;
    Ok(Self {
      http,
      base_url,
      timeout,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Send `forward` to `path` under the upstream base and return the raw response.
  pub async fn send(
    &self,
    method: Method,
    path: &str,
    forward: Forward,
  ) -> Result<reqwest::Response, BffError> {
    let (request, url) = self.request(method, path, forward)?;
    dispatch(request.timeout(self.timeout), url).await
  }

  /// Like [`Upstream::send`], but with no cap on the total time so a large
  /// body can stream for as long as data keeps arriving.
  pub async fn send_streaming(
    &self,
    method: Method,
    path: &str,
    forward: Forward,
  ) -> Result<reqwest::Response, BffError> {
    let (request, url) = self.request(method, path, forward)?;
    dispatch(request, url).await
  }

  fn request(
    &self,
    method: Method,
    path: &str,
    forward: Forward,
  ) -> Result<(reqwest::RequestBuilder, Url), BffError> {
    let mut url = self.base_url.join(path.trim_start_matches('/'))?;
    // The inbound query string is relayed as-is, without re-encoding.
    url.set_query(forward.query.as_deref());
    debug!("-> {} {}", method, url);

    let mut request = self.http.request(method, url.clone());
    if let Some(authorization) = forward.authorization {
      request = request.header(AUTHORIZATION, authorization);
    }
    request = request.header(CONTENT_TYPE, "application/json");
    if let Some(body) = forward.body {
      request = request.body(body.to_string());
    }
    Ok((request, url))
  }

  /// Send and read the JSON response.
  pub async fn exchange(
    &self,
    method: Method,
    path: &str,
    forward: Forward,
  ) -> Result<Relayed, BffError> {
    let response = self.send(method, path, forward).await?;
    Relayed::read(response).await
  }
}

async fn dispatch(request: reqwest::RequestBuilder, url: Url) -> Result<reqwest::Response, BffError> {
  let response = request.send().await.map_err(|e| {
    warn!("Upstream {} unreachable: {}", url, e);
    e
  })?;
  debug!("<- {} {}", response.status(), url);
  Ok(response)
}

impl Relayed {
  /// Read a response in full. An empty body reads as `None`; anything else
  /// must be JSON.
  pub async fn read(response: reqwest::Response) -> Result<Self, BffError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
      None
    } else {
      Some(serde_json::from_slice(&bytes)?)
    };
    Ok(Self { status, body })
  }

  /// Turn a failed response into `{"message": ...}` with the upstream status.
  /// An unreadable error body falls back to `fallback`.
  pub async fn failure(response: reqwest::Response, fallback: &str) -> Result<Response, BffError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let relayed = Self {
      status,
      body: serde_json::from_slice(&bytes).ok(),
    };
    warn!("Upstream answered {}", status);
    Ok(message_response(status, relayed.message_or(fallback)))
  }
}
