//! Typed HTTP client: the single place outbound API requests are made.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::params::QueryParams;
use super::types::ExportFile;
use crate::error::ApiError;
use crate::session::Session;

/// Request payload.
pub enum RequestBody {
  Empty,
  Json(Value),
  /// Sent without an explicit content type so the multipart boundary is generated.
  Multipart(Form),
}

impl RequestBody {
  pub fn json<T: Serialize>(payload: &T) -> Result<Self, ApiError> {
    serde_json::to_value(payload).map(RequestBody::Json).map_err(|e| {
      warn!("Failed to serialize request body: {}", e);
      ApiError::decode()
    })
  }
}

/// API client wrapper
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let base_url = normalize_base(base_url)?;
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  pub async fn get<T: DeserializeOwned>(
    &self,
    session: &Session,
    path: &str,
    params: Option<&QueryParams>,
  ) -> Result<T, ApiError> {
    self
      .request(session, Method::GET, path, params, RequestBody::Empty)
      .await
  }

  pub async fn post<T: DeserializeOwned>(
    &self,
    session: &Session,
    path: &str,
    body: RequestBody,
  ) -> Result<T, ApiError> {
    self.request(session, Method::POST, path, None, body).await
  }

  pub async fn put<T: DeserializeOwned>(
    &self,
    session: &Session,
    path: &str,
    body: RequestBody,
  ) -> Result<T, ApiError> {
    self.request(session, Method::PUT, path, None, body).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, session: &Session, path: &str) -> Result<T, ApiError> {
    self
      .request(session, Method::DELETE, path, None, RequestBody::Empty)
      .await
  }

  /// GET a binary payload, keeping the upstream content headers.
  pub async fn download(&self, session: &Session, path: &str) -> Result<ExportFile, ApiError> {
    let response = self
      .send(session, Method::GET, path, None, RequestBody::Empty)
      .await?;

    let header = |name| {
      response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
    };
    let content_type = header(CONTENT_TYPE);
    let content_disposition = header(CONTENT_DISPOSITION);

    let bytes = response.bytes().await.map_err(|e| {
      warn!("Failed to read download body from {}: {}", path, e);
      ApiError::transport()
    })?;

    Ok(ExportFile {
      content_type,
      content_disposition,
      bytes: bytes.to_vec(),
    })
  }

  async fn request<T: DeserializeOwned>(
    &self,
    session: &Session,
    method: Method,
    path: &str,
    params: Option<&QueryParams>,
    body: RequestBody,
  ) -> Result<T, ApiError> {
    let response = self.send(session, method, path, params, body).await?;
    decode_body(response).await
  }

  /// Issue the request and turn any non-2xx status into an `ApiError`.
  async fn send(
    &self,
    session: &Session,
    method: Method,
    path: &str,
    params: Option<&QueryParams>,
    body: RequestBody,
  ) -> Result<Response, ApiError> {
    let url = self.endpoint(path, params)?;
    debug!("{} {}", method, url);

    let mut request = self.http.request(method, url.clone());
    if let Some(authorization) = session.authorization() {
      request = request.header(AUTHORIZATION, authorization);
    }
    request = match body {
      RequestBody::Empty => request.header(CONTENT_TYPE, "application/json"),
      RequestBody::Json(value) => request
        .header(CONTENT_TYPE, "application/json")
        .body(value.to_string()),
      RequestBody::Multipart(form) => request.multipart(form),
    };

    let response = request.send().await.map_err(|e| {
      warn!("Request to {} failed: {}", url, e);
      ApiError::transport()
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let message = response
      .json::<Value>()
      .await
      .ok()
      .and_then(|body| body.get("message")?.as_str().map(String::from));
    debug!("{} responded {}", url, status);
    Err(ApiError::from_response(status, message))
  }

  fn endpoint(&self, path: &str, params: Option<&QueryParams>) -> Result<Url, ApiError> {
    let mut url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| {
        warn!("Invalid endpoint path '{}': {}", path, e);
        ApiError::transport()
      })?;

    if let Some(params) = params.filter(|p| !p.is_empty()) {
      let mut query = url.query_pairs_mut();
      for (key, value) in params.pairs() {
        query.append_pair(key, value);
      }
    }
    Ok(url)
  }
}

/// Ensure the base ends with `/` so relative paths nest under it.
pub(crate) fn normalize_base(base_url: &str) -> Result<Url> {
  let base = if base_url.ends_with('/') {
    base_url.to_string()
  } else {
    format!("{}/", base_url)
  };
  Url::parse(&base).map_err(|e| eyre!("Invalid API base URL '{}': {}", base_url, e))
}

/// Relative path built from whole segments. Each segment is percent-encoded,
/// so a `/` or `?` inside an ID cannot leave the resource path. Empty, `.`
/// and `..` segments are refused.
pub(crate) fn encode_path(segments: &[&str]) -> Option<String> {
  let mut url = Url::parse("http://localhost/").ok()?;
  {
    let mut path = url.path_segments_mut().ok()?;
    path.clear();
    for segment in segments {
      if matches!(*segment, "" | "." | "..") {
        return None;
      }
      path.push(segment);
    }
  }
  Some(url.path().trim_start_matches('/').to_string())
}

/// [`encode_path`] for the typed client; an unroutable ID cannot name a resource.
pub(crate) fn resource_path(segments: &[&str]) -> Result<String, ApiError> {
  encode_path(segments).ok_or_else(|| {
    warn!("Refusing to build a path from {:?}", segments);
    ApiError::from_response(reqwest::StatusCode::NOT_FOUND, None)
  })
}

/// Decode a success body. Empty or non-JSON bodies decode as `null`.
async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  let is_json = response
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.contains("application/json"));

  let bytes = response.bytes().await.map_err(|e| {
    warn!("Failed to read response body: {}", e);
    ApiError::transport()
  })?;

  let value = if is_json && !bytes.is_empty() {
    serde_json::from_slice(&bytes).map_err(|e| {
      warn!("Response body is not valid JSON: {}", e);
      ApiError::decode()
    })?
  } else {
    Value::Null
  };

  serde_json::from_value(value).map_err(|e| {
    warn!("Unexpected response shape: {}", e);
    ApiError::decode()
  })
}
