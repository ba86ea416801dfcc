//! Route handlers. Each one forwards to a fixed upstream path; path IDs are
//! encoded as single segments so they cannot reach another route.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::error::BffError;
use super::proxy::{message_response, Forward, Relayed};
use super::AppState;
use crate::api::client::encode_path;

// ============================================================================
// Items
// ============================================================================

pub async fn list_items(
  State(state): State<AppState>,
  RawQuery(query): RawQuery,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers).with_query(query);
  Ok(
    state
      .upstream
      .exchange(Method::GET, "items", forward)
      .await?
      .into_response(),
  )
}

pub async fn create_item(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers).with_body(&body);
  Ok(
    state
      .upstream
      .exchange(Method::POST, "items", forward)
      .await?
      .into_response(),
  )
}

pub async fn get_item(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  get_one(&state, &["items", &id], &headers, "Item not found").await
}

pub async fn update_item(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  update(
    &state,
    &["items", &id],
    &headers,
    &body,
    "Failed to update item",
  )
  .await
}

pub async fn delete_item(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  remove(&state, &["items", &id], &headers, "Failed to delete item").await
}

pub async fn duplicate_item(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  let Some(path) = encode_path(&["items", &id, "duplicate"]) else {
    return Ok(message_response(StatusCode::NOT_FOUND, "Item not found"));
  };
  let forward = Forward::from_headers(&headers).with_body(&body);
  let response = state.upstream.send(Method::POST, &path, forward).await?;

  if !response.status().is_success() {
    return Relayed::failure(response, "Failed to duplicate item").await;
  }
  Ok(Relayed::read(response).await?.into_response_as(StatusCode::CREATED))
}

/// Stream the spreadsheet through without buffering it.
pub async fn export_items(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  let response = state
    .upstream
    .send_streaming(Method::GET, "items/export", Forward::from_headers(&headers))
    .await?;

  let status = response.status();
  if !status.is_success() {
    warn!("Export failed upstream with {}", status);
    return Ok(message_response(status, "Failed to export inventory"));
  }

  let mut builder = Response::builder().status(StatusCode::OK);
  for name in [CONTENT_TYPE, CONTENT_DISPOSITION] {
    if let Some(value) = response.headers().get(&name) {
      builder = builder.header(name, value.clone());
    }
  }
  Ok(builder.body(Body::from_stream(response.bytes_stream()))?)
}

// ============================================================================
// Labels
// ============================================================================

pub async fn list_labels(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers);
  Ok(
    state
      .upstream
      .exchange(Method::GET, "labels", forward)
      .await?
      .into_response(),
  )
}

pub async fn create_label(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers).with_body(&body);
  Ok(
    state
      .upstream
      .exchange(Method::POST, "labels", forward)
      .await?
      .into_response(),
  )
}

// ============================================================================
// Locations
// ============================================================================

pub async fn list_locations(
  State(state): State<AppState>,
  RawQuery(query): RawQuery,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers).with_query(query);
  Ok(
    state
      .upstream
      .exchange(Method::GET, "locations", forward)
      .await?
      .into_response(),
  )
}

pub async fn create_location(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  let forward = Forward::from_headers(&headers).with_body(&body);
  Ok(
    state
      .upstream
      .exchange(Method::POST, "locations", forward)
      .await?
      .into_response(),
  )
}

pub async fn get_location(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  get_one(
    &state,
    &["locations", &id],
    &headers,
    "Location not found",
  )
  .await
}

pub async fn update_location(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Response, BffError> {
  update(
    &state,
    &["locations", &id],
    &headers,
    &body,
    "Failed to update location",
  )
  .await
}

pub async fn delete_location(
  State(state): State<AppState>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, BffError> {
  remove(
    &state,
    &["locations", &id],
    &headers,
    "Failed to delete location",
  )
  .await
}

// ============================================================================
// Auth
// ============================================================================

/// Credentials are forwarded; no `Authorization` header is involved.
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, BffError> {
  let forward = Forward::default().with_body(&body);
  Ok(
    state
      .upstream
      .exchange(Method::POST, "users/login", forward)
      .await?
      .into_response(),
  )
}

// ============================================================================
// Shared shapes
// ============================================================================

/// Single-resource read; a 404 becomes a uniform not-found payload.
async fn get_one(
  state: &AppState,
  segments: &[&str],
  headers: &HeaderMap,
  not_found: &str,
) -> Result<Response, BffError> {
  let Some(path) = encode_path(segments) else {
    return Ok(message_response(StatusCode::NOT_FOUND, not_found));
  };
  let response = state
    .upstream
    .send(Method::GET, &path, Forward::from_headers(headers))
    .await?;
  if response.status() == StatusCode::NOT_FOUND {
    return Ok(message_response(StatusCode::NOT_FOUND, not_found));
  }

  Ok(Relayed::read(response).await?.into_response())
}

/// Update: upstream errors keep their status with a message fallback; success is 200.
async fn update(
  state: &AppState,
  segments: &[&str],
  headers: &HeaderMap,
  body: &Bytes,
  fallback: &str,
) -> Result<Response, BffError> {
  let Some(path) = encode_path(segments) else {
    return Ok(message_response(StatusCode::NOT_FOUND, fallback));
  };
  let forward = Forward::from_headers(headers).with_body(body);
  let response = state.upstream.send(Method::PUT, &path, forward).await?;

  if !response.status().is_success() {
    return Relayed::failure(response, fallback).await;
  }
  Ok(Relayed::read(response).await?.into_response_as(StatusCode::OK))
}

/// Delete: success is always 204 with an empty body.
async fn remove(
  state: &AppState,
  segments: &[&str],
  headers: &HeaderMap,
  fallback: &str,
) -> Result<Response, BffError> {
  let Some(path) = encode_path(segments) else {
    return Ok(message_response(StatusCode::NOT_FOUND, fallback));
  };
  let response = state
    .upstream
    .send(Method::DELETE, &path, Forward::from_headers(headers))
    .await?;

  if !response.status().is_success() {
    return Relayed::failure(response, fallback).await;
  }
  Ok(StatusCode::NO_CONTENT.into_response())
}
