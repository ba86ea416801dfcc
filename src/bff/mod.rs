//! Backend-for-frontend: same-origin passthrough to the inventory service.
//!
//! Routes mirror the upstream API under `/api`. The dashboard's own
//! paths (`/api/inventory...`, `/api/login`) are served as aliases.

mod error;
mod proxy;
mod routes;

use axum::routing::{get, post};
use axum::Router;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use proxy::Upstream;

use crate::config::BffConfig;

pub struct BffState {
  pub upstream: Upstream,
}

pub type AppState = Arc<BffState>;

fn item_routes() -> Router<AppState> {
  Router::new()
    .route("/", get(routes::list_items).post(routes::create_item))
    .route("/export", get(routes::export_items))
    .route(
      "/:id",
      get(routes::get_item)
        .put(routes::update_item)
        .delete(routes::delete_item),
    )
    .route("/:id/duplicate", post(routes::duplicate_item))
}

pub fn router(upstream: Upstream) -> Router {
  let state = Arc::new(BffState { upstream });

  Router::new()
    .nest("/api/items", item_routes())
    .nest("/api/inventory", item_routes())
    .route(
      "/api/labels",
      get(routes::list_labels).post(routes::create_label),
    )
    .route(
      "/api/locations",
      get(routes::list_locations).post(routes::create_location),
    )
    .route(
      "/api/locations/:id",
      get(routes::get_location)
        .put(routes::update_location)
        .delete(routes::delete_location),
    )
    .route("/api/users/login", post(routes::login))
    .route("/api/login", post(routes::login))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Run the BFF until Ctrl+C or SIGTERM.
pub async fn serve(config: &BffConfig) -> Result<()> {
  let upstream = Upstream::new(&config.upstream_url, config.timeout())?;
  info!("Proxying to {}", upstream.base_url());
  let app = router(upstream);

  let listener = TcpListener::bind(config.listen)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", config.listen, e))?;
  info!("Listening on {}", config.listen);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| eyre!("Server error: {}", e))?;

  info!("Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::warn!("Failed to listen for Ctrl+C: {}", e);
      std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
        info!("Received terminate signal, shutting down");
      }
      Err(e) => {
        tracing::warn!("Failed to install SIGTERM handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::spawn_upstream;
  use axum::body::{Body, Bytes};
  use axum::extract::{Path, RawQuery};
  use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
  use axum::http::{HeaderMap, StatusCode};
  use axum::response::{IntoResponse, Response};
  use axum::Json;
  use serde_json::{json, Value};
  use std::time::Duration;

  fn item_json(id: &str) -> Value {
    json!({
      "id": id, "name": "Drill", "quantity": 1,
      "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
    })
  }

  /// Fake inventory service mounted under `/api/v1`.
  fn upstream_router() -> Router {
    let v1 = Router::new()
      .route(
        "/items",
        get(|RawQuery(query): RawQuery, headers: HeaderMap| async move {
          let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
          Json(json!({"query": query, "auth": auth}))
        })
        .post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
      )
      .route(
        "/items/export",
        get(|| async {
          Response::builder()
            .header(CONTENT_TYPE, "text/csv")
            .header(CONTENT_DISPOSITION, "attachment; filename=\"inventory.csv\"")
            .body(Body::from("id,name\ni1,Drill\n"))
            .unwrap()
        }),
      )
      .route(
        "/items/:id",
        get(|Path(id): Path<String>| async move {
          if id == "missing" {
            (StatusCode::NOT_FOUND, Json(json!({"error": "no such row"}))).into_response()
          } else {
            Json(item_json(&id)).into_response()
          }
        })
        .put(|Path(id): Path<String>| async move {
          if id == "bad" {
            (StatusCode::UNPROCESSABLE_ENTITY, "oops").into_response()
          } else {
            Json(item_json(&id)).into_response()
          }
        })
        .delete(|| async { StatusCode::OK }),
      )
      .route(
        "/items/:id/duplicate",
        post(|body: Bytes| async move {
          let body: Value = serde_json::from_slice(&body).unwrap();
          Json(json!({"received": body}))
        }),
      )
      .route(
        "/locations/:id",
        get(|| async { (StatusCode::NOT_FOUND, "") })
          .put(|| async { (StatusCode::BAD_REQUEST, Json(json!({"message": "name taken"}))) })
          .delete(|| async { (StatusCode::CONFLICT, Json(json!({}))) }),
      )
      .route("/labels", get(|| async { Json(json!({"hit": "labels"})) }))
      .route(
        "/users/login",
        post(|Json(body): Json<Value>| async move {
          Json(json!({"token": format!("Bearer {}", body["username"].as_str().unwrap_or_default())}))
        }),
      );
    Router::new().nest("/api/v1", v1)
  }

  async fn spawn_bff() -> String {
    let upstream_base = spawn_upstream(upstream_router()).await;
    let upstream = Upstream::new(&format!("{}api/v1", upstream_base), Duration::from_secs(5)).unwrap();
    spawn_upstream(router(upstream)).await
  }

  #[tokio::test]
  async fn test_list_forwards_query_and_authorization() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .get(format!("{}api/items?page=2&locations=L1%2CL2", bff))
      .header(AUTHORIZATION, "Bearer abc")
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["query"], "page=2&locations=L1%2CL2");
    assert_eq!(body["auth"], "Bearer abc");
  }

  #[tokio::test]
  async fn test_create_relays_status() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .post(format!("{}api/inventory", bff))
      .json(&json!({"name": "Ladder"}))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.json::<Value>().await.unwrap()["name"], "Ladder");
  }

  #[tokio::test]
  async fn test_item_not_found_payload() {
    let bff = spawn_bff().await;
    let resp = reqwest::get(format!("{}api/items/missing", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
      resp.json::<Value>().await.unwrap(),
      json!({"message": "Item not found"})
    );
  }

  #[tokio::test]
  async fn test_location_not_found_payload() {
    let bff = spawn_bff().await;
    let resp = reqwest::get(format!("{}api/locations/nope", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
      resp.json::<Value>().await.unwrap(),
      json!({"message": "Location not found"})
    );
  }

  #[tokio::test]
  async fn test_delete_success_is_empty_204() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .delete(format!("{}api/items/i1", bff))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.bytes().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_failed_location_delete_uses_fallback() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .delete(format!("{}api/locations/l1", bff))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(
      resp.json::<Value>().await.unwrap(),
      json!({"message": "Failed to delete location"})
    );
  }

  #[tokio::test]
  async fn test_update_errors() {
    let bff = spawn_bff().await;
    let client = reqwest::Client::new();

    let resp = client
      .put(format!("{}api/items/bad", bff))
      .json(&json!({"quantity": -1}))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
      resp.json::<Value>().await.unwrap(),
      json!({"message": "Failed to update item"})
    );

    let resp = client
      .put(format!("{}api/locations/l1", bff))
      .json(&json!({"name": "Garage"}))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"message": "name taken"}));
  }

  #[tokio::test]
  async fn test_duplicate_defaults_body_and_returns_201() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .post(format!("{}api/items/i1/duplicate", bff))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"received": {}}));
  }

  #[tokio::test]
  async fn test_export_passes_headers_and_bytes() {
    let bff = spawn_bff().await;
    let resp = reqwest::get(format!("{}api/items/export", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/csv");
    assert_eq!(
      resp.headers()[CONTENT_DISPOSITION],
      "attachment; filename=\"inventory.csv\""
    );
    assert_eq!(resp.text().await.unwrap(), "id,name\ni1,Drill\n");
  }

  #[tokio::test]
  async fn test_login_alias() {
    let bff = spawn_bff().await;
    let resp = reqwest::Client::new()
      .post(format!("{}api/login", bff))
      .json(&json!({"username": "ada", "password": "pw"}))
      .send()
      .await
      .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap()["token"], "Bearer ada");
  }

  #[tokio::test]
  async fn test_encoded_slash_in_id_stays_on_item_route() {
    let bff = spawn_bff().await;
    let resp = reqwest::get(format!("{}api/items/..%2Flabels", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "../labels");
    assert!(body.get("hit").is_none());
  }

  #[tokio::test]
  async fn test_slow_export_streams_past_request_budget() {
    let slow = Router::new().route(
      "/items/export",
      get(|| async {
        let rows = futures::stream::unfold(0u8, |n| async move {
          if n == 4 {
            return None;
          }
          tokio::time::sleep(Duration::from_millis(150)).await;
          Some((Ok::<_, std::io::Error>(Bytes::from(format!("row{}\n", n))), n + 1))
        });
        Response::builder()
          .header(CONTENT_TYPE, "text/csv")
          .body(Body::from_stream(rows))
          .unwrap()
      }),
    );
    let upstream_base = spawn_upstream(slow).await;
    let upstream = Upstream::new(&upstream_base, Duration::from_millis(400)).unwrap();
    let bff = spawn_upstream(router(upstream)).await;

    let resp = reqwest::get(format!("{}api/items/export", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "row0\nrow1\nrow2\nrow3\n");
  }

  #[tokio::test]
  async fn test_unreachable_upstream_is_opaque_500() {
    let upstream = Upstream::new("http://127.0.0.1:9/api/v1", Duration::from_secs(2)).unwrap();
    let bff = spawn_upstream(router(upstream)).await;
    let resp = reqwest::get(format!("{}api/labels", bff)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      resp.json::<Value>().await.unwrap(),
      json!({"message": "Internal Server Error"})
    );
  }
}
