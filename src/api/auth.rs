use super::client::{ApiClient, RequestBody};
use super::types::{LoginRequest, LoginResponse};
use crate::error::ApiError;
use crate::session::{Session, User};

#[derive(Clone)]
pub struct AuthApi {
  client: ApiClient,
}

impl AuthApi {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// Exchange credentials for a session.
  ///
  /// The service answers with a token only, so the local user record is
  /// built from the username.
  pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
    let request = LoginRequest {
      username: username.to_string(),
      password: password.to_string(),
    };
    let response: LoginResponse = self
      .client
      .post(
        &Session::anonymous(),
        "users/login",
        RequestBody::json(&request)?,
      )
      .await?;

    let user = User {
      id: username.to_string(),
      username: username.to_string(),
      email: None,
    };
    Ok(Session::new(response.token, user))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::spawn_upstream;
  use axum::http::StatusCode;
  use axum::routing::post;
  use axum::{Json, Router};
  use serde_json::{json, Value};
  use std::time::Duration;

  #[tokio::test]
  async fn test_login_builds_session() {
    let router = Router::new().route(
      "/users/login",
      post(|Json(body): Json<Value>| async move {
        if body["password"] == "hunter2" {
          (StatusCode::OK, Json(json!({"token": "Bearer abc"})))
        } else {
          (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"})))
        }
      }),
    );
    let base = spawn_upstream(router).await;
    let api = AuthApi::new(ApiClient::new(&base, Duration::from_secs(5)).unwrap());

    let session = api.login("alice", "hunter2").await.unwrap();
    assert_eq!(session.authorization().as_deref(), Some("Bearer abc"));
    assert_eq!(session.user().map(|u| u.username.as_str()), Some("alice"));

    let err = api.login("alice", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
  }
}
