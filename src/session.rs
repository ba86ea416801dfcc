//! Authenticated request context and its local persistence.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Storage key for the serialized user record.
pub const USER_KEY: &str = "auth_user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub username: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

/// Request context passed to every API call.
///
/// The token is opaque and only forwarded. An anonymous session sends no
/// `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  token: Option<String>,
  user: Option<User>,
}

impl Session {
  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn new(token: impl Into<String>, user: User) -> Self {
    Self {
      token: Some(token.into()),
      user: Some(user),
    }
  }

  pub fn token(&self) -> Option<&str> {
    self.token.as_deref()
  }

  pub fn user(&self) -> Option<&User> {
    self.user.as_ref()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }

  /// Header value for this session, adding the `Bearer ` prefix when missing.
  pub fn authorization(&self) -> Option<String> {
    self.token.as_ref().map(|token| {
      if token.starts_with("Bearer ") {
        token.clone()
      } else {
        format!("Bearer {}", token)
      }
    })
  }
}

/// Trait for session persistence backends.
pub trait SessionStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

/// Save, restore and clear the persisted session under the two fixed keys.
pub struct SessionStore<S: SessionStorage> {
  storage: S,
}

impl<S: SessionStorage> SessionStore<S> {
  pub fn new(storage: S) -> Self {
    Self { storage }
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    let (Some(token), Some(user)) = (session.token(), session.user()) else {
      return Err(eyre!("Cannot persist an anonymous session"));
    };
    let user = serde_json::to_string(user)?;
    self.storage.set(TOKEN_KEY, token)?;
    self.storage.set(USER_KEY, &user)?;
    Ok(())
  }

  /// Restore the session; both keys must be present, otherwise anonymous.
  pub fn restore(&self) -> Result<Session> {
    let token = self.storage.get(TOKEN_KEY)?;
    let user = self.storage.get(USER_KEY)?;

    match (token, user) {
      (Some(token), Some(user)) => match serde_json::from_str::<User>(&user) {
        Ok(user) => Ok(Session::new(token, user)),
        Err(e) => {
          tracing::warn!("Discarding unreadable stored user: {}", e);
          Ok(Session::anonymous())
        }
      },
      _ => Ok(Session::anonymous()),
    }
  }

  pub fn clear(&self) -> Result<()> {
    self.storage.remove(TOKEN_KEY)?;
    self.storage.remove(USER_KEY)?;
    Ok(())
  }
}

/// SQLite-backed key/value storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory session database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("stockpile").join("session.db"))
  }
}

const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SessionStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM local_storage WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM local_storage WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove {}: {}", key, e))?;
    Ok(())
  }
}
