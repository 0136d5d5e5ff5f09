// 🔐 Session - credentials, user info and the session-expired flag
//
// Session data lives in a key/value store (the CLI persists it in SQLite).
// Consumers never read the store directly: they take a `SessionContext`
// snapshot and pass it to the gate and the form.

use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const SESSION_EXPIRED_KEY: &str = "sessionExpired";
pub const REDIRECT_KEY: &str = "redirectUrl";

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ADMIN: &str = "ADMIN";

// ============================================================================
// USER INFO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "string_roles")]
    pub roles: Vec<String>,

    /// Anything else the backend sends about the user
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Keep the string roles of a role collection, skip anything else.
fn string_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let roles = match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(role) => Some(role),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(roles)
}

impl UserInfo {
    pub fn with_roles(username: &str, roles: &[&str]) -> Self {
        UserInfo {
            sub: None,
            username: Some(username.to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            extra: serde_json::Map::new(),
        }
    }

    /// Name shown to the user: `sub`, then `username`, then "User".
    pub fn display_name(&self) -> &str {
        [self.sub.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or("User")
    }
}

/// ROLE_ADMIN or ADMIN, exact case-sensitive match.
pub fn is_admin(user: Option<&UserInfo>) -> bool {
    user.map(|u| u.roles.iter().any(|role| role == ROLE_ADMIN || role == ADMIN))
        .unwrap_or(false)
}

// ============================================================================
// SESSION STORE
// ============================================================================

/// String key/value storage for session state.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_store(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

fn setup_store(conn: &Connection) -> Result<(), StoreError> {
    // WAL keeps the file consistent if the CLI is killed mid-write
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

impl SessionStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// SESSION CONTEXT
// ============================================================================

/// Immutable snapshot of who is logged in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub token: Option<String>,
    pub user: Option<UserInfo>,

    /// Backend rejected the token; a fresh login is pending
    pub session_expired: bool,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(token: &str, user: UserInfo) -> Self {
        SessionContext {
            token: Some(token.to_string()),
            user: Some(user),
            session_expired: false,
        }
    }

    /// Token presence is what counts as logged in.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn current_user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        is_admin(self.user.as_ref())
    }

    pub fn expired(mut self) -> Self {
        self.session_expired = true;
        self
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Session operations over a store. Store failures are logged and treated
/// as "no value"; nothing here is fatal to the caller.
pub struct Session<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> Session<S> {
    pub fn new(store: S) -> Self {
        Session { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "session store read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.set(key, value)
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "session store delete failed");
        }
    }

    /// Persist a fresh login and drop any expiry left from a previous session.
    pub fn establish(&self, token: &str, user: &UserInfo) -> Result<(), StoreError> {
        let user_json = serde_json::to_string(user)?;
        self.write(TOKEN_KEY, token)?;
        self.write(USER_KEY, &user_json)?;
        self.clear_expired();
        tracing::info!(user = user.display_name(), "session established");
        Ok(())
    }

    pub fn logout(&self) {
        for key in [TOKEN_KEY, USER_KEY, SESSION_EXPIRED_KEY, REDIRECT_KEY] {
            self.delete(key);
        }
        tracing::info!("session cleared");
    }

    pub fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Parsed user info; a corrupt entry is logged and reads as absent.
    pub fn current_user(&self) -> Option<UserInfo> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "stored user info is not valid JSON");
                None
            }
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            token: self.token(),
            user: self.current_user(),
            session_expired: self.is_expired(),
        }
    }

    /// Flag the session as expired and remember where the user was.
    pub fn mark_expired(&self, location: Option<&str>) {
        if let Some(location) = location {
            if let Err(e) = self.write(REDIRECT_KEY, location) {
                tracing::warn!(error = %e, "failed to store redirect target");
            }
        }
        if let Err(e) = self.write(SESSION_EXPIRED_KEY, "true") {
            tracing::warn!(error = %e, "failed to store session-expired flag");
        }
    }

    pub fn is_expired(&self) -> bool {
        self.read(SESSION_EXPIRED_KEY).as_deref() == Some("true")
    }

    pub fn clear_expired(&self) {
        self.delete(SESSION_EXPIRED_KEY);
    }

    pub fn remember_redirect(&self, location: &str) {
        if let Err(e) = self.write(REDIRECT_KEY, location) {
            tracing::warn!(error = %e, "failed to store redirect target");
        }
    }

    /// Pop the remembered post-login location.
    pub fn take_redirect(&self) -> Option<String> {
        let target = self.read(REDIRECT_KEY)?;
        self.delete(REDIRECT_KEY);
        Some(target)
    }
}

// ============================================================================
// TESTS
// ============================================================================
