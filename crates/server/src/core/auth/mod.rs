//! Session resolution
//!
//! Login and signup live outside this service. What the relationship core
//! needs is a way to turn a bearer token into a subject id, which is the
//! [`SessionProvider`] contract. Sessions are written into the shared
//! `sessions` table by whoever issues them; `create_session` exists for
//! provisioning tools and tests.

pub mod middleware;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Resolves bearer tokens to subject ids.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    /// Returns the subject id, or `None` for unknown or expired tokens.
    async fn resolve(&self, token: &str) -> Result<Option<String>>;
}

/// Session row. Only the token digest is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Session provider backed by the `sessions` table
pub struct SqliteSessionProvider {
    pool: SqlitePool,
    session_ttl: Duration,
    /// In-memory session cache
    sessions: RwLock<HashMap<String, Session>>,
}

impl SqliteSessionProvider {
    pub async fn new(pool: SqlitePool, session_ttl_days: i64) -> Result<Self> {
        let provider = Self {
            pool,
            session_ttl: Duration::days(session_ttl_days),
            sessions: RwLock::new(HashMap::new()),
        };
        provider.init_db().await?;
        info!("[Sessions] Initialized");
        Ok(provider)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Issue a session for `user_id` and return the bearer token.
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            token_hash: hash_token(&token),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token_hash)
        .bind(&session.user_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.sessions
            .write()
            .await
            .insert(session.token_hash.clone(), session);

        Ok(token)
    }

    /// Invalidate a session
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let token_hash = hash_token(token);
        self.sessions.write().await.remove(&token_hash);
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;
        info!("[Sessions] Session revoked");
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for SqliteSessionProvider {
    async fn resolve(&self, token: &str) -> Result<Option<String>> {
        let token_hash = hash_token(token);

        // Check cache first
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&token_hash) {
                if session.expires_at > Utc::now() {
                    return Ok(Some(session.user_id.clone()));
                }
            }
        }

        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT user_id, created_at, expires_at FROM sessions WHERE token_hash = ?",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some((user_id, created_at, expires_at)) = row else {
            debug!("[Sessions] Unknown token");
            return Ok(None);
        };

        let expires_at: DateTime<Utc> = expires_at
            .parse()
            .context("Invalid session expiry in database")?;
        if expires_at <= Utc::now() {
            self.sessions.write().await.remove(&token_hash);
            return Ok(None);
        }

        let session = Session {
            token_hash: token_hash.clone(),
            user_id: user_id.clone(),
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            expires_at,
        };
        self.sessions.write().await.insert(token_hash, session);

        Ok(Some(user_id))
    }
}

/// Process-local sessions for the in-memory backend.
#[derive(Default)]
pub struct MemorySessionProvider {
    sessions: parking_lot::RwLock<HashMap<String, String>>,
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(hash_token(&token), user_id.to_string());
        token
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn resolve(&self, token: &str) -> Result<Option<String>> {
        Ok(self.sessions.read().get(&hash_token(token)).cloned())
    }
}
