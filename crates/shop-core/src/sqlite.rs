//! SQLite ledger - schema and connection management
//!
//! Accounts and purchase sessions live in one embedded database file. Every
//! call checks a connection out of an r2d2 pool on a blocking thread and
//! returns it before the future resolves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;

use crate::account::{PaymentToken, UserAccount, UserId};
use crate::error::{Result, ShopError};
use crate::ledger::{random_tokens, Ledger, TokenSource, MAX_TOKEN_ATTEMPTS};
use crate::session::{PurchaseState, SessionStore};

/// Default database file, relative to the working directory
pub const DEFAULT_DATABASE_PATH: &str = "users.db";

/// Ledger and session store backed by SQLite
#[derive(Clone)]
pub struct SqliteLedger {
    pool: Pool<SqliteConnectionManager>,
    tokens: TokenSource,
}

impl SqliteLedger {
    /// Open (or create) the database file and initialize the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        });

        // SQLite serializes writers anyway
        let pool = Pool::builder().max_size(8).build(manager)?;

        let ledger = Self {
            pool,
            tokens: random_tokens(),
        };
        ledger.init()?;

        tracing::info!(path = %path.display(), "Opened ledger database");
        Ok(ledger)
    }

    /// Replace the random token generator
    #[must_use]
    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Create tables and bring databases written by older releases up to date
    fn init(&self) -> Result<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                payment_id TEXT NOT NULL,
                payment_status BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT,
                paid_at TEXT
            )",
            [],
        )?;

        // Older files only carry (user_id, payment_id, payment_status)
        for column in ["created_at", "paid_at"] {
            if !has_column(&conn, "users", column)? {
                conn.execute(&format!("ALTER TABLE users ADD COLUMN {column} TEXT"), [])?;
                tracing::info!(column, "Migrated users table");
            }
        }

        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_payment_id ON users(payment_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                user_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Run a closure against a pooled connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| ShopError::Storage(format!("ledger task failed: {e}")))?
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn parse_time(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn ensure_account(&self, user_id: UserId) -> Result<()> {
        let tokens = self.tokens.clone();
        self.with_conn(move |conn| {
            for _ in 0..MAX_TOKEN_ATTEMPTS {
                let token = tokens();
                let inserted = conn.execute(
                    "INSERT INTO users (user_id, payment_id, payment_status, created_at)
                     VALUES (?1, ?2, 0, ?3)
                     ON CONFLICT(user_id) DO NOTHING",
                    params![user_id.0, token.as_str(), Utc::now().to_rfc3339()],
                );

                match inserted {
                    Ok(1) => {
                        tracing::info!(user_id = %user_id, "Created account");
                        return Ok(());
                    }
                    Ok(_) => return Ok(()),
                    Err(e) if is_unique_violation(&e) => {
                        tracing::warn!(user_id = %user_id, "Payment token collision, regenerating");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(ShopError::TokenCollision(MAX_TOKEN_ATTEMPTS))
        })
        .await
    }

    async fn get_payment_token(&self, user_id: UserId) -> Result<Option<PaymentToken>> {
        self.with_conn(move |conn| {
            let token = conn
                .query_row(
                    "SELECT payment_id FROM users WHERE user_id = ?1",
                    params![user_id.0],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(token.map(PaymentToken::from_string))
        })
        .await
    }

    async fn is_paid(&self, user_id: UserId) -> Result<bool> {
        self.with_conn(move |conn| {
            let paid = conn
                .query_row(
                    "SELECT payment_status FROM users WHERE user_id = ?1",
                    params![user_id.0],
                    |row| row.get::<_, bool>(0),
                )
                .optional()?;
            Ok(paid.unwrap_or(false))
        })
        .await
    }

    async fn mark_paid(&self, user_id: UserId) -> Result<()> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE users SET payment_status = 1, paid_at = COALESCE(paid_at, ?2)
                 WHERE user_id = ?1",
                params![user_id.0, Utc::now().to_rfc3339()],
            )?;
            if updated == 0 {
                tracing::warn!(user_id = %user_id, "mark_paid for unknown user ignored");
            }
            Ok(())
        })
        .await
    }

    async fn get_account(&self, user_id: UserId) -> Result<Option<UserAccount>> {
        self.with_conn(move |conn| {
            let account = conn
                .query_row(
                    "SELECT payment_id, payment_status, created_at, paid_at
                     FROM users WHERE user_id = ?1",
                    params![user_id.0],
                    |row| {
                        Ok(UserAccount {
                            user_id,
                            payment_id: PaymentToken::from_string(row.get::<_, String>(0)?),
                            paid: row.get(1)?,
                            created_at: parse_time(row.get(2)?).unwrap_or_default(),
                            paid_at: parse_time(row.get(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(account)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SqliteLedger {
    async fn state(&self, user_id: UserId) -> Result<PurchaseState> {
        self.with_conn(move |conn| {
            let state = conn
                .query_row(
                    "SELECT state FROM sessions WHERE user_id = ?1",
                    params![user_id.0],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(state.map(|s| PurchaseState::parse(&s)).unwrap_or_default())
        })
        .await
    }

    async fn set_state(&self, user_id: UserId, state: PurchaseState) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (user_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at",
                params![user_id.0, state.as_str(), Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}
