//! Accounts and token balances.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::error::StoreResult;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Role {
    /// Regular customer.
    #[default]
    User,
    /// Operator with access to pricing, billing, and contact admin.
    Admin,
}

impl Role {
    /// Lowercase name as stored.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role `{other}` (expected user or admin)")),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A registered account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// UUID string.
    pub id: String,
    /// Login email, unique.
    pub email: String,
    /// Account role.
    pub role: Role,
    /// Spendable generation tokens.
    pub tokens_remaining: i64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, role, tokens_remaining, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        role: row.get(2)?,
        tokens_remaining: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Store {
    /// Insert a new account.
    ///
    /// A duplicate email surfaces as a UNIQUE constraint failure.
    pub fn insert_user(
        &self,
        email: &str,
        hashed_password: &str,
        role: Role,
        tokens: i64,
    ) -> StoreResult<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
            tokens_remaining: tokens,
            created_at: Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, hashed_password, role, tokens_remaining, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.email,
                    hashed_password,
                    user.role,
                    user.tokens_remaining,
                    user.created_at
                ],
            )?;
            Ok(())
        })?;
        Ok(user)
    }

    /// Look up an account by id.
    pub fn user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    [id],
                    user_from_row,
                )
                .optional()?)
        })
    }

    /// Look up an account and its password hash by email.
    pub fn credentials_by_email(&self, email: &str) -> StoreResult<Option<(User, String)>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS}, hashed_password FROM users WHERE email = ?1"),
                    [email],
                    |row| Ok((user_from_row(row)?, row.get(5)?)),
                )
                .optional()?)
        })
    }

    /// Current balance, or `None` for an unknown account.
    pub fn balance(&self, user_id: &str) -> StoreResult<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT tokens_remaining FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    /// Add `amount` tokens and return the new balance.
    pub fn add_tokens(&self, user_id: &str, amount: i64) -> StoreResult<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "UPDATE users SET tokens_remaining = tokens_remaining + ?2
                     WHERE id = ?1 RETURNING tokens_remaining",
                    params![user_id, amount],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }
}
