//! Command implementations.

use anyhow::{Context, bail};
use serde::Serialize;
use shortbiz_core::store::User;
use shortbiz_core::{Auth, Config, Store};
use tracing::debug;

pub mod auth;
pub mod billing;
pub mod block;
pub mod blog;
pub mod contact;
pub mod info;
pub mod page;
pub mod plan;
pub mod public;
#[cfg(feature = "mcp")]
pub mod serve;
pub mod tokens;

/// Everything a data command needs: settings, the open store, and the caller.
#[derive(Debug)]
pub struct AppContext {
    /// Loaded configuration.
    pub config: Config,
    /// Open database.
    pub store: Store,
    /// Token issuer and verifier.
    pub auth: Auth,
    /// Access token supplied with `--token` or `SHORTBIZ_TOKEN`.
    pub token: Option<String>,
    /// Global `--json` flag.
    pub json: bool,
}

impl AppContext {
    /// Open the configured database and build the token service.
    pub fn open(config: Config, token: Option<String>, json: bool) -> anyhow::Result<Self> {
        let path = config
            .resolve_database_path()
            .context("failed to resolve database path")?;
        debug!(database = %path, "opening store");
        let store = Store::open(&path).with_context(|| format!("failed to open database {path}"))?;
        Ok(Self::new(config, store, token, json))
    }

    /// Wrap an already-open store.
    pub fn new(config: Config, store: Store, token: Option<String>, json: bool) -> Self {
        let auth = Auth::from_config(&config);
        Self {
            config,
            store,
            auth,
            token,
            json,
        }
    }

    /// The signed-in account.
    pub fn current_user(&self) -> anyhow::Result<User> {
        let Some(ref token) = self.token else {
            bail!("not signed in: pass --token or set SHORTBIZ_TOKEN (see `shortbiz auth login`)");
        };
        Ok(self.auth.authenticate(&self.store, token)?)
    }
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `1900` → `19.00 USD`.
pub fn format_price(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", cents / 100, cents % 100)
}
