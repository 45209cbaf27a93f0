use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::session::{Account, AccountStore};

const SELECTED_ACCOUNT_KEY: &str = "selected_account";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted account list. Cached entities are never written here.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = match opts.path {
            Some(path) => path,
            None => default_path().ok_or_else(|| anyhow!("storage: no config directory"))?,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("storage: mkdir {}", dir.display()))?;
        }

        let mut conn =
            Connection::open(&path).with_context(|| format!("storage: open {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: enable WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("storage: busy timeout")?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Closes the connection. Fails while a clone of this handle is alive.
    pub fn close(self) -> Result<()> {
        let Ok(conn) = Arc::try_unwrap(self.conn) else {
            bail!("storage: still shared");
        };
        conn.into_inner()
            .close()
            .map_err(|(_, err)| anyhow!(err).context("storage: close"))
    }

    /// Replaces the stored account list and selection in one transaction.
    pub fn save_accounts(&self, accounts: &[Account], selected: usize) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("storage: begin transaction")?;
        tx.execute("DELETE FROM accounts", [])?;
        for (position, account) in accounts.iter().enumerate() {
            tx.execute(
                r#"
INSERT INTO accounts (position, instance, jwt, uuid, username, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
                params![
                    position as i64,
                    account.instance,
                    account.jwt,
                    account.uuid,
                    account.username,
                    now,
                ],
            )?;
        }
        tx.execute(
            r#"
INSERT INTO settings (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
            params![SELECTED_ACCOUNT_KEY, selected.to_string()],
        )?;
        tx.commit().context("storage: save accounts")
    }

    pub fn load_accounts(&self) -> Result<(Vec<Account>, usize)> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
SELECT instance, jwt, uuid, username
FROM accounts
ORDER BY position ASC
"#,
        )?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("storage: query accounts")?;
        let selected: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![SELECTED_ACCOUNT_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("storage: query selected account")?;
        let selected = selected
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        Ok((accounts, selected))
    }

    /// Restores the account store, falling back to a single anonymous slot on
    /// `default_instance` when nothing was saved.
    pub fn load_account_store(&self, default_instance: &str) -> Result<AccountStore> {
        let (accounts, selected) = self.load_accounts()?;
        Ok(AccountStore::from_parts(default_instance, accounts, selected))
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        instance: row.get(0)?,
        jwt: row.get(1)?,
        uuid: row.get(2)?,
        username: row.get(3)?,
    })
}

/// Applies every migration newer than the recorded schema version, each in
/// its own transaction.
fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
    )
    .context("storage: create schema_migrations")?;
    let applied: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .context("storage: read schema version")?;

    for (version, sql) in (1i64..).zip(migrations()) {
        if version <= applied {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("storage: migration {version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().timestamp()],
        )?;
        tx.commit()?;
        debug!(version, "applied storage migration");
    }
    Ok(())
}

fn migrations() -> [&'static str; 1] {
    [
        r#"
CREATE TABLE IF NOT EXISTS accounts (
  position INTEGER PRIMARY KEY,
  instance TEXT NOT NULL,
  jwt TEXT,
  uuid TEXT,
  username TEXT,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lemmy-cache").join("state.db"))
}
