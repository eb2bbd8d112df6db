//! SQLite-backed assignment and settings store.
//!
//! Two tables: `assignment` (which hooks are bound to which application
//! identities, with usage/install tracking) and `setting` (per-user named
//! values). All access is serialized by a process-wide reader/writer lock
//! that is distinct from both the registry lock and the database engine's
//! own locking: readers share the read lock, writers hold the write lock for
//! the whole transaction, so no thread ever observes a partially-committed
//! transaction.
//!
//! Lock order: the access lock is acquired before the connection mutex, and
//! the connection mutex is held only while statements execute.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::identity::{Uid, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// One row of the `assignment` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    pub package: String,
    pub uid: Uid,
    pub hook: String,
    pub installed: i64,
    pub used: i64,
    pub restricted: bool,
    pub exception: Option<String>,
}

/// Column updates applied to one assignment row by a usage report.
#[derive(Debug, Default, Clone)]
pub struct ReportUpdate {
    pub installed: Option<i64>,
    pub used: Option<i64>,
    pub restricted: Option<bool>,
    pub exception: Option<String>,
}

impl ReportUpdate {
    pub fn is_empty(&self) -> bool {
        self.installed.is_none()
            && self.used.is_none()
            && self.restricted.is_none()
            && self.exception.is_none()
    }
}

pub struct Store {
    /// Reader/writer discipline over the whole store.
    access: RwLock<()>,
    /// Connection handle; acquired only under the access lock.
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store under `data_dir`.
    ///
    /// Applies the one-shot schema upgrade when the on-disk version is below
    /// [`StoreConfig::SCHEMA_VERSION`], then unconditionally resets every
    /// assignment's `installed` timestamp to -1 and its exception to NULL:
    /// reinstallation and failures have not yet been observed in this
    /// process lifetime.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| Error::Io {
            message: format!("Failed to create store directory: {e}"),
            path: Some(data_dir.to_path_buf()),
            source: Some(e),
        })?;
        #[cfg(unix)]
        restrict_dir(data_dir)?;

        let db_path = data_dir.join(StoreConfig::DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        info!("Database file {}", db_path.display());

        let store = Self {
            access: RwLock::new(()),
            conn: Mutex::new(conn),
        };
        store.prepare()?;

        #[cfg(unix)]
        restrict_files(data_dir)?;

        Ok(store)
    }

    /// Schema upgrade plus the unconditional usage-data reset, both under
    /// the write lock.
    fn prepare(&self) -> Result<()> {
        let _access = self.write_guard()?;
        let mut conn = self.lock_conn()?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < StoreConfig::SCHEMA_VERSION {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "CREATE TABLE assignment (
                    package TEXT NOT NULL,
                    uid INTEGER NOT NULL,
                    hook TEXT NOT NULL,
                    installed INTEGER,
                    used INTEGER,
                    restricted INTEGER,
                    exception TEXT
                );
                CREATE UNIQUE INDEX idx_assignment ON assignment(package, uid, hook);

                CREATE TABLE setting (
                    user INTEGER,
                    category TEXT NOT NULL,
                    name TEXT NOT NULL,
                    value TEXT
                );
                CREATE UNIQUE INDEX idx_setting ON setting(user, category, name);",
            )?;
            tx.pragma_update(None, "user_version", StoreConfig::SCHEMA_VERSION)?;
            tx.commit()?;
            info!(
                "Upgraded schema {} -> {}",
                version,
                StoreConfig::SCHEMA_VERSION
            );
        }

        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE assignment SET installed = -1, exception = NULL",
            [],
        )?;
        tx.commit()?;
        info!("Reset assigned hook data count={rows}");

        Ok(())
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.access.read().map_err(|_| Error::Database {
            message: "store access lock poisoned".to_string(),
            source: None,
        })
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.access.write().map_err(|_| Error::Database {
            message: "store access lock poisoned".to_string(),
            source: None,
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Database {
            message: "store connection lock poisoned".to_string(),
            source: None,
        })
    }

    /// All assignment rows whose uid falls in the inclusive range
    /// `[start, end]`, the per-user block computed by the caller.
    pub fn assignments_in_range(&self, start: Uid, end: Uid) -> Result<Vec<AssignmentRow>> {
        let _access = self.read_guard()?;
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT package, uid, hook, installed, used, restricted, exception
             FROM assignment WHERE uid >= ?1 AND uid <= ?2",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok(AssignmentRow {
                    package: row.get(0)?,
                    uid: row.get(1)?,
                    hook: row.get(2)?,
                    installed: row.get(3)?,
                    used: row.get(4)?,
                    restricted: row.get::<_, i64>(5)? == 1,
                    exception: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Hook ids assigned to one (package, uid).
    pub fn assigned_hook_ids(&self, package: &str, uid: Uid) -> Result<Vec<String>> {
        let _access = self.read_guard()?;
        let conn = self.lock_conn()?;

        let mut stmt =
            conn.prepare("SELECT hook FROM assignment WHERE package = ?1 AND uid = ?2")?;
        let ids = stmt
            .query_map(params![package, uid], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(ids)
    }

    /// Insert (or, with `delete`, remove) assignment rows for every hook id,
    /// inside one transaction. Inserts use replace-on-conflict semantics on
    /// the (package, uid, hook) key; fresh rows start unobserved.
    pub fn assign(&self, hook_ids: &[String], package: &str, uid: Uid, delete: bool) -> Result<()> {
        let _access = self.write_guard()?;
        let mut conn = self.lock_conn()?;

        let tx = conn.transaction()?;
        for hook_id in hook_ids {
            if delete {
                debug!("{package}:{uid}/{hook_id} deleted");
                tx.execute(
                    "DELETE FROM assignment WHERE hook = ?1 AND package = ?2 AND uid = ?3",
                    params![hook_id, package, uid],
                )?;
            } else {
                debug!("{package}:{uid}/{hook_id} added");
                tx.execute(
                    "INSERT OR REPLACE INTO assignment
                     (package, uid, hook, installed, used, restricted, exception)
                     VALUES (?1, ?2, ?3, -1, -1, 0, NULL)",
                    params![package, uid, hook_id],
                )?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// Apply a usage report to one assignment row. Returns the number of
    /// rows updated; zero means the assignment does not exist, which callers
    /// log rather than treat as an error.
    pub fn record_report(
        &self,
        package: &str,
        uid: Uid,
        hook: &str,
        update: &ReportUpdate,
    ) -> Result<usize> {
        if update.is_empty() {
            return Ok(0);
        }

        let _access = self.write_guard()?;
        let mut conn = self.lock_conn()?;

        use rusqlite::types::Value;
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(installed) = update.installed {
            sets.push("installed = ?");
            values.push(Value::Integer(installed));
        }
        if let Some(used) = update.used {
            sets.push("used = ?");
            values.push(Value::Integer(used));
        }
        if let Some(restricted) = update.restricted {
            sets.push("restricted = ?");
            values.push(Value::Integer(restricted as i64));
        }
        if let Some(ref exception) = update.exception {
            sets.push("exception = ?");
            values.push(Value::Text(exception.clone()));
        }
        values.push(Value::Text(package.to_string()));
        values.push(Value::Integer(i64::from(uid)));
        values.push(Value::Text(hook.to_string()));

        let sql = format!(
            "UPDATE assignment SET {} WHERE package = ? AND uid = ? AND hook = ?",
            sets.join(", ")
        );

        let tx = conn.transaction()?;
        let rows = tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        tx.commit()?;

        Ok(rows)
    }

    /// Value of one setting, or None when unset.
    pub fn get_setting(&self, user: UserId, category: &str, name: &str) -> Result<Option<String>> {
        let _access = self.read_guard()?;
        let conn = self.lock_conn()?;

        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT value FROM setting WHERE user = ?1 AND category = ?2 AND name = ?3",
                params![user, category, name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.flatten())
    }

    /// Write one setting. A None value deletes the row.
    pub fn put_setting(
        &self,
        user: UserId,
        category: &str,
        name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let _access = self.write_guard()?;
        let mut conn = self.lock_conn()?;

        let tx = conn.transaction()?;
        match value {
            None => {
                tx.execute(
                    "DELETE FROM setting WHERE user = ?1 AND category = ?2 AND name = ?3",
                    params![user, category, name],
                )?;
            }
            Some(value) => {
                tx.execute(
                    "INSERT OR REPLACE INTO setting (user, category, name, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user, category, name, value],
                )?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// Bulk delete. User 0 clears both tables entirely; any other user
    /// clears assignments in that user's uid block and settings with that
    /// exact user id.
    pub fn clear(&self, user: UserId) -> Result<()> {
        let _access = self.write_guard()?;
        let mut conn = self.lock_conn()?;

        let tx = conn.transaction()?;
        if user == 0 {
            tx.execute("DELETE FROM assignment", [])?;
            tx.execute("DELETE FROM setting", [])?;
        } else {
            let start = crate::identity::user_uid(user, 0);
            let end = crate::identity::user_uid(user, crate::identity::LAST_APPLICATION_ID);
            tx.execute(
                "DELETE FROM assignment WHERE uid >= ?1 AND uid <= ?2",
                params![start, end],
            )?;
            tx.execute("DELETE FROM setting WHERE user = ?1", params![user])?;
        }
        tx.commit()?;

        Ok(())
    }
}

#[cfg(unix)]
fn restrict_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(StoreConfig::DATA_DIR_MODE);
    std::fs::set_permissions(dir, perms).map_err(|e| Error::io_with_path(e, dir))
}

#[cfg(unix)]
fn restrict_files(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io_with_path(e, dir))? {
        let entry = entry.map_err(|e| Error::io_with_path(e, dir))?;
        let perms = std::fs::Permissions::from_mode(0o660);
        std::fs::set_permissions(entry.path(), perms)
            .map_err(|e| Error::io_with_path(e, entry.path()))?;
    }
    Ok(())
}
