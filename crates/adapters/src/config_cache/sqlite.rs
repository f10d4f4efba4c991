use super::cache_error;
use polychat_ports::ConfigCachePort;
use polychat_shared::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

const SCHEMA_VERSION: i64 = 1;

/// `SQLite` key-value store for config documents.
///
/// One connection guarded by a mutex; every write replaces the whole value.
#[derive(Debug)]
pub struct SqliteConfigCache {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteConfigCache {
    /// Open (or create) the store at `path`.
    ///
    /// A file written with a different schema version is moved aside and a
    /// fresh store is created in its place.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = open_connection(&path)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| cache_error("sqlite cache lock poisoned"))
    }
}

impl ConfigCachePort for SqliteConfigCache {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.lock()?
            .query_row(
                "SELECT value FROM config_entries WHERE cache_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| cache_error(&format!("sqlite cache query failed: {error}")))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let now = now_epoch_ms();
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO config_entries (cache_key, value, updated_at_ms) VALUES (?1, ?2, ?3)",
                (key, value, now),
            )
            .map_err(|error| cache_error(&format!("sqlite cache insert failed: {error}")))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM config_entries WHERE cache_key = ?1", [key])
            .map_err(|error| cache_error(&format!("sqlite cache delete failed: {error}")))?;
        Ok(())
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| cache_error(&format!("sqlite cache mkdir failed: {error}")))?;
    }

    let conn = open_with_schema(path)?;
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|error| cache_error(&format!("sqlite cache version failed: {error}")))?;

    if version == 0 {
        set_schema_version(&conn)?;
        return Ok(conn);
    }

    if version != SCHEMA_VERSION {
        drop(conn);
        rotate_legacy(path, version)?;
        let conn = open_with_schema(path)?;
        set_schema_version(&conn)?;
        return Ok(conn);
    }

    Ok(conn)
}

fn open_with_schema(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|error| cache_error(&format!("sqlite cache open failed: {error}")))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|error| cache_error(&format!("sqlite cache pragma failed: {error}")))?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS config_entries (
            cache_key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at_ms INTEGER NOT NULL
         );",
    )
    .map_err(|error| cache_error(&format!("sqlite cache schema failed: {error}")))?;
    Ok(conn)
}

fn set_schema_version(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
        .map_err(|error| cache_error(&format!("sqlite cache version set failed: {error}")))
}

fn rotate_legacy(path: &Path, version: i64) -> Result<()> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs());
    let file_name = path
        .file_name()
        .ok_or_else(|| cache_error("sqlite cache path missing filename"))?
        .to_string_lossy()
        .into_owned();

    for suffix in ["", "-wal", "-shm"] {
        let current = path.with_file_name(format!("{file_name}{suffix}"));
        if current.exists() {
            let legacy =
                path.with_file_name(format!("{file_name}{suffix}.legacy.{version}_{stamp}"));
            std::fs::rename(&current, &legacy)
                .map_err(|error| cache_error(&format!("sqlite cache rotate failed: {error}")))?;
        }
    }
    Ok(())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| i64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        std::env::temp_dir()
            .join(format!("polychat-cache-{}-{nanos}", std::process::id()))
            .join(name)
    }

    #[test]
    fn values_survive_reopen() -> Result<()> {
        let path = scratch_path("config.db");
        {
            let cache = SqliteConfigCache::open(&path)?;
            cache.write("polychat.config.topics.document", "{\"version\":\"1.1.0\"}")?;
            cache.write("polychat.config.topics.version", "1.1.0")?;
        }

        let reopened = SqliteConfigCache::open(&path)?;
        assert_eq!(
            reopened.read("polychat.config.topics.version")?.as_deref(),
            Some("1.1.0")
        );
        reopened.remove("polychat.config.topics.version")?;
        reopened.remove("polychat.config.topics.version")?;
        assert_eq!(reopened.read("polychat.config.topics.version")?, None);
        Ok(())
    }

    #[test]
    fn writes_replace_wholesale() -> Result<()> {
        let cache = SqliteConfigCache::open(scratch_path("replace.db"))?;
        cache.write("k", "a much longer first value")?;
        cache.write("k", "b")?;
        assert_eq!(cache.read("k")?.as_deref(), Some("b"));
        Ok(())
    }

    #[test]
    fn foreign_schema_version_is_rotated() -> Result<()> {
        let path = scratch_path("rotate.db");
        {
            let cache = SqliteConfigCache::open(&path)?;
            cache.write("k", "v")?;
            let conn = cache.lock()?;
            conn.execute_batch("PRAGMA user_version = 99;")
                .map_err(|error| cache_error(&error.to_string()))?;
        }

        let cache = SqliteConfigCache::open(&path)?;
        assert_eq!(cache.read("k")?, None);
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let rotated = std::fs::read_dir(parent)
            .map_err(|error| cache_error(&error.to_string()))?
            .filter_map(std::result::Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().contains(".legacy.99_"));
        assert!(rotated);
        Ok(())
    }
}
