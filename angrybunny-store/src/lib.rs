//! Durable storage for license records and the local entitlement.
//!
//! Backed by a single SQLite file. Records are stored as whole-record JSON
//! blobs; there is no schema migration logic beyond field defaulting at
//! deserialization time.
//!
//! # Concurrency contract
//!
//! The store is the only shared mutable resource in the engine. Every
//! mutation is a read-modify-write expressed as a closure over the old
//! record ([`EntitlementStore::upsert_license`],
//! [`EntitlementStore::update_entitlement`]); the connection mutex is held
//! across the whole read-apply-write, so two racing activations against one
//! key serialize and the second closure observes the first one's result.
//! Callers never see lock primitives.

use angrybunny_license::{LicenseError, LicenseResult, LicenseRecord, MyEntitlement};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Length of generated secrets (API key, codec salt).
const SECRET_LEN: usize = 32;

/// SQLite-backed store for the two durable record types plus gateway
/// settings.
pub struct EntitlementStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntitlementStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Storage`] if the database cannot be opened or the
    /// schema cannot be initialized.
    pub fn open(path: &str) -> LicenseResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| LicenseError::Storage(format!("failed to open store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> LicenseResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LicenseError::Storage(format!("failed to open in-memory store: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> LicenseResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> LicenseResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS licenses (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entitlement (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| LicenseError::Storage(format!("failed to init schema: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-write; the connection itself
        // is still consistent (SQLite statements are atomic).
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── License records ──────────────────────────────────────────

    /// Loads the record for `key`, or `None` if it was never issued.
    pub fn get_license(&self, key: &str) -> LicenseResult<Option<LicenseRecord>> {
        let conn = self.lock();
        read_license(&conn, key)
    }

    /// Atomically creates or mutates the record for `key`.
    ///
    /// When the key is absent, `f` receives a defaulted [`LicenseRecord`]
    /// (active, created now, one-year expiry, site limit 1, no sites).
    /// The applied record is persisted and returned. The closure's error is
    /// propagated untouched and leaves the stored record unchanged.
    pub fn upsert_license<F>(&self, key: &str, f: F) -> LicenseResult<LicenseRecord>
    where
        F: FnOnce(LicenseRecord) -> LicenseResult<LicenseRecord>,
    {
        let conn = self.lock();
        let old = read_license(&conn, key)?
            .unwrap_or_else(|| LicenseRecord::new(key, chrono::Utc::now()));
        let new = f(old)?;
        write_license(&conn, key, &new)?;
        Ok(new)
    }

    /// Atomically mutates the record for `key`, failing when it does not
    /// exist. Used by operations that must not mint records as a side
    /// effect (activation, revocation).
    pub fn update_license<F>(&self, key: &str, f: F) -> LicenseResult<LicenseRecord>
    where
        F: FnOnce(LicenseRecord) -> LicenseResult<LicenseRecord>,
    {
        let conn = self.lock();
        let old = read_license(&conn, key)?.ok_or(LicenseError::NotFound)?;
        let new = f(old)?;
        write_license(&conn, key, &new)?;
        Ok(new)
    }

    /// Lists all issued license records, ordered by key.
    pub fn list_licenses(&self) -> LicenseResult<Vec<LicenseRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT data FROM licenses ORDER BY key")
            .map_err(|e| LicenseError::Storage(format!("failed to prepare list: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| LicenseError::Storage(format!("failed to query licenses: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let blob = row.map_err(|e| LicenseError::Storage(format!("failed to read row: {e}")))?;
            result.push(serde_json::from_str(&blob)?);
        }
        Ok(result)
    }

    // ── Local entitlement ────────────────────────────────────────

    /// Loads this installation's entitlement record.
    ///
    /// Never fails on absence: a missing record yields
    /// [`MyEntitlement::default`].
    pub fn my_entitlement(&self) -> LicenseResult<MyEntitlement> {
        let conn = self.lock();
        read_entitlement(&conn)
    }

    /// Atomically mutates the entitlement record under the same
    /// read-modify-write discipline as license records, so a daily check
    /// and an interactive activation cannot lose each other's updates.
    pub fn update_entitlement<F>(&self, f: F) -> LicenseResult<MyEntitlement>
    where
        F: FnOnce(MyEntitlement) -> LicenseResult<MyEntitlement>,
    {
        let conn = self.lock();
        let old = read_entitlement(&conn)?;
        let new = f(old)?;
        write_entitlement(&conn, &new)?;
        Ok(new)
    }

    /// Overwrites the entitlement record.
    pub fn set_my_entitlement(&self, ent: &MyEntitlement) -> LicenseResult<()> {
        let conn = self.lock();
        write_entitlement(&conn, ent)
    }

    // ── Gateway settings ─────────────────────────────────────────

    /// Returns the gateway API key, generating and persisting one on first
    /// use (32 random alphanumerics).
    pub fn api_key(&self) -> LicenseResult<String> {
        self.get_or_create_secret("api_key")
    }

    /// Returns the process-wide salt used by the key codec's checksum,
    /// generated on first use.
    pub fn key_salt(&self) -> LicenseResult<String> {
        self.get_or_create_secret("key_salt")
    }

    fn get_or_create_secret(&self, name: &str) -> LicenseResult<String> {
        let conn = self.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LicenseError::Storage(format!("failed to read {name}: {e}")))?;

        if let Some(value) = existing {
            return Ok(value);
        }

        let value = generate_secret();
        conn.execute(
            "INSERT INTO settings (name, value) VALUES (?1, ?2)",
            params![name, value],
        )
        .map_err(|e| LicenseError::Storage(format!("failed to store {name}: {e}")))?;
        debug!(setting = name, "generated new secret");
        Ok(value)
    }

    /// Stores the latest update-metadata payload from the authority.
    pub fn set_update_metadata(&self, payload: &str) -> LicenseResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO settings (name, value) VALUES ('update_metadata', ?1)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![payload],
        )
        .map_err(|e| LicenseError::Storage(format!("failed to store update metadata: {e}")))?;
        Ok(())
    }

    /// Returns the last stored update-metadata payload, if any.
    pub fn update_metadata(&self) -> LicenseResult<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM settings WHERE name = 'update_metadata'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LicenseError::Storage(format!("failed to read update metadata: {e}")))
    }
}

fn read_license(conn: &Connection, key: &str) -> LicenseResult<Option<LicenseRecord>> {
    let blob: Option<String> = conn
        .query_row(
            "SELECT data FROM licenses WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LicenseError::Storage(format!("failed to read license: {e}")))?;
    match blob {
        Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
        None => Ok(None),
    }
}

fn write_license(conn: &Connection, key: &str, record: &LicenseRecord) -> LicenseResult<()> {
    let blob = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO licenses (key, data) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET data = excluded.data",
        params![key, blob],
    )
    .map_err(|e| LicenseError::Storage(format!("failed to write license: {e}")))?;
    Ok(())
}

fn read_entitlement(conn: &Connection) -> LicenseResult<MyEntitlement> {
    let blob: Option<String> = conn
        .query_row("SELECT data FROM entitlement WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| LicenseError::Storage(format!("failed to read entitlement: {e}")))?;
    match blob {
        Some(blob) => Ok(serde_json::from_str(&blob)?),
        None => Ok(MyEntitlement::default()),
    }
}

fn write_entitlement(conn: &Connection, ent: &MyEntitlement) -> LicenseResult<()> {
    let blob = serde_json::to_string(ent)?;
    conn.execute(
        "INSERT INTO entitlement (id, data) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        params![blob],
    )
    .map_err(|e| LicenseError::Storage(format!("failed to write entitlement: {e}")))?;
    Ok(())
}

fn generate_secret() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
