#![forbid(unsafe_code)]

//! Saved character configurations and their uploaded images.
//!
//! The authoring tool keeps one [`WebuddyRecord`] per saved character. The
//! [`ConfigStore`] trait is what its backend has to provide;
//! [`MemoryConfigStore`] is the in-process implementation used by tests and
//! offline tooling.
//!
//! # Ownership
//!
//! Every write needs a signed-in user. Listing without one returns an empty
//! list rather than an error, so a signed-out dashboard simply shows nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use webuddy_core::{ConfigError, WebuddyConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    NotFound(String),
    /// The operation needs a signed-in user.
    Unauthenticated,
    /// The backend rejected or failed the request.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "no webuddy with id {id}"),
            StoreError::Unauthenticated => write!(f, "not signed in"),
            StoreError::Backend(reason) => write!(f, "store backend error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// What the editor submits when saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebuddyDraft {
    pub name: String,
    /// The configuration document as the embed script will receive it.
    pub config: Value,
}

impl WebuddyDraft {
    pub fn new(name: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// A saved character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebuddyRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub config: Value,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl WebuddyRecord {
    /// Decode the stored document the way the embed script will.
    pub fn webuddy_config(&self) -> Result<WebuddyConfig, ConfigError> {
        Ok(serde_json::from_value(self.config.clone())?)
    }
}

/// Backend for saved characters.
pub trait ConfigStore {
    /// Save a new character for `user`.
    fn create(&self, user: Option<&str>, draft: WebuddyDraft) -> StoreResult<WebuddyRecord>;

    /// Characters owned by `user`, newest first.
    fn list(&self, user: Option<&str>) -> StoreResult<Vec<WebuddyRecord>>;

    fn fetch(&self, id: &str) -> StoreResult<Option<WebuddyRecord>>;

    /// Replace the name and document of an existing record.
    fn update(&self, id: &str, draft: WebuddyDraft) -> StoreResult<WebuddyRecord>;

    fn delete(&self, id: &str) -> StoreResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

#[derive(Default)]
struct Table {
    rows: HashMap<String, (u64, WebuddyRecord)>,
    next_seq: u64,
}

/// [`ConfigStore`] over a map behind a lock.
pub struct MemoryConfigStore {
    table: RwLock<Table>,
    clock: Clock,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::with_clock(unix_millis)
    }
}

impl fmt::Debug for MemoryConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.table.read().map(|t| t.rows.len()).unwrap_or(0);
        f.debug_struct("MemoryConfigStore")
            .field("rows", &rows)
            .finish_non_exhaustive()
    }
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store stamping `created_at` from `clock`.
    pub fn with_clock(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            clock: Box::new(clock),
        }
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Table>> {
        self.table
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Table>> {
        self.table
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn create(&self, user: Option<&str>, draft: WebuddyDraft) -> StoreResult<WebuddyRecord> {
        let user = user.ok_or(StoreError::Unauthenticated)?;
        let mut table = self.write()?;
        let seq = table.next_seq;
        table.next_seq += 1;
        let record = WebuddyRecord {
            id: format!("wb-{seq:06}"),
            user_id: user.to_string(),
            name: draft.name,
            config: draft.config,
            created_at: (self.clock)(),
        };
        table.rows.insert(record.id.clone(), (seq, record.clone()));
        tracing::debug!(id = %record.id, user, "webuddy saved");
        Ok(record)
    }

    fn list(&self, user: Option<&str>) -> StoreResult<Vec<WebuddyRecord>> {
        let Some(user) = user else {
            return Ok(Vec::new());
        };
        let table = self.read()?;
        let mut owned: Vec<&(u64, WebuddyRecord)> = table
            .rows
            .values()
            .filter(|(_, record)| record.user_id == user)
            .collect();
        owned.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(owned.into_iter().map(|(_, record)| record.clone()).collect())
    }

    fn fetch(&self, id: &str) -> StoreResult<Option<WebuddyRecord>> {
        Ok(self.read()?.rows.get(id).map(|(_, record)| record.clone()))
    }

    fn update(&self, id: &str, draft: WebuddyDraft) -> StoreResult<WebuddyRecord> {
        let mut table = self.write()?;
        let (_, record) = table
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.name = draft.name;
        record.config = draft.config;
        Ok(record.clone())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.write()?
            .rows
            .remove(id)
            .map(|_| tracing::debug!(id, "webuddy deleted"))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Images
// ─────────────────────────────────────────────────────────────────────────────

/// Object key for an uploaded sprite image: `{user}/{buddy}/{millis}.{ext}`.
///
/// The extension is whatever follows the last `.` of `file_name`, or the
/// whole name when it has none.
#[must_use]
pub fn image_object_path(user: &str, buddy: &str, now_millis: u64, file_name: &str) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or(file_name);
    format!("{user}/{buddy}/{now_millis}.{extension}")
}

/// `public_url` with a `t` query parameter so browsers refetch replaced images.
#[must_use]
pub fn cache_busted_url(public_url: &str, now_millis: u64) -> String {
    format!("{public_url}?t={now_millis}")
}

/// Blob storage for sprite images.
pub trait ImageStore {
    /// Store `bytes` under `path`, replacing any existing object, and return
    /// its public URL.
    fn upload(&self, path: &str, bytes: &[u8]) -> StoreResult<String>;
}

/// Upload one sprite image and return the URL to put in the character map.
pub fn upload_sprite_image(
    images: &dyn ImageStore,
    user: &str,
    buddy: &str,
    file_name: &str,
    bytes: &[u8],
    now_millis: u64,
) -> StoreResult<String> {
    let path = image_object_path(user, buddy, now_millis, file_name);
    let public = images.upload(&path, bytes).inspect_err(|err| {
        tracing::warn!(%path, %err, "image upload failed");
    })?;
    if public.is_empty() {
        return Err(StoreError::Backend(format!("no public URL for {path}")));
    }
    Ok(cache_busted_url(&public, now_millis))
}
