//! Low-level key-value storage backend trait and supporting types.
//!
//! The [`StorageBackend`] trait exposes five versioned KV operations:
//! [`get`](StorageBackend::get), [`put`](StorageBackend::put),
//! [`put_if_version`](StorageBackend::put_if_version),
//! [`delete`](StorageBackend::delete), and
//! [`list_by_prefix`](StorageBackend::list_by_prefix).
//!
//! Record semantics (id allocation, serialization, filtering) do **not**
//! belong here; they live in [`GenericStore`](super::generic::GenericStore).
//!
//! # Key Structure
//!
//! Keys are `{kind}:{id}` where `kind` is `function`, `job`, or
//! `collection`. Listing a kind uses the prefix `{kind}:`.
//!
//! # Versioning
//!
//! Each stored record carries a monotonic `u64` version starting at 1 and
//! incremented on every successful write.

use std::fmt;

use async_trait::async_trait;

/// A stored record paired with its version number.
///
/// # Examples
///
/// ```
/// use fnstore::store::VersionedRecord;
///
/// let record = VersionedRecord {
///     data: b"{}".to_vec(),
///     version: 1,
/// };
/// assert_eq!(record.version, 1);
/// ```
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The serialized record (JSON).
    pub data: Vec<u8>,

    /// Monotonic version, starting at 1.
    pub version: u64,
}

/// Errors from raw storage operations.
///
/// [`GenericStore`](super::generic::GenericStore) maps these to
/// [`FunctionError`](crate::error::FunctionError) before they reach callers.
#[derive(Debug)]
pub enum StorageError {
    /// The requested key was not found.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A [`put_if_version`](StorageBackend::put_if_version) found a
    /// different version than expected.
    VersionConflict {
        /// The key where the conflict occurred.
        key: String,
        /// The version the caller expected.
        expected: u64,
        /// The version found in storage.
        actual: u64,
    },

    /// An I/O or backend-specific failure.
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on key {key}: expected {expected}, found {actual}"
            ),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Versioned key-value storage.
///
/// Implementations must be `Send + Sync` and must serialize concurrent
/// writers per key without a global lock.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a record by key.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the key.
    /// - [`StorageError::Backend`] on backend failures.
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError>;

    /// Stores a record unconditionally and returns its new version (1 for a
    /// new key).
    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError>;

    /// Stores a record only if its current version is `expected_version`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the key.
    /// - [`StorageError::VersionConflict`] on a version mismatch.
    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError>;

    /// Deletes a record, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// All records whose key starts with `prefix`, in no particular order.
    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError>;
}

/// Builds the storage key for a record.
///
/// ```
/// use fnstore::store::backend::make_key;
///
/// assert_eq!(make_key("job", 42), "job:42");
/// ```
pub fn make_key(kind: &str, id: u64) -> String {
    format!("{kind}:{id}")
}

/// Builds the listing prefix for a record kind.
pub fn make_prefix(kind: &str) -> String {
    format!("{kind}:")
}
