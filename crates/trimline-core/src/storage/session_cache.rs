//! # Session Cache
//!
//! A redb-backed cache of the product data and the initial control keys.
//!
//! Entries are keyed by product id. The cache tracks the product it was
//! last used for; switching to another product drops every cached entry.
//! Entries that fail to decode are removed and read as absent.

use crate::primitives::{MAX_CACHED_PRODUCT_SIZE, MAX_INITIAL_KEYS};
use crate::product::ProductData;
use crate::{ControlKey, TrimlineError};
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;

/// Table keyed by product id holding raw bytes.
type BytesTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Table for product data: product id -> JSON bytes
const PRODUCTS: BytesTable = TableDefinition::new("products");

/// Table for initial keys: product id -> postcard-serialized key list
const INITIAL_KEYS: BytesTable = TableDefinition::new("initial_keys");

/// Table for metadata: key string -> value string
const METADATA: TableDefinition<&str, &str> = TableDefinition::new("metadata");

const CURRENT_PRODUCT: &str = "current_product";

fn cache_err(e: impl std::fmt::Display) -> TrimlineError {
    TrimlineError::CacheError(e.to_string())
}

/// Persistent session cache.
pub struct SessionCache {
    db: Database,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

impl SessionCache {
    /// Open or create a cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrimlineError> {
        let db = Database::create(path.as_ref()).map_err(|e| TrimlineError::IoError(e.to_string()))?;

        let write_txn = db.begin_write().map_err(cache_err)?;
        {
            let _ = write_txn.open_table(PRODUCTS).map_err(cache_err)?;
            let _ = write_txn.open_table(INITIAL_KEYS).map_err(cache_err)?;
            let _ = write_txn.open_table(METADATA).map_err(cache_err)?;
        }
        write_txn.commit().map_err(cache_err)?;

        Ok(Self { db })
    }

    /// Product id the cache currently holds entries for.
    pub fn current_product(&self) -> Result<Option<String>, TrimlineError> {
        let read_txn = self.db.begin_read().map_err(cache_err)?;
        let table = read_txn.open_table(METADATA).map_err(cache_err)?;
        Ok(table
            .get(CURRENT_PRODUCT)
            .map_err(cache_err)?
            .map(|v| v.value().to_string()))
    }

    /// Make `product_id` the current product.
    ///
    /// Returns `true` if entries of a different product were dropped.
    pub fn switch_product(&self, product_id: &str) -> Result<bool, TrimlineError> {
        let current = self.current_product()?;
        if current.as_deref() == Some(product_id) {
            return Ok(false);
        }

        let write_txn = self.db.begin_write().map_err(cache_err)?;
        {
            write_txn.delete_table(PRODUCTS).map_err(cache_err)?;
            write_txn.delete_table(INITIAL_KEYS).map_err(cache_err)?;
            let _ = write_txn.open_table(PRODUCTS).map_err(cache_err)?;
            let _ = write_txn.open_table(INITIAL_KEYS).map_err(cache_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(cache_err)?;
            meta.insert(CURRENT_PRODUCT, product_id).map_err(cache_err)?;
        }
        write_txn.commit().map_err(cache_err)?;

        Ok(current.is_some())
    }

    // =========================================================================
    // PRODUCT DATA
    // =========================================================================

    /// Cache the raw product JSON.
    pub fn store_product(&self, product_id: &str, json: &[u8]) -> Result<(), TrimlineError> {
        if json.len() > MAX_CACHED_PRODUCT_SIZE {
            return Err(TrimlineError::CacheError(format!(
                "product {} is {} bytes, limit is {}",
                product_id,
                json.len(),
                MAX_CACHED_PRODUCT_SIZE
            )));
        }
        self.put(PRODUCTS, product_id, json)
    }

    /// Load cached product data. Undecodable entries are removed.
    pub fn load_product(&self, product_id: &str) -> Result<Option<ProductData>, TrimlineError> {
        let Some(bytes) = self.get(PRODUCTS, product_id)? else {
            return Ok(None);
        };
        match ProductData::from_slice(&bytes) {
            Ok(product) => Ok(Some(product)),
            Err(_) => {
                self.remove(PRODUCTS, product_id)?;
                Ok(None)
            }
        }
    }

    // =========================================================================
    // INITIAL KEYS
    // =========================================================================

    /// Cache the initial control keys of a product.
    pub fn store_initial_keys(
        &self,
        product_id: &str,
        keys: &[ControlKey],
    ) -> Result<(), TrimlineError> {
        let keys = &keys[..keys.len().min(MAX_INITIAL_KEYS)];
        let bytes = postcard::to_stdvec(keys)
            .map_err(|e| TrimlineError::SerializationError(e.to_string()))?;
        self.put(INITIAL_KEYS, product_id, &bytes)
    }

    /// Cached initial control keys; empty when absent or undecodable.
    pub fn initial_keys(&self, product_id: &str) -> Result<Vec<ControlKey>, TrimlineError> {
        let Some(bytes) = self.get(INITIAL_KEYS, product_id)? else {
            return Ok(Vec::new());
        };
        match postcard::from_bytes::<Vec<ControlKey>>(&bytes) {
            Ok(keys) if keys.len() <= MAX_INITIAL_KEYS => Ok(keys),
            _ => {
                self.remove(INITIAL_KEYS, product_id)?;
                Ok(Vec::new())
            }
        }
    }

    // =========================================================================
    // RAW ACCESS
    // =========================================================================

    fn put(
        &self,
        table: BytesTable,
        product_id: &str,
        bytes: &[u8],
    ) -> Result<(), TrimlineError> {
        let write_txn = self.db.begin_write().map_err(cache_err)?;
        {
            let mut table = write_txn.open_table(table).map_err(cache_err)?;
            table.insert(product_id, bytes).map_err(cache_err)?;
        }
        write_txn.commit().map_err(cache_err)
    }

    fn get(
        &self,
        table: BytesTable,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, TrimlineError> {
        let read_txn = self.db.begin_read().map_err(cache_err)?;
        let table = read_txn.open_table(table).map_err(cache_err)?;
        Ok(table
            .get(product_id)
            .map_err(cache_err)?
            .map(|v| v.value().to_vec()))
    }

    fn remove(
        &self,
        table: BytesTable,
        product_id: &str,
    ) -> Result<(), TrimlineError> {
        let write_txn = self.db.begin_write().map_err(cache_err)?;
        {
            let mut table = write_txn.open_table(table).map_err(cache_err)?;
            table.remove(product_id).map_err(cache_err)?;
        }
        write_txn.commit().map_err(cache_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, SessionCache) {
        let dir = TempDir::new().expect("tempdir");
        let cache = SessionCache::open(dir.path().join("session.redb")).expect("open");
        (dir, cache)
    }

    #[test]
    fn product_round_trips() {
        let (_dir, cache) = cache();
        cache.switch_product("boat-7").expect("switch");
        cache
            .store_product("boat-7", br#"{"id":"boat-7","options":[]}"#)
            .expect("store");

        let product = cache.load_product("boat-7").expect("load").expect("present");
        assert_eq!(product.id.as_deref(), Some("boat-7"));
        assert!(cache.load_product("boat-8").expect("load").is_none());
    }

    #[test]
    fn initial_keys_round_trip() {
        let (_dir, cache) = cache();
        let keys = vec![ControlKey::new("white"), ControlKey::new("radar")];
        cache.store_initial_keys("boat-7", &keys).expect("store");
        assert_eq!(cache.initial_keys("boat-7").expect("keys"), keys);
    }

    #[test]
    fn switching_product_drops_entries() {
        let (_dir, cache) = cache();
        assert!(!cache.switch_product("boat-7").expect("switch"));
        cache
            .store_initial_keys("boat-7", &[ControlKey::new("white")])
            .expect("store");
        assert!(!cache.switch_product("boat-7").expect("same product"));
        assert_eq!(cache.initial_keys("boat-7").expect("keys").len(), 1);

        assert!(cache.switch_product("boat-8").expect("switch"));
        assert!(cache.initial_keys("boat-7").expect("keys").is_empty());
        assert_eq!(
            cache.current_product().expect("current").as_deref(),
            Some("boat-8")
        );
    }

    #[test]
    fn corrupt_entries_are_discarded() {
        let (_dir, cache) = cache();
        cache.store_product("boat-7", b"not json").expect("store");
        assert!(cache.load_product("boat-7").expect("load").is_none());
        assert!(cache.get(PRODUCTS, "boat-7").expect("get").is_none());

        cache
            .put(INITIAL_KEYS, "boat-7", &[0xff, 0xff, 0xff])
            .expect("put");
        assert!(cache.initial_keys("boat-7").expect("keys").is_empty());
    }

    #[test]
    fn oversized_product_is_rejected() {
        let (_dir, cache) = cache();
        let big = vec![b' '; MAX_CACHED_PRODUCT_SIZE + 1];
        assert!(matches!(
            cache.store_product("boat-7", &big),
            Err(TrimlineError::CacheError(_))
        ));
    }
}
