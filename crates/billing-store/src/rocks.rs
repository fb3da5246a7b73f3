//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use billing_core::{BillingRecord, BillingRecordId, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
///
/// Writes that read before they write (create, update) go through a process
/// local mutex so the owner index and version checks are not racy.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {e}")))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read_billing(&self, id: &BillingRecordId) -> Result<Option<BillingRecord>> {
        let cf = self.cf(cf::BILLING_RECORDS)?;
        self.db
            .get_cf(&cf, keys::billing_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn owner_index(&self, owner_id: &UserId) -> Result<Option<BillingRecordId>> {
        let cf = self.cf(cf::BILLING_BY_OWNER)?;
        let value = self
            .db
            .get_cf(&cf, keys::user_key(owner_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        value
            .map(|v| {
                keys::decode_billing_id(&v).ok_or_else(|| {
                    StoreError::Serialization(format!("corrupt owner index for {owner_id}"))
                })
            })
            .transpose()
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            out.push(Self::deserialize(&value)?);
        }
        Ok(out)
    }
}

impl Store for RocksStore {
    fn get_billing(&self, id: &BillingRecordId) -> Result<BillingRecord> {
        self.read_billing(id)?.ok_or_else(|| StoreError::NotFound {
            entity: "billing record",
            id: id.to_string(),
        })
    }

    fn get_billing_by_owner(&self, owner_id: &UserId) -> Result<BillingRecord> {
        let not_found = || StoreError::NotFound {
            entity: "billing record",
            id: owner_id.to_string(),
        };
        let id = self.owner_index(owner_id)?.ok_or_else(not_found)?;
        self.read_billing(&id)?.ok_or_else(not_found)
    }

    fn create_billing(&self, mut record: BillingRecord) -> Result<BillingRecord> {
        let _guard = self.lock()?;

        if self.owner_index(&record.owner_id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                owner_id: record.owner_id.to_string(),
            });
        }

        let now = Utc::now();
        record.id = BillingRecordId::generate();
        record.created_at = now;
        record.updated_at = now;
        record.version = 1;

        let cf_records = self.cf(cf::BILLING_RECORDS)?;
        let cf_owner = self.cf(cf::BILLING_BY_OWNER)?;
        let record_key = keys::billing_key(&record.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_records, &record_key, Self::serialize(&record)?);
        batch.put_cf(&cf_owner, keys::user_key(&record.owner_id), &record_key);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(billing_id = %record.id, owner_id = %record.owner_id, "Billing record created");
        Ok(record)
    }

    fn update_billing(&self, mut record: BillingRecord) -> Result<BillingRecord> {
        let _guard = self.lock()?;

        let stored = self.get_billing(&record.id)?;
        if stored.version != record.version {
            return Err(StoreError::VersionConflict {
                id: record.id.to_string(),
                expected: record.version,
                found: stored.version,
            });
        }

        record.version += 1;
        record.updated_at = Utc::now();

        let cf = self.cf(cf::BILLING_RECORDS)?;
        self.db
            .put_cf(&cf, keys::billing_key(&record.id), Self::serialize(&record)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(record)
    }

    fn get_user(&self, id: &UserId) -> Result<UserAccount> {
        let cf = self.cf(cf::USERS)?;
        self.db
            .get_cf(&cf, keys::user_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    fn put_user(&self, user: &UserAccount) -> Result<()> {
        let mut user = user.clone();
        user.updated_at = Utc::now();

        let cf = self.cf(cf::USERS)?;
        self.db
            .put_cf(&cf, keys::user_key(&user.id), Self::serialize(&user)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_users(&self) -> Result<Vec<UserAccount>> {
        self.scan(cf::USERS)
    }
}
