//! In-memory storage implementation.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use billing_core::{BillingRecord, BillingRecordId, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    billing: HashMap<BillingRecordId, BillingRecord>,
    billing_by_owner: HashMap<UserId, BillingRecordId>,
    users: HashMap<UserId, UserAccount>,
}

/// `HashMap`-backed storage. Everything lives behind one lock, so each
/// method is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {e}")))
    }
}

impl Store for MemoryStore {
    fn get_billing(&self, id: &BillingRecordId) -> Result<BillingRecord> {
        self.read()?
            .billing
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "billing record",
                id: id.to_string(),
            })
    }

    fn get_billing_by_owner(&self, owner_id: &UserId) -> Result<BillingRecord> {
        let tables = self.read()?;
        tables
            .billing_by_owner
            .get(owner_id)
            .and_then(|id| tables.billing.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "billing record",
                id: owner_id.to_string(),
            })
    }

    fn create_billing(&self, mut record: BillingRecord) -> Result<BillingRecord> {
        let mut tables = self.write()?;
        if tables.billing_by_owner.contains_key(&record.owner_id) {
            return Err(StoreError::AlreadyExists {
                owner_id: record.owner_id.to_string(),
            });
        }

        let now = Utc::now();
        record.id = BillingRecordId::generate();
        record.created_at = now;
        record.updated_at = now;
        record.version = 1;

        tables.billing_by_owner.insert(record.owner_id, record.id);
        tables.billing.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_billing(&self, mut record: BillingRecord) -> Result<BillingRecord> {
        let mut tables = self.write()?;
        let stored = tables
            .billing
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "billing record",
                id: record.id.to_string(),
            })?;

        if stored.version != record.version {
            return Err(StoreError::VersionConflict {
                id: record.id.to_string(),
                expected: record.version,
                found: stored.version,
            });
        }

        record.version += 1;
        record.updated_at = Utc::now();
        *stored = record.clone();
        Ok(record)
    }

    fn get_user(&self, id: &UserId) -> Result<UserAccount> {
        self.read()?
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    fn put_user(&self, user: &UserAccount) -> Result<()> {
        let mut user = user.clone();
        user.updated_at = Utc::now();
        self.write()?.users.insert(user.id, user);
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserAccount>> {
        Ok(self.read()?.users.values().cloned().collect())
    }
}
