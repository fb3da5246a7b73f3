//! Storage layer for billing records and the user stubs billing touches.
//!
//! The [`Store`] trait is the single seam; two implementations exist:
//!
//! - [`MemoryStore`]: `RwLock<HashMap>` backed, the default and what tests use
//! - `RocksStore` (feature `rocksdb-backend`): `RocksDB` with column families
//!   `billing_records`, `billing_by_owner` and `users`
//!
//! # Concurrency
//!
//! `update_billing` is a compare-and-swap on [`BillingRecord::version`]: the
//! caller passes back the record it read, and the write is refused with
//! [`StoreError::VersionConflict`] if someone else wrote in between.
//!
//! # Example
//!
//! ```
//! use billing_core::{BillingRecord, UserId};
//! use billing_store::{MemoryStore, Store};
//! use chrono::Utc;
//!
//! let store = MemoryStore::new();
//! let owner = UserId::generate();
//! let record = store
//!     .create_billing(BillingRecord::new_trial(owner, "cus_1", Utc::now()))
//!     .unwrap();
//! assert_eq!(store.get_billing_by_owner(&owner).unwrap().id, record.id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use billing_core::{BillingRecord, BillingRecordId, UserAccount, UserId};

/// The storage trait defining all persistence operations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Billing Records
    // =========================================================================

    /// Get a billing record by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this id.
    fn get_billing(&self, id: &BillingRecordId) -> Result<BillingRecord>;

    /// Get the billing record owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the owner has no billing record yet.
    fn get_billing_by_owner(&self, owner_id: &UserId) -> Result<BillingRecord>;

    /// Insert a new billing record.
    ///
    /// Assigns a fresh id, stamps `created_at`/`updated_at`, and sets the
    /// version to 1. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the owner already has a record.
    fn create_billing(&self, record: BillingRecord) -> Result<BillingRecord>;

    /// Write back a record previously read from the store.
    ///
    /// Refreshes `updated_at` and bumps the version. Returns the stored record.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the record does not exist.
    /// - `StoreError::VersionConflict` if it was written since it was read.
    fn update_billing(&self, record: BillingRecord) -> Result<BillingRecord>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user is unknown.
    fn get_user(&self, id: &UserId) -> Result<UserAccount>;

    /// Insert or replace a user, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &UserAccount) -> Result<()>;

    /// List every user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_users(&self) -> Result<Vec<UserAccount>>;
}
