//! Column families used by the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Billing records, keyed by `BillingRecordId` (ULID bytes).
    pub const BILLING_RECORDS: &str = "billing_records";

    /// Index: owner to billing record, keyed by `user_id`, value is the record id.
    pub const BILLING_BY_OWNER: &str = "billing_by_owner";

    /// User account stubs, keyed by `user_id`.
    pub const USERS: &str = "users";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::BILLING_RECORDS, cf::BILLING_BY_OWNER, cf::USERS]
}
