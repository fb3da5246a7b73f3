//! Key encoding for the `RocksDB` column families.

use billing_core::{BillingRecordId, UserId};

/// Key of a billing record.
#[must_use]
pub fn billing_key(id: &BillingRecordId) -> Vec<u8> {
    id.to_bytes().to_vec()
}

/// Key of the owner index and of the users column family.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Decode a billing record id stored as an owner-index value.
///
/// Returns `None` if the value is not exactly 16 bytes.
#[must_use]
pub fn decode_billing_id(value: &[u8]) -> Option<BillingRecordId> {
    let bytes: [u8; 16] = value.try_into().ok()?;
    Some(BillingRecordId::from_bytes(bytes))
}
