//! Account data codec.
//!
//! Account data is an 8-byte type discriminator followed by the MsgPack
//! encoding of the account struct (via `rmp-serde`). The discriminator lets
//! scans filter by account type with [`AccountFilter::DataPrefix`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ledger::{AccountFilter, AccountRecord, LedgerError};
use crate::types::Address;

/// Length of the type discriminator prefix.
pub const DISCRIMINATOR_LEN: usize = 8;

/// A typed on-ledger account layout.
pub trait AccountType: Serialize + DeserializeOwned {
    /// Human-readable account type, used in error messages and discriminators.
    const NAME: &'static str;

    /// First 8 bytes of `blake3("account:" + NAME)`.
    #[must_use]
    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        let hash = blake3::hash(format!("account:{}", Self::NAME).as_bytes());
        let mut out = [0u8; DISCRIMINATOR_LEN];
        out.copy_from_slice(&hash.as_bytes()[..DISCRIMINATOR_LEN]);
        out
    }

    /// Scan filter selecting accounts of this type.
    #[must_use]
    fn filter() -> AccountFilter {
        AccountFilter::DataPrefix(Self::discriminator().to_vec())
    }
}

/// Serializes `value` into account data.
///
/// # Errors
///
/// Returns an error if MsgPack serialization fails.
pub fn encode<T: AccountType>(value: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let mut data = T::discriminator().to_vec();
    data.extend(rmp_serde::to_vec_named(value)?);
    Ok(data)
}

/// Deserializes an account of type `T`.
///
/// # Errors
///
/// Returns [`LedgerError::Decode`] if the discriminator does not match `T`
/// or the payload is malformed.
pub fn decode<T: AccountType>(record: &AccountRecord) -> Result<T, LedgerError> {
    let decode_err = |reason: String| LedgerError::Decode {
        address: record.address,
        reason,
    };
    let Some((prefix, payload)) = record.data.split_at_checked(DISCRIMINATOR_LEN) else {
        return Err(decode_err(format!("data shorter than {DISCRIMINATOR_LEN} bytes")));
    };
    if prefix != T::discriminator() {
        return Err(decode_err(format!("not a {} account", T::NAME)));
    }
    rmp_serde::from_slice(payload).map_err(|e| decode_err(e.to_string()))
}

/// Deserializes an account that must exist.
///
/// # Errors
///
/// Returns [`LedgerError::AccountNotFound`] when `record` is `None`, otherwise
/// whatever [`decode`] returns.
pub fn decode_required<T: AccountType>(
    address: &Address,
    record: Option<&AccountRecord>,
) -> Result<T, LedgerError> {
    match record {
        Some(record) => decode(record),
        None => Err(LedgerError::AccountNotFound {
            address: *address,
            account_type: T::NAME,
        }),
    }
}
