use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// 32-byte ledger address (account key, program id, or derived address).
///
/// Displays and parses as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Number of bytes in an address.
    pub const LEN: usize = 32;

    /// Builds an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Well-known address spelled by an ASCII label, zero-padded.
    /// Labels longer than 32 bytes are truncated.
    #[must_use]
    pub const fn from_label(label: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < label.len() && i < 32 {
            bytes[i] = label[i];
            i += 1;
        }
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Error returned when parsing an [`Address`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseAddressError {
    #[error("address must be {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("address is not valid hex")]
    InvalidHex,
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN * 2 {
            return Err(ParseAddressError::Length {
                expected: Self::LEN * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseAddressError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Identifier of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// Confirmation level requested for ledger reads and submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Commitment {
    /// Seen by the queried node, may still be rolled back.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted; will not be rolled back.
    Finalized,
}

// ---------------------------------------------------------------------------
// Currency & Amount
// ---------------------------------------------------------------------------

/// Unit an [`Amount`] is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u8,
}

impl Currency {
    /// The ledger's native currency (9 decimals).
    #[must_use]
    pub fn sol() -> Self {
        Self {
            symbol: "SOL".to_string(),
            decimals: 9,
        }
    }

    /// Indivisible token units (0 decimals).
    #[must_use]
    pub fn token() -> Self {
        Self {
            symbol: "Token".to_string(),
            decimals: 0,
        }
    }
}

/// An integer quantity of the smallest unit of a [`Currency`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub basis_points: u64,
    pub currency: Currency,
}

impl Amount {
    #[must_use]
    pub fn new(basis_points: u64, currency: Currency) -> Self {
        Self {
            basis_points,
            currency,
        }
    }

    /// Converts a human-readable decimal value into basis points of `currency`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_decimal(value: f64, currency: Currency) -> Self {
        let scale = 10f64.powi(i32::from(currency.decimals));
        let basis_points = (value * scale).round().max(0.0) as u64;
        Self::new(basis_points, currency)
    }

    #[must_use]
    pub fn same_currency(&self, other: &Amount) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimals = usize::from(self.currency.decimals);
        if decimals == 0 {
            return write!(f, "{} {}", self.basis_points, self.currency.symbol);
        }
        let raw = format!("{:0>width$}", self.basis_points, width = decimals + 1);
        let (whole, frac) = raw.split_at(raw.len() - decimals);
        write!(f, "{whole}.{frac} {}", self.currency.symbol)
    }
}

/// Amount of native currency, e.g. `sol(6.5)`.
#[must_use]
pub fn sol(value: f64) -> Amount {
    Amount::from_decimal(value, Currency::sol())
}

/// Amount of native currency given in its smallest unit.
#[must_use]
pub fn lamports(basis_points: u64) -> Amount {
    Amount::new(basis_points, Currency::sol())
}

/// Amount of indivisible token units, e.g. `token(1.0)`.
#[must_use]
pub fn token(value: f64) -> Amount {
    Amount::from_decimal(value, Currency::token())
}
