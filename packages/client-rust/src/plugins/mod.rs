//! Built-in plugins.
//!
//! - [`nft`]: mints, metadata and token accounts
//! - [`auction_house`]: auction houses, bids and listings

pub mod auction_house;
pub mod nft;
