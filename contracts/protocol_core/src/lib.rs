#![cfg_attr(not(feature = "std"), no_std)]

//! # Policy Market Protocol — Core State Machines
//!
//! Host-independent financial logic shared by every contract in the
//! workspace.  Nothing in here touches the contract environment: callers pass
//! in the caller address, the ledger clock and any external reads, and get
//! back either a fully applied state transition or an [`Error`] with nothing
//! written.
//!
//! ```text
//!   governance_token ──► roles::RoleLedger        (owner / minters / CAP)
//!   price_oracle     ──► oracle::OracleAdapter    (symbol → feed, price reads)
//!   policy_market    ──► market::Market           (pools, router, policy tokens)
//!                          ├── amm   (constant-product math, pool shares)
//!                          └── router (paths through the stablecoin hub)
//!   lottery          ──► lottery::LotteryEngine   (rounds, two-phase draw)
//! ```
//!
//! Balances live behind the [`ledger::Ledger`] trait, and records that grow
//! with use (policies, consumed request ids) behind [`ledger::Registry`], so
//! the same code runs against `ink::storage::Mapping` on-chain and against a
//! `BTreeMap` in tests.

extern crate alloc;

pub mod amm;
pub mod error;
pub mod ledger;
pub mod lottery;
pub mod market;
pub mod math;
pub mod oracle;
pub mod roles;
pub mod router;

pub use error::{Error, Invalid, Result, Role};

pub use ink::primitives::AccountId;
pub use primitive_types::U256;

/// Token amounts. Matches `DefaultEnvironment::Balance`.
pub type Balance = u128;

/// Ledger clock in milliseconds. Matches `DefaultEnvironment::Timestamp`.
pub type Timestamp = u64;

/// All-zero account. Never a valid owner, minter, feed or recipient; pool
/// liquidity locked on first deposit is credited here.
pub const ZERO_ACCOUNT: [u8; 32] = [0u8; 32];

/// The all-zero [`AccountId`].
pub fn zero_account() -> AccountId {
    AccountId::from(ZERO_ACCOUNT)
}

/// Reject the all-zero account.
pub fn ensure_not_zero(account: &AccountId) -> Result<()> {
    if *account == zero_account() {
        return Err(Error::Validation(Invalid::ZeroAddress));
    }
    Ok(())
}
