//! Owner/minter roles and the capped governance-token supply.
//!
//! ```text
//!   owner ──add_minter / remove_minter──► minters
//!   minter ──mint(to, amount)──► balances[to] += amount
//!                                total_minted += amount   (≤ CAP, always)
//! ```
//!
//! The ledger is a plain value owned by whichever contract embeds it, so
//! every test builds its own isolated instance.

use alloc::collections::BTreeSet;

use crate::ledger::Ledger;
use crate::{ensure_not_zero, AccountId, Balance, Error, Invalid, Result, Role};

pub mod constants {
    use crate::Balance;

    /// One whole token with 18 decimals.
    pub const ONE_TOKEN: Balance = 1_000_000_000_000_000_000;

    /// Hard supply cap: 100 000 000 tokens.
    pub const CAP: Balance = 100_000_000 * ONE_TOKEN;

    pub const TOKEN_DECIMALS: u8 = 18;
}

pub use constants::CAP;

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct RoleLedger {
    /// `None` once ownership is renounced.
    owner: Option<AccountId>,
    minters: BTreeSet<AccountId>,
    total_minted: Balance,
    cap: Balance,
}

impl RoleLedger {
    /// `owner` becomes the owner and the first minter.
    pub fn new(owner: AccountId) -> Self {
        Self::with_cap(owner, CAP)
    }

    pub fn with_cap(owner: AccountId, cap: Balance) -> Self {
        let mut minters = BTreeSet::new();
        minters.insert(owner);
        Self { owner: Some(owner), minters, total_minted: 0, cap }
    }

    // ── Views ────────────────────────────────────────────────────────────

    pub fn owner(&self) -> Option<AccountId> {
        self.owner
    }

    pub fn is_owner(&self, account: &AccountId) -> bool {
        self.owner.as_ref() == Some(account)
    }

    pub fn is_minter(&self, account: &AccountId) -> bool {
        self.minters.contains(account)
    }

    pub fn total_minted(&self) -> Balance {
        self.total_minted
    }

    pub fn cap(&self) -> Balance {
        self.cap
    }

    pub fn remaining(&self) -> Balance {
        self.cap.saturating_sub(self.total_minted)
    }

    // ── Role management ──────────────────────────────────────────────────

    pub fn only_owner(&self, caller: &AccountId) -> Result<()> {
        if !self.is_owner(caller) {
            return Err(Error::Unauthorized(Role::Owner));
        }
        Ok(())
    }

    /// Grant minting rights. Returns `false` when `minter` already had them.
    pub fn add_minter(&mut self, caller: &AccountId, minter: AccountId) -> Result<bool> {
        self.only_owner(caller)?;
        ensure_not_zero(&minter)?;
        Ok(self.minters.insert(minter))
    }

    /// Revoke minting rights. Returns `false` when `minter` had none.
    pub fn remove_minter(&mut self, caller: &AccountId, minter: &AccountId) -> Result<bool> {
        self.only_owner(caller)?;
        Ok(self.minters.remove(minter))
    }

    /// Single-step ownership handover. Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> Result<AccountId> {
        self.only_owner(caller)?;
        ensure_not_zero(&new_owner)?;
        let previous = *caller;
        self.owner = Some(new_owner);
        Ok(previous)
    }

    /// Leave the ledger without an owner. Minters keep their rights.
    pub fn renounce_ownership(&mut self, caller: &AccountId) -> Result<AccountId> {
        self.only_owner(caller)?;
        self.owner = None;
        Ok(*caller)
    }

    // ── Supply ───────────────────────────────────────────────────────────

    /// Mint `amount` to `to`, enforcing the minter role and the cap.
    ///
    /// # Errors
    /// - `Unauthorized(Minter)` if `caller` is not a minter.
    /// - `Validation` for a zero recipient or zero amount.
    /// - `CapExceeded` if `total_minted + amount > cap`.
    pub fn mint<L: Ledger<AccountId>>(
        &mut self,
        balances: &mut L,
        caller: &AccountId,
        to: AccountId,
        amount: Balance,
    ) -> Result<()> {
        if !self.is_minter(caller) {
            return Err(Error::Unauthorized(Role::Minter));
        }
        ensure_not_zero(&to)?;
        if amount == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        let remaining = self.remaining();
        if amount > remaining {
            return Err(Error::CapExceeded { requested: amount, remaining });
        }
        let updated = balances.ensure_credit(&to, amount)?;

        self.total_minted += amount;
        balances.set_balance(&to, updated);
        Ok(())
    }
}
