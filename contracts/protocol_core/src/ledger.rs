//! Balance bookkeeping behind a trait.
//!
//! Contracts implement it with `ink::storage::Mapping`; tests use a
//! `BTreeMap`.  The provided `ensure_*` methods let an operation check every
//! debit and credit it is about to make before writing the first one.
//!
//! `Registry` is the same seam for keyed records that grow with use
//! (policies, pools, fulfilled requests). Anything unbounded lives behind it
//! so a contract's root storage stays a fixed size.

use alloc::collections::BTreeMap;

use ink::storage::{
    traits::{Packed, StorageKey},
    Mapping,
};

use crate::{Balance, Error, Result};

pub trait Ledger<K> {
    fn balance_of(&self, key: &K) -> Balance;

    /// Overwrite a balance. A zero balance may drop the entry.
    fn set_balance(&mut self, key: &K, value: Balance);

    /// Balance after debiting `amount`, without writing it.
    ///
    /// # Errors
    /// `InsufficientBalance` when the holder has less than `amount`.
    fn ensure_debit(&self, key: &K, amount: Balance) -> Result<Balance> {
        let available = self.balance_of(key);
        available
            .checked_sub(amount)
            .ok_or(Error::InsufficientBalance { requested: amount, available })
    }

    /// Balance after crediting `amount`, without writing it.
    fn ensure_credit(&self, key: &K, amount: Balance) -> Result<Balance> {
        self.balance_of(key)
            .checked_add(amount)
            .ok_or(Error::Overflow)
    }

    fn debit(&mut self, key: &K, amount: Balance) -> Result<()> {
        let updated = self.ensure_debit(key, amount)?;
        self.set_balance(key, updated);
        Ok(())
    }

    fn credit(&mut self, key: &K, amount: Balance) -> Result<()> {
        let updated = self.ensure_credit(key, amount)?;
        self.set_balance(key, updated);
        Ok(())
    }

    /// Move `amount` from one holder to another; all-or-nothing.
    fn transfer(&mut self, from: &K, to: &K, amount: Balance) -> Result<()>
    where
        K: PartialEq,
    {
        let from_after = self.ensure_debit(from, amount)?;
        if from == to {
            return Ok(());
        }
        let to_after = self.ensure_credit(to, amount)?;
        self.set_balance(from, from_after);
        self.set_balance(to, to_after);
        Ok(())
    }
}

impl<K, S> Ledger<K> for Mapping<K, Balance, S>
where
    K: scale::Encode,
    S: StorageKey,
{
    fn balance_of(&self, key: &K) -> Balance {
        self.get(key).unwrap_or(0)
    }

    fn set_balance(&mut self, key: &K, value: Balance) {
        if value == 0 {
            self.remove(key);
        } else {
            self.insert(key, &value);
        }
    }
}

impl<K> Ledger<K> for BTreeMap<K, Balance>
where
    K: Ord + Clone,
{
    fn balance_of(&self, key: &K) -> Balance {
        self.get(key).copied().unwrap_or(0)
    }

    fn set_balance(&mut self, key: &K, value: Balance) {
        if value == 0 {
            self.remove(key);
        } else {
            self.insert(key.clone(), value);
        }
    }
}

/// Keyed records, one storage cell per key.
pub trait Registry<K, V> {
    fn lookup(&self, key: &K) -> Option<V>;

    fn store(&mut self, key: &K, value: &V);

    fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }
}

impl<K, V, S> Registry<K, V> for Mapping<K, V, S>
where
    K: scale::Encode,
    V: Packed + scale::EncodeLike,
    S: StorageKey,
{
    fn lookup(&self, key: &K) -> Option<V> {
        self.get(key)
    }

    fn store(&mut self, key: &K, value: &V) {
        self.insert(key, value);
    }
}

impl<K, V, T> Registry<K, V> for &mut T
where
    T: Registry<K, V> + ?Sized,
{
    fn lookup(&self, key: &K) -> Option<V> {
        (**self).lookup(key)
    }

    fn store(&mut self, key: &K, value: &V) {
        (**self).store(key, value)
    }
}

impl<K, V> Registry<K, V> for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn lookup(&self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }

    fn store(&mut self, key: &K, value: &V) {
        self.insert(key.clone(), value.clone());
    }
}
