//! Policy tokens, their pools, and the router that trades them.
//!
//! ```text
//!   mint_policy ──premium──► premium reserve        buyer += premium policy tokens
//!        │
//!        ▼        now ≥ expiry, oracle read
//!   Pending ──────────── settle ──────────► Won | Lost   (exactly once)
//!                                              │   Lost: reserve → pool.reserve1,
//!                                              │         or the owner if no shares
//!   redeem(amount) ◄───────────────────────────┘
//!     Won  → amount × premium reserve / total_supply stablecoin
//!     Lost → 0   (tokens are burned either way)
//! ```
//!
//! Each policy's pool holds two balances of stablecoin: the premium reserve
//! backing redemptions, and `reserve1` on the constant-product curve.  Shares
//! only ever claim the curve, so the first provider prices the pool.  Until
//! expiry the policy token trades against the stablecoin on that curve; after
//! expiry the pool only accepts withdrawals.
//!
//! Policy records and the terms index grow with every new class, so they sit
//! behind [`PolicyBook`] (one storage cell per policy on-chain).  [`Market`]
//! itself only carries configuration.
//!
//! Every operation validates all inputs and sizes every balance change
//! before writing anything.

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::amm::{self, Deposit, Pool};
use crate::ledger::{Ledger, Registry};
use crate::math::mul_div;
use crate::oracle::{validate_symbol, PriceSource, Symbol};
use crate::router::{self, Asset, Hop};
use crate::{ensure_not_zero, zero_account, AccountId, Balance, Error, Invalid, Result, Role, Timestamp};

pub type PolicyId = u32;

/// Ledger key for one holder's balance of one asset.
pub type Holding = (Asset, AccountId);

// ── Settlement strategy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub enum Outcome {
    Pending,
    Won,
    Lost,
}

/// Which side of the strike pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub enum Trigger {
    /// Wins when the settlement price is below the strike.
    BelowStrike,
    /// Wins when the settlement price is above the strike.
    AboveStrike,
}

/// Outcome when the settlement price equals the strike exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub enum AtStrike {
    Won,
    Lost,
}

/// Maps a settlement price and a strike to an outcome.
pub trait SettlementPredicate {
    fn outcome(&self, price: Balance, strike: Balance) -> Outcome;
}

/// Settlement predicate chosen per policy-token class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct SettlementRule {
    pub trigger: Trigger,
    pub at_strike: AtStrike,
}

impl SettlementRule {
    /// Default class: pays out when `price <= strike`.
    pub const BELOW_OR_AT: SettlementRule =
        SettlementRule { trigger: Trigger::BelowStrike, at_strike: AtStrike::Won };

    /// Pays out when `price >= strike`.
    pub const ABOVE_OR_AT: SettlementRule =
        SettlementRule { trigger: Trigger::AboveStrike, at_strike: AtStrike::Won };
}

impl Default for SettlementRule {
    fn default() -> Self {
        Self::BELOW_OR_AT
    }
}

impl SettlementPredicate for SettlementRule {
    fn outcome(&self, price: Balance, strike: Balance) -> Outcome {
        let won = match (price.cmp(&strike), self.trigger) {
            (Ordering::Equal, _) => self.at_strike == AtStrike::Won,
            (Ordering::Less, Trigger::BelowStrike) => true,
            (Ordering::Greater, Trigger::AboveStrike) => true,
            _ => false,
        };
        if won {
            Outcome::Won
        } else {
            Outcome::Lost
        }
    }
}

// ── Policy tokens ────────────────────────────────────────────────────────────

/// Terms identifying a policy-token class. Strike is in 18-decimal price units.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct PolicyTerms {
    pub symbol: Symbol,
    pub strike: Balance,
    pub expiry: Timestamp,
    pub rule: SettlementRule,
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct PolicyToken {
    pub id: PolicyId,
    pub terms: PolicyTerms,
    pub outcome: Outcome,
    /// Oracle price the outcome was decided on.
    pub settled_price: Option<Balance>,
    pub settled_at: Option<Timestamp>,
    pub total_supply: Balance,
    /// Premiums paid for this class and not yet redeemed or forfeited.
    pub premium_reserve: Balance,
}

impl PolicyToken {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.terms.expiry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: Outcome,
    pub price: Balance,
    pub price_updated_at: Timestamp,
}

/// Reject a call made after the caller's deadline.
pub fn ensure_deadline(deadline: Timestamp, now: Timestamp) -> Result<()> {
    if now > deadline {
        return Err(Error::ExpiredDeadline { deadline, now });
    }
    Ok(())
}

// ── Policy book ──────────────────────────────────────────────────────────────

/// Everything stored per policy class.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct PolicyRecord {
    pub token: PolicyToken,
    pub pool: Pool,
}

/// Storage for policy records and the terms → id index.
pub trait PolicyBook {
    fn record(&self, id: PolicyId) -> Option<PolicyRecord>;

    fn set_record(&mut self, id: PolicyId, record: &PolicyRecord);

    fn class_of(&self, terms: &PolicyTerms) -> Option<PolicyId>;

    fn set_class(&mut self, terms: &PolicyTerms, id: PolicyId);

    /// # Errors
    /// `Validation(UnknownPolicy)` if no class has this id.
    fn policy(&self, id: PolicyId) -> Result<PolicyRecord> {
        self.record(id)
            .ok_or(Error::Validation(Invalid::UnknownPolicy(id)))
    }

    fn pool(&self, id: PolicyId) -> Result<Pool> {
        Ok(self.policy(id)?.pool)
    }
}

/// A [`PolicyBook`] over two registries: `Mapping`s in a contract,
/// `BTreeMap`s in tests.
pub struct Book<R, C> {
    pub records: R,
    pub classes: C,
}

impl<R, C> PolicyBook for Book<R, C>
where
    R: Registry<PolicyId, PolicyRecord>,
    C: Registry<PolicyTerms, PolicyId>,
{
    fn record(&self, id: PolicyId) -> Option<PolicyRecord> {
        self.records.lookup(&id)
    }

    fn set_record(&mut self, id: PolicyId, record: &PolicyRecord) {
        self.records.store(&id, record)
    }

    fn class_of(&self, terms: &PolicyTerms) -> Option<PolicyId> {
        self.classes.lookup(terms)
    }

    fn set_class(&mut self, terms: &PolicyTerms, id: PolicyId) {
        self.classes.store(terms, &id)
    }
}

// =============================================================================
// MARKET
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct Market {
    owner: AccountId,
    fee_per_mille: u128,
    default_rule: SettlementRule,
    next_policy_id: PolicyId,
}

impl Market {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            fee_per_mille: amm::DEFAULT_FEE_PER_MILLE,
            default_rule: SettlementRule::default(),
            next_policy_id: 1,
        }
    }

    // ── Views ────────────────────────────────────────────────────────────

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn fee_per_mille(&self) -> u128 {
        self.fee_per_mille
    }

    pub fn default_rule(&self) -> SettlementRule {
        self.default_rule
    }

    /// Ids are handed out from 1 without gaps.
    pub fn policy_count(&self) -> u32 {
        self.next_policy_id - 1
    }

    /// Quote an exact-input trade. `pool_of` reads a policy's pool.
    pub fn get_amounts_out<F>(&self, pool_of: F, amount_in: Balance, path: &[Asset]) -> Result<Vec<Balance>>
    where
        F: Fn(PolicyId) -> Result<Pool>,
    {
        let hops = router::resolve_path(path)?;
        router::get_amounts_out(pool_of, amount_in, &hops, self.fee_per_mille)
    }

    pub fn get_amounts_in<F>(&self, pool_of: F, amount_out: Balance, path: &[Asset]) -> Result<Vec<Balance>>
    where
        F: Fn(PolicyId) -> Result<Pool>,
    {
        let hops = router::resolve_path(path)?;
        router::get_amounts_in(pool_of, amount_out, &hops, self.fee_per_mille)
    }

    // ── Admin ────────────────────────────────────────────────────────────

    fn only_owner(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner {
            return Err(Error::Unauthorized(Role::Owner));
        }
        Ok(())
    }

    /// Returns the previous fee.
    pub fn set_fee_rate(&mut self, caller: &AccountId, fee_per_mille: u128) -> Result<u128> {
        self.only_owner(caller)?;
        amm::ensure_fee(fee_per_mille)?;
        let previous = self.fee_per_mille;
        self.fee_per_mille = fee_per_mille;
        Ok(previous)
    }

    /// Rule applied by `mint_policy`. Existing classes keep theirs.
    pub fn set_default_rule(&mut self, caller: &AccountId, rule: SettlementRule) -> Result<()> {
        self.only_owner(caller)?;
        self.default_rule = rule;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: AccountId) -> Result<AccountId> {
        self.only_owner(caller)?;
        ensure_not_zero(&new_owner)?;
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }

    // ── Stablecoin custody ───────────────────────────────────────────────

    pub fn deposit_stablecoin<L: Ledger<Holding>>(
        &mut self,
        ledger: &mut L,
        who: AccountId,
        amount: Balance,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        ledger.credit(&(Asset::Stablecoin, who), amount)
    }

    pub fn withdraw_stablecoin<L: Ledger<Holding>>(
        &mut self,
        ledger: &mut L,
        who: AccountId,
        amount: Balance,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        ledger.debit(&(Asset::Stablecoin, who), amount)
    }

    /// Move stablecoin, policy tokens or LP shares between holders.
    pub fn transfer<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &B,
        ledger: &mut L,
        from: AccountId,
        to: AccountId,
        asset: Asset,
        amount: Balance,
    ) -> Result<()> {
        ensure_not_zero(&to)?;
        if amount == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        if let Asset::Policy(id) | Asset::Share(id) = asset {
            book.policy(id)?;
        }
        ledger.transfer(&(asset, from), &(asset, to), amount)
    }

    // =========================================================================
    // POLICY LIFECYCLE
    // =========================================================================

    /// Buy `premium` policy tokens under the default settlement rule.
    #[allow(clippy::too_many_arguments)]
    pub fn mint_policy<B: PolicyBook, L: Ledger<Holding>, P: PriceSource>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        oracle: &P,
        buyer: AccountId,
        now: Timestamp,
        symbol: &str,
        strike: Balance,
        expiry: Timestamp,
        premium: Balance,
    ) -> Result<PolicyId> {
        let rule = self.default_rule;
        self.mint_policy_with_rule(book, ledger, oracle, buyer, now, symbol, strike, expiry, rule, premium)
    }

    /// Buy `premium` policy tokens of the class `(symbol, strike, expiry, rule)`.
    ///
    /// The premium moves from the buyer's stablecoin balance into the class's
    /// premium reserve and the buyer receives the same number of policy
    /// tokens.  Repeating the terms of an existing class mints more of that
    /// class.
    ///
    /// # Errors
    /// - `Validation` for a bad symbol, zero strike or premium, or an expiry
    ///   not after `now`.
    /// - `NotConfigured` if the oracle has no feed for `symbol`.
    /// - `InsufficientBalance` if the buyer cannot pay the premium.
    #[allow(clippy::too_many_arguments)]
    pub fn mint_policy_with_rule<B: PolicyBook, L: Ledger<Holding>, P: PriceSource>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        oracle: &P,
        buyer: AccountId,
        now: Timestamp,
        symbol: &str,
        strike: Balance,
        expiry: Timestamp,
        rule: SettlementRule,
        premium: Balance,
    ) -> Result<PolicyId> {
        validate_symbol(symbol)?;
        if strike == 0 || premium == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        oracle.feed_address(symbol)?;
        if expiry <= now {
            return Err(Invalid::ExpiryNotInFuture.into());
        }

        let terms = PolicyTerms { symbol: String::from(symbol), strike, expiry, rule };
        let existing = book.class_of(&terms);
        let id = existing.unwrap_or(self.next_policy_id);

        let stable_key = (Asset::Stablecoin, buyer);
        let policy_key = (Asset::Policy(id), buyer);
        let stable_after = ledger.ensure_debit(&stable_key, premium)?;
        let policy_after = ledger.ensure_credit(&policy_key, premium)?;

        let mut record = match existing {
            Some(id) => book.policy(id)?,
            None => PolicyRecord {
                token: PolicyToken {
                    id,
                    terms: terms.clone(),
                    outcome: Outcome::Pending,
                    settled_price: None,
                    settled_at: None,
                    total_supply: 0,
                    premium_reserve: 0,
                },
                pool: Pool::default(),
            },
        };
        let token = &mut record.token;
        token.total_supply = token.total_supply.checked_add(premium).ok_or(Error::Overflow)?;
        token.premium_reserve = token.premium_reserve.checked_add(premium).ok_or(Error::Overflow)?;
        let next_policy_id = match existing {
            Some(_) => self.next_policy_id,
            None => self.next_policy_id.checked_add(1).ok_or(Error::Overflow)?,
        };

        // ── Effects ───────────────────────────────────────────────────────
        ledger.set_balance(&stable_key, stable_after);
        ledger.set_balance(&policy_key, policy_after);
        book.set_record(id, &record);
        if existing.is_none() {
            book.set_class(&terms, id);
            self.next_policy_id = next_policy_id;
        }
        Ok(id)
    }

    /// Fix the outcome of a policy from the oracle's latest price.
    ///
    /// Callable by anyone, once, at or after expiry.  A Lost outcome forfeits
    /// the premium reserve to the pool's liquidity providers, or to the owner
    /// when the pool has no shares.
    ///
    /// # Errors
    /// - `AlreadySettled` on any call after the first successful one.
    /// - `Validation(NotExpired)` before expiry.
    /// - `NotConfigured` / `StaleOrMissingPrice` from the oracle; the policy
    ///   stays `Pending`.
    pub fn settle<B: PolicyBook, L: Ledger<Holding>, P: PriceSource>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        oracle: &P,
        id: PolicyId,
        now: Timestamp,
    ) -> Result<Settlement> {
        let mut record = book.policy(id)?;
        if record.token.outcome != Outcome::Pending {
            return Err(Error::AlreadySettled(id));
        }
        if !record.token.is_expired(now) {
            return Err(Invalid::NotExpired.into());
        }

        let reading = oracle.latest_price(&record.token.terms.symbol)?;
        let outcome = record.token.terms.rule.outcome(reading.price, record.token.terms.strike);

        let mut owner_credit = None;
        if outcome == Outcome::Lost {
            let forfeited = core::mem::take(&mut record.token.premium_reserve);
            if record.pool.total_shares > 0 {
                record.pool.reserve1 =
                    record.pool.reserve1.checked_add(forfeited).ok_or(Error::Overflow)?;
            } else if forfeited > 0 {
                let owner_key = (Asset::Stablecoin, self.owner);
                owner_credit = Some((owner_key, ledger.ensure_credit(&owner_key, forfeited)?));
            }
        }
        record.token.outcome = outcome;
        record.token.settled_price = Some(reading.price);
        record.token.settled_at = Some(now);

        // ── Effects ───────────────────────────────────────────────────────
        if let Some((key, balance)) = owner_credit {
            ledger.set_balance(&key, balance);
        }
        book.set_record(id, &record);

        Ok(Settlement { outcome, price: reading.price, price_updated_at: reading.updated_at })
    }

    /// Burn `amount` settled policy tokens and pay the holder's share.
    ///
    /// Won pays `⌊amount × premium_reserve / total_supply⌋` stablecoin; Lost
    /// pays nothing.
    ///
    /// # Errors
    /// - `NotSettled` while the outcome is pending.
    /// - `InsufficientBalance` if the holder has fewer than `amount` tokens.
    pub fn redeem<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        holder: AccountId,
        id: PolicyId,
        amount: Balance,
    ) -> Result<Balance> {
        let mut record = book.policy(id)?;
        if record.token.outcome == Outcome::Pending {
            return Err(Error::NotSettled(id));
        }
        if amount == 0 {
            return Err(Invalid::ZeroAmount.into());
        }

        let policy_key = (Asset::Policy(id), holder);
        let stable_key = (Asset::Stablecoin, holder);
        let policy_after = ledger.ensure_debit(&policy_key, amount)?;

        let token = &mut record.token;
        let payout = match token.outcome {
            Outcome::Won => mul_div(amount, token.premium_reserve, token.total_supply)?,
            _ => 0,
        };
        let stable_after = ledger.ensure_credit(&stable_key, payout)?;
        token.premium_reserve = token
            .premium_reserve
            .checked_sub(payout)
            .ok_or(Error::InsufficientLiquidity)?;
        token.total_supply = token.total_supply.checked_sub(amount).ok_or(Error::Overflow)?;

        // ── Effects ───────────────────────────────────────────────────────
        ledger.set_balance(&policy_key, policy_after);
        ledger.set_balance(&stable_key, stable_after);
        book.set_record(id, &record);
        Ok(payout)
    }

    // =========================================================================
    // LIQUIDITY
    // =========================================================================

    fn ensure_tradable(record: &PolicyRecord, now: Timestamp) -> Result<()> {
        if record.token.is_expired(now) {
            return Err(Error::PolicyExpired(record.token.id));
        }
        Ok(())
    }

    /// Deposit policy tokens and stablecoin into a policy's pool for shares.
    ///
    /// # Errors
    /// - `ExpiredDeadline` when `now > deadline` (checked first).
    /// - `PolicyExpired` at or after the policy's expiry.
    /// - `InsufficientLiquidity` if the deposit would mint no shares.
    /// - `SlippageExceeded` if fewer than `min_shares` would be minted.
    /// - `InsufficientBalance` if the provider cannot cover the amounts.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        provider: AccountId,
        now: Timestamp,
        id: PolicyId,
        amount0_desired: Balance,
        amount1_desired: Balance,
        min_shares: Balance,
        deadline: Timestamp,
    ) -> Result<Deposit> {
        ensure_deadline(deadline, now)?;
        ensure_not_zero(&provider)?;
        let mut record = book.policy(id)?;
        Self::ensure_tradable(&record, now)?;

        let pool = record.pool;
        let deposit = pool.deposit(amount0_desired, amount1_desired)?;
        if deposit.shares < min_shares {
            return Err(Error::SlippageExceeded { limit: min_shares, actual: deposit.shares });
        }

        let policy_key = (Asset::Policy(id), provider);
        let stable_key = (Asset::Stablecoin, provider);
        let share_key = (Asset::Share(id), provider);
        let locked_key = (Asset::Share(id), zero_account());
        let policy_after = ledger.ensure_debit(&policy_key, deposit.amount0)?;
        let stable_after = ledger.ensure_debit(&stable_key, deposit.amount1)?;
        let share_after = ledger.ensure_credit(&share_key, deposit.shares)?;
        let locked_after = ledger.ensure_credit(&locked_key, deposit.locked)?;

        record.pool = Pool {
            reserve0: pool.reserve0.checked_add(deposit.amount0).ok_or(Error::Overflow)?,
            reserve1: pool.reserve1.checked_add(deposit.amount1).ok_or(Error::Overflow)?,
            total_shares: pool
                .total_shares
                .checked_add(deposit.shares)
                .and_then(|total| total.checked_add(deposit.locked))
                .ok_or(Error::Overflow)?,
        };

        // ── Effects ───────────────────────────────────────────────────────
        ledger.set_balance(&policy_key, policy_after);
        ledger.set_balance(&stable_key, stable_after);
        ledger.set_balance(&share_key, share_after);
        if deposit.locked > 0 {
            ledger.set_balance(&locked_key, locked_after);
        }
        book.set_record(id, &record);
        Ok(deposit)
    }

    /// Burn pool shares for the matching slice of both reserves.
    ///
    /// Stays available after expiry so providers can always exit.
    ///
    /// # Errors
    /// - `ExpiredDeadline` when `now > deadline` (checked first).
    /// - `InsufficientShares` if the provider holds fewer than `shares`.
    /// - `SlippageExceeded` if either output is below its minimum.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        provider: AccountId,
        now: Timestamp,
        id: PolicyId,
        shares: Balance,
        min_amount0: Balance,
        min_amount1: Balance,
        deadline: Timestamp,
    ) -> Result<(Balance, Balance)> {
        ensure_deadline(deadline, now)?;
        let mut record = book.policy(id)?;
        if shares == 0 {
            return Err(Invalid::ZeroAmount.into());
        }

        let share_key = (Asset::Share(id), provider);
        let held = ledger.balance_of(&share_key);
        if held < shares {
            return Err(Error::InsufficientShares { requested: shares, available: held });
        }

        let pool = record.pool;
        let (amount0, amount1) = pool.withdrawal(shares)?;
        if amount0 < min_amount0 {
            return Err(Error::SlippageExceeded { limit: min_amount0, actual: amount0 });
        }
        if amount1 < min_amount1 {
            return Err(Error::SlippageExceeded { limit: min_amount1, actual: amount1 });
        }

        let policy_key = (Asset::Policy(id), provider);
        let stable_key = (Asset::Stablecoin, provider);
        let policy_after = ledger.ensure_credit(&policy_key, amount0)?;
        let stable_after = ledger.ensure_credit(&stable_key, amount1)?;
        record.pool = Pool {
            reserve0: pool.reserve0 - amount0,
            reserve1: pool.reserve1 - amount1,
            total_shares: pool.total_shares - shares,
        };

        // ── Effects ───────────────────────────────────────────────────────
        ledger.set_balance(&share_key, held - shares);
        ledger.set_balance(&policy_key, policy_after);
        ledger.set_balance(&stable_key, stable_after);
        book.set_record(id, &record);
        Ok((amount0, amount1))
    }

    // =========================================================================
    // SWAPS
    // =========================================================================

    /// Sell exactly `amount_in` of `path[0]` for at least `amount_out_min`
    /// of the last asset, credited to `to`.
    ///
    /// # Errors
    /// - `ExpiredDeadline` when `now > deadline` (checked first).
    /// - `Validation(InvalidPath)`, `PolicyExpired`, `InsufficientLiquidity`.
    /// - `SlippageExceeded` if the output is below `amount_out_min`.
    /// - `InsufficientBalance` if the sender cannot pay `amount_in`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_tokens_for_tokens<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        sender: AccountId,
        now: Timestamp,
        amount_in: Balance,
        amount_out_min: Balance,
        path: &[Asset],
        to: AccountId,
        deadline: Timestamp,
    ) -> Result<Vec<Balance>> {
        ensure_deadline(deadline, now)?;
        let hops = Self::tradable_hops(book, path, &to, now)?;
        let amounts =
            router::get_amounts_out(|id| book.pool(id), amount_in, &hops, self.fee_per_mille)?;
        let amount_out = amounts[amounts.len() - 1];
        if amount_out < amount_out_min {
            return Err(Error::SlippageExceeded { limit: amount_out_min, actual: amount_out });
        }
        Self::execute_swap(book, ledger, sender, to, path, &hops, &amounts)?;
        Ok(amounts)
    }

    /// Buy exactly `amount_out` of the last asset for at most `amount_in_max`
    /// of `path[0]`. Inputs are rounded up at every hop.
    ///
    /// # Errors
    /// As [`Market::swap_exact_tokens_for_tokens`], with `SlippageExceeded`
    /// when the required input exceeds `amount_in_max`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_tokens_for_exact_tokens<B: PolicyBook, L: Ledger<Holding>>(
        &mut self,
        book: &mut B,
        ledger: &mut L,
        sender: AccountId,
        now: Timestamp,
        amount_out: Balance,
        amount_in_max: Balance,
        path: &[Asset],
        to: AccountId,
        deadline: Timestamp,
    ) -> Result<Vec<Balance>> {
        ensure_deadline(deadline, now)?;
        let hops = Self::tradable_hops(book, path, &to, now)?;
        let amounts =
            router::get_amounts_in(|id| book.pool(id), amount_out, &hops, self.fee_per_mille)?;
        if amounts[0] > amount_in_max {
            return Err(Error::SlippageExceeded { limit: amount_in_max, actual: amounts[0] });
        }
        Self::execute_swap(book, ledger, sender, to, path, &hops, &amounts)?;
        Ok(amounts)
    }

    fn tradable_hops<B: PolicyBook>(
        book: &B,
        path: &[Asset],
        to: &AccountId,
        now: Timestamp,
    ) -> Result<Vec<Hop>> {
        let hops = router::resolve_path(path)?;
        ensure_not_zero(to)?;
        for hop in &hops {
            Self::ensure_tradable(&book.policy(hop.policy)?, now)?;
        }
        Ok(hops)
    }

    fn execute_swap<B: PolicyBook, L: Ledger<Holding>>(
        book: &mut B,
        ledger: &mut L,
        sender: AccountId,
        to: AccountId,
        path: &[Asset],
        hops: &[Hop],
        amounts: &[Balance],
    ) -> Result<()> {
        let last = amounts.len() - 1;
        let from_key = (path[0], sender);
        let to_key = (path[last], to);
        let from_after = ledger.ensure_debit(&from_key, amounts[0])?;
        let to_after = ledger.ensure_credit(&to_key, amounts[last])?;

        let mut next_records = Vec::with_capacity(hops.len());
        for (index, hop) in hops.iter().enumerate() {
            let mut record = book.policy(hop.policy)?;
            record.pool = record.pool.after_swap(hop.direction, amounts[index], amounts[index + 1])?;
            next_records.push((hop.policy, record));
        }

        // ── Effects ───────────────────────────────────────────────────────
        ledger.set_balance(&from_key, from_after);
        ledger.set_balance(&to_key, to_after);
        for (id, record) in next_records {
            book.set_record(id, &record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::MINIMUM_LIQUIDITY;
    use crate::oracle::{OracleAdapter, OracleView, RoundData, StaticFeeds, PRICE_SCALE};
    use crate::testing::account;
    use alloc::collections::BTreeMap;
    use alloc::vec;

    type Balances = BTreeMap<Holding, Balance>;
    type MemoryBook = Book<BTreeMap<PolicyId, PolicyRecord>, BTreeMap<PolicyTerms, PolicyId>>;

    const NOW: Timestamp = 1_000_000;
    const EXPIRY: Timestamp = 2_000_000;
    const STRIKE: Balance = 2_000 * PRICE_SCALE;

    struct Harness {
        market: Market,
        book: MemoryBook,
        ledger: Balances,
        oracle: OracleAdapter,
        feeds: StaticFeeds,
    }

    impl Harness {
        fn new() -> Self {
            let mut oracle = OracleAdapter::new(account(1));
            oracle.set_price_feed(&account(1), "ETH", account(50)).unwrap();
            let mut ledger = Balances::new();
            for who in [account(2), account(3), account(4)] {
                ledger.credit(&(Asset::Stablecoin, who), 1_000_000).unwrap();
            }
            Self {
                market: Market::new(account(1)),
                book: Book { records: BTreeMap::new(), classes: BTreeMap::new() },
                ledger,
                oracle,
                feeds: StaticFeeds::default(),
            }
        }

        /// Feed answer in 8 decimals.
        fn set_price(&mut self, whole_usd: i128, updated_at: Timestamp) {
            self.feeds.0.insert(
                account(50),
                RoundData { answer: whole_usd * 100_000_000, updated_at },
            );
        }

        fn mint(&mut self, buyer: AccountId, premium: Balance) -> Result<PolicyId> {
            let view = OracleView { adapter: &self.oracle, reader: &self.feeds, now: NOW };
            self.market.mint_policy(
                &mut self.book,
                &mut self.ledger,
                &view,
                buyer,
                NOW,
                "ETH",
                STRIKE,
                EXPIRY,
                premium,
            )
        }

        fn settle(&mut self, id: PolicyId, now: Timestamp) -> Result<Settlement> {
            let view = OracleView { adapter: &self.oracle, reader: &self.feeds, now };
            self.market.settle(&mut self.book, &mut self.ledger, &view, id, now)
        }

        fn redeem(&mut self, holder: AccountId, id: PolicyId, amount: Balance) -> Result<Balance> {
            self.market.redeem(&mut self.book, &mut self.ledger, holder, id, amount)
        }

        fn add(&mut self, provider: AccountId, id: PolicyId, amount0: Balance, amount1: Balance) -> Result<Deposit> {
            self.market
                .add_liquidity(&mut self.book, &mut self.ledger, provider, NOW, id, amount0, amount1, 0, NOW)
        }

        fn remove(&mut self, provider: AccountId, id: PolicyId, shares: Balance) -> Result<(Balance, Balance)> {
            self.market
                .remove_liquidity(&mut self.book, &mut self.ledger, provider, NOW, id, shares, 0, 0, NOW)
        }

        fn balance(&self, asset: Asset, who: AccountId) -> Balance {
            self.ledger.balance_of(&(asset, who))
        }

        fn token(&self, id: PolicyId) -> PolicyToken {
            self.book.policy(id).unwrap().token
        }

        fn pool(&self, id: PolicyId) -> Pool {
            self.book.pool(id).unwrap()
        }

        fn set_pool(&mut self, id: PolicyId, pool: Pool) {
            let mut record = self.book.policy(id).unwrap();
            record.pool = pool;
            self.book.set_record(id, &record);
        }

        /// Buyer 2 pays 50_000 of premiums, then seeds the pool with 10_000/10_000.
        fn seeded_pool(&mut self) -> PolicyId {
            let id = self.mint(account(2), 50_000).unwrap();
            self.add(account(2), id, 10_000, 10_000).unwrap();
            id
        }
    }

    // ── Settlement predicate ─────────────────────────────────────────────────

    #[test]
    fn default_rule_pays_below_and_at_strike() {
        let rule = SettlementRule::default();
        assert_eq!(rule.outcome(99, 100), Outcome::Won);
        assert_eq!(rule.outcome(100, 100), Outcome::Won);
        assert_eq!(rule.outcome(101, 100), Outcome::Lost);
    }

    #[test]
    fn above_rule_with_losing_tie() {
        let rule = SettlementRule { trigger: Trigger::AboveStrike, at_strike: AtStrike::Lost };
        assert_eq!(rule.outcome(101, 100), Outcome::Won);
        assert_eq!(rule.outcome(100, 100), Outcome::Lost);
        assert_eq!(rule.outcome(99, 100), Outcome::Lost);
    }

    // ── Minting ──────────────────────────────────────────────────────────────

    #[test]
    fn mint_moves_premium_into_the_reserve() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();

        assert_eq!(h.balance(Asset::Stablecoin, account(2)), 1_000_000 - 500);
        assert_eq!(h.balance(Asset::Policy(id), account(2)), 500);
        let token = h.token(id);
        assert_eq!(token.premium_reserve, 500);
        assert_eq!(token.total_supply, 500);
        assert_eq!(token.outcome, Outcome::Pending);
        assert_eq!(h.pool(id), Pool::default(), "premiums stay off the curve");
    }

    #[test]
    fn same_terms_reuse_the_class() {
        let mut h = Harness::new();
        let first = h.mint(account(2), 500).unwrap();
        let second = h.mint(account(3), 300).unwrap();
        assert_eq!(first, second);
        assert_eq!(h.market.policy_count(), 1);
        assert_eq!(h.token(first).premium_reserve, 800);

        let view = OracleView { adapter: &h.oracle, reader: &h.feeds, now: NOW };
        let other = h
            .market
            .mint_policy_with_rule(
                &mut h.book,
                &mut h.ledger,
                &view,
                account(2),
                NOW,
                "ETH",
                STRIKE,
                EXPIRY,
                SettlementRule::ABOVE_OR_AT,
                10,
            )
            .unwrap();
        assert_ne!(other, first, "a different rule is a different class");
        assert_eq!(h.market.policy_count(), 2);
    }

    #[test]
    fn mint_requires_configured_feed() {
        let mut h = Harness::new();
        let view = OracleView { adapter: &h.oracle, reader: &h.feeds, now: NOW };
        let result = h.market.mint_policy(
            &mut h.book,
            &mut h.ledger,
            &view,
            account(2),
            NOW,
            "BTC",
            STRIKE,
            EXPIRY,
            10,
        );
        assert_eq!(result, Err(Error::NotConfigured { symbol: "BTC".into() }));
        assert_eq!(h.balance(Asset::Stablecoin, account(2)), 1_000_000);
    }

    #[test]
    fn mint_requires_future_expiry() {
        let mut h = Harness::new();
        let view = OracleView { adapter: &h.oracle, reader: &h.feeds, now: NOW };
        let result = h.market.mint_policy(
            &mut h.book,
            &mut h.ledger,
            &view,
            account(2),
            NOW,
            "ETH",
            STRIKE,
            NOW,
            10,
        );
        assert_eq!(result, Err(Error::Validation(Invalid::ExpiryNotInFuture)));
        assert_eq!(h.market.policy_count(), 0);
        assert!(h.book.records.is_empty());
    }

    #[test]
    fn mint_without_funds_changes_nothing() {
        let mut h = Harness::new();
        assert_eq!(
            h.mint(account(9), 10),
            Err(Error::InsufficientBalance { requested: 10, available: 0 })
        );
        assert_eq!(h.market.policy_count(), 0);
        assert!(h.book.classes.is_empty());
    }

    // ── Settlement ───────────────────────────────────────────────────────────

    #[test]
    fn settle_before_expiry_is_rejected() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(1_500, EXPIRY - 1);
        assert_eq!(h.settle(id, EXPIRY - 1), Err(Error::Validation(Invalid::NotExpired)));
    }

    #[test]
    fn settle_is_exactly_once() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(1_500, EXPIRY);

        let settlement = h.settle(id, EXPIRY).unwrap();
        assert_eq!(settlement.outcome, Outcome::Won);
        assert_eq!(settlement.price, 1_500 * PRICE_SCALE);

        h.set_price(2_500, EXPIRY + 10);
        assert_eq!(h.settle(id, EXPIRY + 10), Err(Error::AlreadySettled(id)));
        assert_eq!(h.token(id).outcome, Outcome::Won, "outcome is immutable");
        assert_eq!(h.token(id).settled_price, Some(1_500 * PRICE_SCALE));
    }

    #[test]
    fn settle_at_strike_uses_tie_break() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(2_000, EXPIRY);
        assert_eq!(h.settle(id, EXPIRY).unwrap().outcome, Outcome::Won);
    }

    #[test]
    fn missing_price_leaves_policy_pending() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        assert_eq!(
            h.settle(id, EXPIRY),
            Err(Error::StaleOrMissingPrice { symbol: "ETH".into() })
        );
        assert_eq!(h.token(id).outcome, Outcome::Pending);

        h.set_price(2_100, EXPIRY);
        assert_eq!(h.settle(id, EXPIRY).unwrap().outcome, Outcome::Lost);
    }

    #[test]
    fn lost_premiums_fall_to_owner_without_providers() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(3_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();

        assert_eq!(h.token(id).premium_reserve, 0);
        assert_eq!(h.balance(Asset::Stablecoin, account(1)), 500);
        assert_eq!(h.pool(id), Pool::default());
    }

    #[test]
    fn lost_premiums_accrue_to_providers() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        h.set_price(3_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();

        assert_eq!(h.pool(id).reserve1, 60_000);
        assert_eq!(h.balance(Asset::Stablecoin, account(1)), 0);
        let (a0, a1) = h
            .market
            .remove_liquidity(&mut h.book, &mut h.ledger, account(2), EXPIRY, id, 9_000, 0, 0, EXPIRY)
            .unwrap();
        assert_eq!((a0, a1), (9_000, 54_000));
    }

    // ── Redemption ───────────────────────────────────────────────────────────

    #[test]
    fn redeem_before_settlement_fails() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        assert_eq!(h.redeem(account(2), id, 100), Err(Error::NotSettled(id)));
    }

    #[test]
    fn won_redemption_pays_pro_rata_share() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 600).unwrap();
        h.mint(account(3), 400).unwrap();
        h.set_price(1_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();

        let payout = h.redeem(account(3), id, 400).unwrap();
        assert_eq!(payout, 400, "400 of 1000 supply against a 1000 reserve");
        assert_eq!(h.balance(Asset::Policy(id), account(3)), 0);
        assert_eq!(h.balance(Asset::Stablecoin, account(3)), 1_000_000);
        assert_eq!(h.token(id).premium_reserve, 600);
        assert_eq!(h.token(id).total_supply, 600);

        assert_eq!(h.redeem(account(2), id, 600), Ok(600));
        assert_eq!(h.token(id).premium_reserve, 0);
    }

    #[test]
    fn won_redemption_ignores_pool_reserves() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        h.set_price(1_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();

        // 40_000 held plus 10_000 in the pool make up the 50_000 supply.
        assert_eq!(h.redeem(account(2), id, 40_000), Ok(40_000));
        assert_eq!(h.pool(id).reserve1, 10_000);
        assert_eq!(h.token(id).premium_reserve, 10_000);
    }

    #[test]
    fn lost_redemption_burns_for_nothing() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(3_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();

        assert_eq!(h.redeem(account(2), id, 500), Ok(0));
        assert_eq!(h.balance(Asset::Policy(id), account(2)), 0);
        assert_eq!(h.token(id).total_supply, 0);
    }

    #[test]
    fn redeem_more_than_held_fails() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 500).unwrap();
        h.set_price(1_000, EXPIRY);
        h.settle(id, EXPIRY).unwrap();
        assert_eq!(
            h.redeem(account(2), id, 501),
            Err(Error::InsufficientBalance { requested: 501, available: 500 })
        );
    }

    // ── Liquidity ────────────────────────────────────────────────────────────

    #[test]
    fn first_provider_locks_minimum_liquidity() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 50_000).unwrap();
        let deposit = h.add(account(2), id, 10_000, 10_000).unwrap();

        assert_eq!(deposit.shares, 10_000 - MINIMUM_LIQUIDITY);
        assert_eq!(h.balance(Asset::Share(id), crate::zero_account()), MINIMUM_LIQUIDITY);
        assert_eq!(h.pool(id), Pool { reserve0: 10_000, reserve1: 10_000, total_shares: 10_000 });
        assert_eq!(h.token(id).premium_reserve, 50_000);
        assert_eq!(h.balance(Asset::Policy(id), account(2)), 40_000);
    }

    #[test]
    fn first_provider_sets_the_price() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 50_000).unwrap();
        h.add(account(2), id, 4_000, 1_000).unwrap();

        let pool = h.pool(id);
        assert_eq!((pool.reserve0, pool.reserve1), (4_000, 1_000));
        assert_eq!(amm::quote(1_000, pool.reserve0, pool.reserve1), Ok(250));
    }

    #[test]
    fn add_then_remove_returns_at_most_principal() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 50_000).unwrap();
        h.market
            .transfer(&h.book, &mut h.ledger, account(2), account(3), Asset::Policy(id), 20_000)
            .unwrap();

        let deposit = h.add(account(3), id, 10_000, 10_000).unwrap();
        let (a0, a1) = h.remove(account(3), id, deposit.shares).unwrap();
        assert!(a0 <= 10_000 && a1 <= 10_000, "got back {}/{}", a0, a1);
        assert!(h.balance(Asset::Stablecoin, account(3)) <= 1_000_000);
        assert!(h.balance(Asset::Policy(id), account(3)) <= 20_000);

        // A later provider's round trip is bounded the same way.
        let stable_before = h.balance(Asset::Stablecoin, account(2));
        let policy_before = h.balance(Asset::Policy(id), account(2));
        let deposit = h.add(account(2), id, 2_000, 2_000).unwrap();
        let (a0, a1) = h.remove(account(2), id, deposit.shares).unwrap();
        assert!(a0 <= deposit.amount0 && a1 <= deposit.amount1);
        assert!(h.balance(Asset::Stablecoin, account(2)) <= stable_before);
        assert!(h.balance(Asset::Policy(id), account(2)) <= policy_before);
        assert_eq!(h.token(id).premium_reserve, 50_000);
    }

    #[test]
    fn share_sum_matches_total_shares() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        h.ledger.credit(&(Asset::Policy(id), account(3)), 5_000).unwrap();
        h.add(account(3), id, 1_000, 50_000).unwrap();

        let sum: Balance = h
            .ledger
            .iter()
            .filter(|((asset, _), _)| *asset == Asset::Share(id))
            .map(|(_, amount)| *amount)
            .sum();
        assert_eq!(sum, h.pool(id).total_shares);
    }

    #[test]
    fn min_shares_guard_triggers_slippage() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        let before = h.pool(id);
        let result = h.market.add_liquidity(
            &mut h.book,
            &mut h.ledger,
            account(2),
            NOW,
            id,
            1_000,
            6_000,
            1_000_000,
            NOW,
        );
        assert!(matches!(result, Err(Error::SlippageExceeded { limit: 1_000_000, .. })));
        assert_eq!(h.pool(id), before);
    }

    #[test]
    fn remove_more_shares_than_held_fails() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        assert_eq!(
            h.remove(account(2), id, 9_001),
            Err(Error::InsufficientShares { requested: 9_001, available: 9_000 })
        );
    }

    #[test]
    fn remove_returns_proportional_reserves() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        let (a0, a1) = h
            .market
            .remove_liquidity(&mut h.book, &mut h.ledger, account(2), NOW, id, 5_000, 5_000, 5_000, NOW)
            .unwrap();
        assert_eq!((a0, a1), (5_000, 5_000));
        assert_eq!(h.balance(Asset::Share(id), account(2)), 4_000);
        assert_eq!(h.pool(id).total_shares, 5_000);
    }

    #[test]
    fn remove_below_minimum_fails() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        assert_eq!(
            h.market
                .remove_liquidity(&mut h.book, &mut h.ledger, account(2), NOW, id, 5_000, 5_001, 0, NOW),
            Err(Error::SlippageExceeded { limit: 5_001, actual: 5_000 })
        );
    }

    // ── Swaps ────────────────────────────────────────────────────────────────

    #[test]
    fn exact_in_swap_matches_reference_scenario() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 1_000).unwrap();
        h.set_pool(id, Pool { reserve0: 1_000, reserve1: 1_000, total_shares: 1_000 });

        let amounts = h
            .market
            .swap_exact_tokens_for_tokens(
                &mut h.book,
                &mut h.ledger,
                account(2),
                NOW,
                100,
                90,
                &[Asset::Policy(id), Asset::Stablecoin],
                account(3),
                NOW,
            )
            .unwrap();

        assert_eq!(amounts, vec![100, 90]);
        assert_eq!(h.balance(Asset::Policy(id), account(2)), 900);
        assert_eq!(h.balance(Asset::Stablecoin, account(3)), 1_000_090);
        assert_eq!(h.pool(id), Pool { reserve0: 1_100, reserve1: 910, total_shares: 1_000 });
        assert_eq!(h.token(id).premium_reserve, 1_000, "swaps never touch premiums");
    }

    #[test]
    fn exact_in_below_minimum_is_slippage() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 1_000).unwrap();
        h.set_pool(id, Pool { reserve0: 1_000, reserve1: 1_000, total_shares: 1_000 });
        assert_eq!(
            h.market.swap_exact_tokens_for_tokens(
                &mut h.book,
                &mut h.ledger,
                account(2),
                NOW,
                100,
                91,
                &[Asset::Policy(id), Asset::Stablecoin],
                account(2),
                NOW,
            ),
            Err(Error::SlippageExceeded { limit: 91, actual: 90 })
        );
    }

    #[test]
    fn expired_deadline_changes_nothing() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        let records = h.book.records.clone();
        let ledger = h.ledger.clone();

        let result = h.market.swap_exact_tokens_for_tokens(
            &mut h.book,
            &mut h.ledger,
            account(2),
            NOW,
            100,
            0,
            &[Asset::Stablecoin, Asset::Policy(id)],
            account(2),
            NOW - 1,
        );
        assert_eq!(result, Err(Error::ExpiredDeadline { deadline: NOW - 1, now: NOW }));
        assert_eq!(
            h.market
                .add_liquidity(&mut h.book, &mut h.ledger, account(2), NOW, id, 10, 10, 0, NOW - 1),
            Err(Error::ExpiredDeadline { deadline: NOW - 1, now: NOW })
        );
        assert_eq!(h.book.records, records);
        assert_eq!(h.ledger, ledger);
    }

    #[test]
    fn exact_out_swap_charges_rounded_up_input() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 1_000).unwrap();
        h.set_pool(id, Pool { reserve0: 1_000, reserve1: 1_000, total_shares: 1_000 });

        let amounts = h
            .market
            .swap_tokens_for_exact_tokens(
                &mut h.book,
                &mut h.ledger,
                account(3),
                NOW,
                90,
                100,
                &[Asset::Stablecoin, Asset::Policy(id)],
                account(3),
                NOW,
            )
            .unwrap();
        assert_eq!(amounts, vec![100, 90]);
        assert_eq!(h.balance(Asset::Policy(id), account(3)), 90);

        assert_eq!(
            h.market.swap_tokens_for_exact_tokens(
                &mut h.book,
                &mut h.ledger,
                account(3),
                NOW,
                90,
                50,
                &[Asset::Stablecoin, Asset::Policy(id)],
                account(3),
                NOW,
            ),
            Err(Error::SlippageExceeded { limit: 50, actual: 122 })
        );
    }

    #[test]
    fn multi_hop_swap_moves_stable_between_pools() {
        let mut h = Harness::new();
        let a = h.mint(account(2), 1_000).unwrap();
        let view = OracleView { adapter: &h.oracle, reader: &h.feeds, now: NOW };
        let b = h
            .market
            .mint_policy(
                &mut h.book,
                &mut h.ledger,
                &view,
                account(2),
                NOW,
                "ETH",
                STRIKE,
                EXPIRY + 1,
                1_000,
            )
            .unwrap();
        h.set_pool(a, Pool { reserve0: 1_000, reserve1: 1_000, total_shares: 1_000 });
        h.set_pool(b, Pool { reserve0: 1_000, reserve1: 1_000, total_shares: 1_000 });

        let amounts = h
            .market
            .swap_exact_tokens_for_tokens(
                &mut h.book,
                &mut h.ledger,
                account(2),
                NOW,
                100,
                1,
                &[Asset::Policy(a), Asset::Stablecoin, Asset::Policy(b)],
                account(2),
                NOW,
            )
            .unwrap();

        assert_eq!(amounts[1], 90);
        assert_eq!(h.pool(a).reserve1, 910);
        assert_eq!(h.pool(b).reserve1, 1_090);
        assert_eq!(h.balance(Asset::Policy(b), account(2)), 1_000 + amounts[2]);
        assert_eq!(
            h.market.get_amounts_out(|id| h.book.pool(id), 100, &[Asset::Policy(a), Asset::Stablecoin]),
            Ok(vec![100, amm::swap(100, 1_100, 910, 3).unwrap()])
        );
    }

    #[test]
    fn trading_closes_at_expiry_but_exit_stays_open() {
        let mut h = Harness::new();
        let id = h.seeded_pool();
        assert_eq!(
            h.market.swap_exact_tokens_for_tokens(
                &mut h.book,
                &mut h.ledger,
                account(2),
                EXPIRY,
                100,
                0,
                &[Asset::Policy(id), Asset::Stablecoin],
                account(2),
                EXPIRY,
            ),
            Err(Error::PolicyExpired(id))
        );
        assert_eq!(
            h.market
                .add_liquidity(&mut h.book, &mut h.ledger, account(2), EXPIRY, id, 10, 10, 0, EXPIRY),
            Err(Error::PolicyExpired(id))
        );
        assert!(h
            .market
            .remove_liquidity(&mut h.book, &mut h.ledger, account(2), EXPIRY, id, 1_000, 0, 0, EXPIRY)
            .is_ok());
    }

    #[test]
    fn swap_into_empty_pool_has_no_liquidity() {
        let mut h = Harness::new();
        let id = h.mint(account(2), 1_000).unwrap();
        assert_eq!(
            h.market.swap_exact_tokens_for_tokens(
                &mut h.book,
                &mut h.ledger,
                account(2),
                NOW,
                100,
                0,
                &[Asset::Policy(id), Asset::Stablecoin],
                account(2),
                NOW,
            ),
            Err(Error::InsufficientLiquidity)
        );
    }

    // ── Admin & custody ──────────────────────────────────────────────────────

    #[test]
    fn fee_rate_is_owner_gated_and_bounded() {
        let mut h = Harness::new();
        assert_eq!(h.market.set_fee_rate(&account(2), 5), Err(Error::Unauthorized(Role::Owner)));
        assert_eq!(
            h.market.set_fee_rate(&account(1), 1_000),
            Err(Error::Validation(Invalid::FeeOutOfRange))
        );
        assert_eq!(h.market.set_fee_rate(&account(1), 5), Ok(amm::DEFAULT_FEE_PER_MILLE));
        assert_eq!(h.market.fee_per_mille(), 5);
    }

    #[test]
    fn default_rule_applies_to_new_classes_only() {
        let mut h = Harness::new();
        let below = h.mint(account(2), 10).unwrap();
        h.market.set_default_rule(&account(1), SettlementRule::ABOVE_OR_AT).unwrap();
        let above = h.mint(account(2), 10).unwrap();
        assert_ne!(below, above);
        assert_eq!(h.token(below).terms.rule, SettlementRule::BELOW_OR_AT);
        assert_eq!(h.token(above).terms.rule, SettlementRule::ABOVE_OR_AT);
    }

    #[test]
    fn custody_and_transfers() {
        let mut h = Harness::new();
        h.market.deposit_stablecoin(&mut h.ledger, account(9), 70).unwrap();
        h.market.withdraw_stablecoin(&mut h.ledger, account(9), 20).unwrap();
        assert_eq!(h.balance(Asset::Stablecoin, account(9)), 50);
        assert_eq!(
            h.market.withdraw_stablecoin(&mut h.ledger, account(9), 51),
            Err(Error::InsufficientBalance { requested: 51, available: 50 })
        );

        let id = h.mint(account(2), 10).unwrap();
        h.market
            .transfer(&h.book, &mut h.ledger, account(2), account(9), Asset::Policy(id), 4)
            .unwrap();
        assert_eq!(h.balance(Asset::Policy(id), account(9)), 4);
        assert_eq!(
            h.market
                .transfer(&h.book, &mut h.ledger, account(2), account(9), Asset::Policy(77), 1),
            Err(Error::Validation(Invalid::UnknownPolicy(77)))
        );
    }
}
