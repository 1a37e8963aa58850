//! Symbol → price-feed registry and validated price reads.
//!
//! ```text
//!   set_price_feed("ETH", feed, 8) ──► feeds["ETH"] = { feed, decimals: 8 }
//!   latest_price("ETH")            ──► FeedReader::latest_round_data(feed)
//!                                       ├── None / answer ≤ 0 / stale ──► StaleOrMissingPrice
//!                                       └── answer × 10^(18 − 8)      ──► PriceReading
//! ```
//!
//! Prices handed to the rest of the protocol always carry
//! [`PRICE_DECIMALS`] decimals, whatever the feed reports in.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::{ensure_not_zero, AccountId, Balance, Error, Invalid, Result, Role, Timestamp};

pub type Symbol = String;

/// Decimals assumed for a feed registered without an explicit value.
pub const DEFAULT_FEED_DECIMALS: u8 = 8;

/// Upper bound accepted for a feed's decimals.
pub const MAX_FEED_DECIMALS: u8 = 36;

/// Decimals of every normalised price.
pub const PRICE_DECIMALS: u8 = 18;

/// `10^PRICE_DECIMALS`.
pub const PRICE_SCALE: Balance = 1_000_000_000_000_000_000;

pub const MAX_SYMBOL_LEN: usize = 32;

/// Latest answer of an external feed, in the feed's own decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct RoundData {
    pub answer: i128,
    pub updated_at: Timestamp,
}

/// A validated price scaled to [`PRICE_DECIMALS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct PriceReading {
    pub price: Balance,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct PriceFeedEntry {
    pub feed: AccountId,
    pub decimals: u8,
}

/// Reads the raw latest round from a feed contract.
pub trait FeedReader {
    /// `None` when the feed has no data or cannot be reached.
    fn latest_round_data(&self, feed: &AccountId) -> Option<RoundData>;
}

/// What price consumers (the policy market) need from the oracle.
pub trait PriceSource {
    /// # Errors
    /// `NotConfigured` when no feed is registered for `symbol`.
    fn feed_address(&self, symbol: &str) -> Result<AccountId>;

    /// # Errors
    /// `NotConfigured` or `StaleOrMissingPrice`.
    fn latest_price(&self, symbol: &str) -> Result<PriceReading>;
}

pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(Invalid::EmptySymbol.into());
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(Invalid::SymbolTooLong.into());
    }
    Ok(())
}

/// Scale a positive raw answer from `decimals` to [`PRICE_DECIMALS`].
pub fn normalize_price(answer: i128, decimals: u8) -> Option<Balance> {
    if answer <= 0 {
        return None;
    }
    let raw = answer as u128;
    if decimals <= PRICE_DECIMALS {
        let factor = 10u128.checked_pow(u32::from(PRICE_DECIMALS - decimals))?;
        raw.checked_mul(factor)
    } else {
        let factor = 10u128.checked_pow(u32::from(decimals - PRICE_DECIMALS))?;
        match raw / factor {
            0 => None,
            price => Some(price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct OracleAdapter {
    owner: AccountId,
    feeds: BTreeMap<Symbol, PriceFeedEntry>,
    /// Oldest acceptable answer, in milliseconds. `None` disables the check.
    max_price_age: Option<Timestamp>,
}

impl OracleAdapter {
    pub fn new(owner: AccountId) -> Self {
        Self { owner, feeds: BTreeMap::new(), max_price_age: None }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn max_price_age(&self) -> Option<Timestamp> {
        self.max_price_age
    }

    fn only_owner(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner {
            return Err(Error::Unauthorized(Role::Owner));
        }
        Ok(())
    }

    /// Register or overwrite the feed for `symbol` with the default decimals.
    pub fn set_price_feed(
        &mut self,
        caller: &AccountId,
        symbol: &str,
        feed: AccountId,
    ) -> Result<PriceFeedEntry> {
        self.set_price_feed_with_decimals(caller, symbol, feed, DEFAULT_FEED_DECIMALS)
    }

    pub fn set_price_feed_with_decimals(
        &mut self,
        caller: &AccountId,
        symbol: &str,
        feed: AccountId,
        decimals: u8,
    ) -> Result<PriceFeedEntry> {
        self.only_owner(caller)?;
        validate_symbol(symbol)?;
        ensure_not_zero(&feed)?;
        if decimals > MAX_FEED_DECIMALS {
            return Err(Invalid::DecimalsOutOfRange.into());
        }
        let entry = PriceFeedEntry { feed, decimals };
        self.feeds.insert(String::from(symbol), entry);
        Ok(entry)
    }

    pub fn set_max_price_age(&mut self, caller: &AccountId, max_age: Option<Timestamp>) -> Result<()> {
        self.only_owner(caller)?;
        if max_age == Some(0) {
            return Err(Invalid::ZeroAmount.into());
        }
        self.max_price_age = max_age;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: AccountId) -> Result<AccountId> {
        self.only_owner(caller)?;
        ensure_not_zero(&new_owner)?;
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }

    pub fn feed_info(&self, symbol: &str) -> Result<PriceFeedEntry> {
        self.feeds
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::NotConfigured { symbol: String::from(symbol) })
    }

    /// Never returns a default address for an unknown symbol.
    pub fn price_feed_address(&self, symbol: &str) -> Result<AccountId> {
        self.feed_info(symbol).map(|entry| entry.feed)
    }

    /// Read, validate and normalise the latest answer for `symbol`.
    ///
    /// # Errors
    /// - `NotConfigured` if no feed is registered.
    /// - `StaleOrMissingPrice` if the feed returned nothing, a non-positive
    ///   answer, a zero or future timestamp, or an answer older than
    ///   `max_price_age`.
    pub fn latest_price<R: FeedReader>(
        &self,
        reader: &R,
        symbol: &str,
        now: Timestamp,
    ) -> Result<PriceReading> {
        let entry = self.feed_info(symbol)?;
        let stale = || Error::StaleOrMissingPrice { symbol: String::from(symbol) };

        let round = reader.latest_round_data(&entry.feed).ok_or_else(stale)?;
        if round.updated_at == 0 || round.updated_at > now {
            return Err(stale());
        }
        if let Some(max_age) = self.max_price_age {
            if now - round.updated_at > max_age {
                return Err(stale());
            }
        }
        let price = normalize_price(round.answer, entry.decimals).ok_or_else(stale)?;
        Ok(PriceReading { price, updated_at: round.updated_at })
    }
}

/// An [`OracleAdapter`] bound to a feed reader and a clock.
pub struct OracleView<'a, R> {
    pub adapter: &'a OracleAdapter,
    pub reader: &'a R,
    pub now: Timestamp,
}

impl<R: FeedReader> PriceSource for OracleView<'_, R> {
    fn feed_address(&self, symbol: &str) -> Result<AccountId> {
        self.adapter.price_feed_address(symbol)
    }

    fn latest_price(&self, symbol: &str) -> Result<PriceReading> {
        self.adapter.latest_price(self.reader, symbol, self.now)
    }
}

/// In-memory feed answers, keyed by feed address.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct StaticFeeds(pub BTreeMap<AccountId, RoundData>);

#[cfg(test)]
impl FeedReader for StaticFeeds {
    fn latest_round_data(&self, feed: &AccountId) -> Option<RoundData> {
        self.0.get(feed).copied()
    }
}
