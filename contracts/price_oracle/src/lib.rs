#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Policy Market — Price Oracle Adapter
///
/// **Role:** Registry mapping a price symbol ("ETH", "BTC", …) to the
/// external feed contract that publishes it, and the single place the rest of
/// the protocol reads prices from.
///
/// ```text
///   [PolicyMarket] ──get_latest_price("ETH")──► [PriceOracle]
///                                                   │ feeds["ETH"] = { feed, decimals }
///                                                   ▼
///                                   latest_round_data() XCC ──► [Feed]
/// ```
///
/// Every price leaving this contract is validated (present, positive, not
/// from the future, optionally not older than `max_price_age`) and scaled to
/// 18 decimals.  An unregistered symbol is always `NotConfigured`, never a
/// default address.
#[ink::contract]
mod price_oracle {
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::prelude::string::String;

    use protocol_core::oracle::{FeedReader, OracleAdapter, PriceFeedEntry, PriceReading, RoundData};

    pub use protocol_core::Error;

    pub type Result<T> = core::result::Result<T, Error>;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct PriceOracle {
        /// Owner, symbol → feed table and the staleness bound.
        adapter: OracleAdapter,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Emitted whenever a symbol is registered or re-pointed.
    #[ink(event)]
    pub struct PriceFeedChanged {
        #[ink(topic)]
        symbol: String,
        #[ink(topic)]
        feed: AccountId,
        decimals: u8,
    }

    #[ink(event)]
    pub struct MaxPriceAgeChanged {
        previous: Option<Timestamp>,
        updated: Option<Timestamp>,
    }

    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous_owner: AccountId,
        #[ink(topic)]
        new_owner: AccountId,
    }

    // =========================================================================
    // FEED INTERFACE (Cross-Contract)
    // =========================================================================

    /// Reads feeds through `latest_round_data() -> Option<RoundData>`.
    /// A failed or undecodable call reads as "no data".
    struct RemoteFeeds;

    impl FeedReader for RemoteFeeds {
        fn latest_round_data(&self, feed: &AccountId) -> Option<RoundData> {
            let result = build_call::<DefaultEnvironment>()
                .call(*feed)
                .exec_input(ExecutionInput::new(Selector::new(ink::selector_bytes!(
                    "latest_round_data"
                ))))
                .returns::<Option<RoundData>>()
                .try_invoke();

            match result {
                Ok(Ok(round)) => round,
                _ => None,
            }
        }
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl PriceOracle {
        #[ink(constructor)]
        pub fn new() -> Self {
            Self { adapter: OracleAdapter::new(Self::env().caller()) }
        }

        // =====================================================================
        // FEED REGISTRY
        // =====================================================================

        /// Point `symbol` at `feed`, assuming 8 feed decimals. Owner only;
        /// overwriting an existing entry is allowed.
        #[ink(message)]
        pub fn set_price_feed(&mut self, symbol: String, feed: AccountId) -> Result<()> {
            let caller = self.env().caller();
            let entry = self.adapter.set_price_feed(&caller, &symbol, feed)?;
            self.emit_feed_changed(symbol, entry);
            Ok(())
        }

        #[ink(message)]
        pub fn set_price_feed_with_decimals(
            &mut self,
            symbol: String,
            feed: AccountId,
            decimals: u8,
        ) -> Result<()> {
            let caller = self.env().caller();
            let entry = self
                .adapter
                .set_price_feed_with_decimals(&caller, &symbol, feed, decimals)?;
            self.emit_feed_changed(symbol, entry);
            Ok(())
        }

        fn emit_feed_changed(&self, symbol: String, entry: PriceFeedEntry) {
            self.env().emit_event(PriceFeedChanged {
                symbol,
                feed: entry.feed,
                decimals: entry.decimals,
            });
        }

        /// # Errors
        /// `NotConfigured` when no feed is registered for `symbol`.
        #[ink(message)]
        pub fn get_price_feed_address(&self, symbol: String) -> Result<AccountId> {
            self.adapter.price_feed_address(&symbol)
        }

        #[ink(message)]
        pub fn get_price_feed_info(&self, symbol: String) -> Result<PriceFeedEntry> {
            self.adapter.feed_info(&symbol)
        }

        /// Latest validated price for `symbol`, with 18 decimals, and the
        /// time the feed published it.
        ///
        /// # Errors
        /// `NotConfigured` or `StaleOrMissingPrice`.
        #[ink(message)]
        pub fn get_latest_price(&self, symbol: String) -> Result<PriceReading> {
            let now = self.env().block_timestamp();
            self.adapter.latest_price(&RemoteFeeds, &symbol, now)
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        /// Reject answers older than `max_age` milliseconds. `None` disables
        /// the check.
        #[ink(message)]
        pub fn set_max_price_age(&mut self, max_age: Option<Timestamp>) -> Result<()> {
            let caller = self.env().caller();
            let previous = self.adapter.max_price_age();
            self.adapter.set_max_price_age(&caller, max_age)?;
            self.env().emit_event(MaxPriceAgeChanged { previous, updated: max_age });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<()> {
            let caller = self.env().caller();
            let previous_owner = self.adapter.transfer_ownership(&caller, new_owner)?;
            self.env().emit_event(OwnershipTransferred { previous_owner, new_owner });
            Ok(())
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.adapter.owner()
        }

        #[ink(message)]
        pub fn max_price_age(&self) -> Option<Timestamp> {
            self.adapter.max_price_age()
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================
    //
    // Reads that reach a feed need a live cross-contract call; the
    // validation and scaling behind them is covered in `protocol_core::oracle`.

}
