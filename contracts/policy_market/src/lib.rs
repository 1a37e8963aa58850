#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Policy Market — Policy Tokens, Pools & Router
///
/// **Role:** Issues policy tokens against a price oracle, runs one
/// constant-product pool per policy token (policy token / stablecoin), and
/// settles and redeems policies once they expire.  The stablecoin is the
/// chain's native value held in custody by this contract.
///
/// ```text
///   deposit() ──native value──► stablecoin balance
///        │
///        ├── mint_policy ──premium──► premium reserve, buyer += policy tokens
///        ├── add_liquidity / remove_liquidity ──► pool shares
///        └── swap_* ──path through the stablecoin hub──► pools
///
///   expiry ──► settle(id) ──get_latest_price XCC──► [PriceOracle]
///                 └── Won | Lost (once) ──► redeem(id, amount)
/// ```
///
/// Each policy class is one `records` entry (token state plus pool), so
/// storage grows per key rather than inside the root struct.
///
/// All financial logic lives in `protocol_core::market`; this contract binds
/// it to storage, the clock, the oracle and native transfers.
#[ink::contract]
mod policy_market {
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::prelude::string::String;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;

    use protocol_core::amm::Pool;
    use protocol_core::market::{
        Book, Holding, Market, Outcome, PolicyId, PolicyRecord, PolicyTerms, PolicyToken,
        SettlementRule,
    };
    use protocol_core::oracle::{PriceReading, PriceSource};
    use protocol_core::router::Asset;

    pub use protocol_core::Error;

    pub type Result<T> = core::result::Result<T, Error>;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct PolicyMarket {
        /// Fee rate, default rule, owner and the next policy id.
        market: Market,

        /// Price oracle adapter contract consulted on mint and settle.
        oracle: AccountId,

        // ── Ledger ────────────────────────────────────────────────────────
        /// (asset, holder) → balance for stablecoin, policy tokens and shares.
        balances: Mapping<Holding, Balance>,

        // ── Policy book ───────────────────────────────────────────────────
        /// Policy id → token state and pool.
        records: Mapping<PolicyId, PolicyRecord>,
        /// Class terms → policy id.
        classes: Mapping<PolicyTerms, PolicyId>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct Deposited {
        #[ink(topic)]
        account: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct Withdrawn {
        #[ink(topic)]
        account: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct Transferred {
        #[ink(topic)]
        from: AccountId,
        #[ink(topic)]
        to: AccountId,
        asset: Asset,
        amount: Balance,
    }

    #[ink(event)]
    pub struct PolicyMinted {
        #[ink(topic)]
        policy_id: PolicyId,
        #[ink(topic)]
        buyer: AccountId,
        premium: Balance,
    }

    /// Emitted once per policy, when its outcome is fixed.
    #[ink(event)]
    pub struct PolicySettled {
        #[ink(topic)]
        policy_id: PolicyId,
        outcome: Outcome,
        price: Balance,
        price_updated_at: Timestamp,
    }

    #[ink(event)]
    pub struct PolicyRedeemed {
        #[ink(topic)]
        policy_id: PolicyId,
        #[ink(topic)]
        holder: AccountId,
        amount: Balance,
        payout: Balance,
    }

    #[ink(event)]
    pub struct LiquidityAdded {
        #[ink(topic)]
        policy_id: PolicyId,
        #[ink(topic)]
        provider: AccountId,
        amount0: Balance,
        amount1: Balance,
        shares: Balance,
    }

    #[ink(event)]
    pub struct LiquidityRemoved {
        #[ink(topic)]
        policy_id: PolicyId,
        #[ink(topic)]
        provider: AccountId,
        amount0: Balance,
        amount1: Balance,
        shares: Balance,
    }

    #[ink(event)]
    pub struct Swap {
        #[ink(topic)]
        sender: AccountId,
        #[ink(topic)]
        to: AccountId,
        path: Vec<Asset>,
        amount_in: Balance,
        amount_out: Balance,
    }

    #[ink(event)]
    pub struct FeeRateChanged {
        previous: u128,
        updated: u128,
    }

    #[ink(event)]
    pub struct DefaultRuleChanged {
        rule: SettlementRule,
    }

    #[ink(event)]
    pub struct OracleChanged {
        #[ink(topic)]
        oracle: AccountId,
    }

    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous_owner: AccountId,
        #[ink(topic)]
        new_owner: AccountId,
    }

    // =========================================================================
    // ORACLE INTERFACE (Cross-Contract)
    // =========================================================================

    /// Reads the price oracle adapter. Callee errors are passed through
    /// unchanged; transport failures become `CallFailed`.
    struct RemoteOracle {
        oracle: AccountId,
    }

    impl PriceSource for RemoteOracle {
        fn feed_address(&self, symbol: &str) -> Result<AccountId> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.oracle)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!(
                        "get_price_feed_address"
                    )))
                    .push_arg(String::from(symbol)),
                )
                .returns::<Result<AccountId>>()
                .try_invoke();

            match result {
                Ok(Ok(reply)) => reply,
                _ => Err(Error::CallFailed),
            }
        }

        fn latest_price(&self, symbol: &str) -> Result<PriceReading> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.oracle)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("get_latest_price")))
                        .push_arg(String::from(symbol)),
                )
                .returns::<Result<PriceReading>>()
                .try_invoke();

            match result {
                Ok(Ok(reply)) => reply,
                _ => Err(Error::CallFailed),
            }
        }
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl PolicyMarket {
        /// Deploy with the caller as owner, a 3‰ swap fee and the
        /// "price at or below strike wins" settlement rule.
        #[ink(constructor)]
        pub fn new(oracle: AccountId) -> Self {
            Self {
                market: Market::new(Self::env().caller()),
                oracle,
                balances: Mapping::default(),
                records: Mapping::default(),
                classes: Mapping::default(),
            }
        }

        fn remote_oracle(&self) -> RemoteOracle {
            RemoteOracle { oracle: self.oracle }
        }

        fn record(&self, policy_id: PolicyId) -> Result<PolicyRecord> {
            self.records
                .get(policy_id)
                .ok_or(Error::Validation(protocol_core::Invalid::UnknownPolicy(policy_id)))
        }

        // =====================================================================
        // STABLECOIN CUSTODY
        // =====================================================================

        /// Credit the transferred native value as stablecoin.
        #[ink(message, payable)]
        pub fn deposit(&mut self) -> Result<()> {
            let caller = self.env().caller();
            let amount = self.env().transferred_value();
            self.market.deposit_stablecoin(&mut self.balances, caller, amount)?;
            self.env().emit_event(Deposited { account: caller, amount });
            Ok(())
        }

        /// Debit stablecoin and send it back as native value.
        #[ink(message)]
        pub fn withdraw(&mut self, amount: Balance) -> Result<()> {
            let caller = self.env().caller();

            // Effects before interaction.
            self.market.withdraw_stablecoin(&mut self.balances, caller, amount)?;
            self.env()
                .transfer(caller, amount)
                .map_err(|_| Error::TransferFailed)?;

            self.env().emit_event(Withdrawn { account: caller, amount });
            Ok(())
        }

        /// Move stablecoin, policy tokens or pool shares to another holder.
        #[ink(message)]
        pub fn transfer(&mut self, to: AccountId, asset: Asset, amount: Balance) -> Result<()> {
            let from = self.env().caller();
            let book = Book { records: &mut self.records, classes: &mut self.classes };
            self.market.transfer(&book, &mut self.balances, from, to, asset, amount)?;
            self.env().emit_event(Transferred { from, to, asset, amount });
            Ok(())
        }

        // =====================================================================
        // POLICY LIFECYCLE
        // =====================================================================

        /// Pay `premium` stablecoin for `premium` policy tokens of the class
        /// `(symbol, strike, expiry)` under the default settlement rule.
        ///
        /// # Errors
        /// - `NotConfigured` if the oracle has no feed for `symbol`.
        /// - `Validation(ExpiryNotInFuture)` unless `expiry > now`.
        /// - `InsufficientBalance` if the caller cannot pay the premium.
        #[ink(message)]
        pub fn mint_policy(
            &mut self,
            symbol: String,
            strike: Balance,
            expiry: Timestamp,
            premium: Balance,
        ) -> Result<PolicyId> {
            let rule = self.market.default_rule();
            self.mint_policy_with_rule(symbol, strike, expiry, rule, premium)
        }

        /// As `mint_policy`, for an explicit settlement rule.
        #[ink(message)]
        pub fn mint_policy_with_rule(
            &mut self,
            symbol: String,
            strike: Balance,
            expiry: Timestamp,
            rule: SettlementRule,
            premium: Balance,
        ) -> Result<PolicyId> {
            let buyer = self.env().caller();
            let now = self.env().block_timestamp();
            let oracle = self.remote_oracle();

            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let policy_id = self.market.mint_policy_with_rule(
                &mut book,
                &mut self.balances,
                &oracle,
                buyer,
                now,
                &symbol,
                strike,
                expiry,
                rule,
                premium,
            )?;

            self.env().emit_event(PolicyMinted { policy_id, buyer, premium });
            Ok(policy_id)
        }

        /// Fix a policy's outcome from the oracle. Anyone may call, once, at
        /// or after expiry.  A Lost policy's premiums go to its pool's
        /// providers, or to the owner when the pool has no shares.
        ///
        /// # Errors
        /// `AlreadySettled`, `Validation(NotExpired)`, or the oracle's
        /// `NotConfigured` / `StaleOrMissingPrice`.
        #[ink(message)]
        pub fn settle(&mut self, policy_id: PolicyId) -> Result<Outcome> {
            let now = self.env().block_timestamp();
            let oracle = self.remote_oracle();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let settlement =
                self.market.settle(&mut book, &mut self.balances, &oracle, policy_id, now)?;

            self.env().emit_event(PolicySettled {
                policy_id,
                outcome: settlement.outcome,
                price: settlement.price,
                price_updated_at: settlement.price_updated_at,
            });
            Ok(settlement.outcome)
        }

        /// Burn settled policy tokens for their share of the premium reserve
        /// (Won) or nothing (Lost).
        #[ink(message)]
        pub fn redeem(&mut self, policy_id: PolicyId, amount: Balance) -> Result<Balance> {
            let holder = self.env().caller();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let payout =
                self.market.redeem(&mut book, &mut self.balances, holder, policy_id, amount)?;

            self.env().emit_event(PolicyRedeemed { policy_id, holder, amount, payout });
            Ok(payout)
        }

        // =====================================================================
        // LIQUIDITY
        // =====================================================================

        /// Returns `(amount0, amount1, shares)` actually deposited and minted.
        #[ink(message)]
        pub fn add_liquidity(
            &mut self,
            policy_id: PolicyId,
            amount0_desired: Balance,
            amount1_desired: Balance,
            min_shares: Balance,
            deadline: Timestamp,
        ) -> Result<(Balance, Balance, Balance)> {
            let provider = self.env().caller();
            let now = self.env().block_timestamp();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let deposit = self.market.add_liquidity(
                &mut book,
                &mut self.balances,
                provider,
                now,
                policy_id,
                amount0_desired,
                amount1_desired,
                min_shares,
                deadline,
            )?;

            self.env().emit_event(LiquidityAdded {
                policy_id,
                provider,
                amount0: deposit.amount0,
                amount1: deposit.amount1,
                shares: deposit.shares,
            });
            Ok((deposit.amount0, deposit.amount1, deposit.shares))
        }

        #[ink(message)]
        pub fn remove_liquidity(
            &mut self,
            policy_id: PolicyId,
            shares: Balance,
            min_amount0: Balance,
            min_amount1: Balance,
            deadline: Timestamp,
        ) -> Result<(Balance, Balance)> {
            let provider = self.env().caller();
            let now = self.env().block_timestamp();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let (amount0, amount1) = self.market.remove_liquidity(
                &mut book,
                &mut self.balances,
                provider,
                now,
                policy_id,
                shares,
                min_amount0,
                min_amount1,
                deadline,
            )?;

            self.env().emit_event(LiquidityRemoved {
                policy_id,
                provider,
                amount0,
                amount1,
                shares,
            });
            Ok((amount0, amount1))
        }

        // =====================================================================
        // SWAPS
        // =====================================================================

        #[ink(message)]
        pub fn swap_exact_tokens_for_tokens(
            &mut self,
            amount_in: Balance,
            amount_out_min: Balance,
            path: Vec<Asset>,
            to: AccountId,
            deadline: Timestamp,
        ) -> Result<Vec<Balance>> {
            let sender = self.env().caller();
            let now = self.env().block_timestamp();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let amounts = self.market.swap_exact_tokens_for_tokens(
                &mut book,
                &mut self.balances,
                sender,
                now,
                amount_in,
                amount_out_min,
                &path,
                to,
                deadline,
            )?;
            self.emit_swap(sender, to, path, &amounts);
            Ok(amounts)
        }

        #[ink(message)]
        pub fn swap_tokens_for_exact_tokens(
            &mut self,
            amount_out: Balance,
            amount_in_max: Balance,
            path: Vec<Asset>,
            to: AccountId,
            deadline: Timestamp,
        ) -> Result<Vec<Balance>> {
            let sender = self.env().caller();
            let now = self.env().block_timestamp();
            let mut book = Book { records: &mut self.records, classes: &mut self.classes };
            let amounts = self.market.swap_tokens_for_exact_tokens(
                &mut book,
                &mut self.balances,
                sender,
                now,
                amount_out,
                amount_in_max,
                &path,
                to,
                deadline,
            )?;
            self.emit_swap(sender, to, path, &amounts);
            Ok(amounts)
        }

        fn emit_swap(&self, sender: AccountId, to: AccountId, path: Vec<Asset>, amounts: &[Balance]) {
            let amount_in = amounts.first().copied().unwrap_or_default();
            let amount_out = amounts.last().copied().unwrap_or_default();
            self.env().emit_event(Swap { sender, to, path, amount_in, amount_out });
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        #[ink(message)]
        pub fn set_fee_rate(&mut self, fee_per_mille: u128) -> Result<()> {
            let caller = self.env().caller();
            let previous = self.market.set_fee_rate(&caller, fee_per_mille)?;
            self.env().emit_event(FeeRateChanged { previous, updated: fee_per_mille });
            Ok(())
        }

        #[ink(message)]
        pub fn set_default_rule(&mut self, rule: SettlementRule) -> Result<()> {
            let caller = self.env().caller();
            self.market.set_default_rule(&caller, rule)?;
            self.env().emit_event(DefaultRuleChanged { rule });
            Ok(())
        }

        #[ink(message)]
        pub fn set_oracle(&mut self, oracle: AccountId) -> Result<()> {
            let caller = self.env().caller();
            if caller != self.market.owner() {
                return Err(Error::Unauthorized(protocol_core::Role::Owner));
            }
            protocol_core::ensure_not_zero(&oracle)?;
            self.oracle = oracle;
            self.env().emit_event(OracleChanged { oracle });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<()> {
            let caller = self.env().caller();
            let previous_owner = self.market.transfer_ownership(&caller, new_owner)?;
            self.env().emit_event(OwnershipTransferred { previous_owner, new_owner });
            Ok(())
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn balance_of(&self, asset: Asset, owner: AccountId) -> Balance {
            self.balances.get((asset, owner)).unwrap_or(0)
        }

        #[ink(message)]
        pub fn get_policy(&self, policy_id: PolicyId) -> Result<PolicyToken> {
            self.record(policy_id).map(|record| record.token)
        }

        /// `(reserve0, reserve1, total_shares)`: policy token, stablecoin, shares.
        #[ink(message)]
        pub fn get_reserves(&self, policy_id: PolicyId) -> Result<(Balance, Balance, Balance)> {
            let Pool { reserve0, reserve1, total_shares } = self.record(policy_id)?.pool;
            Ok((reserve0, reserve1, total_shares))
        }

        #[ink(message)]
        pub fn get_amounts_out(&self, amount_in: Balance, path: Vec<Asset>) -> Result<Vec<Balance>> {
            self.market
                .get_amounts_out(|id| self.record(id).map(|record| record.pool), amount_in, &path)
        }

        #[ink(message)]
        pub fn get_amounts_in(&self, amount_out: Balance, path: Vec<Asset>) -> Result<Vec<Balance>> {
            self.market
                .get_amounts_in(|id| self.record(id).map(|record| record.pool), amount_out, &path)
        }

        #[ink(message)]
        pub fn policy_count(&self) -> u32 {
            self.market.policy_count()
        }

        #[ink(message)]
        pub fn fee_per_mille(&self) -> u128 {
            self.market.fee_per_mille()
        }

        #[ink(message)]
        pub fn default_rule(&self) -> SettlementRule {
            self.market.default_rule()
        }

        #[ink(message)]
        pub fn oracle(&self) -> AccountId {
            self.oracle
        }

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.market.owner()
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================
    //
    // Minting and settlement reach the oracle through a cross-contract call,
    // which the off-chain environment cannot execute; the full lifecycle is
    // exercised against an in-memory price source in
    // `protocol_core::market`.

}
