#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Policy Market — Lottery
///
/// **Role:** Sells tickets for the open round and draws a winner from
/// randomness delivered by an external coordinator in a second transaction.
///
/// ```text
///   buy_tickets(n) ──n × price──► prize pool          (round Open)
///        │
///   owner / scheduler ──request_draw()──► RandomnessRequested(id)   (Drawing)
///        │                                   │
///        │                          [Coordinator] off-chain VRF
///        │                                   │
///   fulfill_randomness(id, r) ◄──────────────┘
///        ├── winner = walk(tickets, r mod total)
///        ├── prize ──native transfer──► winner
///        │        └─or─ mint(winner, prize) XCC ──► [GovernanceToken]
///        └── round closed, next round opens (empty rounds roll over)
/// ```
///
/// Request ids are `blake2x256(key_hash, round_id, nonce)`.  Each id is
/// consumed at most once; the owner may revoke a stuck request with
/// `reset_pending_draw`.
#[ink::contract]
mod lottery {
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::hash::Blake2x256;
    use ink::env::DefaultEnvironment;
    use ink::storage::Mapping;

    use protocol_core::lottery::{
        DrawResult, LotteryEngine, LotteryRound, ModuloWalk, RequestId, RoundId,
    };
    use protocol_core::{Invalid, Role, U256};

    pub use protocol_core::Error;

    pub type Result<T> = core::result::Result<T, Error>;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct Lottery {
        /// Rounds, tickets, roles and the request table.
        engine: LotteryEngine,

        /// Randomness key the coordinator answers for.
        key_hash: [u8; 32],

        /// When set, prizes are minted in this governance token and ticket
        /// revenue stays here as `revenue`.
        prize_token: Option<AccountId>,

        /// Native ticket revenue owed to the owner.
        revenue: Balance,

        // ── History ───────────────────────────────────────────────────────
        /// Closed rounds by id.
        rounds: Mapping<RoundId, LotteryRound>,

        /// Consumed request ids → the round each one drew.
        fulfilled: Mapping<RequestId, RoundId>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct TicketsPurchased {
        #[ink(topic)]
        round_id: RoundId,
        #[ink(topic)]
        buyer: AccountId,
        count: u32,
        paid: Balance,
    }

    #[ink(event)]
    pub struct RandomnessRequested {
        #[ink(topic)]
        request_id: RequestId,
        key_hash: [u8; 32],
        round_id: RoundId,
    }

    /// `winner: None` marks an empty round whose pool rolled over.
    #[ink(event)]
    pub struct LotteryDrawn {
        #[ink(topic)]
        round_id: RoundId,
        #[ink(topic)]
        winner: Option<AccountId>,
        prize: Balance,
        rollover: Balance,
    }

    #[ink(event)]
    pub struct DrawReset {
        #[ink(topic)]
        request_id: RequestId,
        round_id: RoundId,
    }

    #[ink(event)]
    pub struct TicketPriceChanged {
        price: Balance,
    }

    #[ink(event)]
    pub struct MaxTicketsPerBuyChanged {
        max: u32,
    }

    #[ink(event)]
    pub struct SchedulerChanged {
        scheduler: Option<AccountId>,
    }

    #[ink(event)]
    pub struct CoordinatorChanged {
        #[ink(topic)]
        coordinator: AccountId,
    }

    #[ink(event)]
    pub struct PrizeTokenChanged {
        token: Option<AccountId>,
    }

    #[ink(event)]
    pub struct RevenueWithdrawn {
        #[ink(topic)]
        to: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous_owner: AccountId,
        #[ink(topic)]
        new_owner: AccountId,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl Lottery {
        /// Deploy with the caller as owner and round 1 open.
        ///
        /// # Errors
        /// `Validation` for a zero coordinator or a zero ticket price.
        #[ink(constructor)]
        pub fn new(coordinator: AccountId, key_hash: [u8; 32], ticket_price: Balance) -> Result<Self> {
            let engine = LotteryEngine::new(Self::env().caller(), coordinator, ticket_price)?;
            Ok(Self {
                engine,
                key_hash,
                prize_token: None,
                revenue: 0,
                rounds: Mapping::default(),
                fulfilled: Mapping::default(),
            })
        }

        fn only_owner(&self) -> Result<AccountId> {
            let caller = self.env().caller();
            if caller != self.engine.owner() {
                return Err(Error::Unauthorized(Role::Owner));
            }
            Ok(caller)
        }

        // =====================================================================
        // TICKETS
        // =====================================================================

        /// Buy `count` tickets in the open round. The transferred value must
        /// equal `count × ticket_price`.
        ///
        /// # Errors
        /// - `RoundClosed` while a draw is pending.
        /// - `RoundFull` once the round holds its maximum number of purchases.
        /// - `Validation(TooManyTickets | IncorrectPayment | ZeroAmount)`.
        #[ink(message, payable)]
        pub fn buy_tickets(&mut self, count: u32) -> Result<()> {
            let buyer = self.env().caller();
            let paid = self.env().transferred_value();
            self.engine.buy_tickets(buyer, count, paid)?;

            self.env().emit_event(TicketsPurchased {
                round_id: self.engine.current_round().id,
                buyer,
                count,
                paid,
            });
            Ok(())
        }

        // =====================================================================
        // DRAW
        // =====================================================================

        /// Close ticket sales and ask the coordinator for randomness.
        /// Owner or scheduler only.
        ///
        /// # Errors
        /// `Unauthorized(Scheduler)`, `RequestPending`, `RoundClosed`.
        #[ink(message)]
        pub fn request_draw(&mut self) -> Result<RequestId> {
            let caller = self.env().caller();
            let round_id = self.engine.current_round().id;
            let nonce = self.engine.request_nonce();
            let request_id = self
                .env()
                .hash_encoded::<Blake2x256, _>(&(self.key_hash, round_id, nonce));

            self.engine.request_draw(&self.fulfilled, &caller, request_id)?;

            self.env().emit_event(RandomnessRequested {
                request_id,
                key_hash: self.key_hash,
                round_id,
            });
            Ok(request_id)
        }

        /// Coordinator callback. Picks the winner, pays the prize once and
        /// opens the next round.
        ///
        /// # Errors
        /// - `Unauthorized(Coordinator)` for any other caller.
        /// - `AlreadyFulfilled` / `UnknownRequest` for a consumed or revoked id.
        /// - `TransferFailed` / `CallFailed` if the prize cannot be paid; the
        ///   whole call reverts.
        #[ink(message)]
        pub fn fulfill_randomness(&mut self, request_id: RequestId, randomness: U256) -> Result<()> {
            let caller = self.env().caller();
            let DrawResult { round, winner, prize, rollover } = self.engine.fulfill_randomness(
                &mut self.fulfilled,
                &caller,
                request_id,
                randomness,
                &ModuloWalk,
            )?;

            let round_id = round.id;
            self.rounds.insert(round_id, &round);
            if let Some(winner) = winner {
                self.pay_prize(winner, prize)?;
            }

            self.env().emit_event(LotteryDrawn { round_id, winner, prize, rollover });
            Ok(())
        }

        fn pay_prize(&mut self, winner: AccountId, prize: Balance) -> Result<()> {
            if prize == 0 {
                return Ok(());
            }
            match self.prize_token {
                Some(token) => {
                    self.revenue = self.revenue.checked_add(prize).ok_or(Error::Overflow)?;
                    mint_prize(token, winner, prize)
                }
                None => self
                    .env()
                    .transfer(winner, prize)
                    .map_err(|_| Error::TransferFailed),
            }
        }

        /// Revoke the outstanding request and reopen ticket sales.
        /// Owner only.
        ///
        /// # Errors
        /// `Validation(NoPendingRequest)` when nothing is pending.
        #[ink(message)]
        pub fn reset_pending_draw(&mut self) -> Result<RequestId> {
            let caller = self.env().caller();
            let request_id = self.engine.reset_pending_draw(&caller)?;
            self.env().emit_event(DrawReset {
                request_id,
                round_id: self.engine.current_round().id,
            });
            Ok(request_id)
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        #[ink(message)]
        pub fn set_ticket_price(&mut self, price: Balance) -> Result<()> {
            let caller = self.env().caller();
            self.engine.set_ticket_price(&caller, price)?;
            self.env().emit_event(TicketPriceChanged { price });
            Ok(())
        }

        #[ink(message)]
        pub fn set_max_tickets_per_buy(&mut self, max: u32) -> Result<()> {
            let caller = self.env().caller();
            self.engine.set_max_tickets_per_buy(&caller, max)?;
            self.env().emit_event(MaxTicketsPerBuyChanged { max });
            Ok(())
        }

        /// `None` leaves draw requests to the owner alone.
        #[ink(message)]
        pub fn set_scheduler(&mut self, scheduler: Option<AccountId>) -> Result<()> {
            let caller = self.env().caller();
            self.engine.set_scheduler(&caller, scheduler)?;
            self.env().emit_event(SchedulerChanged { scheduler });
            Ok(())
        }

        #[ink(message)]
        pub fn set_coordinator(&mut self, coordinator: AccountId) -> Result<()> {
            let caller = self.env().caller();
            self.engine.set_coordinator(&caller, coordinator)?;
            self.env().emit_event(CoordinatorChanged { coordinator });
            Ok(())
        }

        /// Pay future prizes by minting `token` (this contract must be one of
        /// its minters), or natively with `None`.
        #[ink(message)]
        pub fn set_prize_token(&mut self, token: Option<AccountId>) -> Result<()> {
            self.only_owner()?;
            if let Some(account) = &token {
                protocol_core::ensure_not_zero(account)?;
            }
            self.prize_token = token;
            self.env().emit_event(PrizeTokenChanged { token });
            Ok(())
        }

        /// Send the accumulated ticket revenue to `to`.
        #[ink(message)]
        pub fn withdraw_revenue(&mut self, to: AccountId) -> Result<Balance> {
            self.only_owner()?;
            protocol_core::ensure_not_zero(&to)?;
            let amount = self.revenue;
            if amount == 0 {
                return Err(Error::Validation(Invalid::ZeroAmount));
            }

            self.revenue = 0;
            self.env()
                .transfer(to, amount)
                .map_err(|_| Error::TransferFailed)?;

            self.env().emit_event(RevenueWithdrawn { to, amount });
            Ok(amount)
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<()> {
            let caller = self.env().caller();
            let previous_owner = self.engine.transfer_ownership(&caller, new_owner)?;
            self.env().emit_event(OwnershipTransferred { previous_owner, new_owner });
            Ok(())
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn current_round(&self) -> LotteryRound {
            self.engine.current_round().clone()
        }

        /// The open round or a closed one from history.
        #[ink(message)]
        pub fn round(&self, round_id: RoundId) -> Option<LotteryRound> {
            let current = self.engine.current_round();
            if current.id == round_id {
                return Some(current.clone());
            }
            self.rounds.get(round_id)
        }

        #[ink(message)]
        pub fn tickets_of(&self, round_id: RoundId, owner: AccountId) -> u64 {
            self.round(round_id)
                .map(|round| round.tickets_of(&owner))
                .unwrap_or(0)
        }

        #[ink(message)]
        pub fn pending_request(&self) -> Option<RequestId> {
            self.engine.pending_request()
        }

        #[ink(message)]
        pub fn is_fulfilled(&self, request_id: RequestId) -> bool {
            self.fulfilled.contains(request_id)
        }

        /// Round drawn by a consumed request id.
        #[ink(message)]
        pub fn fulfilled_round(&self, request_id: RequestId) -> Option<RoundId> {
            self.fulfilled.get(request_id)
        }

        #[ink(message)]
        pub fn ticket_price(&self) -> Balance {
            self.engine.ticket_price()
        }

        #[ink(message)]
        pub fn max_tickets_per_buy(&self) -> u32 {
            self.engine.max_tickets_per_buy()
        }

        #[ink(message)]
        pub fn scheduler(&self) -> Option<AccountId> {
            self.engine.scheduler()
        }

        #[ink(message)]
        pub fn coordinator(&self) -> AccountId {
            self.engine.coordinator()
        }

        #[ink(message)]
        pub fn key_hash(&self) -> [u8; 32] {
            self.key_hash
        }

        #[ink(message)]
        pub fn prize_token(&self) -> Option<AccountId> {
            self.prize_token
        }

        #[ink(message)]
        pub fn revenue(&self) -> Balance {
            self.revenue
        }

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.engine.owner()
        }
    }

    // =========================================================================
    // GOVERNANCE TOKEN INTERFACE (Cross-Contract)
    // =========================================================================

    /// `mint(to, amount) -> Result<bool, Error>` on the governance token.
    fn mint_prize(token: AccountId, winner: AccountId, prize: Balance) -> Result<()> {
        let result = build_call::<DefaultEnvironment>()
            .call(token)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("mint")))
                    .push_arg(winner)
                    .push_arg(prize),
            )
            .returns::<Result<bool>>()
            .try_invoke();

        match result {
            Ok(Ok(Ok(_))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e),
            _ => Err(Error::CallFailed),
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================
    //
    // Prize minting goes through a cross-contract call the off-chain
    // environment cannot execute; these tests pay prizes natively.

}
