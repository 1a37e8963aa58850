//! Ticket rounds drawn from externally supplied randomness.
//!
//! ```text
//!   Open ──request_draw(id)──► Drawing ──fulfill_randomness(id, r)──► Closed
//!     ▲          │                                                     │
//!     │          └──reset_pending_draw (owner) ──► Open                 │
//!     └────────────────────── next round opens ◄────────────────────────┘
//! ```
//!
//! The request/fulfil pair is the only asynchronous boundary.  A request id
//! is consumed at most once: after fulfillment it answers `AlreadyFulfilled`,
//! after an owner reset it answers `UnknownRequest`.
//!
//! Consumed ids accumulate forever, so they live in a [`Registry`] the host
//! supplies (a `Mapping` on-chain).  The open round is part of the engine and
//! holds at most [`constants::MAX_ENTRIES_PER_ROUND`] purchase entries.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use primitive_types::U256;

use crate::ledger::Registry;
use crate::{ensure_not_zero, AccountId, Balance, Error, Invalid, Result, Role};

pub type RoundId = u32;
pub type RequestId = [u8; 32];

pub mod constants {
    /// Tickets one call may buy unless the owner changes it.
    pub const DEFAULT_MAX_TICKETS_PER_BUY: u32 = 10;

    /// Id of the round opened at construction.
    pub const FIRST_ROUND: super::RoundId = 1;

    /// Purchase entries one round can hold. At 36 encoded bytes per entry a
    /// full round stays well inside the 16 KiB storage buffer.
    pub const MAX_ENTRIES_PER_ROUND: usize = 200;
}

use constants::{DEFAULT_MAX_TICKETS_PER_BUY, FIRST_ROUND, MAX_ENTRIES_PER_ROUND};

#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct TicketEntry {
    pub owner: AccountId,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub enum RoundStatus {
    /// Selling tickets.
    Open,
    /// Randomness requested; sales paused.
    Drawing,
    /// Randomness consumed; winner (if any) paid.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct LotteryRound {
    pub id: RoundId,
    pub status: RoundStatus,
    /// Purchases in order. The order fixes each ticket's index.
    pub tickets: Vec<TicketEntry>,
    pub total_tickets: u64,
    /// Ticket revenue plus anything rolled over from earlier rounds.
    pub prize_pool: Balance,
    pub request_id: Option<RequestId>,
    /// Big-endian randomness word, set once.
    pub randomness: Option<[u8; 32]>,
    pub winner: Option<AccountId>,
}

impl LotteryRound {
    fn open(id: RoundId, prize_pool: Balance) -> Self {
        Self {
            id,
            status: RoundStatus::Open,
            tickets: Vec::new(),
            total_tickets: 0,
            prize_pool,
            request_id: None,
            randomness: None,
            winner: None,
        }
    }

    pub fn tickets_of(&self, owner: &AccountId) -> u64 {
        self.tickets
            .iter()
            .filter(|entry| entry.owner == *owner)
            .map(|entry| u64::from(entry.count))
            .sum()
    }
}

/// Picks the winner of a round from its ticket list and a random word.
pub trait WinnerSelector {
    /// `None` when nobody can win (no tickets).
    fn select(&self, tickets: &[TicketEntry], randomness: U256) -> Option<AccountId>;
}

/// `index = randomness mod total_tickets`, then walk the purchases in order
/// summing counts until the running total passes `index`.
///
/// Zero-count entries occupy no index and are never selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuloWalk;

impl WinnerSelector for ModuloWalk {
    fn select(&self, tickets: &[TicketEntry], randomness: U256) -> Option<AccountId> {
        let total: u64 = tickets.iter().map(|entry| u64::from(entry.count)).sum();
        if total == 0 {
            return None;
        }
        let index = (randomness % U256::from(total)).low_u64();
        let mut cumulative = 0u64;
        for entry in tickets {
            cumulative += u64::from(entry.count);
            if index < cumulative {
                return Some(entry.owner);
            }
        }
        None
    }
}

/// A completed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResult {
    /// The round as closed.
    pub round: LotteryRound,
    pub winner: Option<AccountId>,
    /// Paid to `winner`; zero when there is none.
    pub prize: Balance,
    /// Carried into the next round when there is no winner.
    pub rollover: Balance,
}

pub fn randomness_bytes(randomness: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    randomness.to_big_endian(&mut bytes);
    bytes
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct LotteryEngine {
    owner: AccountId,
    /// May request draws besides the owner.
    scheduler: Option<AccountId>,
    /// Only caller allowed to fulfil randomness.
    coordinator: AccountId,
    ticket_price: Balance,
    max_tickets_per_buy: u32,
    current: LotteryRound,
    /// Outstanding requests → the round they draw. At most one entry.
    pending: BTreeMap<RequestId, RoundId>,
    /// Bumped by every request; lets the host derive unique request ids.
    request_nonce: u64,
}

impl LotteryEngine {
    /// Open round 1.
    ///
    /// # Errors
    /// `Validation` for a zero ticket price or zero coordinator.
    pub fn new(owner: AccountId, coordinator: AccountId, ticket_price: Balance) -> Result<Self> {
        ensure_not_zero(&coordinator)?;
        if ticket_price == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        Ok(Self {
            owner,
            scheduler: None,
            coordinator,
            ticket_price,
            max_tickets_per_buy: DEFAULT_MAX_TICKETS_PER_BUY,
            current: LotteryRound::open(FIRST_ROUND, 0),
            pending: BTreeMap::new(),
            request_nonce: 0,
        })
    }

    // ── Views ────────────────────────────────────────────────────────────

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn scheduler(&self) -> Option<AccountId> {
        self.scheduler
    }

    pub fn coordinator(&self) -> AccountId {
        self.coordinator
    }

    pub fn ticket_price(&self) -> Balance {
        self.ticket_price
    }

    pub fn max_tickets_per_buy(&self) -> u32 {
        self.max_tickets_per_buy
    }

    pub fn current_round(&self) -> &LotteryRound {
        &self.current
    }

    pub fn request_nonce(&self) -> u64 {
        self.request_nonce
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending.keys().next().copied()
    }

    // ── Access control ───────────────────────────────────────────────────

    fn only_owner(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner {
            return Err(Error::Unauthorized(Role::Owner));
        }
        Ok(())
    }

    fn only_owner_or_scheduler(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner && self.scheduler.as_ref() != Some(caller) {
            return Err(Error::Unauthorized(Role::Scheduler));
        }
        Ok(())
    }

    // =========================================================================
    // TICKETS
    // =========================================================================

    /// Record `count` tickets for `buyer`, paid with exactly
    /// `count × ticket_price`.
    ///
    /// # Errors
    /// - `RoundClosed` while a draw is pending.
    /// - `Validation` for a zero count, a count above the per-call limit, or
    ///   a payment that differs from the cost.
    /// - `RoundFull` once the round holds `MAX_ENTRIES_PER_ROUND` entries.
    pub fn buy_tickets(&mut self, buyer: AccountId, count: u32, payment: Balance) -> Result<()> {
        if self.current.status != RoundStatus::Open {
            return Err(Error::RoundClosed(self.current.id));
        }
        if self.current.tickets.len() >= MAX_ENTRIES_PER_ROUND {
            return Err(Error::RoundFull(self.current.id));
        }
        if count == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        if count > self.max_tickets_per_buy {
            return Err(Invalid::TooManyTickets { requested: count, max: self.max_tickets_per_buy }
                .into());
        }
        let expected = self
            .ticket_price
            .checked_mul(Balance::from(count))
            .ok_or(Error::Overflow)?;
        if payment != expected {
            return Err(Invalid::IncorrectPayment { expected, received: payment }.into());
        }
        let prize_pool = self.current.prize_pool.checked_add(payment).ok_or(Error::Overflow)?;
        let total_tickets = self
            .current
            .total_tickets
            .checked_add(u64::from(count))
            .ok_or(Error::Overflow)?;

        self.current.tickets.push(TicketEntry { owner: buyer, count });
        self.current.total_tickets = total_tickets;
        self.current.prize_pool = prize_pool;
        Ok(())
    }

    // =========================================================================
    // DRAW
    // =========================================================================

    /// Register `request_id` as the randomness request for the open round.
    ///
    /// # Errors
    /// - `Unauthorized(Scheduler)` unless called by the owner or scheduler.
    /// - `RequestPending` while another request is outstanding.
    /// - `AlreadyFulfilled` if the id was consumed before.
    pub fn request_draw<F: Registry<RequestId, RoundId>>(
        &mut self,
        fulfilled: &F,
        caller: &AccountId,
        request_id: RequestId,
    ) -> Result<RoundId> {
        self.only_owner_or_scheduler(caller)?;
        if let Some(pending) = self.pending_request() {
            return Err(Error::RequestPending(pending));
        }
        if self.current.status != RoundStatus::Open {
            return Err(Error::RoundClosed(self.current.id));
        }
        if fulfilled.contains(&request_id) {
            return Err(Error::AlreadyFulfilled(request_id));
        }

        let round = self.current.id;
        self.pending.insert(request_id, round);
        self.request_nonce = self.request_nonce.wrapping_add(1);
        self.current.status = RoundStatus::Drawing;
        self.current.request_id = Some(request_id);
        Ok(round)
    }

    /// Consume the randomness for `request_id`, pick the winner and open the
    /// next round.  `fulfilled` records the id against the round it drew.
    ///
    /// With no tickets sold there is no winner and the whole prize pool
    /// rolls into the next round.
    ///
    /// # Errors
    /// - `Unauthorized(Coordinator)` for any other caller.
    /// - `AlreadyFulfilled` for an id consumed earlier.
    /// - `UnknownRequest` for an id never issued or revoked by a reset.
    pub fn fulfill_randomness<F: Registry<RequestId, RoundId>, S: WinnerSelector>(
        &mut self,
        fulfilled: &mut F,
        caller: &AccountId,
        request_id: RequestId,
        randomness: U256,
        selector: &S,
    ) -> Result<DrawResult> {
        if *caller != self.coordinator {
            return Err(Error::Unauthorized(Role::Coordinator));
        }
        if fulfilled.contains(&request_id) {
            return Err(Error::AlreadyFulfilled(request_id));
        }
        match self.pending.get(&request_id) {
            Some(round) if *round == self.current.id => {}
            _ => return Err(Error::UnknownRequest(request_id)),
        }
        let next_id = self.current.id.checked_add(1).ok_or(Error::Overflow)?;

        let winner = selector.select(&self.current.tickets, randomness);
        let pool = self.current.prize_pool;
        let (prize, rollover) = match winner {
            Some(_) => (pool, 0),
            None => (0, pool),
        };

        let mut closed = core::mem::replace(&mut self.current, LotteryRound::open(next_id, rollover));
        closed.status = RoundStatus::Closed;
        closed.randomness = Some(randomness_bytes(randomness));
        closed.winner = winner;
        closed.prize_pool = prize;

        self.pending.remove(&request_id);
        fulfilled.store(&request_id, &closed.id);

        Ok(DrawResult { round: closed, winner, prize, rollover })
    }

    /// Revoke the outstanding request and reopen ticket sales.
    ///
    /// A late fulfillment of the revoked id fails with `UnknownRequest`.
    pub fn reset_pending_draw(&mut self, caller: &AccountId) -> Result<RequestId> {
        self.only_owner(caller)?;
        let request_id = self
            .pending_request()
            .ok_or(Error::Validation(Invalid::NoPendingRequest))?;
        self.pending.remove(&request_id);
        self.current.status = RoundStatus::Open;
        self.current.request_id = None;
        Ok(request_id)
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    /// Only while the open round has sold nothing, so every ticket in a
    /// round costs the same.
    pub fn set_ticket_price(&mut self, caller: &AccountId, price: Balance) -> Result<()> {
        self.only_owner(caller)?;
        if price == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        if self.current.total_tickets > 0 {
            return Err(Invalid::RoundHasTickets.into());
        }
        self.ticket_price = price;
        Ok(())
    }

    pub fn set_max_tickets_per_buy(&mut self, caller: &AccountId, max: u32) -> Result<()> {
        self.only_owner(caller)?;
        if max == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        self.max_tickets_per_buy = max;
        Ok(())
    }

    pub fn set_scheduler(&mut self, caller: &AccountId, scheduler: Option<AccountId>) -> Result<()> {
        self.only_owner(caller)?;
        if let Some(account) = &scheduler {
            ensure_not_zero(account)?;
        }
        self.scheduler = scheduler;
        Ok(())
    }

    pub fn set_coordinator(&mut self, caller: &AccountId, coordinator: AccountId) -> Result<()> {
        self.only_owner(caller)?;
        ensure_not_zero(&coordinator)?;
        self.coordinator = coordinator;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: AccountId) -> Result<AccountId> {
        self.only_owner(caller)?;
        ensure_not_zero(&new_owner)?;
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }
}
