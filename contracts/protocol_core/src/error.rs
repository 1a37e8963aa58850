//! Error taxonomy shared by every contract.
//!
//! The variant is the machine-readable kind ([`Error::kind`]); its fields
//! carry the context a human needs to understand the failure.  The enum is
//! SCALE-encoded so a contract calling another decodes the callee's error
//! without translation.

use core::fmt;

use crate::lottery::{RequestId, RoundId};
use crate::market::PolicyId;
use crate::oracle::Symbol;
use crate::Balance;

pub type Result<T> = core::result::Result<T, Error>;

/// Why an input was rejected before any state was touched.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum Invalid {
    /// Price symbol is empty.
    EmptySymbol,
    /// Price symbol is longer than `oracle::MAX_SYMBOL_LEN` bytes.
    SymbolTooLong,
    /// The all-zero account was supplied where a real one is required.
    ZeroAddress,
    /// Amount, count or price must be positive.
    ZeroAmount,
    /// Swap path is not a supported route through the stablecoin hub.
    InvalidPath,
    /// Fee must be strictly below the per-mille basis.
    FeeOutOfRange,
    /// Feed decimals exceed `oracle::MAX_FEED_DECIMALS`.
    DecimalsOutOfRange,
    /// Policy expiry must lie strictly after the current time.
    ExpiryNotInFuture,
    /// Settlement attempted before the policy's expiry.
    NotExpired,
    /// No policy token class with this id.
    UnknownPolicy(PolicyId),
    /// Ticket payment differs from `count × ticket_price`.
    IncorrectPayment { expected: Balance, received: Balance },
    /// Ticket purchase exceeds the per-call limit.
    TooManyTickets { requested: u32, max: u32 },
    /// Ticket price cannot change once the open round has sold tickets.
    RoundHasTickets,
    /// There is no outstanding randomness request to reset.
    NoPendingRequest,
}

/// Role a caller lacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum Role {
    Owner,
    Minter,
    /// Owner or the configured draw scheduler.
    Scheduler,
    /// The randomness coordinator.
    Coordinator,
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum Error {
    /// Malformed or out-of-range input.
    Validation(Invalid),
    /// Caller does not hold the required role.
    Unauthorized(Role),
    /// Pool reserves cannot satisfy the request (empty pool, zero output,
    /// output at or above the reserve, or a dust-sized share mint).
    InsufficientLiquidity,
    /// Caller holds fewer pool shares than requested.
    InsufficientShares { requested: Balance, available: Balance },
    /// Caller holds fewer tokens than requested.
    InsufficientBalance { requested: Balance, available: Balance },
    /// Computed amount is on the wrong side of the caller's limit.
    SlippageExceeded { limit: Balance, actual: Balance },
    /// `now` is past the caller's deadline.
    ExpiredDeadline { deadline: u64, now: u64 },
    /// No price feed is registered for the symbol.
    NotConfigured { symbol: Symbol },
    /// The feed has no usable answer for the symbol.
    StaleOrMissingPrice { symbol: Symbol },
    /// Policy outcome is already fixed.
    AlreadySettled(PolicyId),
    /// Policy outcome is still pending.
    NotSettled(PolicyId),
    /// Trading and new liquidity are closed once a policy reaches expiry.
    PolicyExpired(PolicyId),
    /// Mint would push the governance supply over its cap.
    CapExceeded { requested: Balance, remaining: Balance },
    /// A randomness request is already outstanding.
    RequestPending(RequestId),
    /// Fulfillment for an id that is not (or no longer) pending.
    UnknownRequest(RequestId),
    /// Fulfillment for an id that was already consumed.
    AlreadyFulfilled(RequestId),
    /// The round is not accepting this operation.
    RoundClosed(RoundId),
    /// The round holds the maximum number of purchase entries.
    RoundFull(RoundId),
    /// An arithmetic operation overflowed.
    Overflow,
    /// A native value transfer failed.
    TransferFailed,
    /// A cross-contract call failed or could not be decoded.
    CallFailed,
}

impl Error {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Unauthorized(_) => "Unauthorized",
            Error::InsufficientLiquidity => "InsufficientLiquidity",
            Error::InsufficientShares { .. } => "InsufficientShares",
            Error::InsufficientBalance { .. } => "InsufficientBalance",
            Error::SlippageExceeded { .. } => "SlippageExceeded",
            Error::ExpiredDeadline { .. } => "ExpiredDeadline",
            Error::NotConfigured { .. } => "NotConfigured",
            Error::StaleOrMissingPrice { .. } => "StaleOrMissingPrice",
            Error::AlreadySettled(_) => "AlreadySettled",
            Error::NotSettled(_) => "NotSettled",
            Error::PolicyExpired(_) => "PolicyExpired",
            Error::CapExceeded { .. } => "CapExceeded",
            Error::RequestPending(_) => "RequestPending",
            Error::UnknownRequest(_) => "UnknownRequest",
            Error::AlreadyFulfilled(_) => "AlreadyFulfilled",
            Error::RoundClosed(_) => "RoundClosed",
            Error::RoundFull(_) => "RoundFull",
            Error::Overflow => "Overflow",
            Error::TransferFailed => "TransferFailed",
            Error::CallFailed => "CallFailed",
        }
    }
}

impl From<Invalid> for Error {
    fn from(reason: Invalid) -> Self {
        Error::Validation(reason)
    }
}

struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid::EmptySymbol => f.write_str("symbol must not be empty"),
            Invalid::SymbolTooLong => f.write_str("symbol is too long"),
            Invalid::ZeroAddress => f.write_str("zero address is not allowed"),
            Invalid::ZeroAmount => f.write_str("amount must be positive"),
            Invalid::InvalidPath => f.write_str("unsupported swap path"),
            Invalid::FeeOutOfRange => f.write_str("fee must be below 1000 per mille"),
            Invalid::DecimalsOutOfRange => f.write_str("feed decimals out of range"),
            Invalid::ExpiryNotInFuture => f.write_str("expiry must be in the future"),
            Invalid::NotExpired => f.write_str("policy has not reached expiry"),
            Invalid::UnknownPolicy(id) => write!(f, "unknown policy {}", id),
            Invalid::IncorrectPayment { expected, received } => {
                write!(f, "payment {} does not match ticket cost {}", received, expected)
            }
            Invalid::TooManyTickets { requested, max } => {
                write!(f, "{} tickets requested, at most {} per purchase", requested, max)
            }
            Invalid::RoundHasTickets => f.write_str("open round already sold tickets"),
            Invalid::NoPendingRequest => f.write_str("no randomness request is pending"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(reason) => write!(f, "invalid input: {}", reason),
            Error::Unauthorized(role) => write!(f, "caller lacks the {:?} role", role),
            Error::InsufficientLiquidity => f.write_str("insufficient pool liquidity"),
            Error::InsufficientShares { requested, available } => {
                write!(f, "requested {} shares, holding {}", requested, available)
            }
            Error::InsufficientBalance { requested, available } => {
                write!(f, "requested {}, balance {}", requested, available)
            }
            Error::SlippageExceeded { limit, actual } => {
                write!(f, "amount {} violates slippage limit {}", actual, limit)
            }
            Error::ExpiredDeadline { deadline, now } => {
                write!(f, "deadline {} passed at {}", deadline, now)
            }
            Error::NotConfigured { symbol } => write!(f, "no price feed for {}", symbol),
            Error::StaleOrMissingPrice { symbol } => {
                write!(f, "no usable price for {}", symbol)
            }
            Error::AlreadySettled(id) => write!(f, "policy {} already settled", id),
            Error::NotSettled(id) => write!(f, "policy {} not settled", id),
            Error::PolicyExpired(id) => write!(f, "policy {} has expired", id),
            Error::CapExceeded { requested, remaining } => {
                write!(f, "mint of {} exceeds remaining cap {}", requested, remaining)
            }
            Error::RequestPending(id) => write!(f, "request {} is pending", Hex(id)),
            Error::UnknownRequest(id) => write!(f, "unknown request {}", Hex(id)),
            Error::AlreadyFulfilled(id) => write!(f, "request {} already fulfilled", Hex(id)),
            Error::RoundClosed(round) => write!(f, "round {} is closed", round),
            Error::RoundFull(round) => write!(f, "round {} has no room for another purchase", round),
            Error::Overflow => f.write_str("arithmetic overflow"),
            Error::TransferFailed => f.write_str("native transfer failed"),
            Error::CallFailed => f.write_str("cross-contract call failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(Error::InsufficientLiquidity.kind(), "InsufficientLiquidity");
        assert_eq!(Error::Validation(Invalid::ZeroAmount).kind(), "ValidationError");
        assert_eq!(
            Error::CapExceeded { requested: 1, remaining: 0 }.kind(),
            "CapExceeded"
        );
    }

    #[test]
    fn display_carries_context() {
        let err = Error::InsufficientShares { requested: 10, available: 4 };
        assert_eq!(err.to_string(), "requested 10 shares, holding 4");

        let err = Error::NotConfigured { symbol: "ETH".into() };
        assert_eq!(err.to_string(), "no price feed for ETH");

        let err = Error::UnknownRequest([0xab; 32]);
        assert!(err.to_string().starts_with("unknown request 0xabab"));
    }

    #[test]
    fn invalid_converts_into_validation_error() {
        let err: Error = Invalid::InvalidPath.into();
        assert_eq!(err, Error::Validation(Invalid::InvalidPath));
    }

    #[test]
    fn errors_round_trip_through_scale() {
        use scale::{Decode, Encode};
        let err = Error::SlippageExceeded { limit: 95, actual: 90 };
        let decoded = Error::decode(&mut &err.encode()[..]).unwrap();
        assert_eq!(decoded, err);
    }
}
