//! Swap routing through the stablecoin hub.
//!
//! Every pool pairs one policy token with the stablecoin, so any trade is
//! either a single hop or two hops that meet in the stablecoin:
//!
//! ```text
//!   [Policy(a), Stablecoin]              sell a
//!   [Stablecoin, Policy(a)]              buy a
//!   [Policy(a), Stablecoin, Policy(b)]   a → stable → b   (a ≠ b)
//! ```

use alloc::vec::Vec;

use crate::amm::{self, Direction, Pool};
use crate::market::PolicyId;
use crate::{Balance, Error, Invalid, Result};

/// Anything the market keeps a balance of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub enum Asset {
    Stablecoin,
    Policy(PolicyId),
    /// LP shares of a policy's pool. Never part of a swap path.
    Share(PolicyId),
}

/// One pool crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub policy: PolicyId,
    pub direction: Direction,
}

/// Split a path into pool crossings.
///
/// # Errors
/// `Validation(InvalidPath)` for anything other than the three shapes in the
/// module docs.
pub fn resolve_path(path: &[Asset]) -> Result<Vec<Hop>> {
    let invalid = || Error::Validation(Invalid::InvalidPath);
    let hop = |from: Asset, to: Asset| match (from, to) {
        (Asset::Policy(policy), Asset::Stablecoin) => {
            Ok(Hop { policy, direction: Direction::PolicyToStable })
        }
        (Asset::Stablecoin, Asset::Policy(policy)) => {
            Ok(Hop { policy, direction: Direction::StableToPolicy })
        }
        _ => Err(invalid()),
    };

    match path {
        [from, to] => Ok(alloc::vec![hop(*from, *to)?]),
        [Asset::Policy(a), Asset::Stablecoin, Asset::Policy(b)] if a != b => Ok(alloc::vec![
            Hop { policy: *a, direction: Direction::PolicyToStable },
            Hop { policy: *b, direction: Direction::StableToPolicy },
        ]),
        _ => Err(invalid()),
    }
}

/// Amounts along the path for an exact input. `amounts[0] == amount_in`.
///
/// `pool_of` resolves a policy to its pool and reports unknown ids.
pub fn get_amounts_out<F>(
    pool_of: F,
    amount_in: Balance,
    hops: &[Hop],
    fee_per_mille: u128,
) -> Result<Vec<Balance>>
where
    F: Fn(PolicyId) -> Result<Pool>,
{
    let mut amounts = Vec::with_capacity(hops.len() + 1);
    amounts.push(amount_in);
    let mut current = amount_in;
    for hop in hops {
        let (reserve_in, reserve_out) = pool_of(hop.policy)?.reserves(hop.direction);
        current = amm::swap(current, reserve_in, reserve_out, fee_per_mille)?;
        if current == 0 {
            return Err(Error::InsufficientLiquidity);
        }
        amounts.push(current);
    }
    Ok(amounts)
}

/// Amounts along the path for an exact output, rounding every hop up.
/// `amounts[last] == amount_out`.
pub fn get_amounts_in<F>(
    pool_of: F,
    amount_out: Balance,
    hops: &[Hop],
    fee_per_mille: u128,
) -> Result<Vec<Balance>>
where
    F: Fn(PolicyId) -> Result<Pool>,
{
    let mut amounts = alloc::vec![0; hops.len() + 1];
    amounts[hops.len()] = amount_out;
    let mut current = amount_out;
    for (index, hop) in hops.iter().enumerate().rev() {
        let (reserve_in, reserve_out) = pool_of(hop.policy)?.reserves(hop.direction);
        current = amm::get_amount_in(current, reserve_in, reserve_out, fee_per_mille)?;
        amounts[index] = current;
    }
    Ok(amounts)
}
