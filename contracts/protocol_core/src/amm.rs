//! Constant-product pool math.
//!
//! ```text
//!   amountInWithFee = amountIn × (1000 − fee)
//!   amountOut       = ⌊ amountInWithFee × reserveOut
//!                       / (reserveIn × 1000 + amountInWithFee) ⌋
//! ```
//!
//! The exact-out inverse rounds up so the pool is never short-changed.  Share
//! mints use the geometric mean for the first deposit and the smaller
//! proportional side afterwards; the first `MINIMUM_LIQUIDITY` shares are
//! locked forever so the reserves of an initialised pool never return to
//! zero.

use primitive_types::U256;

use crate::math::{div_ceil, mul_div, sqrt_product, to_balance};
use crate::{Balance, Error, Invalid, Result};

/// Denominator of the swap fee.
pub const FEE_BASIS: u128 = 1_000;

/// 0.3 %.
pub const DEFAULT_FEE_PER_MILLE: u128 = 3;

/// Shares permanently locked by the first liquidity provider.
pub const MINIMUM_LIQUIDITY: Balance = 1_000;

pub fn ensure_fee(fee_per_mille: u128) -> Result<()> {
    if fee_per_mille >= FEE_BASIS {
        return Err(Invalid::FeeOutOfRange.into());
    }
    Ok(())
}

fn product(a: Balance, b: Balance) -> Result<U256> {
    U256::from(a).checked_mul(U256::from(b)).ok_or(Error::Overflow)
}

/// Output of an exact-input swap.
///
/// # Errors
/// - `Validation(ZeroAmount)` for a zero input.
/// - `InsufficientLiquidity` if either reserve is empty.
pub fn swap(
    amount_in: Balance,
    reserve_in: Balance,
    reserve_out: Balance,
    fee_per_mille: u128,
) -> Result<Balance> {
    ensure_fee(fee_per_mille)?;
    if amount_in == 0 {
        return Err(Invalid::ZeroAmount.into());
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    let amount_in_with_fee = product(amount_in, FEE_BASIS - fee_per_mille)?;
    let numerator = amount_in_with_fee
        .checked_mul(U256::from(reserve_out))
        .ok_or(Error::Overflow)?;
    let denominator = product(reserve_in, FEE_BASIS)?
        .checked_add(amount_in_with_fee)
        .ok_or(Error::Overflow)?;
    to_balance(numerator / denominator)
}

/// Input required for an exact-output swap (ceiling division).
///
/// # Errors
/// `InsufficientLiquidity` if a reserve is empty or `amount_out` would take
/// the whole output reserve.
pub fn get_amount_in(
    amount_out: Balance,
    reserve_in: Balance,
    reserve_out: Balance,
    fee_per_mille: u128,
) -> Result<Balance> {
    ensure_fee(fee_per_mille)?;
    if amount_out == 0 {
        return Err(Invalid::ZeroAmount.into());
    }
    if reserve_in == 0 || reserve_out == 0 || amount_out >= reserve_out {
        return Err(Error::InsufficientLiquidity);
    }
    let numerator = product(reserve_in, amount_out)?
        .checked_mul(U256::from(FEE_BASIS))
        .ok_or(Error::Overflow)?;
    let denominator = product(reserve_out - amount_out, FEE_BASIS - fee_per_mille)?;
    to_balance(div_ceil(numerator, denominator))
}

/// Amount of B worth `amount_a` of A at the current ratio (floor).
pub fn quote(amount_a: Balance, reserve_a: Balance, reserve_b: Balance) -> Result<Balance> {
    if amount_a == 0 {
        return Err(Invalid::ZeroAmount.into());
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    mul_div(amount_a, reserve_b, reserve_a)
}

/// Which way a swap crosses a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Policy token in, stablecoin out.
    PolicyToStable,
    /// Stablecoin in, policy token out.
    StableToPolicy,
}

/// Outcome of a liquidity deposit, computed before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deposit {
    /// Policy tokens taken from the provider.
    pub amount0: Balance,
    /// Stablecoin taken from the provider.
    pub amount1: Balance,
    /// Shares credited to the provider.
    pub shares: Balance,
    /// Shares locked to the zero account (first deposit only).
    pub locked: Balance,
}

/// Reserves of one policy-token/stablecoin pair.
///
/// `reserve0` holds the policy token, `reserve1` the stablecoin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(
    feature = "std",
    derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
)]
pub struct Pool {
    pub reserve0: Balance,
    pub reserve1: Balance,
    pub total_shares: Balance,
}

impl Pool {
    pub fn has_liquidity(&self) -> bool {
        self.total_shares > 0 && self.reserve0 > 0 && self.reserve1 > 0
    }

    /// `(reserve_in, reserve_out)` for a swap direction.
    pub fn reserves(&self, direction: Direction) -> (Balance, Balance) {
        match direction {
            Direction::PolicyToStable => (self.reserve0, self.reserve1),
            Direction::StableToPolicy => (self.reserve1, self.reserve0),
        }
    }

    /// Pool after a swap of `amount_in` for `amount_out`.
    pub fn after_swap(
        &self,
        direction: Direction,
        amount_in: Balance,
        amount_out: Balance,
    ) -> Result<Pool> {
        let (reserve_in, reserve_out) = self.reserves(direction);
        let reserve_in = reserve_in.checked_add(amount_in).ok_or(Error::Overflow)?;
        let reserve_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(Error::InsufficientLiquidity)?;
        let mut next = *self;
        match direction {
            Direction::PolicyToStable => {
                next.reserve0 = reserve_in;
                next.reserve1 = reserve_out;
            }
            Direction::StableToPolicy => {
                next.reserve1 = reserve_in;
                next.reserve0 = reserve_out;
            }
        }
        Ok(next)
    }

    /// Size a deposit of up to `amount0_desired`/`amount1_desired`.
    ///
    /// The first deposit sets the ratio and mints `√(a0·a1)` shares, of which
    /// `MINIMUM_LIQUIDITY` are locked.  Later deposits take the largest pair
    /// at the current ratio that fits within the offered amounts and mint
    /// `min(a0·T/r0, a1·T/r1)`.
    ///
    /// # Errors
    /// - `Validation(ZeroAmount)` if either amount is zero.
    /// - `InsufficientLiquidity` if the deposit mints no shares.
    pub fn deposit(&self, amount0_desired: Balance, amount1_desired: Balance) -> Result<Deposit> {
        if amount0_desired == 0 || amount1_desired == 0 {
            return Err(Invalid::ZeroAmount.into());
        }

        if self.total_shares == 0 {
            let minted = sqrt_product(amount0_desired, amount1_desired)?;
            if minted <= MINIMUM_LIQUIDITY {
                return Err(Error::InsufficientLiquidity);
            }
            return Ok(Deposit {
                amount0: amount0_desired,
                amount1: amount1_desired,
                shares: minted - MINIMUM_LIQUIDITY,
                locked: MINIMUM_LIQUIDITY,
            });
        }

        let amount1_optimal = quote(amount0_desired, self.reserve0, self.reserve1)?;
        let (amount0, amount1) = if amount1_optimal <= amount1_desired {
            (amount0_desired, amount1_optimal)
        } else {
            let amount0_optimal = quote(amount1_desired, self.reserve1, self.reserve0)?;
            (amount0_optimal, amount1_desired)
        };

        let by0 = mul_div(amount0, self.total_shares, self.reserve0)?;
        let by1 = mul_div(amount1, self.total_shares, self.reserve1)?;
        let shares = by0.min(by1);
        if shares == 0 || amount0 == 0 || amount1 == 0 {
            return Err(Error::InsufficientLiquidity);
        }
        Ok(Deposit { amount0, amount1, shares, locked: 0 })
    }

    /// Reserves paid out for burning `shares`: `shares × r_i / T`.
    pub fn withdrawal(&self, shares: Balance) -> Result<(Balance, Balance)> {
        if shares == 0 {
            return Err(Invalid::ZeroAmount.into());
        }
        if shares > self.total_shares {
            return Err(Error::InsufficientShares {
                requested: shares,
                available: self.total_shares,
            });
        }
        let amount0 = mul_div(shares, self.reserve0, self.total_shares)?;
        let amount1 = mul_div(shares, self.reserve1, self.total_shares)?;
        if amount0 == 0 && amount1 == 0 {
            return Err(Error::InsufficientLiquidity);
        }
        Ok((amount0, amount1))
    }

    /// `reserve0 × reserve1`, for invariant checks.
    pub fn k(&self) -> U256 {
        U256::from(self.reserve0) * U256::from(self.reserve1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_matches_reference_scenario() {
        // 100 in against 1000/1000 at 3‰ yields 90.
        assert_eq!(swap(100, 1_000, 1_000, 3), Ok(90));
    }

    #[test]
    fn swap_rejects_empty_reserves_and_zero_input() {
        assert_eq!(swap(100, 0, 1_000, 3), Err(Error::InsufficientLiquidity));
        assert_eq!(swap(100, 1_000, 0, 3), Err(Error::InsufficientLiquidity));
        assert_eq!(swap(0, 1_000, 1_000, 3), Err(Error::Validation(Invalid::ZeroAmount)));
    }

    #[test]
    fn fee_must_be_below_basis() {
        assert_eq!(swap(1, 10, 10, 1_000), Err(Error::Validation(Invalid::FeeOutOfRange)));
        assert!(swap(1_000, 10, 10, 999).is_ok());
    }

    #[test]
    fn swap_never_decreases_k() {
        let pool = Pool { reserve0: 12_345, reserve1: 67_890, total_shares: 1 };
        for amount_in in [1u128, 7, 100, 5_000, 1_000_000] {
            let out = swap(amount_in, pool.reserve0, pool.reserve1, 3).unwrap();
            let next = pool.after_swap(Direction::PolicyToStable, amount_in, out).unwrap();
            assert!(next.k() >= pool.k(), "k decreased for amount_in={}", amount_in);
        }
    }

    #[test]
    fn exact_out_inverse_rounds_up() {
        let amount_in = get_amount_in(90, 1_000, 1_000, 3).unwrap();
        // 1000·90·1000 / (910·997) = 99.198… → 100
        assert_eq!(amount_in, 100);
        assert!(swap(amount_in, 1_000, 1_000, 3).unwrap() >= 90);
        assert!(swap(amount_in - 1, 1_000, 1_000, 3).unwrap() < 90);
    }

    #[test]
    fn exact_out_never_underpays() {
        let (r_in, r_out) = (3_333_333u128, 777_777u128);
        for out in [1u128, 10, 999, 12_345, 700_000] {
            let needed = get_amount_in(out, r_in, r_out, 3).unwrap();
            assert!(swap(needed, r_in, r_out, 3).unwrap() >= out, "out={}", out);
        }
    }

    #[test]
    fn exact_out_cannot_drain_reserve() {
        assert_eq!(get_amount_in(1_000, 1_000, 1_000, 3), Err(Error::InsufficientLiquidity));
    }

    #[test]
    fn wide_operands_report_overflow() {
        assert_eq!(swap(u128::MAX, u128::MAX, u128::MAX, 0), Err(Error::Overflow));
        assert_eq!(get_amount_in(u128::MAX - 1, u128::MAX, u128::MAX, 0), Err(Error::Overflow));
        // Large but representable operands still price normally.
        assert_eq!(swap(1 << 100, 1 << 100, 1 << 100, 0), Ok(1 << 99));
    }

    #[test]
    fn quote_is_proportional() {
        assert_eq!(quote(10, 100, 250), Ok(25));
        assert_eq!(quote(10, 0, 250), Err(Error::InsufficientLiquidity));
    }

    #[test]
    fn first_deposit_locks_minimum_liquidity() {
        let deposit = Pool::default().deposit(4_000, 1_000).unwrap();
        assert_eq!(deposit.shares + deposit.locked, 2_000);
        assert_eq!(deposit.locked, MINIMUM_LIQUIDITY);
        assert_eq!(deposit.shares, 1_000);
    }

    #[test]
    fn dust_first_deposit_is_rejected() {
        assert_eq!(Pool::default().deposit(1_000, 1_000), Err(Error::InsufficientLiquidity));
    }

    #[test]
    fn later_deposit_uses_binding_side() {
        let pool = Pool { reserve0: 1_000, reserve1: 2_000, total_shares: 1_000 };
        // Offering 100/400 at a 1:2 ratio only uses 100/200.
        let deposit = pool.deposit(100, 400).unwrap();
        assert_eq!((deposit.amount0, deposit.amount1), (100, 200));
        assert_eq!(deposit.shares, 100);
        assert_eq!(deposit.locked, 0);

        // Offering 500/200 only uses 100/200.
        let deposit = pool.deposit(500, 200).unwrap();
        assert_eq!((deposit.amount0, deposit.amount1), (100, 200));
        assert_eq!(deposit.shares, 100);
    }

    #[test]
    fn withdrawal_is_pro_rata() {
        let pool = Pool { reserve0: 1_000, reserve1: 3_000, total_shares: 2_000 };
        assert_eq!(pool.withdrawal(500), Ok((250, 750)));
        assert_eq!(
            pool.withdrawal(2_001),
            Err(Error::InsufficientShares { requested: 2_001, available: 2_000 })
        );
    }
}
