//! Exact integer helpers. Products are formed in 256 bits so `u128`
//! operands never overflow before the division.

use primitive_types::U256;

use crate::{Balance, Error, Result};

/// Narrow a 256-bit value back to `u128`.
pub fn to_balance(value: U256) -> Result<Balance> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow);
    }
    Ok(value.low_u128())
}

/// `floor(a * b / denominator)`.
///
/// # Errors
/// `Overflow` on a zero denominator or a quotient wider than `u128`.
pub fn mul_div(a: Balance, b: Balance, denominator: Balance) -> Result<Balance> {
    if denominator == 0 {
        return Err(Error::Overflow);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(Error::Overflow)?;
    to_balance(product / U256::from(denominator))
}

/// `ceil(a * b / denominator)`.
pub fn mul_div_up(a: Balance, b: Balance, denominator: Balance) -> Result<Balance> {
    if denominator == 0 {
        return Err(Error::Overflow);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(Error::Overflow)?;
    to_balance(div_ceil(product, U256::from(denominator)))
}

/// Ceiling division on 256-bit values. `denominator` must be non-zero.
pub fn div_ceil(numerator: U256, denominator: U256) -> U256 {
    let quotient = numerator / denominator;
    if (numerator % denominator).is_zero() {
        quotient
    } else {
        quotient + U256::one()
    }
}

/// `floor(sqrt(a * b))`, used for the geometric-mean first share mint.
pub fn sqrt_product(a: Balance, b: Balance) -> Result<Balance> {
    // a, b < 2^128 so a*b < 2^256 and the root fits in u128.
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(Error::Overflow)?;
    to_balance(product.integer_sqrt())
}
