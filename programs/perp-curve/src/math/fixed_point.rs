use uint::construct_uint;

use crate::error::PerpError;

construct_uint! {
    /// 256-bit unsigned integer for curve products that overflow `u128`.
    pub struct U256(4);
}

/// Fixed point representation using u128.
/// Represents values as integer * 10^18 (18 decimal places)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Seconds in one day, used by per-day rates
pub const SECONDS_PER_DAY: u64 = 86_400;

pub fn wad_u256() -> U256 {
    U256::from(WAD)
}

/// Narrows a 256-bit intermediate back into `u128`
pub fn narrow(value: U256) -> Result<u128, PerpError> {
    if value > U256::from(u128::MAX) {
        return Err(PerpError::ArithmeticOverflow);
    }
    Ok(value.low_u128())
}

pub fn checked_mul_u256(a: U256, b: U256) -> Result<U256, PerpError> {
    a.checked_mul(b).ok_or(PerpError::ArithmeticOverflow)
}

pub fn checked_div_u256(a: U256, b: U256) -> Result<U256, PerpError> {
    if b.is_zero() {
        return Err(PerpError::DivisionByZero);
    }
    Ok(a / b)
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, PerpError> {
    a.checked_add(b).ok_or(PerpError::ArithmeticOverflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, PerpError> {
    a.checked_sub(b).ok_or(PerpError::ArithmeticOverflow)
}

/// `a * b / c` with a 256-bit intermediate, rounding down
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, PerpError> {
    if c == 0 {
        return Err(PerpError::DivisionByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(c))
}

/// `a * b / WAD`
pub fn mul_wad(a: u128, b: u128) -> Result<u128, PerpError> {
    mul_div(a, b, WAD)
}

/// `a * WAD / b`
pub fn div_wad(a: u128, b: u128) -> Result<u128, PerpError> {
    mul_div(a, WAD, b)
}

/// Square root of a WAD value, result in WAD
pub fn sqrt_wad(value: u128) -> Result<u128, PerpError> {
    narrow((U256::from(value) * wad_u256()).integer_sqrt())
}

/// `base ^ exponent` for a WAD base, by repeated squaring.
///
/// Every intermediate is rounded down, so for `base <= WAD` the result is
/// never above the exact power.
pub fn pow_wad(base: u128, exponent: u64) -> Result<u128, PerpError> {
    let mut result = WAD;
    let mut square = base;
    let mut remaining = exponent;

    while remaining > 0 {
        if remaining & 1 == 1 {
            result = mul_wad(result, square)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            square = mul_wad(square, square)?;
        }
    }

    Ok(result)
}

/// Exponentially weighted step: `decay^elapsed * current + (1 - decay^elapsed) * target`
pub fn decay_toward(
    current: u128,
    target: u128,
    decay_per_second: u128,
    elapsed: u64,
) -> Result<u128, PerpError> {
    let weight = pow_wad(decay_per_second, elapsed)?.min(WAD);
    let kept = mul_wad(current, weight)?;
    let moved = mul_wad(target, WAD - weight)?;
    checked_add(kept, moved)
}
