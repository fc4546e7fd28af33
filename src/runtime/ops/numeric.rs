//! Numeric operations for WebAssembly
//!
//! This module implements the arithmetic instructions of section 4.4.1:
//! integer and floating point unary and binary operations. Comparisons live
//! in `comparison`, bit manipulation in `bitwise`.

use super::*;

// ============================================================================
// Integer Helpers
// ============================================================================

/// Signed division, trapping on a zero divisor and on MIN / -1
fn i32_checked_div(c1: i32, c2: i32) -> Result<i32, Trap> {
    if c2 == 0 {
        return Err(Trap::DivisionByZero);
    }
    c1.checked_div(c2).ok_or(Trap::IntegerOverflow)
}

fn i64_checked_div(c1: i64, c2: i64) -> Result<i64, Trap> {
    if c2 == 0 {
        return Err(Trap::DivisionByZero);
    }
    c1.checked_div(c2).ok_or(Trap::IntegerOverflow)
}

/// Signed remainder. MIN % -1 is 0, not an overflow.
fn i32_checked_rem(c1: i32, c2: i32) -> Result<i32, Trap> {
    match c2 {
        0 => Err(Trap::DivisionByZero),
        _ => Ok(c1.wrapping_rem(c2)),
    }
}

fn i64_checked_rem(c1: i64, c2: i64) -> Result<i64, Trap> {
    match c2 {
        0 => Err(Trap::DivisionByZero),
        _ => Ok(c1.wrapping_rem(c2)),
    }
}

fn unsigned_div<T: Into<u64> + Copy>(c1: T, c2: T, op: fn(u64, u64) -> u64) -> Result<u64, Trap> {
    match c2.into() {
        0 => Err(Trap::DivisionByZero),
        divisor => Ok(op(c1.into(), divisor)),
    }
}

// ============================================================================
// Integer Operations (Section 4.4.1.3)
// ============================================================================

unop!(
    /// i32.clz: number of leading zero bits
    i32_clz, pop_i32 => push_i32, |c| c.leading_zeros() as i32
);
unop!(
    /// i32.ctz: number of trailing zero bits
    i32_ctz, pop_i32 => push_i32, |c| c.trailing_zeros() as i32
);
unop!(
    /// i32.popcnt: number of set bits
    i32_popcnt, pop_i32 => push_i32, |c| c.count_ones() as i32
);
binop!(
    /// i32.add: c1 + c2 modulo 2^32
    i32_add, pop_i32 => push_i32, |c1, c2| c1.wrapping_add(c2)
);
binop!(i32_sub, pop_i32 => push_i32, |c1, c2| c1.wrapping_sub(c2));
binop!(i32_mul, pop_i32 => push_i32, |c1, c2| c1.wrapping_mul(c2));
try_binop!(
    /// i32.div_s
    ///
    /// WebAssembly 4.3.2.9: if c2 is 0 the result is undefined and the
    /// instruction traps. If c1/c2 is not representable (-2^31 / -1) it traps
    /// as well.
    i32_div_s, pop_i32 => push_i32, |c1, c2| i32_checked_div(c1, c2)
);
try_binop!(
    /// i32.div_u: traps if c2 is 0
    i32_div_u, pop_u32 => push, |c1, c2| unsigned_div(c1, c2, |a, b| a / b).map(Value::from_u64)
);
try_binop!(i32_rem_s, pop_i32 => push_i32, |c1, c2| i32_checked_rem(c1, c2));
try_binop!(i32_rem_u, pop_u32 => push, |c1, c2| unsigned_div(c1, c2, |a, b| a % b).map(Value::from_u64));

unop!(i64_clz, pop_i64 => push_i64, |c| c.leading_zeros() as i64);
unop!(i64_ctz, pop_i64 => push_i64, |c| c.trailing_zeros() as i64);
unop!(i64_popcnt, pop_i64 => push_i64, |c| c.count_ones() as i64);
binop!(
    /// i64.add: c1 + c2 modulo 2^64
    i64_add, pop_i64 => push_i64, |c1, c2| c1.wrapping_add(c2)
);
binop!(i64_sub, pop_i64 => push_i64, |c1, c2| c1.wrapping_sub(c2));
binop!(i64_mul, pop_i64 => push_i64, |c1, c2| c1.wrapping_mul(c2));
try_binop!(i64_div_s, pop_i64 => push_i64, |c1, c2| i64_checked_div(c1, c2));
try_binop!(i64_div_u, pop_u64 => push, |c1, c2| unsigned_div(c1, c2, |a, b| a / b).map(Value::from_u64));
try_binop!(i64_rem_s, pop_i64 => push_i64, |c1, c2| i64_checked_rem(c1, c2));
try_binop!(i64_rem_u, pop_u64 => push, |c1, c2| unsigned_div(c1, c2, |a, b| a % b).map(Value::from_u64));

// ============================================================================
// Float Helpers
// ============================================================================

/// fmin as WebAssembly defines it: NaN if either operand is NaN, and -0 is
/// less than +0.
fn f32_min_wasm(z1: f32, z2: f32) -> f32 {
    if z1.is_nan() || z2.is_nan() {
        z1 + z2
    } else if z1 == z2 {
        f32::from_bits(z1.to_bits() | z2.to_bits())
    } else {
        z1.min(z2)
    }
}

fn f32_max_wasm(z1: f32, z2: f32) -> f32 {
    if z1.is_nan() || z2.is_nan() {
        z1 + z2
    } else if z1 == z2 {
        f32::from_bits(z1.to_bits() & z2.to_bits())
    } else {
        z1.max(z2)
    }
}

fn f64_min_wasm(z1: f64, z2: f64) -> f64 {
    if z1.is_nan() || z2.is_nan() {
        z1 + z2
    } else if z1 == z2 {
        f64::from_bits(z1.to_bits() | z2.to_bits())
    } else {
        z1.min(z2)
    }
}

fn f64_max_wasm(z1: f64, z2: f64) -> f64 {
    if z1.is_nan() || z2.is_nan() {
        z1 + z2
    } else if z1 == z2 {
        f64::from_bits(z1.to_bits() & z2.to_bits())
    } else {
        z1.max(z2)
    }
}

// ============================================================================
// Float Operations (Section 4.4.1.2 / 4.4.1.3)
// ============================================================================

unop!(
    /// f32.abs: clears the sign bit, NaN payloads included
    f32_abs, pop_f32 => push_f32, |z| z.abs()
);
unop!(f32_neg, pop_f32 => push_f32, |z| -z);
unop!(f32_ceil, pop_f32 => push_f32, |z| z.ceil());
unop!(f32_floor, pop_f32 => push_f32, |z| z.floor());
unop!(f32_trunc, pop_f32 => push_f32, |z| z.trunc());
unop!(
    /// f32.nearest: round to nearest, ties to even
    f32_nearest, pop_f32 => push_f32, |z| z.round_ties_even()
);
unop!(f32_sqrt, pop_f32 => push_f32, |z| z.sqrt());
binop!(f32_add, pop_f32 => push_f32, |z1, z2| z1 + z2);
binop!(f32_sub, pop_f32 => push_f32, |z1, z2| z1 - z2);
binop!(f32_mul, pop_f32 => push_f32, |z1, z2| z1 * z2);
binop!(f32_div, pop_f32 => push_f32, |z1, z2| z1 / z2);
binop!(f32_min, pop_f32 => push_f32, |z1, z2| f32_min_wasm(z1, z2));
binop!(f32_max, pop_f32 => push_f32, |z1, z2| f32_max_wasm(z1, z2));
binop!(f32_copysign, pop_f32 => push_f32, |z1, z2| z1.copysign(z2));

unop!(f64_abs, pop_f64 => push_f64, |z| z.abs());
unop!(f64_neg, pop_f64 => push_f64, |z| -z);
unop!(f64_ceil, pop_f64 => push_f64, |z| z.ceil());
unop!(f64_floor, pop_f64 => push_f64, |z| z.floor());
unop!(f64_trunc, pop_f64 => push_f64, |z| z.trunc());
unop!(f64_nearest, pop_f64 => push_f64, |z| z.round_ties_even());
unop!(f64_sqrt, pop_f64 => push_f64, |z| z.sqrt());
binop!(f64_add, pop_f64 => push_f64, |z1, z2| z1 + z2);
binop!(f64_sub, pop_f64 => push_f64, |z1, z2| z1 - z2);
binop!(f64_mul, pop_f64 => push_f64, |z1, z2| z1 * z2);
binop!(f64_div, pop_f64 => push_f64, |z1, z2| z1 / z2);
binop!(f64_min, pop_f64 => push_f64, |z1, z2| f64_min_wasm(z1, z2));
binop!(f64_max, pop_f64 => push_f64, |z1, z2| f64_max_wasm(z1, z2));
binop!(f64_copysign, pop_f64 => push_f64, |z1, z2| z1.copysign(z2));
