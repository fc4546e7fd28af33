//! Conversion operations for WebAssembly
//!
//! Wrapping, extension, truncation, conversion, demotion, promotion and
//! reinterpretation between the four value types (section 4.4.1.6), plus the
//! sign-extension operators.

use super::*;

// Truncation bounds: a truncated value t converts iff LO <= t < HI
const I32_S: (f64, f64) = (-2147483648.0, 2147483648.0);
const I32_U: (f64, f64) = (0.0, 4294967296.0);
const I64_S: (f64, f64) = (-9223372036854775808.0, 9223372036854775808.0);
const I64_U: (f64, f64) = (0.0, 18446744073709551616.0);

/// Truncate `z` toward zero, trapping if the result is outside `bounds`.
///
/// NaN traps as an invalid conversion, infinities and out-of-range values as
/// an integer overflow. f32 operands are widened first, which is exact.
fn trunc(z: f64, (lo, hi): (f64, f64)) -> Result<f64, Trap> {
    if z.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    let t = z.trunc();
    if t >= lo && t < hi {
        Ok(t)
    } else {
        Err(Trap::IntegerOverflow)
    }
}

unop!(
    /// i32.wrap_i64: c mod 2^32
    i32_wrap_i64, pop_i64 => push_i32, |c| c as i32
);
try_unop!(i32_trunc_f32_s, pop_f32 => push_i32, |z| trunc(z as f64, I32_S).map(|t| t as i32));
try_unop!(i32_trunc_f32_u, pop_f32 => push, |z| trunc(z as f64, I32_U).map(|t| Value::from_u32(t as u32)));
try_unop!(i32_trunc_f64_s, pop_f64 => push_i32, |z| trunc(z, I32_S).map(|t| t as i32));
try_unop!(i32_trunc_f64_u, pop_f64 => push, |z| trunc(z, I32_U).map(|t| Value::from_u32(t as u32)));

unop!(i64_extend_i32_s, pop_i32 => push_i64, |c| c as i64);
unop!(i64_extend_i32_u, pop_u32 => push_i64, |c| c as i64);
try_unop!(i64_trunc_f32_s, pop_f32 => push_i64, |z| trunc(z as f64, I64_S).map(|t| t as i64));
try_unop!(i64_trunc_f32_u, pop_f32 => push, |z| trunc(z as f64, I64_U).map(|t| Value::from_u64(t as u64)));
try_unop!(i64_trunc_f64_s, pop_f64 => push_i64, |z| trunc(z, I64_S).map(|t| t as i64));
try_unop!(i64_trunc_f64_u, pop_f64 => push, |z| trunc(z, I64_U).map(|t| Value::from_u64(t as u64)));

// Rust's integer to float casts round to nearest, ties to even
unop!(f32_convert_i32_s, pop_i32 => push_f32, |c| c as f32);
unop!(f32_convert_i32_u, pop_u32 => push_f32, |c| c as f32);
unop!(f32_convert_i64_s, pop_i64 => push_f32, |c| c as f32);
unop!(f32_convert_i64_u, pop_u64 => push_f32, |c| c as f32);
unop!(f32_demote_f64, pop_f64 => push_f32, |z| z as f32);

unop!(f64_convert_i32_s, pop_i32 => push_f64, |c| c as f64);
unop!(f64_convert_i32_u, pop_u32 => push_f64, |c| c as f64);
unop!(f64_convert_i64_s, pop_i64 => push_f64, |c| c as f64);
unop!(f64_convert_i64_u, pop_u64 => push_f64, |c| c as f64);
unop!(f64_promote_f32, pop_f32 => push_f64, |z| z as f64);

unop!(i32_reinterpret_f32, pop_f32 => push, |z| Value::from_u32(z.to_bits()));
unop!(i64_reinterpret_f64, pop_f64 => push, |z| Value::from_u64(z.to_bits()));
unop!(f32_reinterpret_i32, pop_u32 => push_f32, |c| f32::from_bits(c));
unop!(f64_reinterpret_i64, pop_u64 => push_f64, |c| f64::from_bits(c));

unop!(i32_extend8_s, pop_i32 => push_i32, |c| c as i8 as i32);
unop!(i32_extend16_s, pop_i32 => push_i32, |c| c as i16 as i32);
unop!(i64_extend8_s, pop_i64 => push_i64, |c| c as i8 as i64);
unop!(i64_extend16_s, pop_i64 => push_i64, |c| c as i16 as i64);
unop!(i64_extend32_s, pop_i64 => push_i64, |c| c as i32 as i64);
