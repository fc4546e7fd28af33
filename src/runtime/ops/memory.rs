//! Memory operations for WebAssembly
//!
//! Loads, stores, memory.size and memory.grow (section 4.4.7). The effective
//! address is the popped i32 operand, read unsigned, plus the static offset;
//! [`Memory`] computes it without wrapping and traps when any accessed byte
//! lies past the end of memory.

use super::*;

// ============================================================================
// Memory Load Operations (Section 4.4.7.1)
// ============================================================================

/// i32.load
/// [i32] → [i32]
pub fn i32_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u32(addr, memarg.offset)?;
    stack.push(Value::from_u32(value));
    Ok(())
}

/// i64.load
/// [i32] → [i64]
pub fn i64_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u64(addr, memarg.offset)?;
    stack.push(Value::from_u64(value));
    Ok(())
}

/// f32.load, bit pattern preserved
pub fn f32_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    i32_load(stack, memory, memarg)
}

pub fn f64_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    i64_load(stack, memory, memarg)
}

/// i32.load8_s - load a byte and sign-extend it
pub fn i32_load8_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u8(addr, memarg.offset)?;
    stack.push_i32(value as i8 as i32);
    Ok(())
}

pub fn i32_load8_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u8(addr, memarg.offset)?;
    stack.push_i32(value as i32);
    Ok(())
}

pub fn i32_load16_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u16(addr, memarg.offset)?;
    stack.push_i32(value as i16 as i32);
    Ok(())
}

pub fn i32_load16_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u16(addr, memarg.offset)?;
    stack.push_i32(value as i32);
    Ok(())
}

pub fn i64_load8_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u8(addr, memarg.offset)?;
    stack.push_i64(value as i8 as i64);
    Ok(())
}

pub fn i64_load8_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u8(addr, memarg.offset)?;
    stack.push_i64(value as i64);
    Ok(())
}

pub fn i64_load16_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u16(addr, memarg.offset)?;
    stack.push_i64(value as i16 as i64);
    Ok(())
}

pub fn i64_load16_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u16(addr, memarg.offset)?;
    stack.push_i64(value as i64);
    Ok(())
}

pub fn i64_load32_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u32(addr, memarg.offset)?;
    stack.push_i64(value as i32 as i64);
    Ok(())
}

pub fn i64_load32_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), Trap> {
    let addr = stack.pop_u32()?;
    let value = memory.read_u32(addr, memarg.offset)?;
    stack.push_i64(value as i64);
    Ok(())
}

// ============================================================================
// Memory Store Operations (Section 4.4.7.2)
// ============================================================================

/// i32.store
/// [i32 i32] → []
///
/// The value is popped before the address.
pub fn i32_store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u32()?;
    let addr = stack.pop_u32()?;
    memory.write_u32(addr, memarg.offset, value)
}

pub fn i64_store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u64()?;
    let addr = stack.pop_u32()?;
    memory.write_u64(addr, memarg.offset, value)
}

pub fn f32_store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop()?;
    let addr = stack.pop_u32()?;
    memory.write_u32(addr, memarg.offset, value.as_u32())
}

pub fn f64_store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop()?;
    let addr = stack.pop_u32()?;
    memory.write_u64(addr, memarg.offset, value.as_u64())
}

/// i32.store8 - store the low byte
pub fn i32_store8(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u32()?;
    let addr = stack.pop_u32()?;
    memory.write_u8(addr, memarg.offset, value as u8)
}

pub fn i32_store16(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u32()?;
    let addr = stack.pop_u32()?;
    memory.write_u16(addr, memarg.offset, value as u16)
}

pub fn i64_store8(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u64()?;
    let addr = stack.pop_u32()?;
    memory.write_u8(addr, memarg.offset, value as u8)
}

pub fn i64_store16(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u64()?;
    let addr = stack.pop_u32()?;
    memory.write_u16(addr, memarg.offset, value as u16)
}

pub fn i64_store32(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), Trap> {
    let value = stack.pop_u64()?;
    let addr = stack.pop_u32()?;
    memory.write_u32(addr, memarg.offset, value as u32)
}

// ============================================================================
// Memory Size and Grow (Section 4.4.7.3 / 4.4.7.4)
// ============================================================================

/// memory.size
/// [] → [i32], the current size in pages
pub fn memory_size(stack: &mut Stack, memory: &Memory) -> Result<(), Trap> {
    stack.push(Value::from_u32(memory.size()));
    Ok(())
}

/// memory.grow
/// [i32] → [i32]
///
/// Pushes the previous size in pages, or -1 if the memory cannot grow by the
/// requested amount. Failure to grow is not a trap.
pub fn memory_grow(stack: &mut Stack, memory: &mut Memory) -> Result<(), Trap> {
    let delta = stack.pop_u32()?;
    stack.push_i32(memory.grow(delta));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::parser::instruction::Instruction::*;
    use crate::parser::instruction::MemArg;
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::{Trap, TypedValue, Value};

    fn memarg(offset: u32) -> MemArg {
        MemArg { align: 0, offset }
    }

    #[test]
    fn store_then_load() {
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(16))
            .inst(I32Const(0x1234_5678))
            .inst(I32Store(memarg(0)))
            .inst(I32Const(16))
            .inst(I32Load(memarg(0)))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0x1234_5678)]);
    }

    #[test]
    fn little_endian_and_offsets() {
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(0))
            .inst(I32Const(0x1234_5678))
            .inst(I32Store(memarg(8)))
            .inst(I32Const(8))
            .inst(I32Load8U(memarg(0)))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0x78)]);
    }

    #[test]
    fn narrow_loads_extend() {
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(0))
            .inst(I32Const(0xff))
            .inst(I32Store8(memarg(0)))
            .inst(I32Const(0))
            .inst(I64Load8S(memarg(0)))
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(-1)]);

        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(0))
            .inst(I64Const(-1))
            .inst(I64Store(memarg(0)))
            .inst(I32Const(0))
            .inst(I64Load32U(memarg(0)))
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(0xffff_ffff)]);
    }

    #[test]
    fn float_bits_round_trip_through_memory() {
        ExecutorTest::new()
            .with_memory()
            .arg(TypedValue::F64(-2.5))
            .inst(I32Const(0))
            .inst(LocalGet(0))
            .inst(F64Store(memarg(0)))
            .inst(I32Const(0))
            .inst(F64Load(memarg(0)))
            .returns(vec![ValueType::F64])
            .expect_stack(vec![Value::from_f64(-2.5)]);
    }

    #[test]
    fn out_of_bounds() {
        // Last four bytes of the page are fine, one further is not
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(65532))
            .inst(I32Load(memarg(0)))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0)]);

        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(65533))
            .inst(I32Load(memarg(0)))
            .returns(vec![ValueType::I32])
            .expect_trap(Trap::MemoryOutOfBounds);

        // Address plus offset does not wrap around
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(-1))
            .inst(I32Load8U(memarg(1)))
            .returns(vec![ValueType::I32])
            .expect_trap(Trap::MemoryOutOfBounds);
    }

    #[test]
    fn size_and_grow() {
        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(2))
            .inst(MemoryGrow)
            .inst(Drop)
            .inst(MemorySize)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(3)]);

        ExecutorTest::new()
            .with_memory()
            .inst(I32Const(70000))
            .inst(MemoryGrow)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(-1)]);
    }

    #[test]
    fn access_without_memory_traps() {
        ExecutorTest::new()
            .inst(I32Const(0))
            .inst(I32Load(memarg(0)))
            .returns(vec![ValueType::I32])
            .expect_trap(Trap::MemoryOutOfBounds);
    }
}
