//! Variable operations for WebAssembly
//!
//! This module provides implementations of variable operations
//! as specified in the WebAssembly specification section 4.4.5 (Variable Instructions).
//! Locals belong to the current call frame; globals to the instance.

use super::*;
use crate::runtime::instance::Instance;

/// local.get x - Get local variable
///
/// 1. Let val be the value F.locals[x] of the current frame F.
/// 2. Push the value val to the stack.
pub fn local_get(stack: &mut Stack, locals: &[Value], local_idx: u32) -> Result<(), Trap> {
    let value = locals
        .get(local_idx as usize)
        .ok_or(Trap::LocalIndexOutOfBounds(local_idx))?;
    stack.push(*value);
    Ok(())
}

/// local.set x - Set local variable
///
/// 1. Pop the value val from the stack.
/// 2. Replace F.locals[x] with the value val.
pub fn local_set(stack: &mut Stack, locals: &mut [Value], local_idx: u32) -> Result<(), Trap> {
    let value = stack.pop()?;
    let slot = locals
        .get_mut(local_idx as usize)
        .ok_or(Trap::LocalIndexOutOfBounds(local_idx))?;
    *slot = value;
    Ok(())
}

/// local.tee x - Set local variable but keep value on stack
pub fn local_tee(stack: &mut Stack, locals: &mut [Value], local_idx: u32) -> Result<(), Trap> {
    let value = stack.peek().ok_or(Trap::StackUnderflow)?;
    let slot = locals
        .get_mut(local_idx as usize)
        .ok_or(Trap::LocalIndexOutOfBounds(local_idx))?;
    *slot = value;
    Ok(())
}

/// global.get x - Get global variable
pub fn global_get(stack: &mut Stack, instance: &Instance, global_idx: u32) -> Result<(), Trap> {
    let value = instance.global_cell(global_idx)?.get();
    stack.push(value);
    Ok(())
}

/// global.set x - Set global variable
///
/// Validation rejects writes to immutable globals; executing one anyway
/// traps rather than changing a constant.
pub fn global_set(stack: &mut Stack, instance: &Instance, global_idx: u32) -> Result<(), Trap> {
    let cell = instance.global_cell(global_idx)?;
    if !instance.global_is_mutable(global_idx) {
        return Err(Trap::ImmutableGlobal(global_idx));
    }
    cell.set(stack.pop()?);
    Ok(())
}
