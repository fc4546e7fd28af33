//! WebAssembly instruction executor
//!
//! [`execute`] runs one function of an instance. Calls between Wasm
//! functions of the same instance push a [`CallFrame`] onto the executor's
//! frame stack instead of recursing, and blocks, loops and branches only move
//! the program counter. Native recursion happens only when a call leaves the
//! instance through an [`ExternalFunction`], which may re-enter `execute`.
//!
//! Every activation carries a depth. A call issued from depth `d` runs at
//! `d + 1`, and a call at or beyond the instance's configured limit traps
//! before any frame is created.

use super::{
    control::{Label, LabelType},
    frame::CallFrame,
    imports::ExternalFunction,
    instance::Instance,
    memory::Memory,
    ops::{bitwise, comparison, conversion, memory as mem, numeric, parametric, variable},
    stack::Stack,
    ExecutionResult, Trap, Value,
};
use crate::parser::instruction::{BlockType, Instruction};
use log::{debug, trace};

/// Native stack that must remain before an activation starts; below this a
/// fresh segment is switched to. One hop through a host function back into
/// `execute` uses far less than this, even unoptimised.
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each native stack segment allocated once the red zone is reached
const STACK_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// Execute function `function_index` of `instance` with `args` at call depth
/// `depth`.
///
/// Imported functions are dispatched to their [`ExternalFunction`]; the
/// host receives `depth` unchanged since this call is its activation.
///
/// Host functions and cross-instance imports re-enter `execute` natively, so
/// each activation first makes sure enough native stack is left, moving onto
/// a heap-allocated segment if it is not. Together with the depth limit this
/// keeps any call graph from overflowing the thread's stack.
pub fn execute(instance: &Instance, function_index: u32, args: &[Value], depth: u32) -> ExecutionResult {
    let result = if depth >= instance.config().call_depth_limit {
        Err(Trap::CallStackExhausted)
    } else {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            invoke(instance, function_index, args, depth)
        })
    };
    if let Err(trap) = &result {
        debug!("function {} trapped at depth {}: {}", function_index, depth, trap);
    }
    result.into()
}

fn invoke(instance: &Instance, func_idx: u32, args: &[Value], depth: u32) -> Result<Option<Value>, Trap> {
    let func_type = instance.function_type(func_idx).ok_or(Trap::UndefinedFunction(func_idx))?;
    if args.len() != func_type.parameters.len() {
        return Err(Trap::ArgumentCountMismatch {
            expected: func_type.parameters.len(),
            actual: args.len(),
        });
    }

    trace!("call function {} at depth {}", func_idx, depth);
    if let Some(import) = instance.imported_function(func_idx) {
        return call_external(instance, import, args, depth);
    }

    let mut executor = Executor::new(instance);
    executor.enter(func_idx, args.to_vec(), depth)?;
    executor.run()
}

fn call_external(
    instance: &Instance,
    import: &ExternalFunction,
    args: &[Value],
    depth: u32,
) -> Result<Option<Value>, Trap> {
    let returns_value = import.func_type().result().is_some();
    match import.call(instance, args, depth) {
        ExecutionResult::Trapped(trap) => Err(trap),
        ExecutionResult::Value(value) if returns_value => Ok(Some(value)),
        ExecutionResult::Value(_) => Ok(None),
        ExecutionResult::Void if returns_value => Err(Trap::Host("host function returned no value".to_string())),
        ExecutionResult::Void => Ok(None),
    }
}

/// What the run loop does after an instruction
enum Flow {
    Continue,
    Call(u32),
    Return,
}

struct Executor<'a> {
    instance: &'a Instance,
    stack: Stack,
    frames: Vec<CallFrame<'a>>,
}

impl<'a> Executor<'a> {
    fn new(instance: &'a Instance) -> Self {
        Executor {
            instance,
            stack: Stack::new(),
            frames: Vec::new(),
        }
    }

    /// Push a frame for a module-defined function.
    fn enter(&mut self, func_idx: u32, args: Vec<Value>, depth: u32) -> Result<(), Trap> {
        let instance = self.instance;
        let func_type = instance.function_type(func_idx).ok_or(Trap::UndefinedFunction(func_idx))?;
        let body = instance.function_body(func_idx).ok_or(Trap::UndefinedFunction(func_idx))?;
        self.frames
            .push(CallFrame::new(func_idx, func_type, body, args, self.stack.depth(), depth));
        Ok(())
    }

    fn run(&mut self) -> Result<Option<Value>, Trap> {
        loop {
            let flow = {
                let frame = self.frames.last_mut().ok_or(Trap::StackUnderflow)?;
                let code = frame.code;
                match code.get(frame.pc) {
                    Some(instruction) => {
                        frame.pc += 1;
                        step(self.instance, &mut self.stack, frame, instruction)?
                    }
                    None => Flow::Return,
                }
            };

            match flow {
                Flow::Continue => {}
                Flow::Call(func_idx) => self.call(func_idx)?,
                Flow::Return => {
                    let frame = self.frames.pop().ok_or(Trap::StackUnderflow)?;
                    let result = self.leave(&frame)?;
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    if let Some(value) = result {
                        self.stack.push(value);
                    }
                }
            }
        }
    }

    /// Issue a call from the current frame at one level deeper.
    fn call(&mut self, func_idx: u32) -> Result<(), Trap> {
        let instance = self.instance;
        let depth = self.frames.last().map_or(0, |frame| frame.depth) + 1;
        if depth >= instance.config().call_depth_limit {
            return Err(Trap::CallStackExhausted);
        }

        let func_type = instance.function_type(func_idx).ok_or(Trap::UndefinedFunction(func_idx))?;
        let args = self.stack.pop_n(func_type.parameters.len())?;
        trace!("call function {} at depth {}", func_idx, depth);

        match instance.imported_function(func_idx) {
            Some(import) => {
                if let Some(value) = call_external(instance, import, &args, depth)? {
                    self.stack.push(value);
                }
                Ok(())
            }
            None => self.enter(func_idx, args, depth),
        }
    }

    /// Take the frame's result and drop its operands.
    fn leave(&mut self, frame: &CallFrame) -> Result<Option<Value>, Trap> {
        if self.stack.depth() < frame.stack_base + frame.arity {
            return Err(Trap::StackUnderflow);
        }
        let result = match frame.arity {
            0 => None,
            _ => Some(self.stack.pop()?),
        };
        self.stack.unwind(frame.stack_base, 0)?;
        Ok(result)
    }
}

fn block_label(label_type: LabelType, block_type: &BlockType, stack: &Stack, continuation: usize) -> Label {
    Label {
        label_type,
        arity: block_type.arity(),
        stack_height: stack.depth(),
        continuation,
    }
}

/// Branch to the label `depth` levels out.
///
/// WebAssembly 4.4.8 (br l): the label's arity values are kept, everything
/// pushed since the label was entered is discarded.
fn branch(stack: &mut Stack, frame: &mut CallFrame, depth: u32) -> Result<Flow, Trap> {
    let label = *frame.labels.get(depth).ok_or(Trap::InvalidLabel(depth))?;
    if label.label_type == LabelType::Function {
        return Ok(Flow::Return);
    }
    stack.unwind(label.stack_height, label.arity)?;
    match label.label_type {
        // A loop label stays active, the branch re-enters the body
        LabelType::Loop => frame.labels.unwind_to(depth),
        _ => frame.labels.unwind_to(depth + 1),
    }
    frame.pc = label.continuation;
    Ok(Flow::Continue)
}

fn with_memory<R>(instance: &Instance, f: impl FnOnce(&Memory) -> Result<R, Trap>) -> Result<R, Trap> {
    let memory = instance.memory().ok_or(Trap::MemoryOutOfBounds)?;
    let memory = memory.try_borrow().map_err(|_| Trap::Host("memory is borrowed mutably".to_string()))?;
    f(&memory)
}

fn with_memory_mut<R>(instance: &Instance, f: impl FnOnce(&mut Memory) -> Result<R, Trap>) -> Result<R, Trap> {
    let memory = instance.memory().ok_or(Trap::MemoryOutOfBounds)?;
    let mut memory = memory
        .try_borrow_mut()
        .map_err(|_| Trap::Host("memory is already borrowed".to_string()))?;
    f(&mut memory)
}

/// Execute a single instruction of `frame`.
fn step(instance: &Instance, stack: &mut Stack, frame: &mut CallFrame, instruction: &Instruction) -> Result<Flow, Trap> {
    use Instruction::*;

    macro_rules! load {
        ($op:path, $memarg:expr) => {
            with_memory(instance, |memory| $op(stack, memory, $memarg))?
        };
    }

    macro_rules! store {
        ($op:path, $memarg:expr) => {
            with_memory_mut(instance, |memory| $op(stack, memory, $memarg))?
        };
    }

    match instruction {
        // Control
        Unreachable => return Err(Trap::Unreachable),
        Nop => {}
        Block { block_type, end } => {
            let label = block_label(LabelType::Block, block_type, stack, *end as usize + 1);
            frame.labels.push(label);
        }
        Loop { block_type: _ } => {
            // Branching to a loop carries no values in the MVP
            let label = Label {
                label_type: LabelType::Loop,
                arity: 0,
                stack_height: stack.depth(),
                continuation: frame.pc,
            };
            frame.labels.push(label);
        }
        If { block_type, else_, end } => {
            let condition = stack.pop_i32()?;
            let continuation = *end as usize + 1;
            if condition != 0 {
                frame.labels.push(block_label(LabelType::If, block_type, stack, continuation));
            } else if let Some(else_pos) = else_ {
                frame.labels.push(block_label(LabelType::If, block_type, stack, continuation));
                frame.pc = *else_pos as usize + 1;
            } else {
                frame.pc = continuation;
            }
        }
        // Reached only at the end of a then-branch; its `end` pops the label
        Else { end } => frame.pc = *end as usize,
        End => {
            if let Some(label) = frame.labels.pop() {
                if label.label_type == LabelType::Function {
                    return Ok(Flow::Return);
                }
            }
        }
        Br(depth) => return branch(stack, frame, *depth),
        BrIf(depth) => {
            if stack.pop_i32()? != 0 {
                return branch(stack, frame, *depth);
            }
        }
        BrTable { labels, default } => {
            let index = stack.pop_u32()? as usize;
            let depth = labels.get(index).copied().unwrap_or(*default);
            return branch(stack, frame, depth);
        }
        Return => return Ok(Flow::Return),
        Call(func_idx) => return Ok(Flow::Call(*func_idx)),
        CallIndirect { type_idx } => {
            let element = stack.pop_u32()?;
            let table = instance.table().ok_or(Trap::UndefinedElement(element))?;
            let func_idx = table.get(element)?;
            let expected = instance
                .module()
                .types
                .get(*type_idx as usize)
                .ok_or(Trap::UndefinedElement(element))?;
            let actual = instance.function_type(func_idx).ok_or(Trap::UndefinedFunction(func_idx))?;
            if expected != actual {
                return Err(Trap::IndirectCallTypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            return Ok(Flow::Call(func_idx));
        }

        // Parametric
        Drop => parametric::drop(stack)?,
        Select => parametric::select(stack)?,

        // Variable
        LocalGet(idx) => variable::local_get(stack, &frame.locals, *idx)?,
        LocalSet(idx) => variable::local_set(stack, &mut frame.locals, *idx)?,
        LocalTee(idx) => variable::local_tee(stack, &mut frame.locals, *idx)?,
        GlobalGet(idx) => variable::global_get(stack, instance, *idx)?,
        GlobalSet(idx) => variable::global_set(stack, instance, *idx)?,

        // Memory
        I32Load(memarg) => load!(mem::i32_load, memarg),
        I64Load(memarg) => load!(mem::i64_load, memarg),
        F32Load(memarg) => load!(mem::f32_load, memarg),
        F64Load(memarg) => load!(mem::f64_load, memarg),
        I32Load8S(memarg) => load!(mem::i32_load8_s, memarg),
        I32Load8U(memarg) => load!(mem::i32_load8_u, memarg),
        I32Load16S(memarg) => load!(mem::i32_load16_s, memarg),
        I32Load16U(memarg) => load!(mem::i32_load16_u, memarg),
        I64Load8S(memarg) => load!(mem::i64_load8_s, memarg),
        I64Load8U(memarg) => load!(mem::i64_load8_u, memarg),
        I64Load16S(memarg) => load!(mem::i64_load16_s, memarg),
        I64Load16U(memarg) => load!(mem::i64_load16_u, memarg),
        I64Load32S(memarg) => load!(mem::i64_load32_s, memarg),
        I64Load32U(memarg) => load!(mem::i64_load32_u, memarg),
        I32Store(memarg) => store!(mem::i32_store, memarg),
        I64Store(memarg) => store!(mem::i64_store, memarg),
        F32Store(memarg) => store!(mem::f32_store, memarg),
        F64Store(memarg) => store!(mem::f64_store, memarg),
        I32Store8(memarg) => store!(mem::i32_store8, memarg),
        I32Store16(memarg) => store!(mem::i32_store16, memarg),
        I64Store8(memarg) => store!(mem::i64_store8, memarg),
        I64Store16(memarg) => store!(mem::i64_store16, memarg),
        I64Store32(memarg) => store!(mem::i64_store32, memarg),
        MemorySize => with_memory(instance, |memory| mem::memory_size(stack, memory))?,
        MemoryGrow => with_memory_mut(instance, |memory| mem::memory_grow(stack, memory))?,

        // Constants
        I32Const(v) => stack.push_i32(*v),
        I64Const(v) => stack.push_i64(*v),
        F32Const(v) => stack.push_f32(*v),
        F64Const(v) => stack.push_f64(*v),

        // i32
        I32Eqz => comparison::i32_eqz(stack)?,
        I32Eq => comparison::i32_eq(stack)?,
        I32Ne => comparison::i32_ne(stack)?,
        I32LtS => comparison::i32_lt_s(stack)?,
        I32LtU => comparison::i32_lt_u(stack)?,
        I32GtS => comparison::i32_gt_s(stack)?,
        I32GtU => comparison::i32_gt_u(stack)?,
        I32LeS => comparison::i32_le_s(stack)?,
        I32LeU => comparison::i32_le_u(stack)?,
        I32GeS => comparison::i32_ge_s(stack)?,
        I32GeU => comparison::i32_ge_u(stack)?,
        I32Clz => numeric::i32_clz(stack)?,
        I32Ctz => numeric::i32_ctz(stack)?,
        I32Popcnt => numeric::i32_popcnt(stack)?,
        I32Add => numeric::i32_add(stack)?,
        I32Sub => numeric::i32_sub(stack)?,
        I32Mul => numeric::i32_mul(stack)?,
        I32DivS => numeric::i32_div_s(stack)?,
        I32DivU => numeric::i32_div_u(stack)?,
        I32RemS => numeric::i32_rem_s(stack)?,
        I32RemU => numeric::i32_rem_u(stack)?,
        I32And => bitwise::i32_and(stack)?,
        I32Or => bitwise::i32_or(stack)?,
        I32Xor => bitwise::i32_xor(stack)?,
        I32Shl => bitwise::i32_shl(stack)?,
        I32ShrS => bitwise::i32_shr_s(stack)?,
        I32ShrU => bitwise::i32_shr_u(stack)?,
        I32Rotl => bitwise::i32_rotl(stack)?,
        I32Rotr => bitwise::i32_rotr(stack)?,

        // i64
        I64Eqz => comparison::i64_eqz(stack)?,
        I64Eq => comparison::i64_eq(stack)?,
        I64Ne => comparison::i64_ne(stack)?,
        I64LtS => comparison::i64_lt_s(stack)?,
        I64LtU => comparison::i64_lt_u(stack)?,
        I64GtS => comparison::i64_gt_s(stack)?,
        I64GtU => comparison::i64_gt_u(stack)?,
        I64LeS => comparison::i64_le_s(stack)?,
        I64LeU => comparison::i64_le_u(stack)?,
        I64GeS => comparison::i64_ge_s(stack)?,
        I64GeU => comparison::i64_ge_u(stack)?,
        I64Clz => numeric::i64_clz(stack)?,
        I64Ctz => numeric::i64_ctz(stack)?,
        I64Popcnt => numeric::i64_popcnt(stack)?,
        I64Add => numeric::i64_add(stack)?,
        I64Sub => numeric::i64_sub(stack)?,
        I64Mul => numeric::i64_mul(stack)?,
        I64DivS => numeric::i64_div_s(stack)?,
        I64DivU => numeric::i64_div_u(stack)?,
        I64RemS => numeric::i64_rem_s(stack)?,
        I64RemU => numeric::i64_rem_u(stack)?,
        I64And => bitwise::i64_and(stack)?,
        I64Or => bitwise::i64_or(stack)?,
        I64Xor => bitwise::i64_xor(stack)?,
        I64Shl => bitwise::i64_shl(stack)?,
        I64ShrS => bitwise::i64_shr_s(stack)?,
        I64ShrU => bitwise::i64_shr_u(stack)?,
        I64Rotl => bitwise::i64_rotl(stack)?,
        I64Rotr => bitwise::i64_rotr(stack)?,

        // f32
        F32Eq => comparison::f32_eq(stack)?,
        F32Ne => comparison::f32_ne(stack)?,
        F32Lt => comparison::f32_lt(stack)?,
        F32Gt => comparison::f32_gt(stack)?,
        F32Le => comparison::f32_le(stack)?,
        F32Ge => comparison::f32_ge(stack)?,
        F32Abs => numeric::f32_abs(stack)?,
        F32Neg => numeric::f32_neg(stack)?,
        F32Ceil => numeric::f32_ceil(stack)?,
        F32Floor => numeric::f32_floor(stack)?,
        F32Trunc => numeric::f32_trunc(stack)?,
        F32Nearest => numeric::f32_nearest(stack)?,
        F32Sqrt => numeric::f32_sqrt(stack)?,
        F32Add => numeric::f32_add(stack)?,
        F32Sub => numeric::f32_sub(stack)?,
        F32Mul => numeric::f32_mul(stack)?,
        F32Div => numeric::f32_div(stack)?,
        F32Min => numeric::f32_min(stack)?,
        F32Max => numeric::f32_max(stack)?,
        F32Copysign => numeric::f32_copysign(stack)?,

        // f64
        F64Eq => comparison::f64_eq(stack)?,
        F64Ne => comparison::f64_ne(stack)?,
        F64Lt => comparison::f64_lt(stack)?,
        F64Gt => comparison::f64_gt(stack)?,
        F64Le => comparison::f64_le(stack)?,
        F64Ge => comparison::f64_ge(stack)?,
        F64Abs => numeric::f64_abs(stack)?,
        F64Neg => numeric::f64_neg(stack)?,
        F64Ceil => numeric::f64_ceil(stack)?,
        F64Floor => numeric::f64_floor(stack)?,
        F64Trunc => numeric::f64_trunc(stack)?,
        F64Nearest => numeric::f64_nearest(stack)?,
        F64Sqrt => numeric::f64_sqrt(stack)?,
        F64Add => numeric::f64_add(stack)?,
        F64Sub => numeric::f64_sub(stack)?,
        F64Mul => numeric::f64_mul(stack)?,
        F64Div => numeric::f64_div(stack)?,
        F64Min => numeric::f64_min(stack)?,
        F64Max => numeric::f64_max(stack)?,
        F64Copysign => numeric::f64_copysign(stack)?,

        // Conversions
        I32WrapI64 => conversion::i32_wrap_i64(stack)?,
        I32TruncF32S => conversion::i32_trunc_f32_s(stack)?,
        I32TruncF32U => conversion::i32_trunc_f32_u(stack)?,
        I32TruncF64S => conversion::i32_trunc_f64_s(stack)?,
        I32TruncF64U => conversion::i32_trunc_f64_u(stack)?,
        I64ExtendI32S => conversion::i64_extend_i32_s(stack)?,
        I64ExtendI32U => conversion::i64_extend_i32_u(stack)?,
        I64TruncF32S => conversion::i64_trunc_f32_s(stack)?,
        I64TruncF32U => conversion::i64_trunc_f32_u(stack)?,
        I64TruncF64S => conversion::i64_trunc_f64_s(stack)?,
        I64TruncF64U => conversion::i64_trunc_f64_u(stack)?,
        F32ConvertI32S => conversion::f32_convert_i32_s(stack)?,
        F32ConvertI32U => conversion::f32_convert_i32_u(stack)?,
        F32ConvertI64S => conversion::f32_convert_i64_s(stack)?,
        F32ConvertI64U => conversion::f32_convert_i64_u(stack)?,
        F32DemoteF64 => conversion::f32_demote_f64(stack)?,
        F64ConvertI32S => conversion::f64_convert_i32_s(stack)?,
        F64ConvertI32U => conversion::f64_convert_i32_u(stack)?,
        F64ConvertI64S => conversion::f64_convert_i64_s(stack)?,
        F64ConvertI64U => conversion::f64_convert_i64_u(stack)?,
        F64PromoteF32 => conversion::f64_promote_f32(stack)?,
        I32ReinterpretF32 => conversion::i32_reinterpret_f32(stack)?,
        I64ReinterpretF64 => conversion::i64_reinterpret_f64(stack)?,
        F32ReinterpretI32 => conversion::f32_reinterpret_i32(stack)?,
        F64ReinterpretI64 => conversion::f64_reinterpret_i64(stack)?,
        I32Extend8S => conversion::i32_extend8_s(stack)?,
        I32Extend16S => conversion::i32_extend16_s(stack)?,
        I64Extend8S => conversion::i64_extend8_s(stack)?,
        I64Extend16S => conversion::i64_extend16_s(stack)?,
        I64Extend32S => conversion::i64_extend32_s(stack)?,
    }
    Ok(Flow::Continue)
}
