//! Instruction decoding from binary format
//!
//! Decodes a function body into the flat instruction vector, resolving
//! `else`/`end` positions of structured control instructions and checking
//! every immediate index against the module that contains the body.

use super::super::limits;
use super::{BlockType, Instruction, MemArg};
use crate::parser::module::{FunctionType, ValueType};
use crate::parser::reader::Reader;
use crate::parser::ParseError;

const BLOCK_TYPE_EMPTY: u8 = 0x40;

/// Index spaces visible to a function body
pub struct BodyContext<'m> {
    pub types: &'m [FunctionType],
    pub function_count: u32,
    pub global_count: u32,
    /// Parameters plus declared locals
    pub local_count: u32,
    pub has_memory: bool,
    pub has_table: bool,
}

impl MemArg {
    pub fn decode(reader: &mut Reader) -> Result<Self, ParseError> {
        let align = reader.read_vu32()?;
        let offset = reader.read_vu32()?;
        Ok(MemArg { align, offset })
    }
}

impl BlockType {
    pub fn decode(reader: &mut Reader) -> Result<Self, ParseError> {
        match reader.read_byte()? {
            BLOCK_TYPE_EMPTY => Ok(BlockType::Empty),
            byte @ 0x7c..=0x7f => Ok(BlockType::Value(ValueType::decode(byte)?)),
            _ => Err(ParseError::Unsupported("multi-value block type")),
        }
    }
}

/// Decode instructions up to and including the function-level `end`.
///
/// The reader must hold exactly the body's expression; trailing bytes after
/// the final `end` are rejected.
pub fn decode_function_body(reader: &mut Reader, ctx: &BodyContext) -> Result<Vec<Instruction>, ParseError> {
    let mut code: Vec<Instruction> = Vec::new();
    // Start positions of open structured instructions; `None` is the function itself
    let mut open: Vec<Option<usize>> = vec![None];

    loop {
        let pos = code.len();
        let instruction = decode_instruction(reader, ctx, open.len() as u32)?;

        match instruction {
            Instruction::Block { .. } | Instruction::Loop { .. } | Instruction::If { .. } => {
                open.push(Some(pos));
            }
            Instruction::Else { .. } => {
                let start = open.last().copied().flatten().ok_or(ParseError::UnbalancedControl)?;
                match &mut code[start] {
                    Instruction::If { else_: else_ @ None, .. } => *else_ = Some(pos as u32),
                    _ => return Err(ParseError::UnbalancedControl),
                }
            }
            Instruction::End => {
                code.push(Instruction::End);
                match open.pop().flatten() {
                    Some(start) => close_block(&mut code, start, pos),
                    None => break,
                }
                continue;
            }
            _ => {}
        }
        code.push(instruction);
    }

    if !reader.is_empty() {
        return Err(ParseError::Malformed("trailing bytes after function end"));
    }
    Ok(code)
}

fn close_block(code: &mut [Instruction], start: usize, end_pos: usize) {
    let end_pos = end_pos as u32;
    let else_pos = match &mut code[start] {
        Instruction::Block { end, .. } => {
            *end = end_pos;
            None
        }
        Instruction::If { else_, end, .. } => {
            *end = end_pos;
            *else_
        }
        _ => None,
    };
    if let Some(else_pos) = else_pos {
        if let Instruction::Else { end } = &mut code[else_pos as usize] {
            *end = end_pos;
        }
    }
}

fn check_index(index: u32, bound: u32, what: &'static str) -> Result<u32, ParseError> {
    if index < bound {
        Ok(index)
    } else {
        Err(ParseError::IndexOutOfRange(what, index))
    }
}

fn memarg(reader: &mut Reader, ctx: &BodyContext) -> Result<MemArg, ParseError> {
    if !ctx.has_memory {
        return Err(ParseError::IndexOutOfRange("memory", 0));
    }
    MemArg::decode(reader)
}

fn decode_instruction(reader: &mut Reader, ctx: &BodyContext, label_count: u32) -> Result<Instruction, ParseError> {
    use Instruction::*;

    let opcode = reader.read_byte()?;
    let instruction = match opcode {
        // Control
        0x00 => Unreachable,
        0x01 => Nop,
        0x02 => Block {
            block_type: BlockType::decode(reader)?,
            end: 0,
        },
        0x03 => Loop {
            block_type: BlockType::decode(reader)?,
        },
        0x04 => If {
            block_type: BlockType::decode(reader)?,
            else_: None,
            end: 0,
        },
        0x05 => Else { end: 0 },
        0x0B => End,
        0x0C => Br(check_index(reader.read_vu32()?, label_count, "label")?),
        0x0D => BrIf(check_index(reader.read_vu32()?, label_count, "label")?),
        0x0E => {
            let count = reader.read_count(limits::MAX_BR_TABLE_LABELS, "br_table labels")?;
            let mut labels = Vec::with_capacity(count as usize);
            for _ in 0..count {
                labels.push(check_index(reader.read_vu32()?, label_count, "label")?);
            }
            let default = check_index(reader.read_vu32()?, label_count, "label")?;
            BrTable { labels, default }
        }
        0x0F => Return,
        0x10 => Call(check_index(reader.read_vu32()?, ctx.function_count, "function")?),
        0x11 => {
            let type_idx = check_index(reader.read_vu32()?, ctx.types.len() as u32, "type")?;
            if reader.read_byte()? != 0x00 {
                return Err(ParseError::Malformed("call_indirect reserved byte"));
            }
            if !ctx.has_table {
                return Err(ParseError::IndexOutOfRange("table", 0));
            }
            CallIndirect { type_idx }
        }

        // Parametric
        0x1A => Drop,
        0x1B => Select,

        // Variable
        0x20 => LocalGet(check_index(reader.read_vu32()?, ctx.local_count, "local")?),
        0x21 => LocalSet(check_index(reader.read_vu32()?, ctx.local_count, "local")?),
        0x22 => LocalTee(check_index(reader.read_vu32()?, ctx.local_count, "local")?),
        0x23 => GlobalGet(check_index(reader.read_vu32()?, ctx.global_count, "global")?),
        0x24 => GlobalSet(check_index(reader.read_vu32()?, ctx.global_count, "global")?),

        // Memory
        0x28 => I32Load(memarg(reader, ctx)?),
        0x29 => I64Load(memarg(reader, ctx)?),
        0x2A => F32Load(memarg(reader, ctx)?),
        0x2B => F64Load(memarg(reader, ctx)?),
        0x2C => I32Load8S(memarg(reader, ctx)?),
        0x2D => I32Load8U(memarg(reader, ctx)?),
        0x2E => I32Load16S(memarg(reader, ctx)?),
        0x2F => I32Load16U(memarg(reader, ctx)?),
        0x30 => I64Load8S(memarg(reader, ctx)?),
        0x31 => I64Load8U(memarg(reader, ctx)?),
        0x32 => I64Load16S(memarg(reader, ctx)?),
        0x33 => I64Load16U(memarg(reader, ctx)?),
        0x34 => I64Load32S(memarg(reader, ctx)?),
        0x35 => I64Load32U(memarg(reader, ctx)?),
        0x36 => I32Store(memarg(reader, ctx)?),
        0x37 => I64Store(memarg(reader, ctx)?),
        0x38 => F32Store(memarg(reader, ctx)?),
        0x39 => F64Store(memarg(reader, ctx)?),
        0x3A => I32Store8(memarg(reader, ctx)?),
        0x3B => I32Store16(memarg(reader, ctx)?),
        0x3C => I64Store8(memarg(reader, ctx)?),
        0x3D => I64Store16(memarg(reader, ctx)?),
        0x3E => I64Store32(memarg(reader, ctx)?),
        0x3F | 0x40 => {
            if reader.read_byte()? != 0x00 {
                return Err(ParseError::Malformed("memory instruction reserved byte"));
            }
            if !ctx.has_memory {
                return Err(ParseError::IndexOutOfRange("memory", 0));
            }
            if opcode == 0x3F {
                MemorySize
            } else {
                MemoryGrow
            }
        }

        // Constants
        0x41 => I32Const(reader.read_vs32()?),
        0x42 => I64Const(reader.read_vs64()?),
        0x43 => F32Const(reader.read_f32()?),
        0x44 => F64Const(reader.read_f64()?),

        0x45..=0xC4 => numeric(opcode),

        0xFC => return Err(ParseError::Unsupported("0xfc prefixed instructions")),
        0xFD => return Err(ParseError::Unsupported("simd instructions")),
        _ => return Err(ParseError::UnknownOpcode(opcode)),
    };
    Ok(instruction)
}

/// Opcodes 0x45..=0xC4 have no immediates.
fn numeric(opcode: u8) -> Instruction {
    use Instruction::*;

    const TABLE: [Instruction; 128] = [
        // 0x45
        I32Eqz, I32Eq, I32Ne, I32LtS, I32LtU, I32GtS, I32GtU, I32LeS, I32LeU, I32GeS, I32GeU,
        // 0x50
        I64Eqz, I64Eq, I64Ne, I64LtS, I64LtU, I64GtS, I64GtU, I64LeS, I64LeU, I64GeS, I64GeU,
        // 0x5B
        F32Eq, F32Ne, F32Lt, F32Gt, F32Le, F32Ge,
        // 0x61
        F64Eq, F64Ne, F64Lt, F64Gt, F64Le, F64Ge,
        // 0x67
        I32Clz, I32Ctz, I32Popcnt, I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU,
        I32And, I32Or, I32Xor, I32Shl, I32ShrS, I32ShrU, I32Rotl, I32Rotr,
        // 0x79
        I64Clz, I64Ctz, I64Popcnt, I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU,
        I64And, I64Or, I64Xor, I64Shl, I64ShrS, I64ShrU, I64Rotl, I64Rotr,
        // 0x8B
        F32Abs, F32Neg, F32Ceil, F32Floor, F32Trunc, F32Nearest, F32Sqrt, F32Add, F32Sub, F32Mul,
        F32Div, F32Min, F32Max, F32Copysign,
        // 0x99
        F64Abs, F64Neg, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt, F64Add, F64Sub, F64Mul,
        F64Div, F64Min, F64Max, F64Copysign,
        // 0xA7
        I32WrapI64, I32TruncF32S, I32TruncF32U, I32TruncF64S, I32TruncF64U, I64ExtendI32S,
        I64ExtendI32U, I64TruncF32S, I64TruncF32U, I64TruncF64S, I64TruncF64U, F32ConvertI32S,
        F32ConvertI32U, F32ConvertI64S, F32ConvertI64U, F32DemoteF64, F64ConvertI32S,
        F64ConvertI32U, F64ConvertI64S, F64ConvertI64U, F64PromoteF32, I32ReinterpretF32,
        I64ReinterpretF64, F32ReinterpretI32, F64ReinterpretI64,
        // 0xC0
        I32Extend8S, I32Extend16S, I64Extend8S, I64Extend16S, I64Extend32S,
    ];

    TABLE[(opcode - 0x45) as usize].clone()
}
