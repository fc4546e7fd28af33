//! WebAssembly binary format parser
//!
//! Decodes a binary module into a [`Module`], performing structural
//! validation along the way: section order and sizes, LEB128 encodings,
//! index ranges, balanced control nesting and function/code agreement.
//! Operand-stack typing is not checked here; the interpreter traps instead.

pub mod instruction;
pub mod limits;
pub mod module;
pub mod reader;

use log::trace;
use thiserror::Error;

use instruction::decode::BodyContext;
use module::{
    ConstExpr, DataSegment, ElementSegment, Export, ExportKind, FunctionBody, FunctionType, Global, GlobalType,
    Import, ImportKind, Limits, Module, ValueType,
};
use reader::Reader;

const MAGIC: u32 = 0x6d73_6100;
const VERSION: u32 = 1;
const FUNC_TYPE_FORM: u8 = 0x60;
const FUNCREF: u8 = 0x70;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("magic header not detected")]
    InvalidMagic,
    #[error("unknown binary version: {0}")]
    UnsupportedVersion(u32),
    #[error("integer representation too long")]
    IntegerTooLong,
    #[error("integer too large")]
    IntegerTooLarge,
    #[error("malformed UTF-8 encoding")]
    InvalidUtf8,
    #[error("unknown section id: {0}")]
    UnknownSection(u8),
    #[error("section {0} out of order")]
    SectionOutOfOrder(u8),
    #[error("section {0} size mismatch")]
    SectionSizeMismatch(u8),
    #[error("invalid value type: {0:#04x}")]
    InvalidValueType(u8),
    #[error("illegal opcode: {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unknown {0} {1}")]
    IndexOutOfRange(&'static str, u32),
    #[error("function and code section have inconsistent lengths")]
    FunctionCodeMismatch,
    #[error("unbalanced control structure")]
    UnbalancedControl,
    #[error("too many {0}")]
    TooMany(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("malformed module: {0}")]
    Malformed(&'static str),
}

/// Parse and structurally validate a binary module.
pub fn parse(bytes: &[u8]) -> Result<Module, ParseError> {
    let mut reader = Reader::new(bytes);
    read_header(&mut reader)?;

    let mut module = Module::default();
    let mut last_rank = 0u8;
    let mut saw_code = false;
    let mut data_count = None;

    while !reader.is_empty() {
        let id = reader.read_byte()?;
        let size = reader.read_vu32()? as usize;
        let mut section = reader.sub_reader(size)?;
        trace!("section #{} len = {}", id, size);

        if id != 0 {
            let rank = section_rank(id)?;
            if rank <= last_rank {
                return Err(ParseError::SectionOutOfOrder(id));
            }
            last_rank = rank;
        }

        match id {
            0 => {
                // Custom sections only need a well-formed name
                section.read_name()?;
                continue;
            }
            1 => read_section_type(&mut section, &mut module)?,
            2 => read_section_import(&mut section, &mut module)?,
            3 => read_section_function(&mut section, &mut module)?,
            4 => read_section_table(&mut section, &mut module)?,
            5 => read_section_memory(&mut section, &mut module)?,
            6 => read_section_global(&mut section, &mut module)?,
            7 => read_section_export(&mut section, &mut module)?,
            8 => read_section_start(&mut section, &mut module)?,
            9 => read_section_element(&mut section, &mut module)?,
            10 => {
                read_section_code(&mut section, &mut module)?;
                saw_code = true;
            }
            11 => read_section_data(&mut section, &mut module)?,
            12 => data_count = Some(section.read_vu32()?),
            _ => return Err(ParseError::UnknownSection(id)),
        }

        if !section.is_empty() {
            return Err(ParseError::SectionSizeMismatch(id));
        }
    }

    if !saw_code && !module.functions.is_empty() {
        return Err(ParseError::FunctionCodeMismatch);
    }
    if data_count.is_some_and(|count| count as usize != module.data.len()) {
        return Err(ParseError::Malformed("data count and data section have inconsistent lengths"));
    }

    Ok(module)
}

/// Whether `bytes` hold a well-formed module.
pub fn validate(bytes: &[u8]) -> bool {
    parse(bytes).is_ok()
}

fn read_header(reader: &mut Reader) -> Result<(), ParseError> {
    let magic = reader.read_u32().map_err(|_| ParseError::InvalidMagic)?;
    if magic != MAGIC {
        return Err(ParseError::InvalidMagic);
    }
    let version = reader.read_u32()?;
    if version != VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Position of a known section in the mandated order; data count sits
/// between element and code.
fn section_rank(id: u8) -> Result<u8, ParseError> {
    match id {
        1..=9 => Ok(id),
        12 => Ok(10),
        10 => Ok(11),
        11 => Ok(12),
        _ => Err(ParseError::UnknownSection(id)),
    }
}

fn read_value_types(reader: &mut Reader, limit: u32, what: &'static str) -> Result<Vec<ValueType>, ParseError> {
    let count = reader.read_count(limit, what)?;
    (0..count).map(|_| ValueType::decode(reader.read_byte()?)).collect()
}

fn read_limits(reader: &mut Reader, max_allowed: u32) -> Result<Limits, ParseError> {
    let limits = match reader.read_byte()? {
        0x00 => Limits {
            min: reader.read_vu32()?,
            max: None,
        },
        0x01 => Limits {
            min: reader.read_vu32()?,
            max: Some(reader.read_vu32()?),
        },
        _ => return Err(ParseError::Malformed("invalid limits flag")),
    };
    if limits.min > max_allowed || limits.max.map_or(false, |max| max > max_allowed) {
        return Err(ParseError::Malformed("limits exceed implementation bound"));
    }
    if limits.max.map_or(false, |max| max < limits.min) {
        return Err(ParseError::Malformed("size minimum must not be greater than maximum"));
    }
    Ok(limits)
}

fn read_table_type(reader: &mut Reader) -> Result<Limits, ParseError> {
    if reader.read_byte()? != FUNCREF {
        return Err(ParseError::Unsupported("table element type other than funcref"));
    }
    read_limits(reader, limits::MAX_TABLE_SIZE)
}

fn read_global_type(reader: &mut Reader) -> Result<GlobalType, ParseError> {
    let value_type = ValueType::decode(reader.read_byte()?)?;
    let mutable = match reader.read_byte()? {
        0x00 => false,
        0x01 => true,
        _ => return Err(ParseError::Malformed("invalid mutability")),
    };
    Ok(GlobalType { value_type, mutable })
}

fn read_const_expr(reader: &mut Reader, global_count: usize) -> Result<ConstExpr, ParseError> {
    let expr = match reader.read_byte()? {
        0x41 => ConstExpr::I32(reader.read_vs32()?),
        0x42 => ConstExpr::I64(reader.read_vs64()?),
        0x43 => ConstExpr::F32(reader.read_f32()?),
        0x44 => ConstExpr::F64(reader.read_f64()?),
        0x23 => {
            let idx = reader.read_vu32()?;
            if idx as usize >= global_count {
                return Err(ParseError::IndexOutOfRange("global", idx));
            }
            ConstExpr::GlobalGet(idx)
        }
        _ => return Err(ParseError::Malformed("constant expression required")),
    };
    if reader.read_byte()? != 0x0B {
        return Err(ParseError::Malformed("constant expression required"));
    }
    Ok(expr)
}

fn imported_count(module: &Module, matches: fn(&ImportKind) -> bool) -> usize {
    module.imports.iter().filter(|import| matches(&import.kind)).count()
}

fn global_count(module: &Module) -> usize {
    imported_count(module, |kind| matches!(kind, ImportKind::Global(_))) + module.globals.len()
}

fn has_memory(module: &Module) -> bool {
    module.memory.is_some() || imported_count(module, |kind| matches!(kind, ImportKind::Memory(_))) > 0
}

fn has_table(module: &Module) -> bool {
    module.table.is_some() || imported_count(module, |kind| matches!(kind, ImportKind::Table(_))) > 0
}

fn read_section_type(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_TYPES, "types")?;
    for _ in 0..count {
        if reader.read_byte()? != FUNC_TYPE_FORM {
            return Err(ParseError::Malformed("expected function type form"));
        }
        let parameters = read_value_types(reader, limits::MAX_FUNCTION_PARAMS, "function parameters")?;
        let return_types = read_value_types(reader, limits::MAX_FUNCTION_PARAMS, "function results")?;
        if return_types.len() > 1 {
            return Err(ParseError::Unsupported("multiple return values"));
        }
        module.types.push(FunctionType::new(parameters, return_types));
    }
    Ok(())
}

fn read_section_import(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_IMPORTS, "imports")?;
    for _ in 0..count {
        let module_name = reader.read_name()?;
        let name = reader.read_name()?;
        let kind = match reader.read_byte()? {
            0x00 => {
                let type_idx = reader.read_vu32()?;
                if type_idx as usize >= module.types.len() {
                    return Err(ParseError::IndexOutOfRange("type", type_idx));
                }
                ImportKind::Function(type_idx)
            }
            0x01 => ImportKind::Table(read_table_type(reader)?),
            0x02 => ImportKind::Memory(read_limits(reader, limits::MAX_MEMORY_PAGES)?),
            0x03 => ImportKind::Global(read_global_type(reader)?),
            _ => return Err(ParseError::Malformed("invalid import kind")),
        };
        module.imports.push(Import {
            module: module_name,
            name,
            kind,
        });
    }
    if imported_count(module, |kind| matches!(kind, ImportKind::Memory(_))) > 1
        || imported_count(module, |kind| matches!(kind, ImportKind::Table(_))) > 1
    {
        return Err(ParseError::TooMany("memories or tables"));
    }
    Ok(())
}

fn read_section_function(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_FUNCTIONS, "functions")?;
    for _ in 0..count {
        let type_idx = reader.read_vu32()?;
        if type_idx as usize >= module.types.len() {
            return Err(ParseError::IndexOutOfRange("type", type_idx));
        }
        module.functions.push(type_idx);
    }
    Ok(())
}

fn read_section_table(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(1, "tables")?;
    if count == 1 {
        if has_table(module) {
            return Err(ParseError::TooMany("tables"));
        }
        module.table = Some(read_table_type(reader)?);
    }
    Ok(())
}

fn read_section_memory(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(1, "memories")?;
    if count == 1 {
        if has_memory(module) {
            return Err(ParseError::TooMany("memories"));
        }
        module.memory = Some(read_limits(reader, limits::MAX_MEMORY_PAGES)?);
    }
    Ok(())
}

fn read_section_global(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_GLOBALS, "globals")?;
    for _ in 0..count {
        let global_type = read_global_type(reader)?;
        // Initialisers may only refer to globals declared before them
        let init = read_const_expr(reader, global_count(module))?;
        module.globals.push(Global { global_type, init });
    }
    Ok(())
}

fn read_section_export(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_EXPORTS, "exports")?;
    for _ in 0..count {
        let name = reader.read_name()?;
        let kind = ExportKind::decode(reader.read_byte()?)?;
        let index = reader.read_vu32()?;

        let (bound, what) = match kind {
            ExportKind::Function => (module.function_count(), "function"),
            ExportKind::Table => (has_table(module) as usize, "table"),
            ExportKind::Memory => (has_memory(module) as usize, "memory"),
            ExportKind::Global => (global_count(module), "global"),
        };
        if index as usize >= bound {
            return Err(ParseError::IndexOutOfRange(what, index));
        }
        if module.exports.iter().any(|export| export.name == name) {
            return Err(ParseError::Malformed("duplicate export name"));
        }
        module.exports.push(Export { name, kind, index });
    }
    Ok(())
}

fn read_section_start(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let func_idx = reader.read_vu32()?;
    let func_type = module
        .function_type(func_idx)
        .ok_or(ParseError::IndexOutOfRange("function", func_idx))?;
    if !func_type.parameters.is_empty() || !func_type.return_types.is_empty() {
        return Err(ParseError::Malformed("start function must have type [] -> []"));
    }
    module.start = Some(func_idx);
    Ok(())
}

fn read_section_element(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_ELEMENT_SEGMENTS, "element segments")?;
    for _ in 0..count {
        if reader.read_vu32()? != 0 {
            return Err(ParseError::Unsupported("passive or declarative element segment"));
        }
        if !has_table(module) {
            return Err(ParseError::IndexOutOfRange("table", 0));
        }
        let offset = read_const_expr(reader, global_count(module))?;
        let len = reader.read_count(limits::MAX_TABLE_SIZE, "element segment entries")?;
        let mut functions = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let func_idx = reader.read_vu32()?;
            if func_idx as usize >= module.function_count() {
                return Err(ParseError::IndexOutOfRange("function", func_idx));
            }
            functions.push(func_idx);
        }
        module.elements.push(ElementSegment { offset, functions });
    }
    Ok(())
}

fn read_section_code(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_FUNCTIONS, "function bodies")?;
    if count as usize != module.functions.len() {
        return Err(ParseError::FunctionCodeMismatch);
    }

    let imported = module.imported_function_count() as u32;
    for defined_idx in 0..count {
        let size = reader.read_vu32()? as usize;
        let mut body = reader.sub_reader(size)?;

        let mut locals = Vec::new();
        let groups = body.read_count(limits::MAX_FUNCTION_LOCALS, "local groups")?;
        for _ in 0..groups {
            let n = body.read_vu32()?;
            if locals.len() as u64 + n as u64 > limits::MAX_FUNCTION_LOCALS as u64 {
                return Err(ParseError::TooMany("locals"));
            }
            let value_type = ValueType::decode(body.read_byte()?)?;
            locals.extend(std::iter::repeat(value_type).take(n as usize));
        }

        let func_type = module
            .function_type(imported + defined_idx)
            .ok_or(ParseError::IndexOutOfRange("function", imported + defined_idx))?;
        let ctx = BodyContext {
            types: &module.types,
            function_count: module.function_count() as u32,
            global_count: global_count(module) as u32,
            local_count: (func_type.parameters.len() + locals.len()) as u32,
            has_memory: has_memory(module),
            has_table: has_table(module),
        };
        let instructions = instruction::decode_function_body(&mut body, &ctx)?;
        module.code.push(FunctionBody { locals, instructions });
    }
    Ok(())
}

fn read_section_data(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_count(limits::MAX_DATA_SEGMENTS, "data segments")?;
    for _ in 0..count {
        if reader.read_vu32()? != 0 {
            return Err(ParseError::Unsupported("passive data segment"));
        }
        if !has_memory(module) {
            return Err(ParseError::IndexOutOfRange("memory", 0));
        }
        let offset = read_const_expr(reader, global_count(module))?;
        let len = reader.read_vu32()? as usize;
        let bytes = reader.read_bytes(len)?.to_vec();
        module.data.push(DataSegment { offset, bytes });
    }
    Ok(())
}
