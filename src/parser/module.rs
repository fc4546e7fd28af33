//! In-memory representation of a parsed WebAssembly module
//!
//! A [`Module`] is immutable once produced by the parser. It is deliberately
//! not `Clone`: instantiation consumes it, so a module value can only ever back
//! a single instance.

use std::fmt;

use super::instruction::Instruction;
use super::ParseError;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn decode(byte: u8) -> Result<Self, ParseError> {
        match byte {
            0x7f => Ok(ValueType::I32),
            0x7e => Ok(ValueType::I64),
            0x7d => Ok(ValueType::F32),
            0x7c => Ok(ValueType::F64),
            _ => Err(ParseError::InvalidValueType(byte)),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

/// A function signature: ordered parameters and at most one result in the MVP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub return_types: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(parameters: Vec<ValueType>, return_types: Vec<ValueType>) -> Self {
        FunctionType {
            parameters,
            return_types,
        }
    }

    /// The single result type, if the function produces one.
    pub fn result(&self) -> Option<ValueType> {
        self.return_types.first().copied()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params = self
            .parameters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>()
            .join(", ");
        match self.return_types.as_slice() {
            [] => write!(f, "({params}) -> nil"),
            [single] => write!(f, "({params}) -> {single}"),
            many => write!(
                f,
                "({params}) -> ({})",
                many.iter().map(ToString::to_string).collect::<Vec<String>>().join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "min={} max={}", self.min, max),
            None => write!(f, "min={}", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// Index into the type section
    Function(u32),
    Table(Limits),
    Memory(Limits),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ImportKind::Function(type_idx) => write!(f, "func sig={} <- {}.{}", type_idx, self.module, self.name),
            ImportKind::Table(limits) => write!(f, "table {} <- {}.{}", limits, self.module, self.name),
            ImportKind::Memory(limits) => write!(f, "memory {} <- {}.{}", limits, self.module, self.name),
            ImportKind::Global(global_type) => {
                write!(f, "global {} <- {}.{}", global_type.value_type, self.module, self.name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Table,
    Memory,
    Global,
}

impl ExportKind {
    pub fn decode(byte: u8) -> Result<Self, ParseError> {
        match byte {
            0x00 => Ok(ExportKind::Function),
            0x01 => Ok(ExportKind::Table),
            0x02 => Ok(ExportKind::Memory),
            0x03 => Ok(ExportKind::Global),
            _ => Err(ParseError::Malformed("invalid export kind")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

/// A constant expression as permitted in global initialisers and segment offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    GlobalGet(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: ConstExpr,
}

/// An active element segment initialising the function table.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub offset: ConstExpr,
    pub functions: Vec<u32>,
}

/// An active data segment initialising linear memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub offset: ConstExpr,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Declared locals, expanded one entry per local (parameters excluded)
    pub locals: Vec<ValueType>,
    /// Flat instruction sequence with resolved control-flow targets,
    /// always terminated by the function-level `end`
    pub instructions: Vec<Instruction>,
}

/// A parsed and structurally validated WebAssembly module.
#[derive(Debug, Default)]
pub struct Module {
    pub types: Vec<FunctionType>,
    pub imports: Vec<Import>,
    /// Type index of each module-defined function
    pub functions: Vec<u32>,
    pub table: Option<Limits>,
    pub memory: Option<Limits>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    pub code: Vec<FunctionBody>,
}

impl Module {
    /// Types of the imported functions, in import declaration order.
    pub fn imported_function_types(&self) -> impl Iterator<Item = &FunctionType> + '_ {
        self.imports.iter().filter_map(move |import| match import.kind {
            ImportKind::Function(type_idx) => self.types.get(type_idx as usize),
            _ => None,
        })
    }

    pub fn imported_function_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|import| matches!(import.kind, ImportKind::Function(_)))
            .count()
    }

    /// Total size of the function index space (imports followed by definitions).
    pub fn function_count(&self) -> usize {
        self.imported_function_count() + self.functions.len()
    }

    /// Signature of a function in the combined index space.
    pub fn function_type(&self, func_idx: u32) -> Option<&FunctionType> {
        let imported = self.imported_function_count();
        let idx = func_idx as usize;
        if idx < imported {
            self.imported_function_types().nth(idx)
        } else {
            let type_idx = *self.functions.get(idx - imported)?;
            self.types.get(type_idx as usize)
        }
    }

    /// Body of a module-defined function, or `None` for imports and bad indices.
    pub fn function_body(&self, func_idx: u32) -> Option<&FunctionBody> {
        let idx = (func_idx as usize).checked_sub(self.imported_function_count())?;
        self.code.get(idx)
    }

    pub fn find_export(&self, name: &str, kind: ExportKind) -> Option<u32> {
        self.exports
            .iter()
            .find(|export| export.kind == kind && export.name == name)
            .map(|export| export.index)
    }

    pub fn find_exported_function(&self, name: &str) -> Option<u32> {
        self.find_export(name, ExportKind::Function)
    }

    /// Imports that are not functions; only function imports can be linked.
    pub fn non_function_imports(&self) -> impl Iterator<Item = &Import> + '_ {
        self.imports
            .iter()
            .filter(|import| !matches!(import.kind, ImportKind::Function(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> Module {
        Module {
            types: vec![
                FunctionType::new(vec![], vec![ValueType::I32]),
                FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]),
            ],
            imports: vec![
                Import {
                    module: "env".to_string(),
                    name: "counter".to_string(),
                    kind: ImportKind::Global(GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    }),
                },
                Import {
                    module: "env".to_string(),
                    name: "div".to_string(),
                    kind: ImportKind::Function(1),
                },
            ],
            functions: vec![0],
            exports: vec![Export {
                name: "answer".to_string(),
                kind: ExportKind::Function,
                index: 1,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_function_index_space() {
        let module = sample_module();
        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(module.function_count(), 2);
        assert_eq!(module.function_type(0), Some(&module.types[1]));
        assert_eq!(module.function_type(1), Some(&module.types[0]));
        assert_eq!(module.function_type(2), None);
        assert!(module.function_body(0).is_none());
    }

    #[test]
    fn test_exports_and_imports() {
        let module = sample_module();
        assert_eq!(module.find_exported_function("answer"), Some(1));
        assert_eq!(module.find_exported_function("missing"), None);
        assert_eq!(module.find_export("answer", ExportKind::Memory), None);
        assert_eq!(module.non_function_imports().count(), 1);
    }

    #[test]
    fn test_function_type_display() {
        assert_eq!(FunctionType::default().to_string(), "() -> nil");
        assert_eq!(
            FunctionType::new(vec![ValueType::I32, ValueType::F64], vec![ValueType::I64]).to_string(),
            "(i32, f64) -> i64"
        );
    }
}
