//! WebAssembly module instance
//!
//! Instantiation links a parsed [`Module`] with its imported functions and
//! allocates the instance state: linear memory, the function table and the
//! globals. The module is moved into the instance; on failure it is dropped
//! together with the supplied imports.

use super::config::Config;
use super::executor::execute;
use super::imports::ExternalFunction;
use super::memory::{Memory, MAX_PAGES};
use super::table::Table;
use super::{ExecutionResult, Trap, TypedValue, Value};
use crate::parser::module::{ConstExpr, ExportKind, FunctionBody, FunctionType, ImportKind, Module, ValueType};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, TryReserveError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstantiationError {
    #[error("module requires {expected} imported functions, {actual} provided")]
    ImportCountMismatch { expected: usize, actual: usize },
    #[error("imported function {index} has type {actual}, module expects {expected}")]
    ImportTypeMismatch {
        index: usize,
        expected: FunctionType,
        actual: FunctionType,
    },
    #[error("unknown import: {module}.{name}")]
    UnknownImport { module: String, name: String },
    #[error("unsupported {kind} import: {module}.{name}")]
    UnsupportedImport {
        module: String,
        name: String,
        kind: &'static str,
    },
    #[error("memory of {requested} pages exceeds the limit of {limit} pages")]
    MemoryLimitExceeded { requested: u32, limit: u32 },
    #[error("{kind} segment {index} does not fit")]
    SegmentOutOfBounds { kind: &'static str, index: usize },
    #[error("invalid constant expression: {0}")]
    InvalidConstExpr(&'static str),
    #[error("out of memory allocating instance state: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

/// Error from [`Instance::invoke`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("unknown export: {0}")]
    UnknownExport(String),
    #[error("argument {index} has type {actual}, expected {expected}")]
    ArgumentTypeMismatch {
        index: usize,
        expected: ValueType,
        actual: ValueType,
    },
    #[error(transparent)]
    Trap(#[from] Trap),
}

/// A linked, runnable module.
///
/// Execution only needs `&Instance`; memory and globals use interior
/// mutability and are borrowed for single instructions, so host functions
/// may re-enter the same instance.
pub struct Instance {
    module: Module,
    imported_functions: Vec<ExternalFunction>,
    memory: Option<RefCell<Memory>>,
    table: Option<Table>,
    globals: Vec<Cell<Value>>,
    exports: HashMap<String, u32>,
    config: Config,
}

/// Instantiate with the default [`Config`].
pub fn instantiate(module: Module, imported_functions: Vec<ExternalFunction>) -> Result<Instance, InstantiationError> {
    instantiate_with_config(module, imported_functions, Config::default())
}

/// Link `module` with `imported_functions` (one per imported function, in
/// declaration order) and allocate its state.
///
/// Each import's type is replaced by the module's declared type for its
/// slot, unless `config.strict_import_types` is set, in which case a
/// differing type fails instantiation. The start function is not run.
pub fn instantiate_with_config(
    module: Module,
    mut imported_functions: Vec<ExternalFunction>,
    config: Config,
) -> Result<Instance, InstantiationError> {
    if let Some(import) = module.non_function_imports().next() {
        let kind = match import.kind {
            ImportKind::Table(_) => "table",
            ImportKind::Memory(_) => "memory",
            _ => "global",
        };
        return Err(InstantiationError::UnsupportedImport {
            module: import.module.clone(),
            name: import.name.clone(),
            kind,
        });
    }

    let expected = module.imported_function_count();
    if imported_functions.len() != expected {
        return Err(InstantiationError::ImportCountMismatch {
            expected,
            actual: imported_functions.len(),
        });
    }

    for (index, (function, declared)) in imported_functions
        .iter_mut()
        .zip(module.imported_function_types())
        .enumerate()
    {
        if function.func_type() == declared {
            continue;
        }
        if config.strict_import_types {
            warn!(
                "imported function {} has type {}, module expects {}",
                index,
                function.func_type(),
                declared
            );
            return Err(InstantiationError::ImportTypeMismatch {
                index,
                expected: declared.clone(),
                actual: function.func_type().clone(),
            });
        }
        function.set_func_type(declared.clone());
    }

    let memory = match module.memory {
        Some(limits) => {
            if limits.min > config.memory_pages_limit {
                return Err(InstantiationError::MemoryLimitExceeded {
                    requested: limits.min,
                    limit: config.memory_pages_limit,
                });
            }
            let max = limits.max.unwrap_or(MAX_PAGES).min(config.memory_pages_limit);
            Some(Memory::new(limits.min, max)?)
        }
        None => None,
    };

    let mut globals: Vec<Value> = Vec::with_capacity(module.globals.len());
    for global in &module.globals {
        let value = eval_const_expr(&global.init, &globals)?;
        globals.push(value);
    }

    let mut table = module.table.map(Table::new).transpose()?;
    for (index, segment) in module.elements.iter().enumerate() {
        let offset = eval_offset(&segment.offset, &globals)?;
        let fits = table
            .as_mut()
            .map_or(false, |table| table.initialize(offset, &segment.functions));
        if !fits {
            return Err(InstantiationError::SegmentOutOfBounds { kind: "element", index });
        }
    }

    let mut memory = memory;
    for (index, segment) in module.data.iter().enumerate() {
        let offset = eval_offset(&segment.offset, &globals)?;
        let written = memory
            .as_mut()
            .map_or(false, |memory| memory.write_bytes(offset, &segment.bytes).is_ok());
        if !written {
            return Err(InstantiationError::SegmentOutOfBounds { kind: "data", index });
        }
    }

    let exports = module
        .exports
        .iter()
        .filter(|export| export.kind == ExportKind::Function)
        .map(|export| (export.name.clone(), export.index))
        .collect();

    debug!(
        "instantiated module: {} imported functions, {} defined functions, memory pages {:?}, depth limit {}",
        imported_functions.len(),
        module.functions.len(),
        memory.as_ref().map(Memory::size),
        config.call_depth_limit
    );

    Ok(Instance {
        module,
        imported_functions,
        memory: memory.map(RefCell::new),
        table,
        globals: globals.into_iter().map(Cell::new).collect(),
        exports,
        config,
    })
}

fn eval_const_expr(expr: &ConstExpr, globals: &[Value]) -> Result<Value, InstantiationError> {
    match *expr {
        ConstExpr::I32(v) => Ok(Value::from_i32(v)),
        ConstExpr::I64(v) => Ok(Value::from_i64(v)),
        ConstExpr::F32(v) => Ok(Value::from_f32(v)),
        ConstExpr::F64(v) => Ok(Value::from_f64(v)),
        ConstExpr::GlobalGet(idx) => globals
            .get(idx as usize)
            .copied()
            .ok_or(InstantiationError::InvalidConstExpr("global.get of an uninitialised global")),
    }
}

fn eval_offset(expr: &ConstExpr, globals: &[Value]) -> Result<u32, InstantiationError> {
    match expr {
        ConstExpr::I32(_) | ConstExpr::GlobalGet(_) => Ok(eval_const_expr(expr, globals)?.as_u32()),
        _ => Err(InstantiationError::InvalidConstExpr("segment offset must be i32")),
    }
}

impl Instance {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Signature of a function in the instance's function space
    /// (imports first, then module-defined functions).
    pub fn function_type(&self, func_idx: u32) -> Option<&FunctionType> {
        match self.defined_index(func_idx) {
            Some(defined) => {
                let type_idx = *self.module.functions.get(defined)?;
                self.module.types.get(type_idx as usize)
            }
            None => self.imported_functions.get(func_idx as usize).map(ExternalFunction::func_type),
        }
    }

    /// Body of a module-defined function, `None` for imports and bad indices.
    pub fn function_body(&self, func_idx: u32) -> Option<&FunctionBody> {
        self.module.code.get(self.defined_index(func_idx)?)
    }

    pub fn function_count(&self) -> usize {
        self.imported_functions.len() + self.module.functions.len()
    }

    /// Position among module-defined functions. The import count is fixed at
    /// instantiation, so this does not rescan the import section per call.
    fn defined_index(&self, func_idx: u32) -> Option<usize> {
        (func_idx as usize).checked_sub(self.imported_functions.len())
    }

    /// The binding for an imported function index, `None` for module-defined
    /// or out-of-range indices.
    pub fn imported_function(&self, func_idx: u32) -> Option<&ExternalFunction> {
        self.imported_functions.get(func_idx as usize)
    }

    pub fn find_exported_function(&self, name: &str) -> Option<u32> {
        self.exports.get(name).copied()
    }

    pub fn memory(&self) -> Option<&RefCell<Memory>> {
        self.memory.as_ref()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn global(&self, global_idx: u32) -> Option<Value> {
        self.globals.get(global_idx as usize).map(Cell::get)
    }

    pub(crate) fn global_cell(&self, global_idx: u32) -> Result<&Cell<Value>, Trap> {
        self.globals
            .get(global_idx as usize)
            .ok_or(Trap::GlobalIndexOutOfBounds(global_idx))
    }

    pub(crate) fn global_is_mutable(&self, global_idx: u32) -> bool {
        self.module
            .globals
            .get(global_idx as usize)
            .map_or(false, |global| global.global_type.mutable)
    }

    /// Run the start function, if the module declares one.
    pub fn run_start(&self, depth: u32) -> ExecutionResult {
        match self.module.start {
            Some(func_idx) => execute(self, func_idx, &[], depth),
            None => ExecutionResult::Void,
        }
    }

    /// Call an exported function with typed arguments at depth 0.
    pub fn invoke(&self, name: &str, args: &[TypedValue]) -> Result<Option<TypedValue>, InvokeError> {
        let func_idx = self
            .find_exported_function(name)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        let func_type = self
            .function_type(func_idx)
            .ok_or(Trap::UndefinedFunction(func_idx))?;

        for (index, (arg, expected)) in args.iter().zip(&func_type.parameters).enumerate() {
            if arg.typ() != *expected {
                return Err(InvokeError::ArgumentTypeMismatch {
                    index,
                    expected: *expected,
                    actual: arg.typ(),
                });
            }
        }

        let values: Vec<Value> = args.iter().map(|arg| arg.to_value()).collect();
        let result = execute(self, func_idx, &values, 0).into_result()?;
        Ok(match (result, func_type.result()) {
            (Some(value), Some(typ)) => Some(TypedValue::from_value(value, typ)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::Instruction;
    use crate::parser::module::{DataSegment, ElementSegment, Global, GlobalType, Import, Limits};

    fn import(kind: ImportKind) -> Import {
        Import {
            module: "env".to_string(),
            name: "f".to_string(),
            kind,
        }
    }

    fn host(func_type: FunctionType) -> ExternalFunction {
        ExternalFunction::new(func_type, |_, _, _| ExecutionResult::Void)
    }

    #[test]
    fn test_import_count_mismatch() {
        let module = Module {
            types: vec![FunctionType::default()],
            imports: vec![import(ImportKind::Function(0))],
            ..Default::default()
        };
        let err = instantiate(module, vec![]).err().unwrap();
        assert_eq!(err, InstantiationError::ImportCountMismatch { expected: 1, actual: 0 });
    }

    #[test]
    fn test_import_type_replaced_or_rejected() {
        let declared = FunctionType::new(vec![ValueType::I32], vec![]);
        let module = || Module {
            types: vec![declared.clone()],
            imports: vec![import(ImportKind::Function(0))],
            ..Default::default()
        };

        let instance = instantiate(module(), vec![host(FunctionType::default())]).unwrap();
        assert_eq!(instance.function_type(0), Some(&declared));

        let strict = Config::new().with_strict_import_types(true);
        let err = instantiate_with_config(module(), vec![host(FunctionType::default())], strict)
            .err()
            .unwrap();
        assert_eq!(
            err,
            InstantiationError::ImportTypeMismatch {
                index: 0,
                expected: declared.clone(),
                actual: FunctionType::default()
            }
        );
        assert!(instantiate_with_config(module(), vec![host(declared.clone())], strict).is_ok());
    }

    #[test]
    fn test_unsupported_import() {
        let module = Module {
            imports: vec![import(ImportKind::Memory(Limits { min: 1, max: None }))],
            ..Default::default()
        };
        assert!(matches!(
            instantiate(module, vec![]),
            Err(InstantiationError::UnsupportedImport { kind: "memory", .. })
        ));
    }

    #[test]
    fn test_memory_limit() {
        let module = Module {
            memory: Some(Limits { min: 3, max: None }),
            ..Default::default()
        };
        let config = Config::new().with_memory_pages_limit(2);
        assert_eq!(
            instantiate_with_config(module, vec![], config).err(),
            Some(InstantiationError::MemoryLimitExceeded { requested: 3, limit: 2 })
        );

        let module = Module {
            memory: Some(Limits { min: 1, max: None }),
            ..Default::default()
        };
        let instance = instantiate_with_config(module, vec![], config).unwrap();
        assert_eq!(instance.memory().map(|m| m.borrow().max_pages()), Some(2));
    }

    #[test]
    fn test_globals_and_segments_initialised() {
        let module = Module {
            types: vec![FunctionType::default()],
            functions: vec![0],
            code: vec![FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::End],
            }],
            table: Some(Limits { min: 2, max: None }),
            memory: Some(Limits { min: 1, max: None }),
            globals: vec![
                Global {
                    global_type: GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    },
                    init: ConstExpr::I32(16),
                },
                Global {
                    global_type: GlobalType {
                        value_type: ValueType::I32,
                        mutable: true,
                    },
                    init: ConstExpr::GlobalGet(0),
                },
            ],
            elements: vec![ElementSegment {
                offset: ConstExpr::I32(1),
                functions: vec![0],
            }],
            data: vec![DataSegment {
                offset: ConstExpr::GlobalGet(1),
                bytes: vec![1, 2, 3],
            }],
            ..Default::default()
        };

        let instance = instantiate(module, vec![]).unwrap();
        assert_eq!(instance.global(1), Some(Value::from_i32(16)));
        assert!(instance.global_is_mutable(1));
        assert!(!instance.global_is_mutable(0));
        assert_eq!(instance.table().unwrap().get(1), Ok(0));
        let memory = instance.memory().unwrap().borrow();
        assert_eq!(memory.read_bytes(16, 3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_segment_out_of_bounds() {
        let module = Module {
            memory: Some(Limits { min: 1, max: None }),
            data: vec![DataSegment {
                offset: ConstExpr::I32(65535),
                bytes: vec![0, 0],
            }],
            ..Default::default()
        };
        assert_eq!(
            instantiate(module, vec![]).err(),
            Some(InstantiationError::SegmentOutOfBounds { kind: "data", index: 0 })
        );
    }

    #[test]
    fn test_allocation_failure_is_an_error() {
        let err = Vec::<u8>::new().try_reserve_exact(usize::MAX).unwrap_err();
        let err = InstantiationError::from(err);
        assert!(matches!(err, InstantiationError::OutOfMemory(_)));
        assert!(err.to_string().starts_with("out of memory"));
    }

    #[test]
    fn test_function_lookup_across_imports() {
        let unary = FunctionType::new(vec![ValueType::I32], vec![]);
        let nullary = FunctionType::new(vec![], vec![ValueType::I64]);
        let module = Module {
            types: vec![unary.clone(), nullary.clone()],
            imports: vec![import(ImportKind::Function(0)), import(ImportKind::Function(0))],
            functions: vec![1],
            code: vec![FunctionBody {
                locals: vec![ValueType::F32],
                instructions: vec![Instruction::I64Const(7), Instruction::End],
            }],
            ..Default::default()
        };

        let instance = instantiate(module, vec![host(unary.clone()), host(unary.clone())]).unwrap();
        assert_eq!(instance.function_count(), 3);
        assert_eq!(instance.function_type(1), Some(&unary));
        assert_eq!(instance.function_type(2), Some(&nullary));
        assert_eq!(instance.function_type(3), None);
        assert!(instance.function_body(1).is_none());
        assert_eq!(instance.function_body(2).map(|body| body.locals.len()), Some(1));
        assert!(instance.function_body(3).is_none());
    }
}
