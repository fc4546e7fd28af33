//! WebAssembly runtime implementation
//!
//! This module provides instantiation and linking of parsed modules and the
//! depth-bounded execution engine, including the value representation, the
//! operand stack and the instruction interpreter.

pub mod config;
pub mod control;
pub mod executor;
pub mod frame;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod table;
pub mod test_utils;
pub mod value;

pub use config::Config;
pub use executor::execute;
pub use imports::{ExternalFunction, HostFunc, ImportObject, InstanceLink};
pub use instance::{instantiate, instantiate_with_config, Instance, InstantiationError, InvokeError};
pub use memory::Memory;
pub use table::Table;
pub use value::{TypedValue, Value};

/// Reason an execution stopped abnormally
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable executed")]
    Unreachable,
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("undefined element: {0}")]
    UndefinedElement(u32),
    #[error("indirect call type mismatch: expected {expected}, got {actual}")]
    IndirectCallTypeMismatch { expected: String, actual: String },
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("undefined function: {0}")]
    UndefinedFunction(u32),
    #[error("argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCountMismatch { expected: usize, actual: usize },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("invalid label: {0}")]
    InvalidLabel(u32),
    #[error("local variable index out of bounds: {0}")]
    LocalIndexOutOfBounds(u32),
    #[error("global variable index out of bounds: {0}")]
    GlobalIndexOutOfBounds(u32),
    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),
    #[error("linked instance is not available")]
    UnlinkedInstance,
    #[error("host trap: {0}")]
    Host(String),
}

/// Outcome of executing a function.
///
/// A trapped execution carries no value; the two are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Trapped(Trap),
    Void,
    Value(Value),
}

impl ExecutionResult {
    pub fn trapped(&self) -> bool {
        matches!(self, ExecutionResult::Trapped(_))
    }

    pub fn has_value(&self) -> bool {
        matches!(self, ExecutionResult::Value(_))
    }

    pub fn value(&self) -> Option<Value> {
        match self {
            ExecutionResult::Value(value) => Some(*value),
            _ => None,
        }
    }

    pub fn trap(&self) -> Option<&Trap> {
        match self {
            ExecutionResult::Trapped(trap) => Some(trap),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<Value>, Trap> {
        match self {
            ExecutionResult::Trapped(trap) => Err(trap),
            ExecutionResult::Void => Ok(None),
            ExecutionResult::Value(value) => Ok(Some(value)),
        }
    }
}

impl From<Result<Option<Value>, Trap>> for ExecutionResult {
    fn from(result: Result<Option<Value>, Trap>) -> Self {
        match result {
            Ok(Some(value)) => ExecutionResult::Value(value),
            Ok(None) => ExecutionResult::Void,
            Err(trap) => ExecutionResult::Trapped(trap),
        }
    }
}

impl From<Trap> for ExecutionResult {
    fn from(trap: Trap) -> Self {
        ExecutionResult::Trapped(trap)
    }
}

impl From<Value> for ExecutionResult {
    fn from(value: Value) -> Self {
        ExecutionResult::Value(value)
    }
}
