//! A small, depth-bounded WebAssembly 1.0 interpreter.
//!
//! ferrule decodes and validates `.wasm` binaries, instantiates them against
//! host functions or other instances, and executes their functions with an
//! explicit call-depth bound. Execution never overflows the native stack from
//! guest recursion: calls inside an instance run on a heap-allocated frame
//! stack, and every call, including calls that cross into host code or into
//! another instance, counts against the configured depth limit.
//!
//! # Modules
//!
//! - [`parser`] -- Binary format decoder. Reads `.wasm` bytes into a [`Module`].
//! - [`runtime`] -- Instantiation, linking and the interpreter.
//!
//! # Example
//!
//! Instantiate a module and call its first function, which returns 42:
//!
//! ```
//! use ferrule::{execute, instantiate, parse, ExecutionResult, Value};
//!
//! let wasm = [
//!     0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
//!     0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7f, // type: () -> i32
//!     0x03, 0x02, 0x01, 0x00, // function 0 has type 0
//!     0x0a, 0x06, 0x01, 0x04, 0x00, 0x41, 0x2a, 0x0b, // i32.const 42
//! ];
//! let module = parse(&wasm).unwrap();
//! let instance = instantiate(module, vec![]).unwrap();
//! assert_eq!(execute(&instance, 0, &[], 0), ExecutionResult::Value(Value::from_i32(42)));
//! ```
//!
//! Imports are supplied positionally as [`ExternalFunction`]s, either host
//! closures or forwarders into another instance's export; [`ImportObject`]
//! resolves them by name. Two instances that import from each other are
//! linked through an [`InstanceLink`] bound after both exist.

pub mod parser;
pub mod runtime;

pub use parser::module::{FunctionType, Module, ValueType};
pub use parser::{parse, validate, ParseError};
pub use runtime::imports::resolve_imports;
pub use runtime::{
    execute, instantiate, instantiate_with_config, Config, ExecutionResult, ExternalFunction, ImportObject,
    Instance, InstanceLink, InstantiationError, InvokeError, Trap, TypedValue, Value,
};
