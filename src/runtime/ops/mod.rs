//! WebAssembly operation implementations
//!
//! One function per instruction, grouped by category as in section 4.4 of
//! the WebAssembly core specification. Each pops its operands from the
//! [`Stack`] and pushes its result, or returns the [`Trap`] it raises.

/// Two operands, one result. `$b` is popped first.
macro_rules! binop {
    ($(#[$doc:meta])* $name:ident, $pop:ident => $push:ident, |$a:ident, $b:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(stack: &mut Stack) -> Result<(), Trap> {
            let $b = stack.$pop()?;
            let $a = stack.$pop()?;
            stack.$push($body);
            Ok(())
        }
    };
}

/// Like `binop!`, for operations that can trap; `$body` is a `Result`.
macro_rules! try_binop {
    ($(#[$doc:meta])* $name:ident, $pop:ident => $push:ident, |$a:ident, $b:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(stack: &mut Stack) -> Result<(), Trap> {
            let $b = stack.$pop()?;
            let $a = stack.$pop()?;
            stack.$push($body?);
            Ok(())
        }
    };
}

macro_rules! unop {
    ($(#[$doc:meta])* $name:ident, $pop:ident => $push:ident, |$a:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(stack: &mut Stack) -> Result<(), Trap> {
            let $a = stack.$pop()?;
            stack.$push($body);
            Ok(())
        }
    };
}

macro_rules! try_unop {
    ($(#[$doc:meta])* $name:ident, $pop:ident => $push:ident, |$a:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(stack: &mut Stack) -> Result<(), Trap> {
            let $a = stack.$pop()?;
            stack.$push($body?);
            Ok(())
        }
    };
}

pub mod bitwise;
pub mod comparison;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod variable;

// Re-export commonly used types for operation implementations
pub(crate) use crate::parser::instruction::MemArg;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{Trap, Value};
