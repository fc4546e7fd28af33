//! WebAssembly call frame
//!
//! One frame per active Wasm function call. Frames live on the executor's
//! heap-allocated frame stack, so calls between functions of one instance do
//! not consume native stack.

use super::control::{Label, LabelStack, LabelType};
use super::Value;
use crate::parser::instruction::Instruction;
use crate::parser::module::{FunctionBody, FunctionType};

#[derive(Debug)]
pub struct CallFrame<'a> {
    /// Function index in the instance's function space
    pub function_idx: u32,
    pub code: &'a [Instruction],
    /// Position of the next instruction in `code`
    pub pc: usize,
    /// Parameters followed by declared locals
    pub locals: Vec<Value>,
    pub labels: LabelStack,
    /// Operand stack height when the frame was entered
    pub stack_base: usize,
    /// Number of results this function returns
    pub arity: usize,
    /// Call depth of this activation
    pub depth: u32,
}

impl<'a> CallFrame<'a> {
    /// Build a frame for `body`, taking ownership of the arguments as the
    /// first locals. Declared locals start zeroed.
    pub fn new(
        function_idx: u32,
        func_type: &FunctionType,
        body: &'a FunctionBody,
        mut args: Vec<Value>,
        stack_base: usize,
        depth: u32,
    ) -> Self {
        args.resize(args.len() + body.locals.len(), Value::ZERO);
        let arity = func_type.return_types.len();

        let mut labels = LabelStack::new();
        labels.push(Label {
            label_type: LabelType::Function,
            arity,
            stack_height: stack_base,
            continuation: body.instructions.len(),
        });

        CallFrame {
            function_idx,
            code: &body.instructions,
            pc: 0,
            locals: args,
            labels,
            stack_base,
            arity,
            depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::ValueType;

    #[test]
    fn test_locals_follow_arguments() {
        let body = FunctionBody {
            locals: vec![ValueType::I64, ValueType::F32],
            instructions: vec![Instruction::End],
        };
        let func_type = FunctionType::new(vec![ValueType::I32], vec![ValueType::I32]);
        let frame = CallFrame::new(3, &func_type, &body, vec![Value::from_i32(7)], 2, 5);

        assert_eq!(frame.locals, vec![Value::from_i32(7), Value::ZERO, Value::ZERO]);
        assert_eq!(frame.arity, 1);
        assert_eq!(frame.labels.depth(), 1);
        assert_eq!(frame.labels.get(0).map(|l| l.label_type), Some(LabelType::Function));
        assert_eq!(frame.depth, 5);
    }
}
