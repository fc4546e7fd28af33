//! WebAssembly operand stack
//!
//! One stack is shared by every frame of an execution; each frame remembers
//! the height it started at. Values are untagged, so the typed pops only
//! reinterpret bits.

use super::{Trap, Value};

#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_i32(&mut self, v: i32) {
        self.push(Value::from_i32(v));
    }

    pub fn push_i64(&mut self, v: i64) {
        self.push(Value::from_i64(v));
    }

    pub fn push_f32(&mut self, v: f32) {
        self.push(Value::from_f32(v));
    }

    pub fn push_f64(&mut self, v: f64) {
        self.push(Value::from_f64(v));
    }

    /// Push a boolean as i32 1 or 0
    pub fn push_bool(&mut self, v: bool) {
        self.push_i32(v as i32);
    }

    pub fn pop(&mut self) -> Result<Value, Trap> {
        self.values.pop().ok_or(Trap::StackUnderflow)
    }

    pub fn pop_i32(&mut self) -> Result<i32, Trap> {
        self.pop().map(Value::as_i32)
    }

    pub fn pop_u32(&mut self) -> Result<u32, Trap> {
        self.pop().map(Value::as_u32)
    }

    pub fn pop_i64(&mut self) -> Result<i64, Trap> {
        self.pop().map(Value::as_i64)
    }

    pub fn pop_u64(&mut self) -> Result<u64, Trap> {
        self.pop().map(Value::as_u64)
    }

    pub fn pop_f32(&mut self) -> Result<f32, Trap> {
        self.pop().map(Value::as_f32)
    }

    pub fn pop_f64(&mut self) -> Result<f64, Trap> {
        self.pop().map(Value::as_f64)
    }

    /// Remove the top `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Trap> {
        let start = self.values.len().checked_sub(n).ok_or(Trap::StackUnderflow)?;
        Ok(self.values.split_off(start))
    }

    pub fn peek(&self) -> Option<Value> {
        self.values.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop everything between `height` and the top `keep` values.
    ///
    /// Used when a branch or return leaves a block: the block's results stay,
    /// any operands left underneath them are discarded.
    pub fn unwind(&mut self, height: usize, keep: usize) -> Result<(), Trap> {
        let len = self.values.len();
        if len < height + keep {
            return Err(Trap::StackUnderflow);
        }
        self.values.drain(height..len - keep);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();

        stack.push_i32(42);
        stack.push_i64(100);

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop_i64().unwrap(), 100);
        assert_eq!(stack.pop_i32().unwrap(), 42);
        assert_eq!(stack.pop(), Err(Trap::StackUnderflow));
    }

    #[test]
    fn test_typed_pops_reinterpret() {
        let mut stack = Stack::new();
        stack.push_i32(-1);
        assert_eq!(stack.pop_u32().unwrap(), u32::MAX);

        stack.push_f32(1.5);
        assert_eq!(stack.pop_f32().unwrap(), 1.5);

        stack.push_bool(true);
        assert_eq!(stack.peek(), Some(Value::from_i32(1)));
    }

    #[test]
    fn test_pop_n() {
        let mut stack = Stack::new();
        for i in 1..=3 {
            stack.push_i32(i);
        }
        assert_eq!(stack.pop_n(2).unwrap(), vec![Value::from_i32(2), Value::from_i32(3)]);
        assert_eq!(stack.pop_n(2), Err(Trap::StackUnderflow));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_unwind_keeps_results() {
        let mut stack = Stack::new();
        for i in 1..=5 {
            stack.push_i32(i);
        }
        stack.unwind(1, 1).unwrap();
        assert_eq!(stack.pop_n(2).unwrap(), vec![Value::from_i32(1), Value::from_i32(5)]);
        assert!(stack.is_empty());
        assert_eq!(stack.unwind(1, 0), Err(Trap::StackUnderflow));
    }
}
