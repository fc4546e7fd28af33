//! WebAssembly label stack for control flow
//!
//! See: <https://webassembly.github.io/spec/core/exec/runtime.html#labels>
//!
//! > "Labels carry an arity n and their associated branch target"
//!
//! Every active block, loop, if and the function body itself has a label.
//! Branch targets are instruction positions in the flat function body, so a
//! branch is a stack unwind plus a program counter update.

/// Type of label construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelType {
    /// The implicit label around a function body; branching to it returns
    Function,
    /// Branches continue after the block's `end`
    Block,
    /// Branches continue at the first instruction of the loop body.
    /// Note: "the label of a loop does not target the end, but the beginning of the loop"
    Loop,
    /// Branches continue after the `end` of the if
    If,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub label_type: LabelType,
    /// Number of values a branch to this label carries
    pub arity: usize,
    /// Height of the operand stack when the label was entered
    pub stack_height: usize,
    /// Instruction position a branch to this label continues at
    pub continuation: usize,
}

#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Label>,
}

impl LabelStack {
    pub fn new() -> Self {
        LabelStack { labels: Vec::new() }
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn pop(&mut self) -> Option<Label> {
        self.labels.pop()
    }

    /// Get the nth label from the top (0 = top)
    ///
    /// WebAssembly 4.4.8 (br l):
    /// > "Let L be the l-th label appearing on the stack, starting from the top and counting from zero"
    pub fn get(&self, depth: u32) -> Option<&Label> {
        let len = self.labels.len();
        if depth as usize >= len {
            return None;
        }
        self.labels.get(len - 1 - depth as usize)
    }

    /// Remove the `depth` innermost labels, keeping the branch target.
    pub fn unwind_to(&mut self, depth: u32) {
        let keep = self.labels.len().saturating_sub(depth as usize);
        self.labels.truncate(keep);
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }
}
