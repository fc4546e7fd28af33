//! WebAssembly function table
//!
//! The MVP table holds function references for `call_indirect`. Slots are
//! `None` until an element segment fills them; calling through a null slot
//! traps.

use super::Trap;
use crate::parser::module::Limits;
use std::collections::TryReserveError;

#[derive(Debug)]
pub struct Table {
    elements: Vec<Option<u32>>,
    limits: Limits,
}

impl Table {
    /// Create a table of `limits.min` null entries.
    pub fn new(limits: Limits) -> Result<Self, TryReserveError> {
        let mut elements = Vec::new();
        elements.try_reserve_exact(limits.min as usize)?;
        elements.resize(limits.min as usize, None);
        Ok(Table { elements, limits })
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Function index stored at `index`.
    ///
    /// Out-of-range and null slots both trap as undefined elements.
    pub fn get(&self, index: u32) -> Result<u32, Trap> {
        self.elements
            .get(index as usize)
            .copied()
            .flatten()
            .ok_or(Trap::UndefinedElement(index))
    }

    /// Copy `functions` into the table starting at `offset`.
    ///
    /// Returns false without modifying the table if the range does not fit.
    pub fn initialize(&mut self, offset: u32, functions: &[u32]) -> bool {
        let start = offset as usize;
        let Some(end) = start.checked_add(functions.len()) else {
            return false;
        };
        match self.elements.get_mut(start..end) {
            Some(slots) => {
                for (slot, func_idx) in slots.iter_mut().zip(functions) {
                    *slot = Some(*func_idx);
                }
                true
            }
            None => false,
        }
    }
}
