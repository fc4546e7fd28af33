//! Decoder limits.
//!
//! Counts read from the binary are checked against these before anything is
//! allocated, so a few bytes claiming a billion entries fail fast. Values
//! follow the limits browsers enforce.

pub const MAX_TYPES: u32 = 1_000_000;
pub const MAX_FUNCTIONS: u32 = 1_000_000;
pub const MAX_IMPORTS: u32 = 100_000;
pub const MAX_EXPORTS: u32 = 100_000;
pub const MAX_GLOBALS: u32 = 1_000_000;
pub const MAX_DATA_SEGMENTS: u32 = 100_000;
pub const MAX_ELEMENT_SEGMENTS: u32 = 10_000_000;

/// Applies to parameters and results separately
pub const MAX_FUNCTION_PARAMS: u32 = 1_000;

/// Declared locals per function, parameters not included
pub const MAX_FUNCTION_LOCALS: u32 = 50_000;

pub const MAX_BR_TABLE_LABELS: u32 = 65_520;

/// Table size in elements, for both minimum and maximum
pub const MAX_TABLE_SIZE: u32 = 10_000_000;

/// The full 4 GiB address space in 64 KiB pages
pub const MAX_MEMORY_PAGES: u32 = 65_536;
