//! Per-instance engine configuration

/// Default bound on nested call depth
pub const DEFAULT_CALL_DEPTH_LIMIT: u32 = 2048;

/// Default bound on linear memory size, in 64KB pages (256 MiB)
pub const DEFAULT_MEMORY_PAGES_LIMIT: u32 = 4096;

/// Engine configuration, owned by each [`Instance`](super::Instance).
///
/// There is no process-wide state: every instance carries the limits it was
/// created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// A call made at this depth or deeper traps with `CallStackExhausted`
    pub call_depth_limit: u32,
    /// Memories may neither start nor grow beyond this many pages
    pub memory_pages_limit: u32,
    /// Reject imports whose declared type differs from the module's
    /// expectation instead of overwriting it
    pub strict_import_types: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            call_depth_limit: DEFAULT_CALL_DEPTH_LIMIT,
            memory_pages_limit: DEFAULT_MEMORY_PAGES_LIMIT,
            strict_import_types: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_depth_limit(mut self, limit: u32) -> Self {
        self.call_depth_limit = limit;
        self
    }

    pub fn with_memory_pages_limit(mut self, pages: u32) -> Self {
        self.memory_pages_limit = pages;
        self
    }

    pub fn with_strict_import_types(mut self, strict: bool) -> Self {
        self.strict_import_types = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = Config::default();
        assert_eq!(config.call_depth_limit, 2048);
        assert_eq!(config.memory_pages_limit, 4096);
        assert!(!config.strict_import_types);

        let config = Config::new()
            .with_call_depth_limit(16)
            .with_memory_pages_limit(1)
            .with_strict_import_types(true);
        assert_eq!(config.call_depth_limit, 16);
        assert_eq!(config.memory_pages_limit, 1);
        assert!(config.strict_import_types);
    }
}
