//! Explicit interpreter configuration.
//!
//! The original interpreter threaded a process-wide `debug_flag` global
//! through its debug-logging calls. Per DESIGN NOTES this rewrite passes
//! that state (and the resource limits needed to keep a tree-walking
//! evaluator from overflowing the Rust stack) explicitly instead.

/// Configuration for a single interpreter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// When set, lexing/parsing/evaluation steps are logged at `trace`/`debug`
    /// level through the `tracing` crate.
    pub debug: bool,
    /// Maximum depth of nested user-function calls before `ErrorKind::Recursion`.
    pub max_recursion_depth: usize,
    /// Maximum depth of nested `use` imports before a cycle is assumed.
    pub max_import_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self { debug: false, max_recursion_depth: 1024, max_import_depth: 64 }
    }
}

impl InterpreterOptions {
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
