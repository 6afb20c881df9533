//! Conversion options.

/// Options for one module conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Attach the defining AST node's span to every emitted node.
    pub emit_positions: bool,
    /// Also convert functions that are only reachable from test bodies.
    /// The tests themselves are never converted.
    pub include_tests: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            emit_positions: true,
            include_tests: false,
        }
    }
}

impl LowerOptions {
    #[must_use]
    pub fn with_emit_positions(mut self, emit_positions: bool) -> Self {
        self.emit_positions = emit_positions;
        self
    }

    #[must_use]
    pub fn with_include_tests(mut self, include_tests: bool) -> Self {
        self.include_tests = include_tests;
        self
    }
}
