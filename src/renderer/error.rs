//! Error taxonomy for pass execution and buffer allocation.

/// Result type alias using RenderError
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised by the pass pipeline.
///
/// `OutOfMemory` and `UnsupportedPass` abort the whole frame, which then
/// returns the unmodified source. `DimensionMismatch` is contained to the
/// pass that raised it (see [`PassExecutor::run_or_copy`]).
///
/// [`PassExecutor::run_or_copy`]: super::executor::PassExecutor::run_or_copy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// No kernel registered under this pass name
    #[error("unsupported pass '{pass}'")]
    UnsupportedPass { pass: String },

    /// Destination size does not satisfy the kernel's output-size contract
    #[error(
        "pass '{pass}' expects a {}x{} destination, got {}x{}",
        .expected[0], .expected[1], .actual[0], .actual[1]
    )]
    DimensionMismatch {
        pass: String,
        expected: [u32; 2],
        actual: [u32; 2],
    },

    /// Fewer source buffers bound than the kernel reads
    #[error("pass '{pass}' is missing source binding #{index}")]
    MissingInput { pass: String, index: usize },

    /// Scratch allocation failed or would exceed the pool budget
    #[error("out of memory: {requested_bytes} bytes requested{}", budget_suffix(.budget_bytes))]
    OutOfMemory {
        requested_bytes: usize,
        budget_bytes: Option<usize>,
    },
}

fn budget_suffix(budget: &Option<usize>) -> String {
    match budget {
        Some(b) => format!(", pool budget is {b} bytes"),
        None => String::new(),
    }
}

impl RenderError {
    /// True for errors after which the frame must fall back to its source.
    pub fn aborts_frame(&self) -> bool {
        matches!(
            self,
            RenderError::OutOfMemory { .. } | RenderError::UnsupportedPass { .. }
        )
    }
}
