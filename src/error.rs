//! Error types for the decode and frame-processing stages.
//!
//! Closed, structured enums via `thiserror` rather than opaque strings, so callers can take
//! different recovery action per variant.

/// Raised by [`crate::protocol::decode_frame`] when a header's declared size would advance the
/// cursor past the end of the transport buffer, or a sub-structure is otherwise inconsistent.
///
/// Recoverable: the caller drops the current transport buffer and continues with the next one.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("malformed IPTS transport frame: {reason}")]
pub struct MalformedFrame {
    pub(crate) reason: &'static str,
}

impl MalformedFrame {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Raised by a [`crate::source::FrameSource`] when a read could not be completed and the source
/// was unable to recover on its own (a replay file that is shorter than one transport buffer even
/// after rewinding, or an I/O failure on the underlying device/file).
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("short read from frame source: got {got} of {expected} bytes")]
    ShortRead { got: usize, expected: usize },
    #[error("I/O error on frame source: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for a single pass through the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Transient: the frame source could not deliver a full transport buffer and gave up
    /// recovering on its own. The next call to [`crate::pipeline::Pipeline::process_one`] may
    /// succeed; this is not a reason to stop the outer loop.
    #[error(transparent)]
    ShortRead(#[from] SourceError),

    /// Recoverable: the transport buffer was structurally invalid. `current` is left zeroed, so
    /// the sink will observe "no contacts" for this frame.
    #[error(transparent)]
    MalformedFrame(#[from] MalformedFrame),

    /// Recoverable: the sink rejected an event. The contact state is unchanged and will be
    /// re-expressed on the next frame.
    #[error("sink rejected frame: {0}")]
    SinkWriteFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Fatal: the sink could not be constructed at all. Callers should abort before entering the
    /// main loop.
    #[error("failed to set up multi-touch sink: {0}")]
    SinkSetupFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}
