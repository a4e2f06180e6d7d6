//! The per-frame pipeline: read, decode, normalise, segment, compute geometry, track, emit.
//!
//! [`FrameState`] is the current/previous double buffer: two [`ClusterSet`]s plus a toggle bit, so
//! tracking always compares against the prior frame without ever copying a whole set.

use tracing::{debug, warn};

use crate::cluster::ClusterSet;
use crate::config::TRANSPORT_SIZE;
use crate::error::PipelineError;
use crate::heatmap::Grid;
use crate::protocol::{self, StylusReport};
use crate::segment::{self, Worklist};
use crate::sink::{emit_frame, ContactSink};
use crate::source::FrameSource;
use crate::{geometry, tracker};

/// Double-buffered cluster state: `current` is filled fresh each frame, `previous` is read-only
/// during tracking and becomes the new `current` on the next [`FrameState::advance`].
pub struct FrameState {
    sets: [ClusterSet; 2],
    current_idx: usize,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            sets: [ClusterSet::new(), ClusterSet::new()],
            current_idx: 0,
        }
    }
}

impl FrameState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> &ClusterSet {
        &self.sets[self.current_idx]
    }

    /// Disjoint mutable/immutable views of `current`/`previous`, without aliasing.
    fn split_mut(&mut self) -> (&mut ClusterSet, &ClusterSet) {
        let (a, b) = self.sets.split_at_mut(1);
        if self.current_idx == 0 {
            (&mut a[0], &b[0])
        } else {
            (&mut b[0], &a[0])
        }
    }

    /// Swap `current` and `previous`, so what was just built becomes the tracking baseline for the
    /// next frame; the new `current` is left as whatever the previous-previous frame held and must
    /// be reset by the caller before reuse (the segmenter's [`ClusterSet::reset`] call does this).
    fn advance(&mut self) {
        self.current_idx = 1 - self.current_idx;
    }
}

/// Owns every piece of steady-state scratch space the per-frame pipeline needs, so a running
/// driver never allocates after start-up.
pub struct Pipeline<Src, Sink> {
    source: Src,
    sink: Sink,
    grid: Grid,
    state: FrameState,
    work: Worklist,
    buf: Box<[u8; TRANSPORT_SIZE]>,
}

impl<Src: FrameSource, Sink: ContactSink> Pipeline<Src, Sink> {
    pub fn new(source: Src, sink: Sink) -> Self {
        Self {
            source,
            sink,
            grid: Grid::new(),
            state: FrameState::new(),
            work: Worklist::new(),
            buf: Box::new([0u8; TRANSPORT_SIZE]),
        }
    }

    /// Run one read-decode-process-emit cycle.
    ///
    /// `on_stylus` is invoked synchronously with any stylus sub-record decoded this frame, before
    /// geometry/tracking/emission run -- stylus interpretation is left to the caller and is never
    /// buffered here.
    pub fn process_one(&mut self, mut on_stylus: impl FnMut(&StylusReport<'_>)) -> Result<(), PipelineError> {
        self.source.read_frame(&mut self.buf)?;

        let decoded = match protocol::decode_frame(self.buf.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "dropping malformed transport frame");
                let (current, _) = self.state.split_mut();
                current.reset();
                self.state.advance();
                return self.emit(Some(PipelineError::from(e)));
            }
        };

        if let Some(stylus) = &decoded.stylus {
            on_stylus(stylus);
        }

        {
            let (current, _) = self.state.split_mut();
            current.reset();
        }

        if let Some(heatmap) = decoded.heatmap {
            self.grid.normalize(heatmap);
            let (current, _) = self.state.split_mut();
            segment::segment(&self.grid, current, &mut self.work);
            geometry::compute_geometry(current);
        }
        // Absence of a heatmap report this frame leaves `current` zeroed -- not an error, just an
        // empty frame.

        let (current, previous) = self.state.split_mut();
        tracker::track(current, previous);

        self.emit(None)?;
        self.state.advance();
        Ok(())
    }

    fn emit(&mut self, pending_err: Option<PipelineError>) -> Result<(), PipelineError> {
        match emit_frame(&mut self.sink, self.state.current()) {
            Ok(()) => {
                if let Some(e) = pending_err {
                    return Err(e);
                }
                Ok(())
            }
            Err(e) => Err(PipelineError::SinkWriteFailed(Box::new(e))),
        }
    }

    /// Run [`Pipeline::process_one`] in a loop until `shutdown` is observed set, logging and
    /// continuing past recoverable errors and returning on the first unrecoverable one.
    pub fn run(&mut self, shutdown: &std::sync::atomic::AtomicBool, mut on_stylus: impl FnMut(&StylusReport<'_>)) -> Result<(), PipelineError> {
        while !shutdown.load(std::sync::atomic::Ordering::Relaxed) {
            match self.process_one(&mut on_stylus) {
                Ok(()) => {}
                Err(PipelineError::ShortRead(e)) => {
                    debug!(error = %e, "short read from frame source, continuing");
                }
                Err(PipelineError::MalformedFrame(e)) => {
                    debug!(error = %e, "malformed frame, continuing");
                }
                Err(PipelineError::SinkWriteFailed(e)) => {
                    warn!(error = %e, "sink rejected frame, continuing");
                }
                Err(e @ PipelineError::SinkSetupFailed(_)) => return Err(e),
            }
        }
        Ok(())
    }
}
