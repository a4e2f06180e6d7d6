//! Compile-time constants for the frame-processing pipeline.
//!
//! None of these are meant to be runtime-tunable: changing them changes the shape of the wire
//! protocol or the behaviour of the segmentation/tracking algorithms, not a user preference.
//! Process-level configuration (which device to open, log verbosity, ...) is handled by the CLI
//! binary instead.

/// Heatmap grid width, in samples.
pub const W: usize = 64;
/// Heatmap grid height, in samples.
pub const H: usize = 44;
/// Total samples per heatmap.
pub const GRID_LEN: usize = W * H;

/// Device-to-sink coordinate multiplier.
pub const SCALE: f32 = 16.0;

/// Background-subtraction bias applied when normalising raw samples.
pub const BIAS: i16 = 100;

/// Maximum number of simultaneously tracked clusters per frame.
pub const MAX_CLUSTERS: usize = 16;
/// Maximum number of member samples per cluster.
pub const MAX_CLUSTER_SIZE: usize = 128;

/// A cluster is only reported to the sink if its diameter exceeds this.
pub const DIAMETER_VALID: f32 = 0.5;
/// A cluster wider than this triggers the giant-contact (palm) veto for the whole frame.
pub const DIAMETER_PALM: f32 = 10.0;
/// Pairwise bounding-box intersection, as a fraction of the smaller box's area, above which the
/// smaller cluster of the pair is suppressed.
pub const OVERLAP_RATIO: f32 = 0.25;

/// Number of multi-touch protocol slots the sink exposes.
pub const MATCH_SLOTS: usize = 6;

/// Fixed size, in bytes, of a single transport read from the IPTS frame source.
pub const TRANSPORT_SIZE: usize = 7485;

/// Outer HID report type that gates the rest of the decode.
pub const HID_TYPE_IPTS: u8 = 0xEE;
/// Raw frame types whose report loop is worth entering.
pub const RAW_FRAME_TYPE_HID: u16 = 6;
pub const RAW_FRAME_TYPE_GET_FEATURES: u16 = 8;
/// Report type carrying the heatmap payload.
pub const REPORT_TYPE_HEATMAP: u8 = 0x25;
/// Report type carrying a stylus sub-record.
pub const REPORT_TYPE_STYLUS: u8 = 0x60;
/// Fixed preamble size of a stylus sub-record, before the per-element records.
pub const STYLUS_PREAMBLE_LEN: usize = 8;
/// Size of a single stylus element record.
pub const STYLUS_ELEMENT_LEN: usize = 16;
