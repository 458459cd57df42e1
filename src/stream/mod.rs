//! Streaming pipeline: upstream bytes to lines, lines to normalized chunks,
//! chunks to outward SSE frames or to one aggregated completion.

pub mod aggregate;
pub mod decoder;
pub mod lines;
pub mod outward;
pub mod sse;

pub use aggregate::{aggregate_stream, Aggregator};
pub use decoder::decode_upstream_stream;
pub use lines::{upstream_line_stream, LineReader};
pub use outward::{encode_outward_stream, DisconnectGuard, StreamOutcome};
