//! Reply Streaming
//!
//! The `/stream_response` body is a concatenation of JSON objects, one per
//! agent event. This module turns it into an ordered sequence of
//! [`StreamEvent`]s:
//!
//! ```text
//!  bytes ──► StreamDemultiplexer ──► "{...}" ──► StreamEvent::parse ──► mpsc
//!            (brace-depth framing)   records     (malformed: warn + skip)
//! ```
//!
//! - [`StreamDemultiplexer`]: buffers bytes and cuts balanced `{...}` records
//! - [`StreamEvent`] / [`EventKind`]: the decoded record and its tag
//! - [`spawn_reader`]: runs the pipeline on a task and forwards
//!   [`StreamUpdate`]s, stopping after `RunCompleted`

mod demux;
mod event;
mod reader;

pub use demux::StreamDemultiplexer;
pub use event::{parse_tool_call, EventKind, StreamEvent};
pub use reader::{decode_records, spawn_reader, StreamUpdate};
