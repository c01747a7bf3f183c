//! IO modules - external interfaces
//!
//! - `frame_source` - JSONL landmark frames from a file or stdin
//! - `egress_channel` - Typed channel between the coach and the writer
//! - `egress` - JSONL event output to stdout or file

pub mod egress;
pub mod egress_channel;
pub mod frame_source;

// Re-export commonly used types
pub use egress::EventWriter;
pub use egress_channel::{create_egress_channel, EgressMessage, EgressSender};
pub use frame_source::{parse_frame_line, FrameReader, FrameRecord};
