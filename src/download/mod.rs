//! Streaming downloads: byte sources, sinks, the copy pipeline and the
//! per-item background task.

mod pipeline;
mod sink;
mod source;
mod task;

pub use pipeline::*;
pub use sink::*;
pub use source::*;
pub use task::*;
