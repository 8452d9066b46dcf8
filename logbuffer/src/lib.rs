pub mod appender;
pub mod buffer;
pub mod descriptor;
mod errors;
pub mod frame;
pub mod mapped;

#[cfg(test)]
mod tests;

pub use appender::{AppendOutcome, LogAppender};
pub use buffer::{AtomicBuffer, UnsafeBuffer};
pub use errors::LogBufferError;
pub use mapped::{LogBufferConfig, MappedLogBuffers};
