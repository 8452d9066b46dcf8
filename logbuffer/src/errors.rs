use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogBufferError {
    /// Construction-time misconfiguration. The object is never usable with the same parameters.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// Call-time rejection. Nothing was written.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("shared memory error: {0}")]
    SharedMemory(#[from] shared_memory::ShmemError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
