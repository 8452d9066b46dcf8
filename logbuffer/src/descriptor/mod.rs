//! Layout of the log and state regions, and the checks every appender runs against them.

use crate::buffer::AtomicBuffer;
use crate::errors::LogBufferError;
use crate::frame::FRAME_ALIGNMENT;

pub const MIN_LOG_SIZE: usize = 64 * 1024;
/// The tail counter is a signed 32-bit value.
pub const MAX_LOG_SIZE: usize = 1 << 30;

pub const CACHE_LINE_SIZE: usize = 64;

pub const TAIL_COUNTER_OFFSET: usize = 0;
/// Reserved so the state region keeps a second cache line for reader-side bookkeeping. Nothing
/// in this crate reads or writes it.
pub const HIGH_WATER_MARK_OFFSET: usize = TAIL_COUNTER_OFFSET + CACHE_LINE_SIZE;
pub const STATE_BUFFER_LENGTH: usize = CACHE_LINE_SIZE * 2;

pub fn check_log_capacity(capacity: usize) -> Result<(), LogBufferError> {
    if capacity < MIN_LOG_SIZE {
        return Err(LogBufferError::IllegalState(format!(
            "Log buffer capacity less than min size of {}, capacity={}",
            MIN_LOG_SIZE, capacity
        )));
    }
    if capacity > MAX_LOG_SIZE {
        return Err(LogBufferError::IllegalState(format!(
            "Log buffer capacity greater than max size of {}, capacity={}",
            MAX_LOG_SIZE, capacity
        )));
    }
    if capacity % FRAME_ALIGNMENT != 0 {
        return Err(LogBufferError::IllegalState(format!(
            "Log buffer capacity not a multiple of {}, capacity={}",
            FRAME_ALIGNMENT, capacity
        )));
    }
    Ok(())
}

pub fn check_log_buffer<B: AtomicBuffer + ?Sized>(buffer: &B) -> Result<(), LogBufferError> {
    check_log_capacity(buffer.capacity())
}

pub fn check_state_buffer<B: AtomicBuffer + ?Sized>(buffer: &B) -> Result<(), LogBufferError> {
    let capacity = buffer.capacity();
    if capacity < STATE_BUFFER_LENGTH {
        return Err(LogBufferError::IllegalState(format!(
            "State buffer capacity less than min size of {}, capacity={}",
            STATE_BUFFER_LENGTH, capacity
        )));
    }
    Ok(())
}
