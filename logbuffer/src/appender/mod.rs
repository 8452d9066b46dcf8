//! Lock-free append path into a log region.
//!
//! Writers arbitrate solely through an atomic get-and-add on the tail counter held in the state
//! region. Each claim yields a disjoint byte range; the claimant writes header and payload into it
//! and publishes the frame by storing its length with release ordering. Claims that run past the
//! end of the region never wrap: the claim straddling the end pads the remainder, and every later
//! claim reports the region as full until the owner rotates buffers.

use tracing::{debug, trace};

use crate::buffer::AtomicBuffer;
use crate::descriptor::{self, TAIL_COUNTER_OFFSET};
use crate::errors::LogBufferError;
use crate::frame::{self, DefaultHeader, HeaderPatch, FRAME_ALIGNMENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was written and published at `frame_offset`.
    Appended {
        frame_offset: usize,
        frame_length: usize,
    },
    /// The claim crossed the end of the region. The remainder from `padding_offset` is now a
    /// published padding frame and the message was not written; rotate and retry.
    Tripped { padding_offset: usize },
    /// The region was already exhausted. Nothing was written.
    Full,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, AppendOutcome::Appended { .. })
    }
}

pub struct LogAppender<'a, B: AtomicBuffer> {
    log_buffer: &'a B,
    state_buffer: &'a B,
    default_header: DefaultHeader<'a>,
    capacity: usize,
    max_frame_length: usize,
    max_message_length: usize,
}

impl<'a, B: AtomicBuffer> LogAppender<'a, B> {
    /// Validates the regions and configuration. Buffer contents are not touched.
    pub fn new(
        log_buffer: &'a B,
        state_buffer: &'a B,
        default_header: &'a [u8],
        max_frame_length: usize,
    ) -> Result<LogAppender<'a, B>, LogBufferError> {
        descriptor::check_log_buffer(log_buffer)?;
        descriptor::check_state_buffer(state_buffer)?;
        let default_header = DefaultHeader::new(default_header)?;
        frame::check_max_frame_length(max_frame_length)?;

        let capacity = log_buffer.capacity();
        let header_length = default_header.length();
        if max_frame_length <= header_length {
            return Err(LogBufferError::IllegalState(format!(
                "Max frame length {} must exceed header length {}",
                max_frame_length, header_length
            )));
        }
        if max_frame_length > capacity {
            return Err(LogBufferError::IllegalState(format!(
                "Max frame length {} greater than log buffer capacity {}",
                max_frame_length, capacity
            )));
        }

        debug!(capacity, max_frame_length, header_length, "log appender ready");
        Ok(LogAppender {
            log_buffer,
            state_buffer,
            default_header,
            capacity,
            max_frame_length,
            max_message_length: max_frame_length - header_length,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// Largest payload whose frame, including the default header, fits in `max_frame_length`.
    #[inline]
    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    #[inline]
    pub fn header_length(&self) -> usize {
        self.default_header.length()
    }

    pub fn default_header(&self) -> &'a [u8] {
        self.default_header.as_bytes()
    }

    pub fn log_buffer(&self) -> &'a B {
        self.log_buffer
    }

    pub fn state_buffer(&self) -> &'a B {
        self.state_buffer
    }

    /// Tail read with acquire semantics, clamped to capacity.
    pub fn tail_volatile(&self) -> usize {
        self.clamp_tail(self.state_buffer.get_i32_volatile(TAIL_COUNTER_OFFSET))
    }

    /// Plain tail read for reporting, clamped to capacity.
    pub fn tail(&self) -> usize {
        self.clamp_tail(self.state_buffer.get_i32(TAIL_COUNTER_OFFSET))
    }

    #[inline]
    fn clamp_tail(&self, raw: i32) -> usize {
        // Negative only after the counter overflowed, long past capacity.
        usize::try_from(raw).map_or(self.capacity, |tail| tail.min(self.capacity))
    }

    /// Appends `src[offset..offset + length]` as a single unfragmented frame.
    ///
    /// All validation happens before the claim: once space is claimed the frame is always
    /// completed and published.
    pub fn append(
        &self,
        src: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<AppendOutcome, LogBufferError> {
        self.check_message_length(length)?;
        let message = offset
            .checked_add(length)
            .and_then(|end| src.get(offset..end))
            .ok_or_else(|| {
                LogBufferError::IllegalArgument(format!(
                    "offset={} length={} out of range for source of length {}",
                    offset,
                    length,
                    src.len()
                ))
            })?;

        let header_length = self.default_header.length();
        let frame_length = header_length + length;
        let aligned_length = frame::align(frame_length, FRAME_ALIGNMENT);

        // Claims are only attempted below capacity, so the counter overshoots capacity by at most
        // one frame per concurrent writer and can never wrap back into the region.
        let tail = self.state_buffer.get_i32_volatile(TAIL_COUNTER_OFFSET);
        if usize::try_from(tail).map_or(true, |tail| tail >= self.capacity) {
            trace!(tail, capacity = self.capacity, "log buffer full");
            return Ok(AppendOutcome::Full);
        }

        let claimed = self.get_tail_and_add(aligned_length);

        let frame_offset = match usize::try_from(claimed) {
            Ok(frame_offset) if frame_offset < self.capacity => frame_offset,
            _ => {
                trace!(claimed, capacity = self.capacity, "log buffer full");
                return Ok(AppendOutcome::Full);
            }
        };

        if frame_offset + aligned_length > self.capacity {
            self.append_padding_frame(frame_offset);
            return Ok(AppendOutcome::Tripped {
                padding_offset: frame_offset,
            });
        }

        self.default_header
            .write_into(self.log_buffer, frame_offset, header_length);
        HeaderPatch::data(frame_offset as i32).apply(self.log_buffer, frame_offset, header_length);
        self.log_buffer
            .put_bytes(frame_offset + header_length, message);
        frame::frame_length_ordered(self.log_buffer, frame_offset, frame_length as i32);

        Ok(AppendOutcome::Appended {
            frame_offset,
            frame_length,
        })
    }

    fn check_message_length(&self, length: usize) -> Result<(), LogBufferError> {
        if length > self.max_message_length {
            return Err(LogBufferError::IllegalArgument(format!(
                "Encoded message exceeds maxMessageLength of {}, length={}",
                self.max_message_length, length
            )));
        }
        Ok(())
    }

    #[inline]
    fn get_tail_and_add(&self, delta: usize) -> i32 {
        // delta <= max_frame_length <= capacity <= MAX_LOG_SIZE
        self.state_buffer
            .get_and_add_i32(TAIL_COUNTER_OFFSET, delta as i32)
    }

    fn append_padding_frame(&self, frame_offset: usize) {
        let padding_length = self.capacity - frame_offset;
        self.default_header
            .write_into(self.log_buffer, frame_offset, padding_length);
        HeaderPatch::padding(frame_offset as i32).apply(self.log_buffer, frame_offset, padding_length);
        frame::frame_length_ordered(self.log_buffer, frame_offset, padding_length as i32);
        debug!(frame_offset, padding_length, "log buffer tripped");
    }
}
