//! Binary layout of a frame in the log region.
//!
//! ```text
//!  0               1               2               4               8              12
//!  +---------------+---------------+---------------+---------------+---------------+----
//!  |    version    |     flags     |     type      | frame length  |  term offset  | ...
//!  +---------------+---------------+---------------+---------------+---------------+----
//! ```
//!
//! Frames start on a [`FRAME_ALIGNMENT`] boundary. The frame length counts header and payload
//! bytes; a reader steps to the next frame by the aligned length. A length of `0` means the frame
//! has been claimed but not yet published.

mod header;

pub use header::{DefaultHeader, HeaderPatch};

use crate::buffer::AtomicBuffer;
use crate::errors::LogBufferError;

pub const VERSION_OFFSET: usize = 0;
pub const FLAGS_OFFSET: usize = 1;
pub const TYPE_OFFSET: usize = 2;
pub const LENGTH_OFFSET: usize = 4;
pub const TERM_OFFSET_OFFSET: usize = 8;

/// Version, flags, type, frame length and term offset.
pub const BASE_HEADER_LENGTH: usize = 12;

pub const FRAME_ALIGNMENT: usize = 8;
pub const WORD_ALIGNMENT: usize = 8;

pub const CURRENT_VERSION: u8 = 0;

pub const PADDING_FRAME_TYPE: u16 = 0x00;
pub const HDR_TYPE_DATA: u16 = 0x01;

pub const BEGIN_FRAG: u8 = 0x80;
pub const END_FRAG: u8 = 0x40;
pub const UNFRAGMENTED: u8 = BEGIN_FRAG | END_FRAG;

/// Length field value of a claimed frame that is not yet readable.
pub const IN_PROGRESS_LENGTH: i32 = 0;

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
#[inline]
pub fn align(value: usize, alignment: usize) -> usize {
    (value + (alignment - 1)) & !(alignment - 1)
}

#[inline]
pub fn length_offset(frame_offset: usize) -> usize {
    frame_offset + LENGTH_OFFSET
}

#[inline]
pub fn type_offset(frame_offset: usize) -> usize {
    frame_offset + TYPE_OFFSET
}

#[inline]
pub fn flags_offset(frame_offset: usize) -> usize {
    frame_offset + FLAGS_OFFSET
}

#[inline]
pub fn term_offset_offset(frame_offset: usize) -> usize {
    frame_offset + TERM_OFFSET_OFFSET
}

/// Reads the frame length with acquire semantics. Header and payload bytes are only guaranteed
/// visible once this returns a value other than [`IN_PROGRESS_LENGTH`].
#[inline]
pub fn frame_length_volatile<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> i32 {
    buffer.get_i32_volatile(length_offset(frame_offset))
}

/// Publishes a frame. Must be the last write to the frame.
#[inline]
pub fn frame_length_ordered<B: AtomicBuffer + ?Sized>(
    buffer: &B,
    frame_offset: usize,
    frame_length: i32,
) {
    buffer.put_i32_ordered(length_offset(frame_offset), frame_length)
}

#[inline]
pub fn frame_type<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> u16 {
    buffer.get_u16(type_offset(frame_offset))
}

#[inline]
pub fn frame_flags<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> u8 {
    buffer.get_u8(flags_offset(frame_offset))
}

#[inline]
pub fn frame_version<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> u8 {
    buffer.get_u8(frame_offset + VERSION_OFFSET)
}

#[inline]
pub fn frame_term_offset<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> i32 {
    buffer.get_i32(term_offset_offset(frame_offset))
}

#[inline]
pub fn is_padding_frame<B: AtomicBuffer + ?Sized>(buffer: &B, frame_offset: usize) -> bool {
    frame_type(buffer, frame_offset) == PADDING_FRAME_TYPE
}

pub fn check_header_length(length: usize) -> Result<(), LogBufferError> {
    if length < BASE_HEADER_LENGTH {
        return Err(LogBufferError::IllegalState(format!(
            "Frame header length {} less than min length {}",
            length, BASE_HEADER_LENGTH
        )));
    }
    if length % WORD_ALIGNMENT != 0 {
        return Err(LogBufferError::IllegalState(format!(
            "Frame header length {} is not a multiple of {}",
            length, WORD_ALIGNMENT
        )));
    }
    Ok(())
}

pub fn check_max_frame_length(length: usize) -> Result<(), LogBufferError> {
    if length % WORD_ALIGNMENT != 0 {
        return Err(LogBufferError::IllegalState(format!(
            "Max frame length {} is not a multiple of {}",
            length, WORD_ALIGNMENT
        )));
    }
    Ok(())
}
