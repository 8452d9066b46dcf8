use std::slice;

use crate::buffer::AtomicBuffer;
use crate::frame::{self, FRAME_ALIGNMENT};

mod concurrent_append_tests;

/// Zeroed heap memory aligned for [`crate::buffer::UnsafeBuffer`].
pub(crate) struct AlignedBytes {
    words: Vec<u64>,
}

impl AlignedBytes {
    pub(crate) fn zeroed(length: usize) -> AlignedBytes {
        assert_eq!(length % 8, 0);
        AlignedBytes {
            words: vec![0u64; length / 8],
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr() as *mut u8, self.words.len() * 8) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedFrame {
    pub offset: usize,
    pub length: usize,
    pub frame_type: u16,
    pub term_offset: i32,
    pub payload: Vec<u8>,
}

/// Walks published frames from offset 0, stopping at the first unpublished one or at `limit`.
pub(crate) fn scan<B: AtomicBuffer>(log: &B, header_length: usize, limit: usize) -> Vec<ScannedFrame> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < limit {
        let length = frame::frame_length_volatile(log, offset);
        if length <= 0 {
            break;
        }
        let length = length as usize;
        let frame_type = frame::frame_type(log, offset);
        let payload = if frame_type == frame::PADDING_FRAME_TYPE {
            Vec::new()
        } else {
            let mut payload = vec![0u8; length - header_length];
            log.get_bytes(offset + header_length, &mut payload);
            payload
        };
        let term_offset = if length >= frame::TERM_OFFSET_OFFSET + 4 {
            frame::frame_term_offset(log, offset)
        } else {
            -1
        };
        frames.push(ScannedFrame {
            offset,
            length,
            frame_type,
            term_offset,
            payload,
        });
        offset += frame::align(length, FRAME_ALIGNMENT);
    }
    frames
}
