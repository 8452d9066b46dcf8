use super::*;

/// Immutable header template copied into every frame before its payload.
#[derive(Debug, Clone, Copy)]
pub struct DefaultHeader<'a> {
    bytes: &'a [u8],
}

impl<'a> DefaultHeader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<DefaultHeader<'a>, LogBufferError> {
        check_header_length(bytes.len())?;
        Ok(DefaultHeader { bytes })
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Copies up to `available` template bytes to `frame_offset`.
    ///
    /// The frame length field is skipped so the frame keeps reading as in progress; it is written
    /// only when the frame is published.
    pub fn write_into<B: AtomicBuffer + ?Sized>(
        &self,
        buffer: &B,
        frame_offset: usize,
        available: usize,
    ) {
        let limit = self.bytes.len().min(available);
        buffer.put_bytes(frame_offset, &self.bytes[..LENGTH_OFFSET.min(limit)]);
        let after_length = LENGTH_OFFSET + 4;
        if limit > after_length {
            buffer.put_bytes(
                frame_offset + after_length,
                &self.bytes[after_length..limit],
            );
        }
    }
}

/// Fields that differ from frame to frame, applied on top of the copied template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPatch {
    pub frame_type: u16,
    pub flags: u8,
    pub term_offset: i32,
}

impl HeaderPatch {
    pub fn data(term_offset: i32) -> HeaderPatch {
        HeaderPatch {
            frame_type: HDR_TYPE_DATA,
            flags: UNFRAGMENTED,
            term_offset,
        }
    }

    pub fn padding(term_offset: i32) -> HeaderPatch {
        HeaderPatch {
            frame_type: PADDING_FRAME_TYPE,
            flags: UNFRAGMENTED,
            term_offset,
        }
    }

    /// Writes the patched fields that fit within `available` bytes of the frame.
    ///
    /// Flags and type always fit because frames are at least [`FRAME_ALIGNMENT`] bytes long.
    pub fn apply<B: AtomicBuffer + ?Sized>(&self, buffer: &B, frame_offset: usize, available: usize) {
        buffer.put_u8(flags_offset(frame_offset), self.flags);
        buffer.put_u16(type_offset(frame_offset), self.frame_type);
        if available >= TERM_OFFSET_OFFSET + 4 {
            buffer.put_i32(term_offset_offset(frame_offset), self.term_offset);
        }
    }
}
