use std::collections::HashSet;
use std::thread;

use super::{scan, AlignedBytes};
use crate::appender::{AppendOutcome, LogAppender};
use crate::buffer::UnsafeBuffer;
use crate::descriptor::{MIN_LOG_SIZE, STATE_BUFFER_LENGTH};
use crate::frame::{self, FRAME_ALIGNMENT, HDR_TYPE_DATA, PADDING_FRAME_TYPE};
use crate::LogBufferError;

const HEADER_LENGTH: usize = 16;
const MAX_FRAME_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TestMessage {
    writer: u32,
    seq: u32,
}

impl TestMessage {
    const LENGTH: usize = 20;

    fn to_bytes(self) -> [u8; TestMessage::LENGTH] {
        let mut bytes = [0u8; TestMessage::LENGTH];
        bytes[0..4].copy_from_slice(&self.writer.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.seq.to_le_bytes());
        let fill = (self.seq % 250) as u8;
        bytes[8..].iter_mut().for_each(|b| *b = fill);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Option<TestMessage> {
        if bytes.len() != TestMessage::LENGTH {
            return None;
        }
        let writer = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let seq = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let fill = (seq % 250) as u8;
        if bytes[8..].iter().any(|b| *b != fill) {
            return None;
        }
        Some(TestMessage { writer, seq })
    }
}

#[test]
fn concurrent_appends_tile_the_log_without_overlap() -> Result<(), LogBufferError> {
    const WRITERS: u32 = 2;
    const MESSAGES_PER_WRITER: u32 = 1000;
    let capacity = 2 * MIN_LOG_SIZE;

    let mut log_bytes = AlignedBytes::zeroed(capacity);
    let mut state_bytes = AlignedBytes::zeroed(STATE_BUFFER_LENGTH);
    let log = UnsafeBuffer::new(log_bytes.as_mut_slice())?;
    let state = UnsafeBuffer::new(state_bytes.as_mut_slice())?;
    let header = [0u8; HEADER_LENGTH];
    let appender = LogAppender::new(&log, &state, &header, MAX_FRAME_LENGTH)?;

    let results: Vec<Vec<AppendOutcome>> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let appender = &appender;
                s.spawn(move || {
                    (0..MESSAGES_PER_WRITER)
                        .map(|seq| {
                            let bytes = TestMessage { writer, seq }.to_bytes();
                            appender
                                .append(&bytes, 0, bytes.len())
                                .expect("message length is within bounds")
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("writer thread panicked"))
            .collect()
    });

    let frame_length = HEADER_LENGTH + TestMessage::LENGTH;
    let aligned_length = frame::align(frame_length, FRAME_ALIGNMENT);
    let total = (WRITERS * MESSAGES_PER_WRITER) as usize;
    assert!(results.iter().flatten().all(AppendOutcome::is_appended));
    assert_eq!(appender.tail_volatile(), total * aligned_length);

    let frames = scan(&log, HEADER_LENGTH, capacity);
    assert_eq!(frames.len(), total);

    let mut seen = HashSet::new();
    let mut last_seq = vec![None; WRITERS as usize];
    for (i, scanned) in frames.iter().enumerate() {
        assert_eq!(scanned.offset, i * aligned_length);
        assert_eq!(scanned.length, frame_length);
        assert_eq!(scanned.frame_type, HDR_TYPE_DATA);
        assert_eq!(scanned.term_offset, scanned.offset as i32);
        let message = TestMessage::from_bytes(&scanned.payload).expect("torn or corrupt payload");
        assert!(seen.insert(message), "duplicate frame {:?}", message);
        // A single writer's claims are ordered.
        let last = &mut last_seq[message.writer as usize];
        assert!(last.map_or(true, |prev| prev < message.seq));
        *last = Some(message.seq);
    }
    assert_eq!(seen.len(), total);
    Ok(())
}

#[test]
fn racing_writers_trip_the_log_exactly_once() -> Result<(), LogBufferError> {
    const WRITERS: u32 = 4;
    let capacity = MIN_LOG_SIZE;

    let mut log_bytes = AlignedBytes::zeroed(capacity);
    let mut state_bytes = AlignedBytes::zeroed(STATE_BUFFER_LENGTH);
    let log = UnsafeBuffer::new(log_bytes.as_mut_slice())?;
    let state = UnsafeBuffer::new(state_bytes.as_mut_slice())?;
    let header = [0u8; HEADER_LENGTH];
    let appender = LogAppender::new(&log, &state, &header, MAX_FRAME_LENGTH)?;

    let outcomes: Vec<AppendOutcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let appender = &appender;
                s.spawn(move || {
                    let mut outcomes = Vec::new();
                    let mut seq = 0;
                    loop {
                        let bytes = TestMessage { writer, seq }.to_bytes();
                        let outcome = appender
                            .append(&bytes, 0, bytes.len())
                            .expect("message length is within bounds");
                        outcomes.push(outcome);
                        if !outcome.is_appended() {
                            return outcomes;
                        }
                        seq += 1;
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("writer thread panicked"))
            .collect()
    });

    let tripped: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            AppendOutcome::Tripped { padding_offset } => Some(*padding_offset),
            _ => None,
        })
        .collect();
    let appended = outcomes.iter().filter(|o| o.is_appended()).count();
    let aligned_length = frame::align(HEADER_LENGTH + TestMessage::LENGTH, FRAME_ALIGNMENT);

    // 65536 is not a multiple of 40, so exactly one claim straddles the end.
    assert_eq!(tripped, vec![appended * aligned_length]);
    assert_eq!(appended, capacity / aligned_length);
    assert_eq!(appender.tail_volatile(), capacity);

    let frames = scan(&log, HEADER_LENGTH, capacity);
    assert_eq!(frames.len(), appended + 1);
    let padding = frames.last().expect("at least one frame");
    assert_eq!(padding.frame_type, PADDING_FRAME_TYPE);
    assert_eq!(padding.offset + padding.length, capacity);
    assert!(frames[..appended]
        .iter()
        .all(|f| f.frame_type == HDR_TYPE_DATA && TestMessage::from_bytes(&f.payload).is_some()));
    Ok(())
}
