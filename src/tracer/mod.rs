//! Capture decoding: record framing, typed events and ingestion counters.

pub mod event;
pub mod parse;
pub mod stats;

use tracing::warn;

use self::event::Event;
use self::parse::{parse_event, ParseError};
use crate::config::ParseMode;

/// Size of the length prefix in front of every record.
pub const FRAME_PREFIX: usize = 4;

/// Splits a capture into records. Each frame is a little-endian `u32`
/// length followed by that many bytes.
///
/// Yields `(offset, record)` pairs where `offset` is the position of the
/// frame's length prefix. A frame running past the end of the capture
/// yields one [`ParseError::Truncated`] and ends iteration.
pub struct RecordReader<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = (usize, Result<&'a [u8], ParseError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }

        let start = self.offset;
        let rest = &self.data[start..];
        let Some(prefix) = rest.get(..FRAME_PREFIX) else {
            self.done = true;
            return Some((start, Err(ParseError::Truncated { size: rest.len() })));
        };
        let mut len = [0u8; FRAME_PREFIX];
        len.copy_from_slice(prefix);
        let len = u32::from_le_bytes(len) as usize;

        let Some(record) = rest.get(FRAME_PREFIX..FRAME_PREFIX.saturating_add(len)) else {
            self.done = true;
            return Some((
                start,
                Err(ParseError::Truncated {
                    size: rest.len() - FRAME_PREFIX,
                }),
            ));
        };

        self.offset = start + FRAME_PREFIX + len;
        Some((start, Ok(record)))
    }
}

/// Decodes every record in a capture, invoking `on_event` for each event
/// kept by `mode`. Records that fail to decode are logged and skipped.
///
/// Returns the number of records skipped.
pub fn decode_capture(data: &[u8], mode: ParseMode, mut on_event: impl FnMut(Event)) -> u64 {
    let mut skipped = 0u64;

    for (offset, record) in RecordReader::new(data) {
        match record.and_then(|r| parse_event(r, mode)) {
            Ok(Some(evt)) => on_event(evt),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, offset, "skipping record");
                skipped += 1;
            }
        }
    }

    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::event::{EventId, EventKind, ObjectType};
    use crate::tracer::parse::HEADER_SIZE;

    fn frame(record: &[u8]) -> Vec<u8> {
        let mut buf = (record.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(record);
        buf
    }

    fn record(ts: u64, id: EventId) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(&ts.to_le_bytes());
        buf[16..18].copy_from_slice(&(id as u16).to_le_bytes());
        buf[20] = 8;
        buf[21] = ObjectType::Global as u8;
        buf
    }

    #[test]
    fn test_reader_splits_frames() {
        let mut data = frame(&[1, 2, 3]);
        data.extend(frame(&[]));
        data.extend(frame(&[9]));

        let frames: Vec<_> = RecordReader::new(&data).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], (0, Ok(&[1u8, 2, 3][..])));
        assert_eq!(frames[1], (7, Ok(&[][..])));
        assert_eq!(frames[2], (11, Ok(&[9u8][..])));
    }

    #[test]
    fn test_reader_stops_at_truncated_frame() {
        let mut data = frame(&[1, 2]);
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(&[0, 0]);

        let mut reader = RecordReader::new(&data);
        assert!(matches!(reader.next(), Some((0, Ok(_)))));
        assert_eq!(
            reader.next(),
            Some((6, Err(ParseError::Truncated { size: 2 })))
        );
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_reader_short_prefix() {
        let data = [1u8, 0];
        let frames: Vec<_> = RecordReader::new(&data).collect();
        assert_eq!(frames, vec![(0, Err(ParseError::Truncated { size: 2 }))]);
    }

    #[test]
    fn test_decode_capture_skips_bad_records() {
        let mut data = frame(&record(1, EventId::ApiExit));
        data.extend(frame(&[0u8; 5]));
        data.extend(frame(&record(2, EventId::ApiExit)));

        let mut events = Vec::new();
        let skipped = decode_capture(&data, ParseMode::Full, |e| events.push(e));
        assert_eq!(skipped, 1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].timestamp, 2);
        assert_eq!(events[0].kind, EventKind::ApiExit);
    }
}
