//! Per-group output buffer that replays both streams in write order.

use std::io;
use std::sync::Mutex;

use tracing::debug;

use crate::output::{OutputSinks, Stream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    stream: Stream,
    offset: usize,
    len: usize,
}

#[derive(Debug, Default)]
struct Recording {
    buffer: Vec<u8>,
    segments: Vec<Segment>,
}

/// Records writes from a group's stdout and stderr into one append-only
/// buffer, remembering which stream every write came from.
#[derive(Debug, Default)]
pub struct OutputRecorder {
    inner: Mutex<Recording>,
}

impl OutputRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` as one segment of `stream`. Returns the number of bytes
    /// recorded.
    pub fn write(&self, stream: Stream, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }

        let mut rec = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let offset = rec.buffer.len();
        rec.buffer.extend_from_slice(bytes);
        rec.segments.push(Segment {
            stream,
            offset,
            len: bytes.len(),
        });

        bytes.len()
    }

    /// Write every recorded segment to `sinks` in the order it was recorded,
    /// then forget them. Replaying again without new writes does nothing.
    ///
    /// The recording is consumed before the sinks are written, so segments
    /// are never replayed twice even if a sink fails part-way.
    pub fn replay(&self, sinks: &OutputSinks) -> io::Result<()> {
        let Recording { buffer, segments } = {
            let mut rec = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *rec)
        };

        if segments.is_empty() {
            return Ok(());
        }

        debug!(
            segments = segments.len(),
            bytes = buffer.len(),
            "Replaying recorded output"
        );

        for segment in &segments {
            sinks.write(
                segment.stream,
                &buffer[segment.offset..segment.offset + segment.len],
            )?;
        }

        sinks.flush()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .map(|rec| rec.segments.is_empty())
            .unwrap_or(true)
    }
}
