//! Destination sinks for the two output streams of every command.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Logical stream a chunk of output was produced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Primary and secondary destination for command output.
///
/// Defaults to the process's own standard output and error; tests swap in
/// [`SharedBuffer`]s.
#[derive(Clone)]
pub struct OutputSinks {
    stdout: SharedWriter,
    stderr: SharedWriter,
    stdio: bool,
}

impl OutputSinks {
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Arc::new(Mutex::new(stdout)),
            stderr: Arc::new(Mutex::new(stderr)),
            stdio: false,
        }
    }

    /// The process's own standard output and error.
    pub fn stdio() -> Self {
        Self {
            stdio: true,
            ..Self::new(io::stdout(), io::stderr())
        }
    }

    /// Whether these sinks are the process's own stdio, which children can
    /// inherit directly.
    pub fn is_stdio(&self) -> bool {
        self.stdio
    }

    /// Write `bytes` in full to the sink selected by `stream`.
    pub fn write(&self, stream: Stream, bytes: &[u8]) -> io::Result<()> {
        let sink = match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        };
        let mut writer = sink
            .lock()
            .map_err(|_| io::Error::other("output sink poisoned"))?;
        writer.write_all(bytes)
    }

    pub fn flush(&self) -> io::Result<()> {
        for sink in [&self.stdout, &self.stderr] {
            let mut writer = sink
                .lock()
                .map_err(|_| io::Error::other("output sink poisoned"))?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl Default for OutputSinks {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSinks")
            .field("stdio", &self.stdio)
            .finish_non_exhaustive()
    }
}

/// Cloneable in-memory sink; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::other("buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_route_by_stream() {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let sinks = OutputSinks::new(out.clone(), err.clone());

        sinks.write(Stream::Stdout, b"to out").unwrap();
        sinks.write(Stream::Stderr, b"to err").unwrap();
        sinks.flush().unwrap();

        assert_eq!(out.to_string_lossy(), "to out");
        assert_eq!(err.to_string_lossy(), "to err");
    }

    #[test]
    fn test_only_default_sinks_are_stdio() {
        assert!(OutputSinks::default().is_stdio());
        assert!(!OutputSinks::new(SharedBuffer::new(), SharedBuffer::new()).is_stdio());
    }

    #[test]
    fn test_shared_buffer_clones_share_storage() {
        let buf = SharedBuffer::new();
        let mut clone = buf.clone();

        clone.write_all(b"abc").unwrap();
        assert_eq!(buf.contents(), b"abc");
    }
}
