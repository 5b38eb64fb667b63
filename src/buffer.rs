//! # buffer.rs - Buffered record output
//!
//! Output-side writer that flushes after every record separator, so
//! selections appear immediately even when the stream is consumed by a
//! slow pipe. The separator is configurable to match `--print0`.

/// Record-buffered writer that flushes whenever a separator byte is
/// written.
pub struct RecordWriter<W: std::io::Write> {
    inner: W,
    separator: u8,
}

impl<W: std::io::Write> RecordWriter<W> {
    /// Wrap `inner`, flushing it after every `separator` byte. Use `b'\n'`
    /// for line output and `b'\0'` for `--print0`.
    pub fn new(inner: W, separator: u8) -> Self {
        Self { inner, separator }
    }

    /// Write one record followed by the separator and flush.
    pub fn write_record(&mut self, record: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(record)?;
        self.inner.write_all(&[self.separator])?;
        self.inner.flush()
    }
}

impl<W: std::io::Write> std::io::Write for RecordWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        // Flush on separator so each completed record is delivered promptly
        if buf.contains(&self.separator) {
            self.inner.flush()?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
