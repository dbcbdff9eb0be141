use std::fmt::{Display, Formatter};
use std::io::Write;

use crate::errors::ShiftResult;

/// Destination of rendered SQL in preview mode. Never read back.
pub trait OutputSink {
    fn append(&mut self, text: &str) -> ShiftResult<()>;
}

/// Collects rendered SQL in memory.
#[derive(Debug, Default, Clone)]
pub struct StringSink {
    buffer: String,
}

impl StringSink {
    pub fn new() -> Self {
        StringSink::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl OutputSink for StringSink {
    fn append(&mut self, text: &str) -> ShiftResult<()> {
        self.buffer.push_str(text);
        Ok(())
    }
}

impl Display for StringSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.buffer)
    }
}

/// Streams rendered SQL to any writer, e.g. a file or stdout.
pub struct WriteSink<W: Write> {
    writer: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        WriteSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriteSink<W> {
    fn append(&mut self, text: &str) -> ShiftResult<()> {
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }
}
