use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};

use crate::vte_actions::LineDecoder;

/// Lines a filter pane may hold in flight before the fan-out blocks on it.
pub const FILTER_BACKLOG: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Contains(String),
    /// The catch-all: lines that none of the patterns contain.
    NoneOf(Vec<String>),
}

impl Matcher {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Contains(pattern) => line.contains(pattern.as_str()),
            Matcher::NoneOf(patterns) => !patterns.iter().any(|p| line.contains(p.as_str())),
        }
    }
}

/// A fan-out sink that decodes its bytes into plain lines, the same way pane
/// output from a pseudo-terminal is decoded, and forwards the matching ones to a
/// pane. Dropping it flushes any unterminated line and closes the channel, which
/// ends the pane's source.
pub struct FilterSink {
    matcher: Matcher,
    decoder: LineDecoder,
    lines: SyncSender<String>,
}

pub fn filter_channel(matcher: Matcher, backlog: usize) -> (FilterSink, Receiver<String>) {
    let (lines, receiver) = mpsc::sync_channel(backlog);
    let sink = FilterSink {
        matcher,
        decoder: LineDecoder::new(),
        lines,
    };
    (sink, receiver)
}

impl FilterSink {
    fn forward(&self, line: String) -> io::Result<()> {
        if !self.matcher.matches(&line) {
            return Ok(());
        }
        self.lines
            .send(line)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "filter pane is gone"))
    }
}

impl Write for FilterSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in self.decoder.decode(buf) {
            self.forward(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FilterSink {
    fn drop(&mut self) {
        if let Some(line) = self.decoder.finish() {
            // The pane may already be gone; nothing is left to tell.
            let _ = self.forward(line);
        }
    }
}
