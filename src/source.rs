//! Source readers: one blocking worker per pane.
//!
//! A reader thread sleeps until the event loop arms it, reads exactly one line
//! from its pane's source, posts it to the loop's inbox and goes back to
//! sleep. The loop re-arms it only after it has consumed that line, so a pane
//! never has more than one read outstanding and its lines arrive in order.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::mpsc as std_mpsc;
use std::thread;

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::message::Message;
use crate::pane::PaneId;
use crate::vte_actions::LineDecoder;

const READ_CHUNK: usize = 4096;

/// A blocking stream of lines. `Ok(None)` is end-of-stream.
pub trait LineSource: Send {
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines printed by a process on a pseudo-terminal.
pub struct TerminalLines<R> {
    reader: R,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R: Read> TerminalLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            chunk: vec![0; READ_CHUNK],
            eof: false,
        }
    }

    fn finish(&mut self) {
        self.eof = true;
        self.pending.extend(self.decoder.finish());
    }
}

impl<R: Read + Send> LineSource for TerminalLines<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }
            match self.reader.read(&mut self.chunk) {
                Ok(0) => self.finish(),
                Ok(n) => {
                    let lines = self.decoder.decode(&self.chunk[..n]);
                    self.pending.extend(lines);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if is_hangup(&err) => {
                    debug!("pseudo-terminal hung up: {err}");
                    self.finish();
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Reading a pseudo-terminal whose child has exited fails with `EIO` on Linux
/// instead of returning end-of-file.
#[cfg(unix)]
fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_hangup(_err: &io::Error) -> bool {
    false
}

/// Lines forwarded by an in-process filter. Ends when the sending side drops.
impl LineSource for std_mpsc::Receiver<String> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.recv().ok())
    }
}

/// The event loop's side of a reader: a way to request the next line.
#[derive(Debug)]
pub struct ReaderHandle {
    pane: PaneId,
    arm: mpsc::Sender<()>,
}

impl ReaderHandle {
    /// A handle and the receiving end its reader waits on.
    pub fn new(pane: PaneId) -> (Self, mpsc::Receiver<()>) {
        let (arm, armed) = mpsc::channel(1);
        (Self { pane, arm }, armed)
    }

    pub fn pane(&self) -> PaneId {
        self.pane
    }

    pub fn request_read(&self) {
        match self.arm.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                warn!("pane {} already has a read outstanding", self.pane)
            }
            Err(TrySendError::Closed(())) => debug!("reader for pane {} has retired", self.pane),
        }
    }
}

/// Starts the reader thread for `pane`. It posts [Message::Line] for every line
/// and a final [Message::Closed] at end-of-stream or on a read error.
pub fn spawn_reader(
    pane: PaneId,
    mut source: Box<dyn LineSource>,
    inbox: mpsc::UnboundedSender<Message>,
) -> Result<ReaderHandle> {
    let (handle, mut armed) = ReaderHandle::new(pane);
    thread::Builder::new()
        .name(format!("source-{pane}"))
        .spawn(move || {
            while armed.blocking_recv().is_some() {
                let message = match source.next_line() {
                    Ok(Some(text)) => Message::Line { pane, text },
                    Ok(None) => Message::Closed(pane),
                    Err(err) => {
                        warn!("reading pane {pane} failed: {err}");
                        Message::Closed(pane)
                    }
                };
                let last = matches!(message, Message::Closed(_));
                if inbox.send(message).is_err() || last {
                    break;
                }
            }
            debug!("reader for pane {pane} retired");
        })
        .with_context(|| format!("starting reader thread for pane {pane}"))?;
    Ok(handle)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    /// Yields its chunks one `read` at a time, then fails with `error`.
    struct Chunked {
        chunks: VecDeque<&'static [u8]>,
        error: Option<io::ErrorKind>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => match self.error {
                    Some(kind) => Err(io::Error::from(kind)),
                    None => Ok(0),
                },
            }
        }
    }

    fn drain(source: &mut dyn LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn terminal_lines_span_reads() {
        let mut source = TerminalLines::new(Chunked {
            chunks: VecDeque::from([&b"al"[..], &b"pha\r\nbe"[..], &b"ta\r\n"[..]]),
            error: None,
        });
        assert_eq!(drain(&mut source), ["alpha", "beta"]);
    }

    #[test]
    fn terminal_lines_flush_partial_line_at_eof() {
        let mut source = TerminalLines::new(Cursor::new(b"done\r\nno newline".to_vec()));
        assert_eq!(drain(&mut source), ["done", "no newline"]);
        assert_eq!(source.next_line().unwrap(), None);
    }

    #[test]
    fn terminal_lines_surface_other_errors() {
        let mut source = TerminalLines::new(Chunked {
            chunks: VecDeque::from([&b"x\n"[..]]),
            error: Some(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(source.next_line().unwrap(), Some("x".to_string()));
        assert!(source.next_line().is_err());
    }

    #[test]
    fn channel_source_ends_when_sender_drops() {
        let (tx, mut rx) = std_mpsc::channel();
        tx.send("a".to_string()).unwrap();
        drop(tx);
        assert_eq!(drain(&mut rx), ["a"]);
    }

    #[test]
    fn request_read_never_queues_two_tokens() {
        let (handle, mut armed) = ReaderHandle::new(PaneId(1));
        handle.request_read();
        handle.request_read();
        assert!(armed.try_recv().is_ok());
        assert!(armed.try_recv().is_err());
    }

    #[test]
    fn reader_sends_one_line_per_request() {
        let (tx, mut inbox) = mpsc::unbounded_channel();
        let (lines, source) = std_mpsc::channel();
        for text in ["a", "b"] {
            lines.send(text.to_string()).unwrap();
        }
        drop(lines);
        let reader = spawn_reader(PaneId(3), Box::new(source), tx).unwrap();

        reader.request_read();
        assert_eq!(
            inbox.blocking_recv(),
            Some(Message::Line {
                pane: PaneId(3),
                text: "a".to_string()
            })
        );
        assert!(inbox.try_recv().is_err());

        reader.request_read();
        assert_eq!(
            inbox.blocking_recv(),
            Some(Message::Line {
                pane: PaneId(3),
                text: "b".to_string()
            })
        );

        reader.request_read();
        assert_eq!(inbox.blocking_recv(), Some(Message::Closed(PaneId(3))));
        // The reader has retired and dropped its sender.
        assert_eq!(inbox.blocking_recv(), None);
    }
}
