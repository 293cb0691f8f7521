//! Broadcast of the shared input stream to every pane's sink.
//!
//! Each chunk is written to all sinks, one after the other, before the next
//! chunk is read. A sink that blocks therefore holds back every other sink.

use std::io::{self, Read, Write};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{debug, info, warn};

const CHUNK_SIZE: usize = 8192;

struct Sink {
    name: String,
    writer: Box<dyn Write + Send>,
}

#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Sink>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, name: impl Into<String>, writer: Box<dyn Write + Send>) {
        self.sinks.push(Sink {
            name: name.into(),
            writer,
        });
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Copies `input` to every sink until it ends, then closes the sinks.
    /// Returns the number of bytes read from `input`.
    pub fn run<R: Read>(mut self, mut input: R) -> io::Result<u64> {
        let mut chunk = vec![0; CHUNK_SIZE];
        let mut total = 0;
        loop {
            let n = match input.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.close();
                    return Err(err);
                }
            };
            total += n as u64;
            self.broadcast(&chunk[..n]);
            if self.sinks.is_empty() {
                info!("every sink has failed, no longer reading input");
                return Ok(total);
            }
        }
        info!("input ended after {total} bytes");
        self.close();
        Ok(total)
    }

    /// A sink that rejects a write is dropped; the others keep receiving.
    fn broadcast(&mut self, chunk: &[u8]) {
        self.sinks.retain_mut(|sink| {
            match sink.writer.write_all(chunk).and_then(|()| sink.writer.flush()) {
                Ok(()) => true,
                Err(err) => {
                    warn!("dropping sink {}: {err}", sink.name);
                    false
                }
            }
        });
    }

    fn close(self) {
        for sink in self.sinks {
            debug!("closing sink {}", sink.name);
            drop(sink.writer);
        }
    }
}

/// Runs the fan-out on its own thread.
pub fn spawn<R>(fanout: FanOut, input: R) -> Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("fan-out".to_string())
        .spawn(move || {
            let result = fanout.run(input);
            if let Err(err) = &result {
                warn!("reading input failed: {err}");
            }
            result
        })
        .context("starting fan-out thread")
}
