//! The single-threaded core that owns all pane state.
//!
//! Workers (source readers, terminal input) only ever post [Message]s into one
//! inbox. The loop applies each message to the [Layout] in arrival order,
//! carries out the [Command]s that come back, and repaints.

use std::collections::HashMap;
use std::io::{self, BufWriter, Write};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::component::{Command, Component};
use crate::config::Config;
use crate::fanout::{self, FanOut};
use crate::layout::Layout;
use crate::message::Message;
use crate::pane::{IdSequence, Pane, PaneId};
use crate::screen::Screen;
use crate::source::{self, ReaderHandle};
use crate::supervisor::{Binding, Streams, Supervisor};
use crate::terminal::{self, TerminalSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct EventLoop<W: Write> {
    layout: Layout,
    readers: HashMap<PaneId, ReaderHandle>,
    screen: Screen<W>,
}

impl<W: Write> EventLoop<W> {
    pub fn new(layout: Layout, readers: Vec<ReaderHandle>, screen: Screen<W>) -> Self {
        let readers = readers
            .into_iter()
            .map(|reader| (reader.pane(), reader))
            .collect();
        Self {
            layout,
            readers,
            screen,
        }
    }

    /// Runs until a quit key, until every sender is gone, or until a frame
    /// cannot be drawn. Messages still queued after a quit are discarded.
    /// Returns the final layout.
    pub async fn run(mut self, mut inbox: UnboundedReceiver<Message>) -> Result<Layout> {
        let commands = self.layout.init();
        if self.execute(commands) == Flow::Quit {
            return Ok(self.layout);
        }
        self.repaint()?;
        while let Some(message) = inbox.recv().await {
            if self.dispatch(message)? == Flow::Quit {
                return Ok(self.layout);
            }
            // Apply whatever else is already queued before paying for a frame.
            while let Ok(message) = inbox.try_recv() {
                if self.dispatch(message)? == Flow::Quit {
                    return Ok(self.layout);
                }
            }
            self.repaint()?;
        }
        debug!("inbox closed");
        Ok(self.layout)
    }

    fn dispatch(&mut self, message: Message) -> Result<Flow> {
        if let Message::InputFailed(reason) = message {
            return Err(anyhow!("terminal input failed: {reason}"));
        }
        let commands = self.layout.update(message);
        Ok(self.execute(commands))
    }

    fn execute(&mut self, commands: Vec<Command>) -> Flow {
        for command in commands {
            match command {
                Command::ReadNext(pane) => match self.readers.get(&pane) {
                    Some(reader) => reader.request_read(),
                    None => debug!("no reader for pane {pane}"),
                },
                Command::Quit => return Flow::Quit,
            }
        }
        Flow::Continue
    }

    fn repaint(&mut self) -> Result<()> {
        self.screen
            .draw(&self.layout.render())
            .context("drawing to the terminal")
    }
}

/// Runs the whole program: starts the sources, takes over the terminal and
/// drives the event loop until the user quits.
pub async fn run(config: Config) -> Result<()> {
    let Streams {
        supervisor,
        bindings,
        fanout,
    } = Supervisor::launch(&config)?;
    let result = drive(&config, bindings, fanout).await;
    info!("shutting down {} child processes", supervisor.len());
    supervisor.shutdown();
    result
}

async fn drive(config: &Config, bindings: Vec<Binding>, broadcast: FanOut) -> Result<()> {
    let (outbox, inbox) = mpsc::unbounded_channel();
    let mut ids = IdSequence::new();
    let mut panes = Vec::with_capacity(bindings.len());
    let mut readers = Vec::with_capacity(bindings.len());
    for Binding { title, source } in bindings {
        let id = ids.next_id();
        info!("pane {id}: {title}");
        readers.push(source::spawn_reader(id, source, outbox.clone())?);
        panes.push(Pane::new(id, title, config.capacity));
    }
    info!("broadcasting input to {} sinks", broadcast.sink_count());
    fanout::spawn(broadcast, io::stdin())?;

    let session = TerminalSession::enter()?;
    let (width, height) = session.size()?;
    // Queued ahead of any line: readers are armed only once the loop starts.
    outbox
        .send(Message::Resize { width, height })
        .map_err(|_| anyhow!("event loop inbox closed before the first frame"))?;
    terminal::spawn_input_reader(outbox)?;

    let screen = Screen::new(BufWriter::new(io::stdout()));
    let result = EventLoop::new(Layout::new(panes), readers, screen)
        .run(inbox)
        .await;
    drop(session);
    result.map(drop)
}

#[cfg(test)]
mod test {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::{Arc, Mutex};

    fn line(pane: u32, text: &str) -> Message {
        Message::Line {
            pane: PaneId(pane),
            text: text.to_string(),
        }
    }

    fn quit() -> Message {
        Message::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
    }

    /// Frames written by the loop, readable after it has consumed the screen.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup_with<W: Write>(
        titles: &[&str],
        output: W,
    ) -> (EventLoop<W>, Vec<mpsc::Receiver<()>>) {
        let layout = Layout::with_titles(titles.iter().copied(), 100);
        let (handles, armed): (Vec<_>, Vec<_>) = layout
            .panes()
            .iter()
            .map(|pane| ReaderHandle::new(pane.id()))
            .unzip();
        (EventLoop::new(layout, handles, Screen::new(output)), armed)
    }

    fn setup(titles: &[&str]) -> (EventLoop<Vec<u8>>, Vec<mpsc::Receiver<()>>) {
        setup_with(titles, Vec::new())
    }

    #[tokio::test]
    async fn init_arms_every_reader_once() {
        let (event_loop, mut armed) = setup(&["a", "b"]);
        let (outbox, inbox) = mpsc::unbounded_channel();
        drop(outbox);
        event_loop.run(inbox).await.unwrap();
        for rx in &mut armed {
            assert!(rx.try_recv().is_ok());
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn applies_messages_in_order() {
        let (event_loop, _armed) = setup(&["a", "b"]);
        let (outbox, inbox) = mpsc::unbounded_channel();
        for message in [
            Message::Resize {
                width: 40,
                height: 10,
            },
            line(1, "one"),
            line(2, "x"),
            line(1, "two"),
            Message::Closed(PaneId(2)),
        ] {
            outbox.send(message).unwrap();
        }
        drop(outbox);

        let layout = event_loop.run(inbox).await.unwrap();
        let first: Vec<_> = layout.panes()[0].lines().collect();
        assert_eq!(first, ["one", "two"]);
        assert!(layout.panes()[1].is_closed());
        assert_eq!(layout.pane_width(), 18);
    }

    #[tokio::test]
    async fn quit_discards_pending_messages() {
        let (event_loop, _armed) = setup(&["a", "b"]);
        let (outbox, inbox) = mpsc::unbounded_channel();
        outbox.send(quit()).unwrap();
        outbox.send(line(1, "late")).unwrap();
        outbox.send(line(2, "later")).unwrap();

        let layout = event_loop.run(inbox).await.unwrap();
        assert!(layout.is_terminated());
        assert!(layout.panes().iter().all(Pane::is_empty));
        // The loop returned without waiting for the sender to go away.
        drop(outbox);
    }

    #[tokio::test]
    async fn consumed_line_rearms_its_reader() {
        let (event_loop, mut armed) = setup(&["a", "b"]);
        let (outbox, inbox) = mpsc::unbounded_channel();
        let task = tokio::spawn(event_loop.run(inbox));

        // Drain the initial tokens as a reader would, then deliver a line.
        for rx in &mut armed {
            rx.recv().await.unwrap();
        }
        outbox.send(line(2, "x")).unwrap();
        armed[1].recv().await.unwrap();
        assert!(armed[0].try_recv().is_err());

        outbox.send(quit()).unwrap();
        let layout = task.await.unwrap().unwrap();
        assert_eq!(layout.panes()[1].lines().collect::<Vec<_>>(), ["x"]);
    }

    #[tokio::test]
    async fn input_failure_is_fatal() {
        let (event_loop, _armed) = setup(&["a"]);
        let (outbox, inbox) = mpsc::unbounded_channel();
        outbox.send(Message::InputFailed("gone".into())).unwrap();
        assert!(event_loop.run(inbox).await.is_err());
    }

    struct Unwritable;

    impl Write for Unwritable {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal is gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal is gone"))
        }
    }

    #[tokio::test]
    async fn draw_failure_is_fatal() {
        let (event_loop, _armed) = setup_with(&["a"], Unwritable);
        let (outbox, inbox) = mpsc::unbounded_channel();
        outbox.send(line(1, "never shown")).unwrap();
        let err = event_loop.run(inbox).await.err().unwrap();
        assert!(format!("{err:#}").contains("drawing to the terminal"), "{err:#}");
        drop(outbox);
    }

    #[tokio::test]
    async fn paints_frame_after_messages() {
        let capture = Capture::default();
        let (event_loop, _armed) = setup_with(&["a"], capture.clone());
        let (outbox, inbox) = mpsc::unbounded_channel();
        outbox
            .send(Message::Resize {
                width: 8,
                height: 3,
            })
            .unwrap();
        outbox.send(line(1, "hello")).unwrap();
        drop(outbox);
        event_loop.run(inbox).await.unwrap();

        let mut parser = vt100::Parser::new(3, 8, 0);
        parser.process(&capture.0.lock().unwrap());
        let contents = parser.screen().contents();
        assert!(contents.contains("|  a   |"), "{contents:?}");
        assert!(contents.contains("|hello |"), "{contents:?}");
    }
}
