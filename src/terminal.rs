use std::io;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::message::Message;

/// Raw mode plus the alternate screen for as long as the value lives.
pub struct TerminalSession {
    _private: (),
}

impl TerminalSession {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("enabling raw mode")?;
        let session = Self { _private: () };
        execute!(io::stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))
            .context("entering the alternate screen")?;
        Ok(session)
    }

    /// Current size as `(width, height)` in cells.
    pub fn size(&self) -> Result<(u16, u16)> {
        terminal::size().context("querying terminal size")
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Converts a terminal event into a loop message, if it is one the loop wants.
pub fn message_for(event: Event) -> Option<Message> {
    match event {
        Event::Key(key) => Some(Message::Key(key)),
        Event::Resize(width, height) => Some(Message::Resize { width, height }),
        _ => None,
    }
}

/// Forwards key and resize events to the loop until it stops listening.
pub fn spawn_input_reader(inbox: UnboundedSender<Message>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("terminal-input".to_string())
        .spawn(move || loop {
            let message = match event::read() {
                Ok(event) => match message_for(event) {
                    Some(message) => message,
                    None => continue,
                },
                Err(err) => {
                    warn!("reading terminal events failed: {err}");
                    let _ = inbox.send(Message::InputFailed(err.to_string()));
                    break;
                }
            };
            if inbox.send(message).is_err() {
                debug!("event loop is gone, stopping terminal input");
                break;
            }
        })
        .context("starting terminal input thread")
}
