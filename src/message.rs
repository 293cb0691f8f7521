use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::pane::PaneId;

/// Everything that reaches the event loop's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One decoded line from a pane's source.
    Line { pane: PaneId, text: String },
    /// The pane's source reached end-of-stream; its reader has retired.
    Closed(PaneId),
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    /// The terminal stopped delivering input events.
    InputFailed(String),
}

/// What a key press means to the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ScrollUp,
    ScrollDown,
}

impl Action {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            KeyCode::Char('q') => Some(Self::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Self::ScrollUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Self::ScrollDown),
            _ => None,
        }
    }
}
