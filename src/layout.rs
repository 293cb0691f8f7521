use log::{debug, info};

use crate::block::Block;
use crate::component::{Command, Component};
use crate::message::{Action, Message};
use crate::pane::{IdSequence, Pane, PaneEvent, PaneId};

const SEPARATOR: &str = "|";

/// Width of every pane when `panes` panes and their `panes + 1` separator
/// columns share `total` columns.
pub fn pane_width(total: usize, panes: usize) -> usize {
    if panes == 0 {
        return 0;
    }
    total.saturating_sub(panes + 1) / panes
}

#[derive(Debug)]
pub struct Layout {
    panes: Vec<Pane>,
    height: usize,
    pane_width: usize,
    terminated: bool,
}

impl Layout {
    /// Panes are drawn left to right in the given order.
    pub fn new(panes: Vec<Pane>) -> Self {
        Self {
            panes,
            height: 0,
            pane_width: 0,
            terminated: false,
        }
    }

    /// Builds one pane per title, numbering them from a fresh id sequence.
    pub fn with_titles<I>(titles: I, capacity: usize) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut ids = IdSequence::new();
        let panes = titles
            .into_iter()
            .map(|title| Pane::new(ids.next_id(), title, capacity))
            .collect();
        Self::new(panes)
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.panes.iter().find(|pane| pane.id() == id)
    }

    pub fn pane_width(&self) -> usize {
        self.pane_width
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn handle_resize(&mut self, width: usize, height: usize) {
        self.height = height;
        self.pane_width = pane_width(width, self.panes.len());
        debug!(
            "resized to {width}x{height}, {} panes of width {}",
            self.panes.len(),
            self.pane_width
        );
        let event = PaneEvent::Resize {
            width: self.pane_width,
            height: height.saturating_sub(1),
        };
        self.broadcast(&event);
    }

    fn handle_key(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Quit => {
                info!("quit requested");
                self.terminated = true;
                return vec![Command::Quit];
            }
            // No focus: every pane scrolls together.
            Action::ScrollUp => self.broadcast(&PaneEvent::ScrollUp),
            Action::ScrollDown => self.broadcast(&PaneEvent::ScrollDown),
        }
        Vec::new()
    }

    fn route(&mut self, id: PaneId, event: PaneEvent) -> Vec<Command> {
        match self.panes.iter_mut().find(|pane| pane.id() == id) {
            Some(pane) => pane.update(event),
            None => {
                debug!("dropping event for unknown pane {id}");
                Vec::new()
            }
        }
    }

    fn broadcast(&mut self, event: &PaneEvent) {
        for pane in &mut self.panes {
            pane.update(event.clone());
        }
    }
}

impl Component for Layout {
    type Message = Message;

    fn init(&self) -> Vec<Command> {
        self.panes.iter().flat_map(Pane::init).collect()
    }

    fn update(&mut self, message: Message) -> Vec<Command> {
        if self.terminated {
            return Vec::new();
        }
        match message {
            Message::Line { pane, text } => self.route(pane, PaneEvent::Line { pane, text }),
            Message::Closed(pane) => self.route(pane, PaneEvent::Closed(pane)),
            Message::Key(key) => match Action::from_key(&key) {
                Some(action) => self.handle_key(action),
                None => Vec::new(),
            },
            Message::Resize { width, height } => {
                self.handle_resize(width.into(), height.into());
                Vec::new()
            }
            // Handled by the event loop before it gets here.
            Message::InputFailed(_) => Vec::new(),
        }
    }

    fn render(&self) -> Block {
        if self.height == 0 {
            return Block::new();
        }
        let separator = Block::column(SEPARATOR, self.height);
        let mut blocks = Vec::with_capacity(self.panes.len() * 2 + 1);
        for pane in &self.panes {
            blocks.push(separator.clone());
            blocks.push(pane.render());
        }
        blocks.push(separator);
        Block::join_horizontal(&blocks)
    }
}
