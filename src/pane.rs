//! A single scrolling region bound to one input stream.
//!
//! A pane keeps the last `capacity` lines it received and a half-open view
//! window `[view_start, view_end)` into them. While the window touches the end
//! of the buffer the pane is tail-following: every pushed line slides the
//! window so the newest `height` lines stay visible. Scrolling up detaches the
//! window; scrolling back down to the end re-attaches it.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;

use log::debug;

use crate::block::{self, Block, Span};
use crate::component::{Command, Component};

pub const DEFAULT_CAPACITY: usize = 10_000;

/// Routes inbound lines to exactly one pane. Stable for the pane's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(pub u32);

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source scoped to a single layout.
#[derive(Debug, Default)]
pub struct IdSequence {
    last: u32,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PaneId {
        self.last += 1;
        PaneId(self.last)
    }
}

/// Events a pane reacts to. The layout translates loop messages into these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneEvent {
    Line { pane: PaneId, text: String },
    Closed(PaneId),
    ScrollUp,
    ScrollDown,
    /// Dimensions of the content area, title row excluded.
    Resize { width: usize, height: usize },
}

#[derive(Debug)]
pub struct Pane {
    id: PaneId,
    title: String,
    buffer: VecDeque<String>,
    capacity: usize,
    view_start: usize,
    view_end: usize,
    width: usize,
    height: usize,
    closed: bool,
}

impl Pane {
    /// A `capacity` of zero is raised to one.
    pub fn new(id: PaneId, title: impl Into<String>, capacity: usize) -> Self {
        Self {
            id,
            title: title.into(),
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
            view_start: 0,
            view_end: 0,
            width: 0,
            height: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> PaneId {
        self.id
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn view(&self) -> Range<usize> {
        self.view_start..self.view_end
    }

    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.buffer
            .range(self.view_start..self.view_end)
            .map(String::as_str)
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_following(&self) -> bool {
        self.view_end == self.buffer.len()
    }

    /// Appends a line, evicting the oldest one when the buffer is full.
    pub fn push(&mut self, line: String) {
        let following = self.is_following();
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
            // A detached window keeps showing the same lines. At the very top
            // it has nowhere to go, so it slides forward with the eviction.
            if !following && self.view_start > 0 {
                self.view_start -= 1;
                self.view_end -= 1;
            }
        }
        self.buffer.push_back(line);
        if following {
            self.follow_tail();
        }
    }

    pub fn scroll_up(&mut self) {
        if self.height == 0 {
            return;
        }
        self.fill_window();
        if self.view_start > 0 {
            self.view_start -= 1;
            self.view_end -= 1;
        }
    }

    pub fn scroll_down(&mut self) {
        if self.height == 0 {
            return;
        }
        self.fill_window();
        if self.view_end < self.buffer.len() {
            self.view_start += 1;
            self.view_end += 1;
        }
    }

    /// Sets the content area and re-anchors the window on the newest lines.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.follow_tail();
    }

    fn follow_tail(&mut self) {
        let len = self.buffer.len();
        self.view_end = len;
        self.view_start = len - self.height.min(len);
    }

    /// Grows a window narrower than the pane. A buffer that fits is shown
    /// whole; otherwise the window extends downward from its current start.
    fn fill_window(&mut self) {
        let len = self.buffer.len();
        if self.view_end - self.view_start >= self.height.min(len) {
            return;
        }
        if len <= self.height {
            self.view_start = 0;
            self.view_end = len;
        } else {
            self.view_start = self.view_start.min(len - self.height);
            self.view_end = self.view_start + self.height;
        }
    }
}

impl Component for Pane {
    type Message = PaneEvent;

    fn init(&self) -> Vec<Command> {
        if self.closed {
            return Vec::new();
        }
        vec![Command::ReadNext(self.id)]
    }

    fn update(&mut self, event: PaneEvent) -> Vec<Command> {
        match event {
            PaneEvent::Line { pane, text } => {
                if pane != self.id || self.closed {
                    return Vec::new();
                }
                self.push(text);
                return vec![Command::ReadNext(self.id)];
            }
            PaneEvent::Closed(pane) => {
                if pane == self.id && !self.closed {
                    debug!("pane {} ({}) reached end of stream", self.id, self.title);
                    self.closed = true;
                }
            }
            PaneEvent::ScrollUp => self.scroll_up(),
            PaneEvent::ScrollDown => self.scroll_down(),
            PaneEvent::Resize { width, height } => self.resize(width, height),
        }
        Vec::new()
    }

    /// A centered title row above `height` content rows, each exactly `width`
    /// columns wide.
    fn render(&self) -> Block {
        let mut out = Block::new();
        out.push_row(vec![Span::emphasized(block::center(&self.title, self.width))]);
        let mut visible = self.visible();
        for _ in 0..self.height {
            let line = visible.next().unwrap_or("");
            out.push_row(vec![Span::plain(block::fit(line, self.width))]);
        }
        out
    }
}
