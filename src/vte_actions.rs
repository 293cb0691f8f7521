use crate::vte_actions::VteAction::{Backspace, CarriageReturn, LineFeed, Tab, Text};
use unicode_width::UnicodeWidthStr;
use vte::{Parser, Perform};

const TAB_STOP: usize = 8;

/// The semantic actions that matter for turning terminal output into plain lines.
/// Escape sequences (colors, cursor movement, ...) produce nothing.
#[derive(Debug, PartialEq, Eq)]
pub enum VteAction {
    Text(char),
    Tab,
    LineFeed,
    CarriageReturn,
    Backspace,
}

/// A wrapper over [Parser] and [Perform] which takes bytes in and exposes the
/// semantic actions. Parser state carries over between calls, so sequences may
/// be split across reads.
pub struct VteActionParser {
    parser: Parser,
}

impl VteActionParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Vec<VteAction> {
        let mut performer = Performer::new();
        for byte in bytes {
            self.parser.advance(&mut performer, *byte)
        }
        performer.actions
    }
}

// Private struct to hide this implementation detail
struct Performer {
    actions: Vec<VteAction>,
}

impl Performer {
    fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }
}

impl Perform for Performer {
    fn print(&mut self, c: char) {
        self.actions.push(Text(c))
    }

    fn execute(&mut self, byte: u8) {
        let action = match byte {
            8 => Backspace,
            9 => Tab,
            10 => LineFeed,
            13 => CarriageReturn,
            _ => return,
        };
        self.actions.push(action);
    }
}

/// Turns a pseudo-terminal byte stream into complete plain-text lines.
pub struct LineDecoder {
    parser: VteActionParser,
    line: String,
    /// Set by a carriage return: the next printed character starts the line over.
    rewind: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            parser: VteActionParser::new(),
            line: String::new(),
            rewind: false,
        }
    }

    /// Feeds bytes in and returns every line they complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for action in self.parser.parse_bytes(bytes) {
            match action {
                Text(c) => {
                    self.start_over_if_rewound();
                    self.line.push(c);
                }
                Tab => {
                    self.start_over_if_rewound();
                    let pad = TAB_STOP - self.line.width() % TAB_STOP;
                    self.line.extend(std::iter::repeat(' ').take(pad));
                }
                Backspace => {
                    self.line.pop();
                }
                CarriageReturn => self.rewind = true,
                LineFeed => {
                    self.rewind = false;
                    lines.push(std::mem::take(&mut self.line));
                }
            }
        }
        lines
    }

    /// The unterminated tail of the stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.rewind = false;
        if self.line.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.line))
    }

    fn start_over_if_rewound(&mut self) {
        if self.rewind {
            self.rewind = false;
            self.line.clear();
        }
    }
}
