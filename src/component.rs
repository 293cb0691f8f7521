use crate::block::Block;
use crate::pane::PaneId;

/// Work a component asks the event loop to carry out after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-arm the source reader of this pane for exactly one more line.
    ReadNext(PaneId),
    /// Stop the event loop and tear everything down.
    Quit,
}

/// The initialize / handle-event / render triple shared by [crate::pane::Pane]
/// and [crate::layout::Layout]. The layout owns its panes and forwards to them.
pub trait Component {
    type Message;

    fn init(&self) -> Vec<Command>;

    fn update(&mut self, message: Self::Message) -> Vec<Command>;

    fn render(&self) -> Block;
}
