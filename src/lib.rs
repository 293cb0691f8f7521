/*
stdin is broadcast to one sink per pane, each pane shows what its sink produces

Data flow:
    stdin
        fan-out thread, one blocking write per sink per chunk
    sinks
        child process on a pseudo-terminal (command mode)
        in-process substring filter feeding a channel (filter mode)
    sources
        one reader thread per pane, one line per request
    event loop
        single inbox, owns the Layout and every Pane
        re-arms a reader only after consuming its line
    screen
        whole frame repainted after each batch of messages

Nothing but the event loop touches pane state, so none of it is locked.
Quitting abandons readers that are still blocked; process exit reaps them.
*/
pub mod block;
pub mod component;
pub mod config;
pub mod fanout;
pub mod filter;
pub mod layout;
pub mod logging;
pub mod message;
pub mod pane;
pub mod runtime;
pub mod screen;
pub mod source;
pub mod supervisor;
pub mod terminal;
mod vte_actions;

pub use config::{Cli, Config};
pub use runtime::run;
