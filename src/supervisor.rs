//! Child processes behind the panes, and the plumbing that connects them.
//!
//! Every command runs under its own pseudo-terminal so line-buffered tools
//! flush per line. Its stdin becomes a fan-out sink and its output becomes the
//! pane's line source. In filter mode no processes are started: the sinks are
//! in-process filters feeding channels.

use std::env;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize, PtySystem};

use crate::config::{Config, PaneSource, PaneSpec};
use crate::fanout::FanOut;
use crate::filter::{self, FILTER_BACKLOG};
use crate::source::{LineSource, TerminalLines};

const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

/// A pane title and the source its reader will pull lines from.
pub struct Binding {
    pub title: String,
    pub source: Box<dyn LineSource>,
}

/// Everything needed to start the run.
pub struct Streams {
    pub supervisor: Supervisor,
    pub bindings: Vec<Binding>,
    pub fanout: FanOut,
}

struct Process {
    title: String,
    child: Box<dyn Child + Send + Sync>,
    // Held so the pseudo-terminal outlives the run.
    _master: Box<dyn MasterPty + Send>,
}

/// Owns the child processes for the duration of the run.
#[derive(Default)]
pub struct Supervisor {
    processes: Vec<Process>,
}

impl Supervisor {
    /// Starts one source per pane, in `config.panes()` order. Children started
    /// before a failure are killed again.
    pub fn launch(config: &Config) -> Result<Streams> {
        let mut streams = Streams {
            supervisor: Supervisor::default(),
            bindings: Vec::new(),
            fanout: FanOut::new(),
        };
        let pty_system = native_pty_system();
        let cwd = env::current_dir().context("resolving working directory")?;
        for spec in config.panes() {
            let PaneSpec { title, source } = spec;
            let started = match source {
                PaneSource::Command(command) => streams.spawn_command(
                    &*pty_system,
                    &config.shell,
                    &cwd,
                    title,
                    &command,
                ),
                PaneSource::Filter(matcher) => {
                    let (sink, lines) = filter::filter_channel(matcher, FILTER_BACKLOG);
                    streams.fanout.add_sink(title.clone(), Box::new(sink));
                    streams.bindings.push(Binding {
                        title,
                        source: Box::new(lines),
                    });
                    Ok(())
                }
            };
            if let Err(err) = started {
                streams.supervisor.shutdown();
                return Err(err);
            }
        }
        Ok(streams)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Best-effort kill of every child. Does not wait for them to exit.
    ///
    /// The children's input handles are owned by the fan-out thread, which may
    /// still be blocked reading stdin. They close when its next write to a
    /// killed child fails and the sink is dropped, or at process exit.
    pub fn shutdown(self) {
        for mut process in self.processes {
            match process.child.kill() {
                Ok(()) => debug!("killed `{}`", process.title),
                Err(err) => debug!("could not kill `{}`: {err}", process.title),
            }
        }
    }
}

impl Streams {
    fn spawn_command(
        &mut self,
        pty_system: &dyn PtySystem,
        shell: &str,
        cwd: &std::path::Path,
        title: String,
        command: &str,
    ) -> Result<()> {
        let pair = pty_system
            .openpty(PTY_SIZE)
            .with_context(|| format!("allocating a pseudo-terminal for `{title}`"))?;
        disable_echo(&*pair.master)
            .with_context(|| format!("configuring the pseudo-terminal for `{title}`"))?;

        let mut builder = CommandBuilder::new(shell);
        builder.arg("-c");
        builder.arg(command);
        builder.cwd(cwd);
        let child = pair
            .slave
            .spawn_command(builder)
            .with_context(|| format!("spawning `{title}`"))?;
        // Only the child may hold the slave, or reads never see it hang up.
        drop(pair.slave);
        info!("started `{title}` (pid {:?})", child.process_id());

        let reader = pair
            .master
            .try_clone_reader()
            .with_context(|| format!("opening the output of `{title}`"))?;
        let writer = pair
            .master
            .take_writer()
            .with_context(|| format!("opening the input of `{title}`"))?;

        self.supervisor.processes.push(Process {
            title: title.clone(),
            child,
            _master: pair.master,
        });
        self.fanout.add_sink(title.clone(), writer);
        self.bindings.push(Binding {
            title,
            source: Box::new(TerminalLines::new(reader)),
        });
        Ok(())
    }
}

/// Turns off local echo so the child's input does not show up in its output,
/// keeping canonical line editing and signal keys.
#[cfg(unix)]
fn disable_echo(master: &dyn MasterPty) -> Result<()> {
    use std::io;
    use std::mem::MaybeUninit;

    let Some(fd) = master.as_raw_fd() else {
        bail!("pseudo-terminal has no file descriptor");
    };
    let mut termios = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: `fd` is an open terminal owned by `master`, and tcgetattr fully
    // initializes `termios` when it succeeds.
    let mut termios = unsafe {
        if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
            return Err(io::Error::last_os_error()).context("reading terminal attributes");
        }
        termios.assume_init()
    };
    termios.c_lflag &= !libc::ECHO;
    termios.c_lflag |= libc::ICANON | libc::ISIG;
    termios.c_iflag |= libc::ICRNL;
    // SAFETY: same descriptor, and `termios` is a valid attribute set.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(io::Error::last_os_error()).context("writing terminal attributes");
    }
    Ok(())
}

#[cfg(not(unix))]
fn disable_echo(_master: &dyn MasterPty) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    use crate::config::Cli;

    fn config(args: &[&str]) -> Config {
        let cli = Cli::parse_from(std::iter::once("branch").chain(args.iter().copied()));
        Config::try_from(cli).unwrap()
    }

    #[test]
    fn filter_mode_starts_no_processes() {
        let streams = Supervisor::launch(&config(&["-f", "-d", "a", "b"])).unwrap();
        assert!(streams.supervisor.is_empty());
        assert_eq!(streams.fanout.sink_count(), 3);
        let titles: Vec<_> = streams.bindings.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "default"]);
    }

    #[test]
    fn filter_bindings_receive_matching_input() {
        let streams = Supervisor::launch(&config(&["-f", "-d", "err"])).unwrap();
        let Streams {
            fanout,
            mut bindings,
            ..
        } = streams;
        fanout.run(&b"err: one\nok: two\n"[..]).unwrap();

        let mut default = bindings.pop().unwrap();
        let mut errors = bindings.pop().unwrap();
        assert_eq!(errors.source.next_line().unwrap(), Some("err: one".into()));
        assert_eq!(errors.source.next_line().unwrap(), None);
        assert_eq!(default.source.next_line().unwrap(), Some("ok: two".into()));
        assert_eq!(default.source.next_line().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "allocates a real pseudo-terminal"]
    fn command_output_reaches_binding_without_echo() {
        let streams = Supervisor::launch(&config(&["cat"])).unwrap();
        let Streams {
            supervisor,
            fanout,
            mut bindings,
        } = streams;
        assert_eq!(supervisor.len(), 1);

        let handle = crate::fanout::spawn(fanout, &b"hello\n"[..]).unwrap();
        handle.join().unwrap().unwrap();

        let line = bindings[0].source.next_line().unwrap();
        assert_eq!(line, Some("hello".to_string()));
        supervisor.shutdown();
    }
}
