use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::LevelFilter;

use crate::filter::Matcher;
use crate::pane::DEFAULT_CAPACITY;

pub const DEFAULT_TITLE: &str = "default";

/// Passthrough command behind the default pane in command mode.
const PASSTHROUGH: &str = "cat";

#[derive(Debug, Parser)]
#[command(
    name = "branch",
    version,
    about = "branch is a command line demultiplexer with multiple output windows",
    long_about = "branch is a command line demultiplexer with multiple output windows.\n\
                  It reads from stdin and sends it to multiple commands.\n\
                  Each command is displayed in a separate pane.",
    after_help = "Example:\n  tail -f /var/log/syslog | branch 'grep -i error' 'grep -i warn' 'grep -i fail'"
)]
pub struct Cli {
    /// Commands to run, one pane each (substrings to match with --filter)
    #[arg(required = true, value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Add a pane for lines that no filter takes
    #[arg(short, long)]
    pub default: bool,

    /// Treat every argument as a plain substring filter instead of a command
    #[arg(short, long)]
    pub filter: bool,

    /// Shell used to run each command as `<shell> -c <command>`
    #[arg(short, long, default_value = "sh")]
    pub shell: String,

    /// Lines of scrollback kept per pane
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Write diagnostics to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// One of off, error, warn, info, debug, trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level `{value}`"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each pane shows the output of a child process on a pseudo-terminal.
    Command,
    /// Each pane shows the input lines containing a substring.
    Filter,
}

/// What feeds one pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneSource {
    Command(String),
    Filter(Matcher),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSpec {
    pub title: String,
    pub source: PaneSource,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub commands: Vec<String>,
    pub default_pane: bool,
    pub mode: Mode,
    pub shell: String,
    pub capacity: usize,
    pub log_file: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl TryFrom<Cli> for Config {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.commands.is_empty() {
            bail!("at least one command is required");
        }
        if cli.capacity == 0 {
            bail!("--capacity must be at least 1");
        }
        if cli.shell.trim().is_empty() {
            bail!("--shell must not be empty");
        }
        Ok(Self {
            commands: cli.commands,
            default_pane: cli.default,
            mode: if cli.filter { Mode::Filter } else { Mode::Command },
            shell: cli.shell,
            capacity: cli.capacity,
            log_file: cli.log_file,
            log_level: cli.log_level,
        })
    }
}

impl Config {
    /// One spec per pane, in display order. The default pane comes last.
    pub fn panes(&self) -> Vec<PaneSpec> {
        let mut panes: Vec<PaneSpec> = self
            .commands
            .iter()
            .map(|command| PaneSpec {
                title: command.clone(),
                source: match self.mode {
                    Mode::Command => PaneSource::Command(command.clone()),
                    Mode::Filter => PaneSource::Filter(Matcher::Contains(command.clone())),
                },
            })
            .collect();
        if self.default_pane {
            let source = match self.mode {
                Mode::Command => PaneSource::Command(PASSTHROUGH.to_string()),
                Mode::Filter => PaneSource::Filter(Matcher::NoneOf(self.commands.clone())),
            };
            panes.push(PaneSpec {
                title: DEFAULT_TITLE.to_string(),
                source,
            });
        }
        panes
    }
}
