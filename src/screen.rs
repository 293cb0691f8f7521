use std::io::Write;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};

use crate::block::Block;

pub struct Screen<W: Write> {
    output: W,
}

impl<W: Write> Screen<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Redraws every row of `frame` from the top-left corner and flushes once.
    pub fn draw(&mut self, frame: &Block) -> Result<()> {
        for (row, spans) in frame.rows().iter().enumerate() {
            let row = u16::try_from(row).context("frame is taller than any terminal")?;
            queue!(self.output, MoveTo(0, row))?;
            for span in spans {
                if span.emphasis {
                    queue!(
                        self.output,
                        SetAttribute(Attribute::Reverse),
                        SetAttribute(Attribute::Bold),
                        Print(&span.text),
                        SetAttribute(Attribute::Reset)
                    )?;
                } else {
                    queue!(self.output, Print(&span.text))?;
                }
            }
            queue!(self.output, Clear(ClearType::UntilNewLine))?;
        }
        self.output.flush()?;
        Ok(())
    }
}
