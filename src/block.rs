use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// A run of text drawn with a single style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    /// Titles are drawn emphasized (reverse video, bold).
    pub emphasis: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    rows: Vec<Vec<Span>>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// A one-column block repeating `cell` on every row.
    pub fn column(cell: &str, height: usize) -> Self {
        Self {
            rows: (0..height).map(|_| vec![Span::plain(cell)]).collect(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Span>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<Span>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Places blocks side by side, top-aligned. Row `i` of the result is the
    /// concatenation of row `i` of every block that has one.
    pub fn join_horizontal(blocks: &[Block]) -> Self {
        let height = blocks.iter().map(Block::height).max().unwrap_or(0);
        let rows = (0..height)
            .map(|row| {
                blocks
                    .iter()
                    .filter_map(|block| block.rows.get(row))
                    .flat_map(|spans| spans.iter().cloned())
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// The unstyled text of the block, one line per row.
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(|spans| spans.iter().map(|span| span.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Clips `text` to `width` display columns, then pads it with spaces to exactly
/// `width` columns. A wide character that would straddle the edge is dropped,
/// and so are control characters, which have no width of their own.
pub fn fit(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0;
    for c in text.chars().filter(|c| !c.is_control()) {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}

/// Like [fit], but centers `text` within `width` columns. Odd padding goes to
/// the right.
pub fn center(text: &str, width: usize) -> String {
    let clipped = fit(text, width);
    let content = clipped.trim_end();
    let left = (width - content.width()) / 2;
    let mut out = " ".repeat(left);
    out.push_str(content);
    fit(&out, width)
}
