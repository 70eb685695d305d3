//! Model behind the output panel: the captured output of the last run, its
//! cleaned and wrapped form for the current panel width, and a scroll offset.

use std::sync::LazyLock;

use regex::Regex;
use unicode_width::UnicodeWidthChar;

// CSI sequences, OSC sequences (BEL or ST terminated), and lone two-byte escapes.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("ANSI regex is valid")
});

const TAB_WIDTH: usize = 4;

/// Make captured process output safe to draw: escape sequences removed,
/// line endings normalised, tabs expanded.
pub fn sanitize(raw: &str) -> String {
    let stripped = ANSI_RE.replace_all(raw, "");
    let mut out = String::with_capacity(stripped.len());
    for line in stripped.replace("\r\n", "\n").split('\n') {
        let mut column = 0;
        // A bare carriage return redraws the line; keep what was drawn last.
        let visible = line.rsplit('\r').next().unwrap_or(line);
        for ch in visible.chars() {
            match ch {
                '\t' => {
                    let pad = TAB_WIDTH - column % TAB_WIDTH;
                    out.extend(std::iter::repeat_n(' ', pad));
                    column += pad;
                }
                c if c.is_control() => {}
                c => {
                    out.push(c);
                    column += c.width().unwrap_or(0);
                }
            }
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Hard-wrap every line at `width` terminal columns. A zero width leaves
/// lines whole. A wide character that would straddle the edge moves down.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        if width == 0 {
            lines.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        let mut used = 0;
        for ch in line.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                used = 0;
            }
            current.push(ch);
            used += w;
        }
        lines.push(current);
    }
    lines
}

#[derive(Debug, Default)]
pub struct OutputPanel {
    /// Output as captured, escapes included. `lines` is derived from it.
    raw: String,
    lines: Vec<String>,
    width: usize,
    height: usize,
    scroll: usize,
}

impl OutputPanel {
    /// Replace the contents and jump back to the top.
    pub fn set_text(&mut self, raw: &str) {
        self.raw = raw.to_string();
        self.lines = wrap(&sanitize(raw), self.width);
        self.scroll = 0;
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The cleaned text, unwrapped.
    pub fn text(&self) -> String {
        sanitize(&self.raw)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Track the inner size of the panel. Re-wraps when the width changes.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.height = height;
        if width != self.width {
            self.width = width;
            self.lines = wrap(&sanitize(&self.raw), width);
        }
        self.scroll = self.scroll.min(self.max_scroll());
    }

    pub fn visible(&self) -> &[String] {
        let end = (self.scroll + self.height.max(1)).min(self.lines.len());
        &self.lines[self.scroll.min(end)..end]
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(self.height.max(1))
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = (self.scroll + n).min(self.max_scroll());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.height.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.height.max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }
}
