// File: src/overlay.rs
use crate::core::dots::key_to_unicode;
use std::collections::HashMap;

/// Parallel per-line record of the canonical dot key behind each emitted
/// character, kept so the host can render a braille overlay next to the
/// print text. Spaces are stored as the empty key; multi-cell emissions
/// store their full `|`-joined key at the starting column.
#[derive(Debug, Clone, Default)]
pub struct OverlayTracker {
    lines: HashMap<u32, Vec<String>>,
}

impl OverlayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the dot key for the character at `(line, col)`. Columns
    /// past the current end of the line are reachable; the gap is filled
    /// with empty entries.
    pub fn record(&mut self, line: u32, col: u32, dot_key: &str) {
        let entries = self.lines.entry(line).or_default();
        let col = col as usize;
        if col >= entries.len() {
            entries.resize(col + 1, String::new());
        }
        entries[col] = dot_key.to_string();
    }

    pub fn record_space(&mut self, line: u32, col: u32) {
        self.record(line, col, "");
    }

    /// The line rendered as Unicode braille, one glyph per stored cell;
    /// empty entries become the braille space.
    pub fn line_text(&self, line: u32) -> Option<String> {
        self.lines
            .get(&line)
            .map(|entries| entries.iter().map(|key| key_to_unicode(key)).collect())
    }

    pub fn has_line(&self, line: u32) -> bool {
        self.lines.contains_key(&line)
    }

    /// Tracked line numbers, ascending.
    pub fn tracked_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.lines.keys().copied().collect();
        lines.sort_unstable();
        lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
