use std::time::{Duration, Instant};

/// Maximum entries in the undo stack.
const MAX_UNDO_ENTRIES: usize = 1000;

/// Consecutive edits of the same kind on one line within this window undo together.
const GROUPING_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Insert,
    Delete,
    Structural,
}

/// Buffer and cursor as they were before an edit.
#[derive(Debug, Clone)]
struct Snapshot {
    buffer: Vec<String>,
    cursor_line: usize,
    cursor_col: usize,
}

/// Text buffer state for the active tab.
///
/// Lines are split on `\n` only, so [`EditorState::text`] reproduces the
/// content it was built from byte for byte. Cursor columns count chars.
#[derive(Debug)]
pub struct EditorState {
    pub buffer: Vec<String>,
    pub cursor_line: usize,
    pub cursor_col: usize,
    /// Line index of the topmost visible line.
    pub scroll_offset: usize,
    /// Visible height of the editor area (set during render).
    pub visible_height: usize,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    last_edit: Option<(EditKind, usize, Instant)>,
}

impl EditorState {
    pub fn new(content: &str) -> Self {
        Self {
            buffer: content.split('\n').map(String::from).collect(),
            cursor_line: 0,
            cursor_col: 0,
            scroll_offset: 0,
            visible_height: 24,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            last_edit: None,
        }
    }

    /// The buffer joined back into file content.
    pub fn text(&self) -> String {
        self.buffer.join("\n")
    }

    /// Swap in content that changed underneath the buffer (reload from disk).
    /// History is dropped; the cursor stays where it was if it still fits.
    pub fn replace_content(&mut self, content: &str) {
        self.buffer = content.split('\n').map(String::from).collect();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_edit = None;
        self.clamp_cursor();
        self.ensure_cursor_visible();
    }

    pub fn line_count(&self) -> usize {
        self.buffer.len()
    }

    /// Width of the line number gutter (digits + space + separator).
    pub fn gutter_width(&self) -> u16 {
        let digits = self.line_count().max(1).to_string().len() as u16;
        digits + 2
    }

    pub fn current_line_len(&self) -> usize {
        self.buffer
            .get(self.cursor_line)
            .map(|l| l.chars().count())
            .unwrap_or(0)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clamp_cursor(&mut self) {
        if self.cursor_line >= self.buffer.len() {
            self.cursor_line = self.buffer.len().saturating_sub(1);
        }
        let line_len = self.current_line_len();
        if self.cursor_col > line_len {
            self.cursor_col = line_len;
        }
    }

    /// Scroll so the cursor stays inside the viewport with a small margin.
    pub fn ensure_cursor_visible(&mut self) {
        let margin = 2usize;
        if self.visible_height == 0 {
            return;
        }
        if self.cursor_line < self.scroll_offset + margin {
            self.scroll_offset = self.cursor_line.saturating_sub(margin);
        }
        let bottom = self.scroll_offset + self.visible_height;
        if self.cursor_line >= bottom.saturating_sub(margin) {
            self.scroll_offset = self
                .cursor_line
                .saturating_sub(self.visible_height.saturating_sub(margin + 1));
        }
    }

    // ── Undo/Redo ─────────────────────────────────────────────────────

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            buffer: self.buffer.clone(),
            cursor_line: self.cursor_line,
            cursor_col: self.cursor_col,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.buffer = snapshot.buffer;
        self.cursor_line = snapshot.cursor_line;
        self.cursor_col = snapshot.cursor_col;
        self.clamp_cursor();
        self.ensure_cursor_visible();
    }

    /// Record the pre-edit state unless this edit continues the current group.
    fn begin_edit(&mut self, kind: EditKind) {
        let now = Instant::now();
        let grouped = kind != EditKind::Structural
            && self.last_edit.is_some_and(|(k, line, at)| {
                k == kind && line == self.cursor_line && now.duration_since(at) < GROUPING_TIMEOUT
            });
        if !grouped {
            self.undo_stack.push(self.snapshot());
            if self.undo_stack.len() > MAX_UNDO_ENTRIES {
                let excess = self.undo_stack.len() - MAX_UNDO_ENTRIES;
                self.undo_stack.drain(..excess);
            }
        }
        self.redo_stack.clear();
        self.last_edit = Some((kind, self.cursor_line, now));
    }

    /// Returns whether anything was undone.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        self.redo_stack.push(self.snapshot());
        self.restore(previous);
        self.last_edit = None;
        true
    }

    /// Returns whether anything was redone.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push(self.snapshot());
        self.restore(next);
        self.last_edit = None;
        true
    }

    // ── Buffer mutation ───────────────────────────────────────────────

    pub fn insert_char(&mut self, ch: char) {
        self.begin_edit(EditKind::Insert);
        if let Some(line) = self.buffer.get_mut(self.cursor_line) {
            let byte_idx = char_to_byte_index(line, self.cursor_col);
            line.insert(byte_idx, ch);
            self.cursor_col += 1;
        }
    }

    /// Insert `width` spaces (the Tab key).
    pub fn insert_indent(&mut self, width: usize) {
        self.begin_edit(EditKind::Insert);
        if let Some(line) = self.buffer.get_mut(self.cursor_line) {
            let byte_idx = char_to_byte_index(line, self.cursor_col);
            line.insert_str(byte_idx, &" ".repeat(width));
            self.cursor_col += width;
        }
    }

    /// Split the line at the cursor, carrying its leading whitespace over.
    pub fn insert_newline(&mut self) {
        self.begin_edit(EditKind::Structural);
        let Some(line) = self.buffer.get(self.cursor_line) else {
            return;
        };
        let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        let byte_idx = char_to_byte_index(line, self.cursor_col);
        let new_line = format!("{}{}", indent, &line[byte_idx..]);
        self.buffer[self.cursor_line].truncate(byte_idx);
        self.buffer.insert(self.cursor_line + 1, new_line);
        self.cursor_line += 1;
        self.cursor_col = indent.chars().count();
        self.ensure_cursor_visible();
    }

    /// Backspace. Returns whether the buffer changed.
    pub fn delete_char_before(&mut self) -> bool {
        if self.cursor_col > 0 {
            self.begin_edit(EditKind::Delete);
            let line = &mut self.buffer[self.cursor_line];
            let byte_idx = char_to_byte_index(line, self.cursor_col - 1);
            line.remove(byte_idx);
            self.cursor_col -= 1;
            true
        } else if self.cursor_line > 0 {
            self.begin_edit(EditKind::Structural);
            let current = self.buffer.remove(self.cursor_line);
            self.cursor_line -= 1;
            self.cursor_col = self.current_line_len();
            self.buffer[self.cursor_line].push_str(&current);
            self.ensure_cursor_visible();
            true
        } else {
            false
        }
    }

    /// Delete key. Returns whether the buffer changed.
    pub fn delete_char_at(&mut self) -> bool {
        if self.cursor_col < self.current_line_len() {
            self.begin_edit(EditKind::Delete);
            let line = &mut self.buffer[self.cursor_line];
            let byte_idx = char_to_byte_index(line, self.cursor_col);
            line.remove(byte_idx);
            true
        } else if self.cursor_line + 1 < self.buffer.len() {
            self.begin_edit(EditKind::Structural);
            let next = self.buffer.remove(self.cursor_line + 1);
            self.buffer[self.cursor_line].push_str(&next);
            true
        } else {
            false
        }
    }

    // ── Navigation ────────────────────────────────────────────────────

    pub fn move_up(&mut self) {
        if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.clamp_cursor();
            self.ensure_cursor_visible();
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor_line + 1 < self.buffer.len() {
            self.cursor_line += 1;
            self.clamp_cursor();
            self.ensure_cursor_visible();
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = self.current_line_len();
            self.ensure_cursor_visible();
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor_col < self.current_line_len() {
            self.cursor_col += 1;
        } else if self.cursor_line + 1 < self.buffer.len() {
            self.cursor_line += 1;
            self.cursor_col = 0;
            self.ensure_cursor_visible();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.current_line_len();
    }

    pub fn page_up(&mut self) {
        let jump = self.visible_height.max(1);
        self.cursor_line = self.cursor_line.saturating_sub(jump);
        self.clamp_cursor();
        self.ensure_cursor_visible();
    }

    pub fn page_down(&mut self) {
        let jump = self.visible_height.max(1);
        self.cursor_line = (self.cursor_line + jump).min(self.buffer.len().saturating_sub(1));
        self.clamp_cursor();
        self.ensure_cursor_visible();
    }
}

/// Byte offset of the `char_col`-th char, or the string length past the end.
fn char_to_byte_index(s: &str, char_col: usize) -> usize {
    s.char_indices()
        .nth(char_col)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
