//! The narrow buffer capability the core works against.
//!
//! An editor buffer does many things; the core only needs to read ranges,
//! replace one range, and list selections. [`TextBuffer`] is that surface.
//! [`MemoryBuffer`] implements it for files on disk and for tests.

use std::fmt;

/// A half-open byte range `[start, end)` into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Create a range. Reversed endpoints (a selection dragged backwards)
    /// are normalised.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// The range covering a whole buffer of `len` bytes.
    pub fn whole(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two ranges share at least one byte. Ranges that only
    /// meet at an endpoint do not overlap.
    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest range covering both.
    pub fn cover(&self, other: &TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Errors from buffer access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("range {range} is out of bounds for a buffer of {len} bytes")]
    OutOfBounds { range: TextRange, len: usize },

    #[error("range {0} does not fall on character boundaries")]
    NotCharBoundary(TextRange),

    #[error("buffer is read-only")]
    ReadOnly,
}

/// Minimal editor buffer surface.
pub trait TextBuffer {
    /// Length of the buffer in bytes.
    fn len(&self) -> usize;

    /// Text inside `range`.
    fn text(&self, range: TextRange) -> Result<String, BufferError>;

    /// Replace `range` with `new_text` as a single undoable edit.
    fn replace(&mut self, range: TextRange, new_text: &str) -> Result<(), BufferError>;

    /// Current selections, in any order; may include empty ones.
    fn selections(&self) -> Vec<TextRange>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct UndoEntry {
    start: usize,
    inserted_len: usize,
    removed: String,
}

/// An in-memory [`TextBuffer`] with a one-entry-per-edit undo stack.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    text: String,
    selections: Vec<TextRange>,
    read_only: bool,
    undo: Vec<UndoEntry>,
}

impl MemoryBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Builder: add a selection.
    pub fn with_selection(mut self, range: TextRange) -> Self {
        self.selections.push(range);
        self
    }

    /// Builder: mark the buffer read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of edits that can be undone.
    pub fn edit_count(&self) -> usize {
        self.undo.len()
    }

    /// Revert the most recent edit. Returns `false` when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo.pop() else {
            return false;
        };
        self.text.replace_range(
            entry.start..entry.start + entry.inserted_len,
            &entry.removed,
        );
        true
    }

    fn check(&self, range: TextRange) -> Result<(), BufferError> {
        if range.end > self.text.len() {
            return Err(BufferError::OutOfBounds {
                range,
                len: self.text.len(),
            });
        }
        if !self.text.is_char_boundary(range.start) || !self.text.is_char_boundary(range.end) {
            return Err(BufferError::NotCharBoundary(range));
        }
        Ok(())
    }
}

impl TextBuffer for MemoryBuffer {
    fn len(&self) -> usize {
        self.text.len()
    }

    fn text(&self, range: TextRange) -> Result<String, BufferError> {
        self.check(range)?;
        Ok(self.text[range.start..range.end].to_string())
    }

    fn replace(&mut self, range: TextRange, new_text: &str) -> Result<(), BufferError> {
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        self.check(range)?;
        let removed = self.text[range.start..range.end].to_string();
        self.text.replace_range(range.start..range.end, new_text);
        self.undo.push(UndoEntry {
            start: range.start,
            inserted_len: new_text.len(),
            removed,
        });
        // Selections no longer point at meaningful text after an edit.
        self.selections.clear();
        Ok(())
    }

    fn selections(&self) -> Vec<TextRange> {
        self.selections.clone()
    }
}
