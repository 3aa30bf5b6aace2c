//! Input buffers and the multi-source queue the engine reads from.
//!
//! A [Source] is a named immutable UTF-8 buffer with a lazily built table of
//! line break offsets, so any byte offset converts to a line/column pair in
//! O(log n). A [SourceQueue] holds one or more sources with a mutable read
//! cursor on the head; the engine appends, prepends (for includes), seeks and
//! rewinds through it, and the speculative resolver captures and restores
//! whole-queue snapshots to undo lexer-visible work.
//!
//! # Example
//! ```
//! use lang_ll::{Source, SourceQueue};
//!
//! let source = Source::new("main", "let x = 1;\nlet y = 2;\n");
//! assert_eq!(source.obtain_position(11).line, 2);
//!
//! let mut queue = SourceQueue::from_source(source);
//! queue.skip(4);
//! queue.prepend(Source::new("include", "..."));
//! assert_eq!(queue.current().unwrap().name(), "include");
//! queue.skip(3);
//! assert!(queue.eof());
//! // dropping the include resumes the saved cursor
//! assert!(queue.next_source());
//! assert_eq!(queue.cursor(), 4);
//! ```

use crate::Position;
use once_cell::unsync::OnceCell;
use std::collections::VecDeque;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A named immutable input buffer with lines information.
pub struct Source {
    name: String,
    content: Box<[u8]>,
    line_breaks: OnceCell<Vec<usize>>,
}

#[derive(Clone)]
/// A location inside a [Source]: the source reference plus a byte offset.
/// Line and column are derived on demand.
pub struct SourcePos {
    pub source: Rc<Source>,
    pub offset: usize,
}

/// An ordered sequence of sources with a designated head, read by the lexer.
///
/// The head pair is the current source and its cursor. `append` enqueues at
/// the tail, `prepend` makes a new source current while saving the old head
/// (the include mechanism), and `seek`/`skip`/`rewind` move the current
/// cursor, clamped to the buffer.
pub struct SourceQueue {
    entries: VecDeque<(Rc<Source>, usize)>,
}

#[derive(Clone)]
/// A captured [SourceQueue] state, restorable with [SourceQueue::restore].
pub struct QueueSnapshot {
    entries: VecDeque<(Rc<Source>, usize)>,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            content: text.into().into_bytes().into_boxed_slice(),
            line_breaks: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Slice the buffer as text. The buffer is UTF-8 by construction and all
    /// offsets handed out by the lexer fall on character boundaries.
    pub fn text(&self, start: usize, end: usize) -> &str {
        unsafe { std::str::from_utf8_unchecked(&self.content[start..end]) }
    }

    fn obtain_line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.content
                .iter()
                .enumerate()
                .filter_map(|(index, n)| if *n == b'\n' { Some(index) } else { None })
                .collect()
        })
    }

    /// Line and column of a byte offset, both 1-based.
    pub fn obtain_position(&self, pointer: usize) -> Position {
        let line_breaks = self.obtain_line_breaks();
        let index = match line_breaks.binary_search(&pointer) {
            Ok(index) | Err(index) => index,
        };

        if index == 0 {
            let s = unsafe { std::str::from_utf8_unchecked(&self.content[..pointer]) };
            Position::new(1, s.chars().count() + 1)
        } else {
            let break_point = line_breaks[index - 1] + 1;
            let s = unsafe { std::str::from_utf8_unchecked(&self.content[break_point..pointer]) };
            Position::new(index + 1, s.chars().count() + 1)
        }
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}

impl SourcePos {
    pub fn new(source: Rc<Source>, offset: usize) -> Self {
        Self { source, offset }
    }

    pub fn position(&self) -> Position {
        self.source.obtain_position(self.offset)
    }
}

impl Debug for SourcePos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source.name(), self.position())
    }
}

impl SourceQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn from_source(source: Rc<Source>) -> Self {
        let mut queue = Self::new();
        queue.append(source);
        queue
    }

    /// Enqueue at the tail; if the queue was empty the source becomes current.
    pub fn append(&mut self, source: Rc<Source>) {
        self.entries.push_back((source, 0));
    }

    /// Make `source` current at offset 0. An existing current source keeps its
    /// cursor and is pushed back onto the queue head, so reading resumes there
    /// once the new source is exhausted.
    pub fn prepend(&mut self, source: Rc<Source>) {
        self.entries.push_front((source, 0));
    }

    /// Drop the current source and promote the next. Returns whether the queue
    /// is non-empty afterwards.
    pub fn next_source(&mut self) -> bool {
        self.entries.pop_front();
        !self.entries.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when there is no current source or its cursor is at the end.
    pub fn eof(&self) -> bool {
        match self.entries.front() {
            Some((source, cursor)) => *cursor >= source.len(),
            None => true,
        }
    }

    pub fn current(&self) -> Option<&Rc<Source>> {
        self.entries.front().map(|(source, _)| source)
    }

    pub fn cursor(&self) -> usize {
        self.entries.front().map_or(0, |(_, cursor)| *cursor)
    }

    /// The current buffer and cursor, if any source remains.
    pub fn content_pos(&self) -> Option<(&[u8], usize)> {
        self.entries
            .front()
            .map(|(source, cursor)| (source.content(), *cursor))
    }

    pub fn pos(&self) -> Option<SourcePos> {
        self.entries
            .front()
            .map(|(source, cursor)| SourcePos::new(source.clone(), *cursor))
    }

    pub fn seek(&mut self, pointer: usize) {
        if let Some((source, cursor)) = self.entries.front_mut() {
            *cursor = pointer.min(source.len());
        }
    }

    pub fn skip(&mut self, n: usize) {
        if let Some((source, cursor)) = self.entries.front_mut() {
            *cursor = (*cursor + n).min(source.len());
        }
    }

    pub fn rewind(&mut self, n: usize) {
        if let Some((_, cursor)) = self.entries.front_mut() {
            *cursor = cursor.saturating_sub(n);
        }
    }

    /// Seek back to a position captured in a token. When the position belongs
    /// to a source no longer current, that source is reinstated at the head;
    /// this is how the engine undoes reads performed during speculation.
    pub fn seek_to(&mut self, pos: &SourcePos) {
        match self.entries.front_mut() {
            Some((source, cursor)) if Rc::ptr_eq(source, &pos.source) => {
                *cursor = pos.offset.min(source.len());
            }
            _ => {
                self.entries
                    .push_front((pos.source.clone(), pos.offset.min(pos.source.len())));
            }
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        self.entries = snapshot.entries;
    }
}

impl Default for SourceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SourceQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<(&str, usize)> = self
            .entries
            .iter()
            .map(|(source, cursor)| (source.name(), *cursor))
            .collect();
        f.debug_tuple("SourceQueue").field(&names).finish()
    }
}
