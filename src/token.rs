//! The immutable token record produced by the lexer and by user hooks.

use crate::source::{Source, SourcePos};
use crate::Position;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Kind of the token produced when the current source is exhausted.
pub const TOKEN_EOF: i32 = -1;
/// Kind of the token produced when the whole source queue is exhausted.
pub const TOKEN_EOI: i32 = -2;
/// Kind reserved for lexical error carriers.
pub const TOKEN_ERROR: i32 = -3;

#[derive(Clone)]
/// An immutable token: kind, shared type name, content and captured position.
///
/// Non-negative kinds index the grammar's token table; the negative space is
/// reserved for [TOKEN_EOF], [TOKEN_EOI] and [TOKEN_ERROR]. Lexer-produced
/// tokens borrow their text from the owning [Source]; hook-synthesised tokens
/// carry owned text.
pub struct Token {
    kind: i32,
    name: Rc<str>,
    content: TokenContent,
    pos: Option<SourcePos>,
}

#[derive(Clone)]
enum TokenContent {
    Slice {
        source: Rc<Source>,
        start: usize,
        end: usize,
    },
    Text(Rc<str>),
}

impl Token {
    /// A token sliced out of a source buffer by the lexer.
    pub fn slice(kind: i32, name: Rc<str>, source: Rc<Source>, start: usize, end: usize) -> Self {
        let pos = SourcePos::new(source.clone(), start);
        Self {
            kind,
            name,
            content: TokenContent::Slice { source, start, end },
            pos: Some(pos),
        }
    }

    /// A token with owned text, as synthesised by hooks.
    pub fn text_token(kind: i32, name: Rc<str>, text: impl Into<Rc<str>>) -> Self {
        Self {
            kind,
            name,
            content: TokenContent::Text(text.into()),
            pos: None,
        }
    }

    pub fn end_of_file(pos: Option<SourcePos>) -> Self {
        Self {
            kind: TOKEN_EOF,
            name: Rc::from("-eof-"),
            content: TokenContent::Text(Rc::from("")),
            pos,
        }
    }

    pub fn end_of_input(pos: Option<SourcePos>) -> Self {
        Self {
            kind: TOKEN_EOI,
            name: Rc::from("-eoi-"),
            content: TokenContent::Text(Rc::from("")),
            pos,
        }
    }

    pub fn kind(&self) -> i32 {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        match &self.content {
            TokenContent::Slice { source, start, end } => source.text(*start, *end),
            TokenContent::Text(text) => text,
        }
    }

    pub fn len(&self) -> usize {
        match &self.content {
            TokenContent::Slice { start, end, .. } => end - start,
            TokenContent::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pos(&self) -> Option<&SourcePos> {
        self.pos.as_ref()
    }

    /// Line and column of the token start, when a source position was captured.
    pub fn position(&self) -> Option<Position> {
        self.pos.as_ref().map(|p| p.position())
    }

    /// True for the end-of-file and end-of-input markers.
    pub fn is_end(&self) -> bool {
        self.kind == TOKEN_EOF || self.kind == TOKEN_EOI
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("")
            .field(&self.name)
            .field(&self.text())
            .finish()
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_end() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {:?}", self.name, self.text())
        }
    }
}
