use crate::source::SourcePos;
use crate::{GrammarError, GrammarErrorKind, ParseError, ParseErrorKind};
use std::fmt::{Display, Formatter};

impl GrammarError {
    pub fn new(kind: GrammarErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            source: None,
            line: 0,
            column: 0,
        }
    }

    /// An error pinned to a source position; the position is pre-formatted
    /// into the message.
    pub fn at(kind: GrammarErrorKind, message: String, pos: &SourcePos) -> Self {
        let position = pos.position();
        Self {
            kind,
            message: format!("{} @ {}:{}", message, pos.source.name(), position),
            source: Some(pos.source.name().to_string()),
            line: position.line,
            column: position.column,
        }
    }
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarError[{:?}]: {}", self.kind, self.message)
    }
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            source: None,
            line: 0,
            column: 0,
        }
    }

    pub fn at(kind: ParseErrorKind, message: String, pos: &SourcePos) -> Self {
        let position = pos.position();
        Self {
            kind,
            message: format!("{} @ {}:{}", message, pos.source.name(), position),
            source: Some(pos.source.name().to_string()),
            line: position.line,
            column: position.column,
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::WrongChar | ParseErrorKind::BadToken
        )
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyntaxError[{:?}]: {}", self.kind, self.message)
    }
}
