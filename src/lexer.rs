//! Regex tokenization over the source queue, one pattern list per tokenizer
//! group.
//!
//! The lexer matches every pattern of the requested group at the current
//! cursor and keeps the longest non-empty match, with the earliest defined
//! pattern winning ties. Empty matches are insignificant and the pattern is
//! skipped. A match that resolves to an `Error`-flagged type aborts with
//! [BadToken](crate::ParseErrorKind::BadToken); no match at all aborts with
//! [WrongChar](crate::ParseErrorKind::WrongChar). A token never crosses the
//! end of the current source: at end of buffer the lexer returns an
//! end-of-file token and drops the source from the queue.
//!
//! # Example
//! ```
//! use lang_ll::{compile, Lexer, Source, SourceQueue};
//!
//! let grammar = compile(r"!aside $sp; $sp = /\s+/; $w = /[a-z]+/; s = $w;").unwrap();
//! let lexer = Lexer::new(&grammar).unwrap();
//! let mut queue = SourceQueue::from_source(Source::new("input", "ab cd"));
//! assert_eq!(lexer.fetch(&mut queue, 0, None).unwrap().text(), "ab");
//! assert_eq!(lexer.fetch(&mut queue, 0, None).unwrap().type_name(), "sp");
//! assert_eq!(lexer.fetch(&mut queue, 0, None).unwrap().text(), "cd");
//! ```

use crate::grammar::{Grammar, TokenFlags, TokenSet, MAX_GROUPS};
use crate::source::{SourcePos, SourceQueue};
use crate::token::Token;
use crate::{GrammarError, GrammarErrorKind, ParseError, ParseErrorKind};
use regex::bytes::Regex;
use std::rc::Rc;

struct LexPattern {
    token: usize,
    flags: TokenFlags,
    regexp: Regex,
}

/// The tokenizer built from a grammar's token table.
pub struct Lexer {
    patterns: Vec<LexPattern>,
    by_group: Vec<Vec<usize>>,
    names: Vec<Rc<str>>,
}

impl Lexer {
    /// Compile the anchored matcher for every regex-bearing token type.
    /// Patterns were validated at grammar compile time, but reloaded tables
    /// are re-checked here.
    pub fn new(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut patterns = Vec::new();
        let mut names = Vec::with_capacity(grammar.tokens.len());
        for (index, entry) in grammar.tokens.iter().enumerate() {
            names.push(Rc::from(entry.name.as_str()));
            if entry.pattern.is_empty() {
                continue;
            }
            let regexp = Regex::new(&format!("^(?:{})", entry.pattern)).map_err(|err| {
                GrammarError::new(
                    GrammarErrorKind::WrongRegexp,
                    format!("Token ${} pattern is not a valid regex: {}", entry.name, err),
                )
            })?;
            patterns.push(LexPattern {
                token: index,
                flags: entry.flags,
                regexp,
            });
        }

        let group_count = MAX_GROUPS.min(32);
        let mut by_group: Vec<Vec<usize>> = vec![Vec::new(); group_count];
        for (pi, pattern) in patterns.iter().enumerate() {
            let groups = grammar.tokens[pattern.token].groups;
            for (group, members) in by_group.iter_mut().enumerate() {
                if groups & (1 << group) != 0 {
                    members.push(pi);
                }
            }
        }

        Ok(Self {
            patterns,
            by_group,
            names,
        })
    }

    /// The shared name handle for a token table index.
    pub fn token_name(&self, index: usize) -> Rc<str> {
        self.names[index].clone()
    }

    /// Extract the next token of `group` from the queue head, advancing the
    /// cursor. `restrict`, when given, admits only the listed kinds plus side
    /// and error types; it is the resolver's tokenizer hint.
    pub fn fetch(
        &self,
        queue: &mut SourceQueue,
        group: u32,
        restrict: Option<&TokenSet>,
    ) -> Result<Token, ParseError> {
        if queue.is_empty() {
            return Ok(Token::end_of_input(None));
        }
        if queue.eof() {
            let pos = queue.pos();
            queue.next_source();
            return Ok(Token::end_of_file(pos));
        }

        let source = queue.current().expect("non-empty queue").clone();
        let cursor = queue.cursor();
        let rest = &source.content()[cursor..];

        match self.best_match(rest, group, restrict, usize::MAX) {
            Some((pi, len)) => {
                let pattern = &self.patterns[pi];
                if pattern.flags.contains(TokenFlags::ERROR) {
                    let pos = SourcePos::new(source.clone(), cursor);
                    let text = source.text(cursor, cursor + len);
                    return Err(ParseError::at(
                        ParseErrorKind::BadToken,
                        format!("Bad token {:?}", text),
                        &pos,
                    ));
                }
                queue.skip(len);
                Ok(Token::slice(
                    pattern.token as i32,
                    self.names[pattern.token].clone(),
                    source,
                    cursor,
                    cursor + len,
                ))
            }
            None => {
                let pos = SourcePos::new(source.clone(), cursor);
                let rune = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Err(ParseError::at(
                    ParseErrorKind::WrongChar,
                    format!("Unexpected character {:?}", rune),
                    &pos,
                ))
            }
        }
    }

    /// [fetch](Lexer::fetch) accepting only the listed token kinds.
    pub fn next_of(
        &self,
        queue: &mut SourceQueue,
        group: u32,
        allowed: &TokenSet,
    ) -> Result<Token, ParseError> {
        self.fetch(queue, group, Some(allowed))
    }

    /// Re-match at the token's start position requiring a strictly shorter
    /// result. On success the queue cursor is moved behind the shrunk token.
    pub fn shrink(&self, queue: &mut SourceQueue, group: u32, token: &Token) -> Option<Token> {
        let pos = token.pos()?;
        if token.len() < 2 {
            return None;
        }
        let limit = token.len() - 1;
        let window = &pos.source.content()[pos.offset..pos.offset + limit];
        let (pi, len) = self.best_match(window, group, None, limit)?;
        let pattern = &self.patterns[pi];
        if pattern.flags.contains(TokenFlags::ERROR) {
            return None;
        }
        queue.seek_to(pos);
        queue.skip(len);
        Some(Token::slice(
            pattern.token as i32,
            self.names[pattern.token].clone(),
            pos.source.clone(),
            pos.offset,
            pos.offset + len,
        ))
    }

    fn best_match(
        &self,
        window: &[u8],
        group: u32,
        restrict: Option<&TokenSet>,
        limit: usize,
    ) -> Option<(usize, usize)> {
        let members = self.by_group.get(group as usize)?;
        let mut best: Option<(usize, usize)> = None;
        for &pi in members {
            let pattern = &self.patterns[pi];
            if let Some(allowed) = restrict {
                let passes = allowed.contains(pattern.token)
                    || pattern.flags.contains(TokenFlags::SIDE)
                    || pattern.flags.contains(TokenFlags::ERROR);
                if !passes {
                    continue;
                }
            }
            if let Some(found) = pattern.regexp.find(window) {
                debug_assert_eq!(found.start(), 0);
                let len = found.end();
                if len == 0 || len > limit {
                    continue;
                }
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((pi, len));
                }
            }
        }
        best
    }
}
