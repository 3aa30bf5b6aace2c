//! Scanning of the grammar description text.
//!
//! The description is lexed with a bootstrap token table through the crate's
//! own [Lexer], split into `;`-terminated records and scanned top-down:
//! directives and token definitions first, then node definitions, whose
//! bodies parse into [RawChunk] trees.

use super::chunk::{GroupMode, RawChunk};
use crate::grammar::{Grammar, TokenEntry, TokenFlags, MAX_GROUPS};
use crate::lexer::Lexer;
use crate::source::{Source, SourceQueue};
use crate::token::Token;
use crate::{GrammarError, GrammarErrorKind, ParseErrorKind};
use regex::bytes::Regex;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

const B_SPACE: i32 = 0;
const B_COMMENT: i32 = 1;
const B_STRING: i32 = 2;
const B_NAME: i32 = 3;
const B_TOKEN: i32 = 4;
const B_REGEX: i32 = 5;
const B_GROUP_DIR: i32 = 6;
const B_LIT_DIR: i32 = 7;
const B_DIR: i32 = 8;
const B_OP: i32 = 9;

/// The fixed surface tokens of the description language. The unterminated
/// string/regex catch-all is `Error`-flagged so description typos surface as
/// actionable diagnostics instead of a bare wrong-character error.
fn bootstrap_table() -> Grammar {
    fn entry(name: &str, pattern: &str, flags: TokenFlags) -> TokenEntry {
        TokenEntry {
            name: name.to_string(),
            pattern: pattern.to_string(),
            groups: 1,
            flags,
        }
    }
    Grammar {
        tokens: vec![
            entry("space", r"\s+", TokenFlags::SIDE),
            entry("comment", r"#[^\n]*", TokenFlags::SIDE),
            entry("string", r#"'[^'\n]*'|"[^"\n]*""#, TokenFlags::NONE),
            entry("name", r"[A-Za-z_][A-Za-z0-9_-]*", TokenFlags::NONE),
            entry("token-name", r"\$[A-Za-z_][A-Za-z0-9_-]*", TokenFlags::NONE),
            entry("regex", r"/(?:\\.|[^/\\\n])*/", TokenFlags::NONE),
            entry("group-directive", r"!group", TokenFlags::NONE),
            entry("literal-directive", r"!literal|!reserved", TokenFlags::NONE),
            entry("directive", r"![a-z-]+", TokenFlags::NONE),
            entry("op", r"[=;,|()\[\]{}]", TokenFlags::NONE),
            entry(
                "bad",
                r#"'[^'\n]*(?:\n|\z)|"[^"\n]*(?:\n|\z)|/(?:\\.|[^/\\\n])*(?:\n|\z)"#,
                TokenFlags::ERROR,
            ),
        ],
        nodes: Vec::new(),
        states: Vec::new(),
        rules: Vec::new(),
        multi_rules: Vec::new(),
        literals: BTreeMap::new(),
    }
}

/// Everything the scan pass produces for the later pipeline stages.
pub(crate) struct Scan {
    pub tokens: Vec<TokenEntry>,
    pub literals: BTreeMap<String, usize>,
    pub node_names: Vec<String>,
    pub raw_bodies: Vec<RawChunk>,
    /// Number of `!group` directives seen; group bits are allocated in
    /// directive order.
    pub group_directives: usize,
}

struct Scanner {
    tokens: Vec<TokenEntry>,
    literals: BTreeMap<String, usize>,
    /// Set once a `!literal` directive is seen; bodies may then only use
    /// literals pre-declared by `!literal` or `!reserved`.
    whitelist_active: bool,
    pending: HashMap<String, (TokenFlags, u32)>,
    group_directives: usize,
    node_names: Vec<String>,
    raw_bodies: Vec<RawChunk>,
}

pub(crate) fn scan(source: &Rc<Source>) -> Result<Scan, GrammarError> {
    let records = split_records(lex_description(source)?)?;
    let mut scanner = Scanner {
        tokens: Vec::new(),
        literals: BTreeMap::new(),
        whitelist_active: false,
        pending: HashMap::new(),
        group_directives: 0,
        node_names: Vec::new(),
        raw_bodies: Vec::new(),
    };

    for record in &records {
        match record[0].kind() {
            B_GROUP_DIR | B_LIT_DIR | B_DIR => scanner.scan_directive(record)?,
            B_TOKEN => scanner.scan_token_def(record)?,
            B_NAME => {}
            _ => return Err(err_at(GrammarErrorKind::UnexpectedToken, &record[0])),
        }
    }
    scanner.apply_pending()?;
    for record in &records {
        if record[0].kind() == B_NAME {
            scanner.scan_node_def(record)?;
        }
    }

    if scanner.node_names.is_empty() {
        return Err(GrammarError::new(
            GrammarErrorKind::UnexpectedEof,
            "Grammar defines no non-terminal.".to_string(),
        ));
    }
    Ok(Scan {
        tokens: scanner.tokens,
        literals: scanner.literals,
        node_names: scanner.node_names,
        raw_bodies: scanner.raw_bodies,
        group_directives: scanner.group_directives,
    })
}

fn lex_description(source: &Rc<Source>) -> Result<Vec<Token>, GrammarError> {
    let lexer = Lexer::new(&bootstrap_table())?;
    let mut queue = SourceQueue::from_source(source.clone());
    let mut tokens = Vec::new();
    loop {
        match lexer.fetch(&mut queue, 0, None) {
            Ok(token) if token.is_end() => break Ok(tokens),
            Ok(token) => {
                if token.kind() != B_SPACE && token.kind() != B_COMMENT {
                    tokens.push(token);
                }
            }
            Err(err) => {
                let kind = match err.kind {
                    ParseErrorKind::UnexpectedEof => GrammarErrorKind::UnexpectedEof,
                    _ => GrammarErrorKind::UnexpectedToken,
                };
                break Err(GrammarError {
                    kind,
                    message: err.message,
                    source: err.source,
                    line: err.line,
                    column: err.column,
                });
            }
        }
    }
}

fn split_records(tokens: Vec<Token>) -> Result<Vec<Vec<Token>>, GrammarError> {
    let mut records = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    for token in tokens {
        if token.kind() == B_OP && token.text() == ";" {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(token);
    }
    match current.last() {
        Some(last) => Err(err_with(
            GrammarErrorKind::UnexpectedEof,
            "Record is not terminated with ;.".to_string(),
            last,
        )),
        None => Ok(records),
    }
}

impl Scanner {
    fn scan_directive(&mut self, record: &[Token]) -> Result<(), GrammarError> {
        let directive = record[0].text();
        match directive {
            "!group" => {
                if self.group_directives >= MAX_GROUPS {
                    return Err(err_with(
                        GrammarErrorKind::GroupNumber,
                        format!("More than {} tokenizer groups are defined.", MAX_GROUPS),
                        &record[0],
                    ));
                }
                let bit = 1u32 << self.group_directives;
                self.group_directives += 1;
                for arg in &record[1..] {
                    let name = self.token_ref(arg)?;
                    let slot = self.pending.entry(name).or_default();
                    slot.1 |= bit;
                }
            }
            "!literal" | "!reserved" => {
                if directive == "!literal" {
                    self.whitelist_active = true;
                }
                for arg in &record[1..] {
                    if arg.kind() != B_STRING {
                        return Err(err_at(GrammarErrorKind::UnexpectedToken, arg));
                    }
                    let text = unquote(arg.text());
                    let index = self.define_literal(&text);
                    if directive == "!reserved" {
                        self.tokens[index].flags.insert(TokenFlags::RESERVED);
                    }
                }
            }
            "!aside" | "!error" | "!extern" | "!shrink" | "!caseless" => {
                let flag = match directive {
                    "!aside" => TokenFlags::SIDE,
                    "!error" => TokenFlags::ERROR,
                    "!extern" => TokenFlags::EXTERNAL,
                    "!shrink" => TokenFlags::SHRINKABLE,
                    _ => TokenFlags::CASELESS,
                };
                for arg in &record[1..] {
                    let name = self.token_ref(arg)?;
                    if directive == "!extern" && self.token_index(&name).is_none() {
                        self.tokens.push(TokenEntry {
                            name: name.clone(),
                            pattern: String::new(),
                            groups: 0,
                            flags: TokenFlags::EXTERNAL,
                        });
                    }
                    let slot = self.pending.entry(name).or_default();
                    slot.0.insert(flag);
                }
            }
            _ => {
                return Err(err_with(
                    GrammarErrorKind::UnexpectedToken,
                    format!("Unknown directive {}.", directive),
                    &record[0],
                ))
            }
        }
        Ok(())
    }

    fn scan_token_def(&mut self, record: &[Token]) -> Result<(), GrammarError> {
        if record.len() != 3 || !is_op(&record[1], "=") || record[2].kind() != B_REGEX {
            let at = record.get(1).unwrap_or(&record[0]);
            return Err(err_at(GrammarErrorKind::UnexpectedToken, at));
        }
        let name = record[0].text()[1..].to_string();
        if self.token_index(&name).is_some() {
            return Err(err_with(
                GrammarErrorKind::TokenDefined,
                format!("Token ${} is already defined.", name),
                &record[0],
            ));
        }
        let pattern = unslash(record[2].text());
        if let Err(err) = Regex::new(&format!("^(?:{})", pattern)) {
            return Err(err_with(
                GrammarErrorKind::WrongRegexp,
                format!("Token ${} pattern is not a valid regex: {}", name, err),
                &record[2],
            ));
        }
        self.tokens.push(TokenEntry {
            name,
            pattern,
            groups: 0,
            flags: TokenFlags::NONE,
        });
        Ok(())
    }

    fn scan_node_def(&mut self, record: &[Token]) -> Result<(), GrammarError> {
        if record.len() < 3 || !is_op(&record[1], "=") {
            let at = record.get(1).unwrap_or(&record[0]);
            return Err(err_at(GrammarErrorKind::UnexpectedToken, at));
        }
        let name = record[0].text().to_string();
        if self.node_names.iter().any(|defined| *defined == name) {
            return Err(err_with(
                GrammarErrorKind::NodeDefined,
                format!("Non-terminal {} is already defined.", name),
                &record[0],
            ));
        }
        let mut cursor = Cursor {
            tokens: &record[2..],
            at: 0,
        };
        let body = self.parse_sequence(&mut cursor, record.last().unwrap())?;
        if let Some(extra) = cursor.peek() {
            return Err(err_at(GrammarErrorKind::UnexpectedToken, extra));
        }
        self.node_names.push(name);
        self.raw_bodies.push(body);
        Ok(())
    }

    fn parse_sequence(
        &mut self,
        cursor: &mut Cursor,
        record_end: &Token,
    ) -> Result<RawChunk, GrammarError> {
        let mut items = vec![self.parse_item(cursor, record_end)?];
        while cursor.peek().map_or(false, |token| is_op(token, ",")) {
            cursor.bump();
            items.push(self.parse_item(cursor, record_end)?);
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(RawChunk::Group(items, GroupMode::Plain))
        }
    }

    fn parse_item(
        &mut self,
        cursor: &mut Cursor,
        record_end: &Token,
    ) -> Result<RawChunk, GrammarError> {
        let mut alternatives = vec![self.parse_element(cursor, record_end)?];
        while cursor.peek().map_or(false, |token| is_op(token, "|")) {
            cursor.bump();
            alternatives.push(self.parse_element(cursor, record_end)?);
        }
        if alternatives.len() == 1 {
            Ok(alternatives.pop().unwrap())
        } else {
            Ok(RawChunk::Variant(alternatives))
        }
    }

    fn parse_element(
        &mut self,
        cursor: &mut Cursor,
        record_end: &Token,
    ) -> Result<RawChunk, GrammarError> {
        let token = match cursor.next() {
            Some(token) => token,
            None => {
                return Err(err_with(
                    GrammarErrorKind::UnexpectedEof,
                    "Definition body ends unexpectedly.".to_string(),
                    record_end,
                ))
            }
        };
        match token.kind() {
            B_NAME => Ok(RawChunk::NodeRef(token.text().to_string())),
            B_TOKEN => {
                let name = &token.text()[1..];
                let index = self.token_index(name).ok_or_else(|| {
                    err_with(
                        GrammarErrorKind::UnknownToken,
                        format!("Token ${} is not defined.", name),
                        token,
                    )
                })?;
                let flags = self.tokens[index].flags;
                if flags.contains(TokenFlags::SIDE) || flags.contains(TokenFlags::ERROR) {
                    return Err(err_with(
                        GrammarErrorKind::WrongToken,
                        format!("Token ${} cannot be used in a rule.", name),
                        token,
                    ));
                }
                Ok(RawChunk::Token(index))
            }
            B_STRING => {
                let text = unquote(token.text());
                if self.whitelist_active && !self.literals.contains_key(&text) {
                    return Err(err_with(
                        GrammarErrorKind::UnknownLiteral,
                        format!("Literal {:?} is not listed in a !literal directive.", text),
                        token,
                    ));
                }
                Ok(RawChunk::Token(self.define_literal(&text)))
            }
            B_OP => {
                let (close, mode) = match token.text() {
                    "(" => (")", GroupMode::Plain),
                    "[" => ("]", GroupMode::Optional),
                    "{" => ("}", GroupMode::Repeat),
                    _ => return Err(err_at(GrammarErrorKind::UnexpectedToken, token)),
                };
                let inner = self.parse_sequence(cursor, record_end)?;
                match cursor.next() {
                    Some(end) if is_op(end, close) => {}
                    Some(end) => return Err(err_at(GrammarErrorKind::UnexpectedToken, end)),
                    None => {
                        return Err(err_with(
                            GrammarErrorKind::UnexpectedEof,
                            format!("Missing closing {}.", close),
                            record_end,
                        ))
                    }
                }
                match mode {
                    GroupMode::Plain => Ok(inner),
                    mode => Ok(RawChunk::Group(vec![inner], mode)),
                }
            }
            _ => Err(err_at(GrammarErrorKind::UnexpectedToken, token)),
        }
    }

    fn apply_pending(&mut self) -> Result<(), GrammarError> {
        let mut names: Vec<&String> = self.pending.keys().collect();
        names.sort();
        for name in names {
            if self.tokens.iter().all(|entry| entry.name != **name) {
                return Err(GrammarError::new(
                    GrammarErrorKind::UndefinedToken,
                    format!("Token ${} is referenced in a directive but never defined.", name),
                ));
            }
        }
        for entry in self.tokens.iter_mut() {
            if let Some((flags, groups)) = self.pending.get(&entry.name) {
                entry.flags.insert(*flags);
                entry.groups |= groups;
            }
        }
        Ok(())
    }

    fn token_index(&self, name: &str) -> Option<usize> {
        self.tokens.iter().position(|entry| entry.name == name)
    }

    fn token_ref(&self, token: &Token) -> Result<String, GrammarError> {
        if token.kind() != B_TOKEN {
            return Err(err_at(GrammarErrorKind::UnexpectedToken, token));
        }
        Ok(token.text()[1..].to_string())
    }

    fn define_literal(&mut self, text: &str) -> usize {
        if let Some(&index) = self.literals.get(text) {
            return index;
        }
        let index = self.tokens.len();
        self.tokens.push(TokenEntry {
            name: text.to_string(),
            pattern: String::new(),
            groups: 0,
            flags: TokenFlags::LITERAL,
        });
        self.literals.insert(text.to_string(), index);
        index
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.at)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.at);
        self.at += 1;
        token
    }

    fn bump(&mut self) {
        self.at += 1;
    }
}

fn is_op(token: &Token, text: &str) -> bool {
    token.kind() == B_OP && token.text() == text
}

fn unquote(text: &str) -> String {
    text[1..text.len() - 1].to_string()
}

fn unslash(text: &str) -> String {
    text[1..text.len() - 1].replace("\\/", "/")
}

fn err_at(kind: GrammarErrorKind, token: &Token) -> GrammarError {
    err_with(kind, format!("Unexpected {}.", token), token)
}

fn err_with(kind: GrammarErrorKind, message: String, token: &Token) -> GrammarError {
    match token.pos() {
        Some(pos) => GrammarError::at(kind, message, pos),
        None => GrammarError::new(kind, message),
    }
}
