//! lang_ll is a reusable LL(*) parsing engine. A grammar written in an
//! EBNF-like surface language is compiled into a compact finite-state
//! machine, the grammar table, and the runtime [Engine] drives that table
//! over a stream of source files, producing semantic events (token consumed,
//! node opened, nested node returned, node closed) which user code consumes
//! through [hook layers](HookLayer).
//!
//! # Overview
//!
//! A grammar description declares its terminals as regular expressions plus
//! directives (`!aside` for whitespace-like side tokens, `!group` for
//! context-sensitive tokenizer groups, `!shrink`, `!caseless`, `!extern` and
//! friends) and its non-terminals as comma-joined sequences of `|`-joined
//! variants, with `[...]` optional and `{...}` repeated groups. String
//! literals used in node bodies implicitly declare literal token types which
//! inherit tokenizer groups from the regex tokens accepting their text.
//!
//! [compile](compiler::compile) turns a description into an immutable
//! [Grammar]: flat token, node, state, rule and multi-rule tables chained by
//! indices. The [Engine] is a stack machine over node frames: per state it
//! selects a tokenizer group, fetches a token through the layered hook
//! pipeline and dispatches the single applicable rule. Where several rules
//! apply for one (state, token) pair the engine speculatively explores all
//! branches with bounded lookahead until exactly one survives, then replays
//! the winner's rules with hooks, deterministically.
//!
//! # Example
//!
//! A four-rule calculator: the grammar is compiled at runtime, node hooks
//! fold frames into integers, and the root's value is the parse result.
//!
//! ```
//! use lang_ll::{
//!     compile, Engine, HookLayer, HookSet, NodeHandler, ParseError, ParseOptions, Source,
//!     SourceQueue, Token,
//! };
//! use std::rc::Rc;
//!
//! let grammar = Rc::new(
//!     compile(
//!         r#"
//!         !aside $space;
//!         $space = /\s+/;
//!         $num = /[0-9]+/;
//!         $op = /[-+*\/()]/;
//!         sum = term, {('+' | '-'), term};
//!         term = $num | '(', sum, ')';
//!         "#,
//!     )
//!     .unwrap(),
//! );
//!
//! struct Sum {
//!     value: i64,
//!     minus: bool,
//! }
//!
//! impl NodeHandler<i64> for Sum {
//!     fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
//!         self.minus = token.text() == "-";
//!         Ok(())
//!     }
//!     fn on_child(&mut self, _name: &str, value: Option<i64>) -> Result<(), ParseError> {
//!         let term = value.unwrap_or(0);
//!         self.value += if self.minus { -term } else { term };
//!         Ok(())
//!     }
//!     fn finish(&mut self) -> Result<Option<i64>, ParseError> {
//!         Ok(Some(self.value))
//!     }
//! }
//!
//! struct Term {
//!     value: i64,
//! }
//!
//! impl NodeHandler<i64> for Term {
//!     fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
//!         if let Ok(number) = token.text().parse() {
//!             self.value = number;
//!         }
//!         Ok(())
//!     }
//!     fn on_child(&mut self, _name: &str, value: Option<i64>) -> Result<(), ParseError> {
//!         if let Some(nested) = value {
//!             self.value = nested;
//!         }
//!         Ok(())
//!     }
//!     fn finish(&mut self) -> Result<Option<i64>, ParseError> {
//!         Ok(Some(self.value))
//!     }
//! }
//!
//! let mut hooks: HookSet<i64> = HookSet::new(&grammar);
//! hooks
//!     .add_layer(
//!         HookLayer::new()
//!             .on_node("sum", |_, _| {
//!                 Ok(Box::new(Sum {
//!                     value: 0,
//!                     minus: false,
//!                 }) as Box<dyn NodeHandler<i64>>)
//!             })
//!             .on_node("term", |_, _| Ok(Box::new(Term { value: 0 }) as _)),
//!     )
//!     .unwrap();
//!
//! let engine = Engine::new(grammar).unwrap();
//! let mut queue = SourceQueue::from_source(Source::new("input", "12 + (3 - 4)"));
//! let result = engine
//!     .parse(&mut queue, &hooks, &ParseOptions::new().full_source())
//!     .unwrap();
//! assert_eq!(result, Some(11));
//! ```
//!
//! # Sharing
//!
//! A compiled [Grammar] is immutable and may be shared across any number of
//! parses; each parse owns its [SourceQueue] and [HookSet]. The engine is
//! single-threaded and runs to completion or error inside one
//! [parse](Engine::parse) call.

pub mod compiler;
mod engine;
mod error;
pub mod examples;
pub mod grammar;
mod hooks;
mod lexer;
mod source;
mod token;
mod util;

pub use compiler::compile;
pub use engine::{Engine, ParseOptions};
pub use grammar::Grammar;
pub use hooks::{HookLayer, HookSet, NodeHandler, NodeHookFn, ParseControl, TokenHookFn};
pub use lexer::Lexer;
pub use source::{QueueSnapshot, Source, SourcePos, SourceQueue};
pub use token::{Token, TOKEN_EOF, TOKEN_EOI, TOKEN_ERROR};
pub use util::Log;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
/// The line and column information at a source offset, both 1-based.
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Classification of grammar compilation failures.
pub enum GrammarErrorKind {
    UnexpectedEof,
    UnexpectedToken,
    /// A token type referenced in a node body is not defined.
    UnknownToken,
    /// A side or error token is used in a rule.
    WrongToken,
    TokenDefined,
    NodeDefined,
    WrongRegexp,
    UnknownNonTerminal,
    UnusedNonTerminal,
    /// FIRST-set resolution found an unresolvable cycle.
    Unresolved,
    /// A node can reach itself before consuming any token.
    Recursion,
    /// More tokenizer groups than the supported maximum.
    GroupNumber,
    /// A literal's text is accepted by no regex token.
    UnresolvedTokenTypes,
    /// The tokens of a state share no tokenizer group.
    DisjointGroups,
    /// A directive references a token type that is never defined.
    UndefinedToken,
    /// A literal is not listed in an active `!literal` whitelist.
    UnknownLiteral,
    /// A repeated group can match empty input.
    EmptyRepeatable,
}

#[derive(Debug)]
/// An error raised while compiling a grammar description.
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub message: String,
    pub source: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Classification of parse-time failures.
pub enum ParseErrorKind {
    UnexpectedEof,
    UnexpectedToken,
    /// A hook-queued token does not belong to the fetching state's group.
    UnexpectedGroup,
    /// A hook emitted a token type that is not in the grammar table.
    EmitWrongToken,
    UnknownTokenType,
    UnknownTokenLiteral,
    UnknownNode,
    /// Input continues past the root node in full-source mode.
    RemainingSource,
    /// A source include was attempted while replayed rules were pending.
    IncludeUnresolved,
    /// No token pattern matches at the current position.
    WrongChar,
    /// An error-flagged token pattern matched.
    BadToken,
    Cancelled,
}

#[derive(Debug)]
/// An error raised while parsing input, aborting the parse with no partial
/// result.
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub source: Option<String>,
    pub line: usize,
    pub column: usize,
}
