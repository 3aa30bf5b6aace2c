//! Layered user hooks and the per-parse control surface they receive.
//!
//! Hooks live in layers. Each layer may supply token hooks (by token type,
//! by literal text, or a catch-all) and node hooks (by node name or a
//! catch-all). Layers are compiled at configuration time into flat per-kind
//! and per-node slot arrays, so the engine's hot path indexes instead of
//! dispatching; empty slots fall through cheaply.
//!
//! The token pipeline is pull-based: when the engine asks for a token the
//! outermost layer's FIFO is checked first; an empty FIFO pulls from the
//! next inner layer, and the innermost pull reaches the lexer. Each layer's
//! hook decides whether the incoming token passes through and may synthesise
//! extra tokens into its FIFO.
//!
//! Node hooks produce a [NodeHandler] per parsed node. The handler sees the
//! frame's tokens and finished children, and its [finish](NodeHandler::finish)
//! value from the first configured layer propagates to the parent and, at
//! the root, becomes the parse result.
//!
//! # Example
//! ```
//! use lang_ll::{compile, Engine, HookLayer, HookSet, ParseOptions, Source, SourceQueue, Token};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let grammar = Rc::new(compile(r"$w = /[a-z]+/; s = {$w};").unwrap());
//! let counted = Rc::new(Cell::new(0));
//! let seen = counted.clone();
//!
//! let mut hooks: HookSet<()> = HookSet::new(&grammar);
//! hooks
//!     .add_layer(HookLayer::new().on_token("w", move |_: &Token, _| {
//!         seen.set(seen.get() + 1);
//!         Ok(true)
//!     }))
//!     .unwrap();
//!
//! let engine = Engine::new(grammar).unwrap();
//! let mut queue = SourceQueue::from_source(Source::new("input", "ab"));
//! engine.parse(&mut queue, &hooks, &ParseOptions::new()).unwrap();
//! assert_eq!(counted.get(), 1);
//! ```

use crate::grammar::Grammar;
use crate::lexer::Lexer;
use crate::source::{Source, SourceQueue};
use crate::token::Token;
use crate::{ParseError, ParseErrorKind};
use std::rc::Rc;

/// A token hook: returns whether the incoming token passes through, and may
/// emit extra tokens through [ParseControl].
pub type TokenHookFn = Rc<dyn Fn(&Token, &mut ParseControl) -> Result<bool, ParseError>>;

/// A node hook: invoked when a frame for the node begins, with the node name
/// and the first structural token; returns the handler driven for the
/// frame's lifetime.
pub type NodeHookFn<V> = Rc<dyn Fn(&str, &Token) -> Result<Box<dyn NodeHandler<V>>, ParseError>>;

/// Per-node lifecycle receiver created by a [NodeHookFn].
pub trait NodeHandler<V> {
    fn on_token(&mut self, _token: &Token) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_child(&mut self, _name: &str, _value: Option<V>) -> Result<(), ParseError> {
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<V>, ParseError> {
        Ok(None)
    }
}

enum TokenKey {
    Type(String),
    Literal(String),
    Any,
}

enum NodeKey {
    Name(String),
    Any,
}

/// One configurable layer of hooks, registered by name and compiled against
/// the grammar when added to a [HookSet].
pub struct HookLayer<V> {
    token_hooks: Vec<(TokenKey, TokenHookFn)>,
    node_hooks: Vec<(NodeKey, NodeHookFn<V>)>,
}

impl<V> HookLayer<V> {
    pub fn new() -> Self {
        Self {
            token_hooks: Vec::new(),
            node_hooks: Vec::new(),
        }
    }

    /// Hook every token of the named type.
    pub fn on_token<F>(mut self, name: &str, hook: F) -> Self
    where
        F: Fn(&Token, &mut ParseControl) -> Result<bool, ParseError> + 'static,
    {
        self.token_hooks
            .push((TokenKey::Type(name.to_string()), Rc::new(hook)));
        self
    }

    /// Hook every token matching the given literal text.
    pub fn on_literal<F>(mut self, text: &str, hook: F) -> Self
    where
        F: Fn(&Token, &mut ParseControl) -> Result<bool, ParseError> + 'static,
    {
        self.token_hooks
            .push((TokenKey::Literal(text.to_string()), Rc::new(hook)));
        self
    }

    /// Hook tokens of any type without a dedicated hook in this layer.
    pub fn on_any_token<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Token, &mut ParseControl) -> Result<bool, ParseError> + 'static,
    {
        self.token_hooks.push((TokenKey::Any, Rc::new(hook)));
        self
    }

    /// Hook frames of the named node.
    pub fn on_node<F>(mut self, name: &str, hook: F) -> Self
    where
        F: Fn(&str, &Token) -> Result<Box<dyn NodeHandler<V>>, ParseError> + 'static,
    {
        self.node_hooks
            .push((NodeKey::Name(name.to_string()), Rc::new(hook)));
        self
    }

    /// Hook frames of any node without a dedicated hook in this layer.
    pub fn on_any_node<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Token) -> Result<Box<dyn NodeHandler<V>>, ParseError> + 'static,
    {
        self.node_hooks.push((NodeKey::Any, Rc::new(hook)));
        self
    }
}

impl<V> Default for HookLayer<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A layer compiled into flat slot arrays.
pub(crate) struct CompiledLayer<V> {
    pub token_hooks: Vec<Option<TokenHookFn>>,
    pub any_token: Option<TokenHookFn>,
    pub node_hooks: Vec<Option<NodeHookFn<V>>>,
    pub any_node: Option<NodeHookFn<V>>,
}

impl<V> CompiledLayer<V> {
    /// The hook applicable to a token: the slot of the literal matching its
    /// text first, then the slot of its kind, then the any-kind slot.
    pub fn token_hook(&self, grammar: &Grammar, token: &Token) -> Option<TokenHookFn> {
        if let Some(literal) = grammar.literal_key(token) {
            if let Some(hook) = self.token_hooks.get(literal).and_then(Clone::clone) {
                return Some(hook);
            }
        }
        let kind = token.kind();
        if kind >= 0 {
            if let Some(hook) = self.token_hooks.get(kind as usize).and_then(Clone::clone) {
                return Some(hook);
            }
        }
        self.any_token.clone()
    }

    pub fn node_hook(&self, node: usize) -> Option<NodeHookFn<V>> {
        self.node_hooks
            .get(node)
            .and_then(Clone::clone)
            .or_else(|| self.any_node.clone())
    }
}

/// The layered hook configuration for a parse, validated against a grammar.
pub struct HookSet<V> {
    grammar: Rc<Grammar>,
    pub(crate) layers: Vec<CompiledLayer<V>>,
}

impl<V> HookSet<V> {
    pub fn new(grammar: &Rc<Grammar>) -> Self {
        Self {
            grammar: grammar.clone(),
            layers: Vec::new(),
        }
    }

    /// Compile and append a layer. The first added layer is the innermost:
    /// its pulls reach the lexer and its node values propagate.
    pub fn add_layer(&mut self, layer: HookLayer<V>) -> Result<(), ParseError> {
        let mut compiled = CompiledLayer {
            token_hooks: (0..self.grammar.tokens.len()).map(|_| None).collect(),
            any_token: None,
            node_hooks: (0..self.grammar.nodes.len()).map(|_| None).collect(),
            any_node: None,
        };
        for (key, hook) in layer.token_hooks {
            match key {
                TokenKey::Type(name) => {
                    let index = self.grammar.token_index(&name).ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::UnknownTokenType,
                            format!("Token type {} is not declared in the grammar.", name),
                        )
                    })?;
                    compiled.token_hooks[index] = Some(hook);
                }
                TokenKey::Literal(text) => {
                    let index = self.grammar.literal(&text).ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::UnknownTokenLiteral,
                            format!("Literal {:?} is not declared in the grammar.", text),
                        )
                    })?;
                    compiled.token_hooks[index] = Some(hook);
                }
                TokenKey::Any => compiled.any_token = Some(hook),
            }
        }
        for (key, hook) in layer.node_hooks {
            match key {
                NodeKey::Name(name) => {
                    let index = self.grammar.node_index(&name).ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::UnknownNode,
                            format!("Node {} is not declared in the grammar.", name),
                        )
                    })?;
                    compiled.node_hooks[index] = Some(hook);
                }
                NodeKey::Any => compiled.any_node = Some(hook),
            }
        }
        self.layers.push(compiled);
        Ok(())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }
}

/// What a token hook may do while the engine is suspended in it: synthesise
/// tokens and include further sources.
pub struct ParseControl<'c> {
    grammar: &'c Grammar,
    lexer: &'c Lexer,
    queue: &'c mut SourceQueue,
    emitted: Vec<Token>,
    rules_pending: bool,
}

impl<'c> ParseControl<'c> {
    pub(crate) fn new(
        grammar: &'c Grammar,
        lexer: &'c Lexer,
        queue: &'c mut SourceQueue,
        rules_pending: bool,
    ) -> Self {
        Self {
            grammar,
            lexer,
            queue,
            emitted: Vec::new(),
            rules_pending,
        }
    }

    pub(crate) fn into_emitted(self) -> Vec<Token> {
        self.emitted
    }

    /// Build a token of a declared type. External-flagged types are legal
    /// here and only here.
    pub fn make_token(&self, name: &str, text: &str) -> Result<Token, ParseError> {
        let index = self.grammar.token_index(name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::EmitWrongToken,
                format!("Cannot emit token of undeclared type {}.", name),
            )
        })?;
        Ok(Token::text_token(
            index as i32,
            self.lexer.token_name(index),
            text,
        ))
    }

    /// Queue a token behind the layer's hook output.
    pub fn emit_token(&mut self, token: Token) -> Result<(), ParseError> {
        let kind = token.kind();
        if kind < 0 || kind as usize >= self.grammar.tokens.len() {
            return Err(ParseError::new(
                ParseErrorKind::EmitWrongToken,
                format!("Emitted token kind {} is not in the grammar table.", kind),
            ));
        }
        self.emitted.push(token);
        Ok(())
    }

    /// Switch reading to `source`, resuming the current source afterwards.
    /// Refused while resolver-decided rules are still being replayed.
    pub fn include_source(&mut self, source: Rc<Source>) -> Result<(), ParseError> {
        if self.rules_pending {
            return Err(ParseError::new(
                ParseErrorKind::IncludeUnresolved,
                format!(
                    "Source {} cannot be included while speculative rules are unresolved.",
                    source.name()
                ),
            ));
        }
        self.queue.prepend(source);
        Ok(())
    }
}
