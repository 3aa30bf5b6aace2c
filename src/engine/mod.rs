//! The table-driven parse engine.
//!
//! The engine is a deterministic single-threaded stack machine over node
//! frames. Per iteration it selects the tokenizer group of the top frame's
//! state, fetches one token through the hook pipeline, and dispatches the
//! single applicable rule for the (state, token) pair. When more than one
//! rule applies it hands over to the [resolver](resolver), which explores
//! every alternative with bounded lookahead until exactly one survives; the
//! surviving rule sequence is then replayed with hooks. Side tokens never
//! reach rule dispatch: they buffer on the current frame and flush to its
//! handlers when the next structural token arrives.

mod context;
pub(crate) mod resolver;

#[cfg(test)]
mod __tests__;

use crate::grammar::{Grammar, Rule, TokenFlags, ANY_TOKEN, FINAL_STATE, SAME_NODE};
use crate::hooks::{CompiledLayer, HookSet, ParseControl};
use crate::lexer::Lexer;
use crate::source::SourceQueue;
use crate::token::{Token, TOKEN_EOF, TOKEN_EOI};
use crate::util::Log;
use crate::{GrammarError, ParseError, ParseErrorKind};
use context::ParseContext;
use once_cell::unsync::OnceCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-parse behaviour switches.
pub struct ParseOptions {
    /// Pass side tokens to node handlers instead of dropping them.
    pub with_sides: bool,
    /// After the root finalises, verify that only side tokens or end of
    /// input remain.
    pub full_source: bool,
    /// Checked at every top-of-loop iteration; aborts the parse when set.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self {
            with_sides: false,
            full_source: false,
            cancel: None,
        }
    }

    pub fn with_sides(mut self) -> Self {
        self.with_sides = true;
        self
    }

    pub fn full_source(mut self) -> Self {
        self.full_source = true;
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The parsing engine: immutable grammar tables plus the lexer built from
/// them. One engine serves any number of sequential parses; each parse owns
/// its queue and hook set.
pub struct Engine {
    grammar: Rc<Grammar>,
    lexer: Lexer,
    log: OnceCell<Log<&'static str>>,
}

impl Engine {
    pub fn new(grammar: Rc<Grammar>) -> Result<Self, GrammarError> {
        let lexer = Lexer::new(&grammar)?;
        Ok(Self {
            grammar,
            lexer,
            log: OnceCell::new(),
        })
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    pub(crate) fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    /// Set a log label to trace token fetches, rule applications and node
    /// pushes/pops. Debug builds only.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.log
            .set(log)
            .map_err(|err| format!("Log label {} is already set.", err))
    }

    /// Drive the grammar over the queue until the root node finalises.
    /// Returns the value produced by the root's first-layer handler.
    pub fn parse<V: Clone>(
        &self,
        queue: &mut SourceQueue,
        hooks: &HookSet<V>,
        options: &ParseOptions,
    ) -> Result<Option<V>, ParseError> {
        let mut ctx: ParseContext<V> = ParseContext::new(hooks.layer_count());
        ctx.push_frame(0, self.grammar.nodes[0].first_state as i32);
        self.run(&mut ctx, queue, hooks, options)?;
        if options.full_source {
            self.verify_remaining(&mut ctx, queue)?;
        }
        Ok(ctx.result.take())
    }

    fn run<V: Clone>(
        &self,
        ctx: &mut ParseContext<V>,
        queue: &mut SourceQueue,
        hooks: &HookSet<V>,
        options: &ParseOptions,
    ) -> Result<(), ParseError> {
        while !ctx.stack.is_empty() {
            if let Some(flag) = &options.cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(ParseError::new(
                        ParseErrorKind::Cancelled,
                        "Parse cancelled.".to_string(),
                    ));
                }
            }
            let state = ctx.top().state as usize;
            let token = self.next_token(ctx, queue, hooks, state)?;
            self.log_token(&token, state);

            if self.grammar.token_flags(token.kind()).contains(TokenFlags::SIDE) {
                ctx.top_mut().sides.push(token);
                continue;
            }
            self.prepare_frame(ctx, hooks, options, &token)?;

            loop {
                let state = ctx.top().state as usize;
                let rule = match ctx.pending_rules.pop_front() {
                    Some(rule) => rule,
                    None => {
                        let found = self.find_rules(&token, state);
                        match found.len() {
                            0 => {
                                if let Some(short) = self.try_shrink(queue, state, &token) {
                                    ctx.pending.push_front(short);
                                    break;
                                }
                                return Err(self.unexpected(&token, state));
                            }
                            1 => found[0],
                            _ => {
                                let resolution = resolver::resolve(
                                    self,
                                    ctx.stack_snapshot(),
                                    &mut ctx.pending,
                                    &mut ctx.fifos,
                                    queue,
                                    &token,
                                    &found,
                                )?;
                                for spent in resolution.tokens.into_iter().rev() {
                                    ctx.pending.push_front(spent);
                                }
                                ctx.pending_rules = resolution.rules.into();
                                break;
                            }
                        }
                    }
                };
                let consumed = self.apply_rule(ctx, hooks, &token, &rule)?;
                if ctx.stack.is_empty() {
                    // the root finalised on a wildcard: the lookahead token
                    // stays available to the full-source check
                    if !consumed {
                        ctx.pending.push_front(token.clone());
                    }
                    break;
                }
                if consumed {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Rule dispatch for a (token, state) pair, in the literal-first
    /// priority: a literal matching the token text (unless the kind skips
    /// literal lookup), then the token's own kind unless the literal is
    /// reserved, then the wildcard.
    pub(crate) fn find_rules(&self, token: &Token, state: usize) -> Vec<Rule> {
        let mut keys: Vec<i32> = Vec::with_capacity(3);
        let kind = token.kind();
        if kind >= 0 {
            let mut reserved = false;
            if let Some(index) = self.grammar.literal_key(token) {
                keys.push(index as i32);
                reserved = self.grammar.tokens[index]
                    .flags
                    .contains(TokenFlags::RESERVED);
            }
            if !reserved {
                keys.push(kind);
            }
        }
        keys.push(ANY_TOKEN);

        let rules = self.grammar.keyed_rules(state);
        let multis = self.grammar.multi_rules_of(state);
        for key in keys {
            if let Ok(found) = rules.binary_search_by_key(&key, |rule| rule.token) {
                return vec![rules[found]];
            }
            if let Ok(found) = multis.binary_search_by_key(&key, |multi| multi.token) {
                let multi = &multis[found];
                return self.grammar.rules[multi.low_rule..multi.high_rule].to_vec();
            }
        }
        Vec::new()
    }

    fn apply_rule<V: Clone>(
        &self,
        ctx: &mut ParseContext<V>,
        hooks: &HookSet<V>,
        token: &Token,
        rule: &Rule,
    ) -> Result<bool, ParseError> {
        self.log_rule(rule);
        if rule.node == SAME_NODE {
            let consume = rule.token != ANY_TOKEN;
            ctx.top_mut().state = rule.state;
            if consume {
                self.dispatch_token(ctx, token)?;
            }
            self.unwind_finals(ctx)?;
            Ok(consume)
        } else {
            ctx.top_mut().state = rule.state;
            let node = rule.node as usize;
            ctx.push_frame(node, self.grammar.nodes[node].first_state as i32);
            self.begin_frame(ctx, hooks, token)?;
            Ok(false)
        }
    }

    /// Begin the top frame's handlers if it has not seen a structural token
    /// yet, then flush buffered side tokens to them.
    fn prepare_frame<V: Clone>(
        &self,
        ctx: &mut ParseContext<V>,
        hooks: &HookSet<V>,
        options: &ParseOptions,
        token: &Token,
    ) -> Result<(), ParseError> {
        self.begin_frame(ctx, hooks, token)?;
        let sides: Vec<Token> = ctx.top_mut().sides.drain(..).collect();
        if options.with_sides {
            for side in &sides {
                self.dispatch_token(ctx, side)?;
            }
        }
        Ok(())
    }

    fn begin_frame<V: Clone>(
        &self,
        ctx: &mut ParseContext<V>,
        hooks: &HookSet<V>,
        token: &Token,
    ) -> Result<(), ParseError> {
        if ctx.top().handlers.is_some() {
            return Ok(());
        }
        let node = ctx.top().node;
        let name = &self.grammar.nodes[node].name;
        self.log_push(name);
        let mut handlers = Vec::with_capacity(hooks.layers.len());
        for layer in &hooks.layers {
            match layer.node_hook(node) {
                Some(hook) => handlers.push(Some(hook(name, token)?)),
                None => handlers.push(None),
            }
        }
        ctx.top_mut().handlers = Some(handlers);
        Ok(())
    }

    fn dispatch_token<V: Clone>(
        &self,
        ctx: &mut ParseContext<V>,
        token: &Token,
    ) -> Result<(), ParseError> {
        if let Some(handlers) = &mut ctx.top_mut().handlers {
            for handler in handlers.iter_mut().flatten() {
                handler.on_token(token)?;
            }
        }
        Ok(())
    }

    /// Pop every finished frame; the parent of each receives the child's
    /// first-layer value, and the root's value becomes the parse result.
    fn unwind_finals<V: Clone>(&self, ctx: &mut ParseContext<V>) -> Result<(), ParseError> {
        while ctx
            .stack
            .last()
            .map_or(false, |frame| frame.state == FINAL_STATE)
        {
            let mut frame = ctx.stack.pop().expect("non-empty node stack");
            let name = self.grammar.nodes[frame.node].name.clone();
            let mut value: Option<V> = None;
            if let Some(handlers) = &mut frame.handlers {
                for (layer, handler) in handlers.iter_mut().enumerate() {
                    if let Some(handler) = handler {
                        let finished = handler.finish()?;
                        if layer == 0 {
                            value = finished;
                        }
                    }
                }
            }
            self.log_pop(&name);
            match ctx.stack.last_mut() {
                Some(parent) => {
                    if let Some(handlers) = &mut parent.handlers {
                        for handler in handlers.iter_mut().flatten() {
                            handler.on_child(&name, value.clone())?;
                        }
                    }
                }
                None => ctx.result = value,
            }
        }
        Ok(())
    }

    /// The next token for a state: the engine-level pending queue first,
    /// then the layered hook pipeline down to the lexer. End-of-file tokens
    /// are transparent while further sources remain queued.
    fn next_token<V>(
        &self,
        ctx: &mut ParseContext<V>,
        queue: &mut SourceQueue,
        hooks: &HookSet<V>,
        state: usize,
    ) -> Result<Token, ParseError> {
        if let Some(token) = ctx.pending.pop_front() {
            return Ok(token);
        }
        let group = self.grammar.states[state].group;
        let rules_pending = !ctx.pending_rules.is_empty();
        loop {
            let token = pull_token(
                &self.lexer,
                &self.grammar,
                &hooks.layers,
                &mut ctx.fifos,
                queue,
                group,
                rules_pending,
                hooks.layers.len(),
            )?;
            if token.kind() == TOKEN_EOF && !queue.is_empty() {
                continue;
            }
            return Ok(token);
        }
    }

    fn try_shrink(&self, queue: &mut SourceQueue, state: usize, token: &Token) -> Option<Token> {
        if !self
            .grammar
            .token_flags(token.kind())
            .contains(TokenFlags::SHRINKABLE)
        {
            return None;
        }
        let group = self.grammar.states[state].group;
        self.lexer.shrink(queue, group, token)
    }

    fn unexpected(&self, token: &Token, state: usize) -> ParseError {
        let expected = self.grammar.expected_text(state);
        let (kind, message) = if token.is_end() {
            (
                ParseErrorKind::UnexpectedEof,
                format!("Unexpected end of input; expected one of: {}.", expected),
            )
        } else {
            (
                ParseErrorKind::UnexpectedToken,
                format!("Unexpected {}; expected one of: {}.", token, expected),
            )
        };
        match token.pos() {
            Some(pos) => ParseError::at(kind, message, pos),
            None => ParseError::new(kind, message),
        }
    }

    /// The full-source check: anything left beyond side tokens and end of
    /// input is an error.
    fn verify_remaining<V>(
        &self,
        ctx: &mut ParseContext<V>,
        queue: &mut SourceQueue,
    ) -> Result<(), ParseError> {
        let group = self.grammar.states[self.grammar.nodes[0].first_state].group;
        loop {
            let token = match ctx.pending.pop_front() {
                Some(token) => token,
                None => self.lexer.fetch(queue, group, None)?,
            };
            match token.kind() {
                TOKEN_EOF => {
                    if queue.is_empty() {
                        return Ok(());
                    }
                }
                TOKEN_EOI => return Ok(()),
                kind if self.grammar.token_flags(kind).contains(TokenFlags::SIDE) => {}
                _ => {
                    let message = format!("Source continues after the parsed input: {}.", token);
                    return Err(match token.pos() {
                        Some(pos) => {
                            ParseError::at(ParseErrorKind::RemainingSource, message, pos)
                        }
                        None => ParseError::new(ParseErrorKind::RemainingSource, message),
                    });
                }
            }
        }
    }

    fn log_token(&self, _token: &Token, _state: usize) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.covers(&Log::Verbose(())) {
                println!("[{}] s{}: token {}", log, _state, _token);
            }
        }
    }

    fn log_rule(&self, _rule: &Rule) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.covers(&Log::Verbose(())) {
                println!("[{}] apply {}", log, self.grammar.rule_text(_rule));
            }
        }
    }

    fn log_push(&self, _name: &str) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.covers(&Log::Success(())) {
                println!("[{}] begin {}", log, _name);
            }
        }
    }

    fn log_pop(&self, _name: &str) {
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.covers(&Log::Success(())) {
                println!("[{}] end {}", log, _name);
            }
        }
    }
}

/// Pull one token through the hook pipeline. `depth` counts the layers still
/// involved; zero reaches the lexer. A layer's FIFO is served before its
/// inner neighbour, and FIFO tokens (hook-queued by construction) are
/// checked against the fetching state's tokenizer group. Lexer output is not
/// group-checked: the lexer picks the state's group by construction.
fn pull_token<V>(
    lexer: &Lexer,
    grammar: &Grammar,
    layers: &[CompiledLayer<V>],
    fifos: &mut [std::collections::VecDeque<Token>],
    queue: &mut SourceQueue,
    group: u32,
    rules_pending: bool,
    depth: usize,
) -> Result<Token, ParseError> {
    if depth == 0 {
        return lexer.fetch(queue, group, None);
    }
    let layer = depth - 1;
    loop {
        if let Some(token) = fifos[layer].pop_front() {
            let kind = token.kind();
            if kind >= 0 && grammar.tokens[kind as usize].groups & (1 << group) == 0 {
                let message = format!(
                    "Token {} does not belong to tokenizer group {}.",
                    token, group
                );
                return Err(ParseError::new(ParseErrorKind::UnexpectedGroup, message));
            }
            return Ok(token);
        }
        let token = pull_token(
            lexer,
            grammar,
            layers,
            fifos,
            queue,
            group,
            rules_pending,
            depth - 1,
        )?;
        let hook = match layers[layer].token_hook(grammar, &token) {
            Some(hook) => hook,
            None => return Ok(token),
        };
        let mut control = ParseControl::new(grammar, lexer, &mut *queue, rules_pending);
        let emit = hook(&token, &mut control)?;
        let emitted = control.into_emitted();
        fifos[layer].extend(emitted);
        if emit {
            return Ok(token);
        }
    }
}
