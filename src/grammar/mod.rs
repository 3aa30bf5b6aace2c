//! The compiled grammar: five flat, immutable tables chained by indices.
//!
//! A [Grammar] is produced once by [compile](crate::compiler::compile) (or
//! reloaded from its serialized form) and then shared by any number of
//! parses. `tokens` carries the terminal alphabet with group membership and
//! flags, `nodes` maps each non-terminal to its first state, `states` bound
//! per-state rule and multi-rule ranges, and `rules`/`multi_rules` hold the
//! transitions themselves.
//!
//! # Example
//! ```
//! use lang_ll::{compile, Grammar};
//!
//! let grammar = compile(
//!     r"
//!     $num = /[0-9]+/;
//!     $op = /[+]/;
//!     sum = $num, {'+', $num};
//!     ",
//! )
//! .unwrap();
//! assert_eq!(grammar.nodes[0].name, "sum");
//! let entry = grammar.nodes[0].first_state;
//! let num = grammar.token_index("num").unwrap();
//! assert!(grammar.states[entry].expected.contains(num));
//!
//! let reloaded = Grammar::from_json(&grammar.to_json()).unwrap();
//! assert_eq!(grammar, reloaded);
//! ```

mod serial;

#[cfg(test)]
mod __tests__;

pub use serial::MachineNode;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::ops::{BitOr, Range};

/// Wildcard rule key: the rule applies when no keyed rule matched. Wildcard
/// rules never consume the lookahead token.
pub const ANY_TOKEN: i32 = -4;
/// `Rule::state` value meaning "this rule finishes the current node".
pub const FINAL_STATE: i32 = -1;
/// `Rule::node` value meaning "stay in the current node; consume the token".
pub const SAME_NODE: i32 = -1;
/// Upper bound on tokenizer groups a grammar may define.
pub const MAX_GROUPS: usize = 31;

#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Bitmask of per-token-type behaviours.
pub struct TokenFlags(pub u16);

impl TokenFlags {
    pub const NONE: TokenFlags = TokenFlags(0);
    /// Appears in source but participates in no grammar rule.
    pub const SIDE: TokenFlags = TokenFlags(1);
    /// Token text is uppercased before comparison with string literals.
    pub const CASELESS: TokenFlags = TokenFlags(1 << 1);
    /// Matching this type is a lexical error; it exists for diagnostics.
    pub const ERROR: TokenFlags = TokenFlags(1 << 2);
    /// Never produced by the lexer; may only be emitted by hooks.
    pub const EXTERNAL: TokenFlags = TokenFlags(1 << 3);
    /// On a dead-end rule lookup the lexer may re-match a strictly shorter
    /// prefix of this type.
    pub const SHRINKABLE: TokenFlags = TokenFlags(1 << 4);
    /// A string-literal type created implicitly from node definitions.
    pub const LITERAL: TokenFlags = TokenFlags(1 << 5);
    /// A literal that forbids its text from matching a non-literal type.
    pub const RESERVED: TokenFlags = TokenFlags(1 << 6);
    /// Literal lookup is skipped for tokens of this type.
    pub const NO_LITERALS: TokenFlags = TokenFlags(1 << 7);

    pub fn contains(self, other: TokenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TokenFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TokenFlags {
    type Output = TokenFlags;

    fn bitor(self, rhs: TokenFlags) -> TokenFlags {
        TokenFlags(self.0 | rhs.0)
    }
}

impl Debug for TokenFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(TokenFlags, &str); 8] = [
            (TokenFlags::SIDE, "side"),
            (TokenFlags::CASELESS, "caseless"),
            (TokenFlags::ERROR, "error"),
            (TokenFlags::EXTERNAL, "extern"),
            (TokenFlags::SHRINKABLE, "shrink"),
            (TokenFlags::LITERAL, "literal"),
            (TokenFlags::RESERVED, "reserved"),
            (TokenFlags::NO_LITERALS, "no-literals"),
        ];
        let mut listed = f.debug_list();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                listed.entry(&name);
            }
        }
        listed.finish()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
/// A bit-set over token table indices.
pub struct TokenSet {
    bits: Vec<u64>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize) {
        let word = index / 64;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bits
            .get(index / 64)
            .map_or(false, |word| word & (1 << (index % 64)) != 0)
    }

    pub fn union_with(&mut self, other: &TokenSet) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (word, bits) in self.bits.iter_mut().zip(other.bits.iter()) {
            *word |= bits;
        }
    }

    pub fn intersects(&self, other: &TokenSet) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .any(|(a, b)| a & b != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().enumerate().flat_map(|(wi, word)| {
            (0..64).filter_map(move |bit| {
                if word & (1 << bit) != 0 {
                    Some(wi * 64 + bit)
                } else {
                    None
                }
            })
        })
    }
}

impl Debug for TokenSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for TokenSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A terminal type: name, regex pattern (empty for literals and externals),
/// tokenizer group membership and behaviour flags.
pub struct TokenEntry {
    pub name: String,
    pub pattern: String,
    pub groups: u32,
    pub flags: TokenFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A non-terminal: its states are the contiguous range starting at
/// `first_state` and ending at the next node's first state.
pub struct NodeEntry {
    pub name: String,
    pub first_state: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A parse state: the tokenizer group to fetch with, the bounds of its keyed
/// rules and multi-rules, and the set of token keys appearing in its rules
/// (the tokenizer-restrict hint used during speculation).
pub struct StateEntry {
    pub group: u32,
    pub low_rule: usize,
    pub high_rule: usize,
    pub low_multi: usize,
    pub high_multi: usize,
    pub expected: TokenSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// A transition: on `token`, move the current frame to `state` (or finish the
/// node on [FINAL_STATE]) and, unless `node` is [SAME_NODE], push that node.
pub struct Rule {
    pub token: i32,
    pub state: i32,
    pub node: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// A contiguous range of rules sharing one token key at one state; more than
/// one applicable rule is the trigger for speculative resolution.
pub struct MultiRule {
    pub token: i32,
    pub low_rule: usize,
    pub high_rule: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The compiled grammar tables. Immutable once built; shared by any number of
/// concurrent parses.
pub struct Grammar {
    pub tokens: Vec<TokenEntry>,
    pub nodes: Vec<NodeEntry>,
    pub states: Vec<StateEntry>,
    pub rules: Vec<Rule>,
    pub multi_rules: Vec<MultiRule>,
    /// Literal text (uppercased for caseless literals) to token table index.
    pub literals: BTreeMap<String, usize>,
}

impl Grammar {
    pub fn token_index(&self, name: &str) -> Option<usize> {
        self.tokens.iter().position(|entry| entry.name == name)
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|entry| entry.name == name)
    }

    pub fn literal(&self, text: &str) -> Option<usize> {
        self.literals.get(text).copied()
    }

    pub fn token_flags(&self, kind: i32) -> TokenFlags {
        if kind >= 0 {
            self.tokens[kind as usize].flags
        } else {
            TokenFlags::NONE
        }
    }

    /// The literal token matching a token's text, honoring the kind's
    /// caseless and no-literals flags.
    pub fn literal_key(&self, token: &crate::token::Token) -> Option<usize> {
        let kind = token.kind();
        if kind < 0 {
            return None;
        }
        let flags = self.tokens[kind as usize].flags;
        if flags.contains(TokenFlags::NO_LITERALS) {
            return None;
        }
        if flags.contains(TokenFlags::CASELESS) {
            self.literal(&token.text().to_uppercase())
        } else {
            self.literal(token.text())
        }
    }

    /// The states belonging to a node.
    pub fn states_of(&self, node: usize) -> Range<usize> {
        let first = self.nodes[node].first_state;
        let next = self
            .nodes
            .get(node + 1)
            .map_or(self.states.len(), |entry| entry.first_state);
        first..next
    }

    /// The node a state belongs to.
    pub fn node_of_state(&self, state: usize) -> usize {
        match self
            .nodes
            .binary_search_by_key(&state, |entry| entry.first_state)
        {
            Ok(index) => index,
            Err(index) => index - 1,
        }
    }

    /// The keyed rules of a state, sorted by ascending token key.
    pub fn keyed_rules(&self, state: usize) -> &[Rule] {
        let entry = &self.states[state];
        &self.rules[entry.low_rule..entry.high_rule]
    }

    pub fn multi_rules_of(&self, state: usize) -> &[MultiRule] {
        let entry = &self.states[state];
        &self.multi_rules[entry.low_multi..entry.high_multi]
    }

    /// Human-readable name for any token key, including the sentinels.
    pub fn key_name(&self, key: i32) -> &str {
        match key {
            k if k >= 0 => &self.tokens[k as usize].name,
            crate::token::TOKEN_EOF => "-eof-",
            crate::token::TOKEN_EOI => "-eoi-",
            crate::token::TOKEN_ERROR => "-error-",
            ANY_TOKEN => "-any-",
            _ => "-invalid-",
        }
    }

    /// Render a rule for log lines and error hints.
    pub fn rule_text(&self, rule: &Rule) -> String {
        let target = if rule.state == FINAL_STATE {
            "final".to_string()
        } else {
            format!("s{}", rule.state)
        };
        if rule.node == SAME_NODE {
            format!("({} -> {})", self.key_name(rule.token), target)
        } else {
            format!(
                "({} -> {} push {})",
                self.key_name(rule.token),
                target,
                self.nodes[rule.node as usize].name
            )
        }
    }

    /// The token names a state accepts, for "expected one of" diagnostics.
    pub fn expected_text(&self, state: usize) -> String {
        let names: Vec<&str> = self.states[state]
            .expected
            .iter()
            .map(|key| self.tokens[key].name.as_str())
            .collect();
        names.join(", ")
    }
}
