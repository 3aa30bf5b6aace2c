//! Speculative resolution of ambiguous (state, token) pairs.
//!
//! When rule dispatch returns more than one applicable rule the engine hands
//! the conflict here. One branch per alternative explores the input with
//! bounded lookahead; branches are plain copies of the (node, state) stack
//! and never invoke user hooks. The loop fetches one token at a time,
//! advances every live branch (forking again on nested ambiguity) and drops
//! branches whose dispatch comes up empty, until exactly one survives. Every
//! fetched token is recorded and requeued so the engine can replay the
//! winner's rule sequence with hooks, deterministically.
//!
//! When lookahead reaches the end of input with several branches still live,
//! the branch that consumed the most tokens wins; ties go to the earliest
//! created branch. When every branch dies on one token, a shrinkable token
//! is re-matched shorter and the round retried; failing that, the
//! last-dying branch's rules are replayed so the engine surfaces the error
//! at the position the deepest exploration reached.

use super::Engine;
use crate::grammar::{Rule, TokenFlags, TokenSet, ANY_TOKEN, FINAL_STATE, SAME_NODE};
use crate::source::SourceQueue;
use crate::token::{Token, TOKEN_EOF};
use crate::ParseError;
use std::collections::VecDeque;

/// What the engine replays after a resolved conflict: the winner's rule
/// sequence and every token fetched while deciding.
pub(crate) struct Resolution {
    pub rules: Vec<Rule>,
    pub tokens: Vec<Token>,
}

#[derive(Clone)]
struct Branch {
    stack: Vec<(usize, i32)>,
    applied: Vec<Rule>,
    /// The rule this branch must apply next instead of dispatching; set for
    /// the initial alternatives and for fork children.
    forced: Option<Rule>,
    consumed: usize,
    order: usize,
    finished: bool,
}

pub(crate) fn resolve(
    engine: &Engine,
    stack: Vec<(usize, i32)>,
    pending: &mut VecDeque<Token>,
    fifos: &mut [VecDeque<Token>],
    queue: &mut SourceQueue,
    conflict: &Token,
    candidates: &[Rule],
) -> Result<Resolution, ParseError> {
    let mut branches: Vec<Branch> = candidates
        .iter()
        .enumerate()
        .map(|(order, rule)| Branch {
            stack: stack.clone(),
            applied: Vec::new(),
            forced: Some(*rule),
            consumed: 0,
            order,
            finished: false,
        })
        .collect();
    let mut next_order = candidates.len();
    let mut tokens: Vec<Token> = Vec::new();
    let mut died: Vec<Branch> = Vec::new();

    let mut current = Some(conflict.clone());
    loop {
        let token = match current.take() {
            Some(token) => token,
            None => {
                if branches.iter().all(|branch| branch.finished) {
                    break;
                }
                let expected = expected_union(engine, &branches);
                let group = lookahead_group(engine, &branches);
                let token = match fetch(engine, pending, fifos, queue, group, &expected) {
                    Ok(token) => token,
                    // A lexical error ends the lookahead; the engine replays
                    // the winner and surfaces it naturally.
                    Err(err) if err.is_lexical() => break,
                    Err(err) => return Err(err),
                };
                if token.is_end() {
                    tokens.push(token);
                    break;
                }
                if engine
                    .grammar()
                    .token_flags(token.kind())
                    .contains(TokenFlags::SIDE)
                {
                    tokens.push(token);
                    continue;
                }
                token
            }
        };
        tokens.push(token.clone());

        let before = branches.clone();
        let mut survivors: Vec<Branch> = Vec::new();
        for branch in branches.drain(..) {
            if branch.finished {
                survivors.push(branch);
                continue;
            }
            advance(engine, &token, branch, &mut survivors, &mut died, &mut next_order);
        }
        branches = survivors;

        match branches.len() {
            1 => break,
            0 => {
                if let Some(short) = shrink_last(engine, queue, &died, &token) {
                    tokens.pop();
                    current = Some(short);
                    branches = before;
                    continue;
                }
                let loser = died.pop().expect("at least one branch died");
                return Ok(Resolution {
                    rules: loser.applied,
                    tokens,
                });
            }
            _ => {}
        }
    }

    // A single survivor, or end-of-lookahead tie-break: longest consumption
    // first, then the earliest created branch.
    let winner = branches
        .iter()
        .max_by(|a, b| {
            a.consumed
                .cmp(&b.consumed)
                .then(b.order.cmp(&a.order))
        })
        .expect("at least one live branch");
    Ok(Resolution {
        rules: winner.applied.clone(),
        tokens,
    })
}

/// Advance one branch over one token: dispatch and apply until the token is
/// consumed, the branch finishes, or dispatch comes up empty. Nested
/// ambiguity forks the branch, one child per extra alternative, advanced in
/// rule order right after their parent.
fn advance(
    engine: &Engine,
    token: &Token,
    branch: Branch,
    survivors: &mut Vec<Branch>,
    died: &mut Vec<Branch>,
    next_order: &mut usize,
) {
    let mut branch = branch;
    let mut forks: Vec<Branch> = Vec::new();
    loop {
        let state = match branch.stack.last() {
            Some(&(_, state)) => state as usize,
            None => {
                branch.finished = true;
                survivors.push(branch);
                break;
            }
        };
        let rules = match branch.forced.take() {
            Some(rule) => vec![rule],
            None => engine.find_rules(token, state),
        };
        if rules.is_empty() {
            died.push(branch);
            break;
        }
        for rule in &rules[1..] {
            let mut fork = branch.clone();
            fork.forced = Some(*rule);
            fork.order = *next_order;
            *next_order += 1;
            forks.push(fork);
        }
        let rule = rules[0];
        let consumed = apply(engine, &mut branch.stack, &rule);
        branch.applied.push(rule);
        if consumed {
            branch.consumed += 1;
            survivors.push(branch);
            break;
        }
        if branch.stack.is_empty() {
            branch.finished = true;
            survivors.push(branch);
            break;
        }
    }
    for fork in forks {
        advance(engine, token, fork, survivors, died, next_order);
    }
}

/// The hook-free counterpart of the engine's rule application, over a plain
/// (node, state) stack.
fn apply(engine: &Engine, stack: &mut Vec<(usize, i32)>, rule: &Rule) -> bool {
    let top = stack.last_mut().expect("non-empty branch stack");
    top.1 = rule.state;
    if rule.node == SAME_NODE {
        while matches!(stack.last(), Some(&(_, state)) if state == FINAL_STATE) {
            stack.pop();
        }
        rule.token != ANY_TOKEN
    } else {
        let node = rule.node as usize;
        stack.push((node, engine.grammar().nodes[node].first_state as i32));
        false
    }
}

/// Lookahead tokens come from the engine's pending queue, then from the hook
/// buffers (outermost first, without running hooks), then from the lexer
/// restricted to the kinds some live branch expects.
fn fetch(
    engine: &Engine,
    pending: &mut VecDeque<Token>,
    fifos: &mut [VecDeque<Token>],
    queue: &mut SourceQueue,
    group: u32,
    expected: &TokenSet,
) -> Result<Token, ParseError> {
    if let Some(token) = pending.pop_front() {
        return Ok(token);
    }
    for fifo in fifos.iter_mut().rev() {
        if let Some(token) = fifo.pop_front() {
            return Ok(token);
        }
    }
    loop {
        let token = engine.lexer().next_of(queue, group, expected)?;
        if token.kind() == TOKEN_EOF && !queue.is_empty() {
            continue;
        }
        return Ok(token);
    }
}

fn expected_union(engine: &Engine, branches: &[Branch]) -> TokenSet {
    let mut union = TokenSet::new();
    for branch in branches {
        if branch.finished {
            continue;
        }
        if let Some(&(_, state)) = branch.stack.last() {
            union.union_with(&engine.grammar().states[state as usize].expected);
        }
    }
    union
}

/// The group used to tokenize lookahead: the first live unfinished branch's
/// state group, falling back to group zero.
fn lookahead_group(engine: &Engine, branches: &[Branch]) -> u32 {
    branches
        .iter()
        .find(|branch| !branch.finished)
        .and_then(|branch| branch.stack.last())
        .map(|&(_, state)| engine.grammar().states[state as usize].group)
        .unwrap_or(0)
}

/// The zero-survivor fallback: re-match the killing token strictly shorter,
/// using the group of the state the last-dying branch reached.
fn shrink_last(
    engine: &Engine,
    queue: &mut SourceQueue,
    died: &[Branch],
    token: &Token,
) -> Option<Token> {
    if !engine
        .grammar()
        .token_flags(token.kind())
        .contains(TokenFlags::SHRINKABLE)
    {
        return None;
    }
    let group = died
        .last()
        .and_then(|branch| branch.stack.last())
        .map(|&(_, state)| engine.grammar().states[state as usize].group)
        .unwrap_or(0);
    engine.lexer().shrink(queue, group, token)
}
