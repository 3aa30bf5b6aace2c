//! Build-time representative trees for node bodies.
//!
//! Each node definition is parsed into a tree of chunks; the tree drives the
//! FIRST-set worklist, the nullability and left-recursion analyses and state
//! emission, and is discarded afterwards.

use crate::grammar::TokenSet;
use crate::{GrammarError, GrammarErrorKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupMode {
    Plain,
    Optional,
    Repeat,
}

#[derive(Debug)]
/// A chunk as scanned, with node references still by name.
pub(crate) enum RawChunk {
    Variant(Vec<RawChunk>),
    Group(Vec<RawChunk>, GroupMode),
    Token(usize),
    NodeRef(String),
}

#[derive(Debug)]
/// A chunk with node references resolved to node table indices.
pub(crate) enum Chunk {
    Variant(Vec<Chunk>),
    Group(Vec<Chunk>, GroupMode),
    Token(usize),
    Node(usize),
}

impl RawChunk {
    /// Replace node references by indices; a reference without a body is an
    /// `UnknownNonTerminal` error.
    pub(crate) fn resolve(self, indices: &HashMap<String, usize>) -> Result<Chunk, GrammarError> {
        match self {
            RawChunk::Token(token) => Ok(Chunk::Token(token)),
            RawChunk::NodeRef(name) => match indices.get(&name) {
                Some(&index) => Ok(Chunk::Node(index)),
                None => Err(GrammarError::new(
                    GrammarErrorKind::UnknownNonTerminal,
                    format!("Non-terminal {} is referenced but never defined.", name),
                )),
            },
            RawChunk::Variant(alternatives) => Ok(Chunk::Variant(
                alternatives
                    .into_iter()
                    .map(|alt| alt.resolve(indices))
                    .collect::<Result<_, _>>()?,
            )),
            RawChunk::Group(items, mode) => Ok(Chunk::Group(
                items
                    .into_iter()
                    .map(|item| item.resolve(indices))
                    .collect::<Result<_, _>>()?,
                mode,
            )),
        }
    }
}

impl Chunk {
    /// Collect every referenced node, for the reachability sweep.
    pub(crate) fn node_refs(&self, refs: &mut Vec<usize>) {
        match self {
            Chunk::Token(_) => {}
            Chunk::Node(index) => refs.push(*index),
            Chunk::Variant(alternatives) => {
                for alt in alternatives {
                    alt.node_refs(refs);
                }
            }
            Chunk::Group(items, _) => {
                for item in items {
                    item.node_refs(refs);
                }
            }
        }
    }

    /// Whether the chunk can match empty input, given the current per-node
    /// nullability estimates.
    pub(crate) fn nullable(&self, node_nullable: &[bool]) -> bool {
        match self {
            Chunk::Token(_) => false,
            Chunk::Node(index) => node_nullable[*index],
            Chunk::Variant(alternatives) => {
                alternatives.iter().any(|alt| alt.nullable(node_nullable))
            }
            Chunk::Group(items, mode) => match mode {
                GroupMode::Optional | GroupMode::Repeat => true,
                GroupMode::Plain => items.iter().all(|item| item.nullable(node_nullable)),
            },
        }
    }

    /// Union the chunk's FIRST tokens into `out`, given the current per-node
    /// FIRST estimates.
    pub(crate) fn first(&self, firsts: &[TokenSet], node_nullable: &[bool], out: &mut TokenSet) {
        match self {
            Chunk::Token(token) => out.insert(*token),
            Chunk::Node(index) => out.union_with(&firsts[*index]),
            Chunk::Variant(alternatives) => {
                for alt in alternatives {
                    alt.first(firsts, node_nullable, out);
                }
            }
            Chunk::Group(items, _) => {
                for item in items {
                    item.first(firsts, node_nullable, out);
                    if !item.nullable(node_nullable) {
                        break;
                    }
                }
            }
        }
    }

    /// Nodes referable before any token is consumed: the left-recursion
    /// dependency edges.
    pub(crate) fn left_refs(&self, node_nullable: &[bool], refs: &mut Vec<usize>) {
        match self {
            Chunk::Token(_) => {}
            Chunk::Node(index) => refs.push(*index),
            Chunk::Variant(alternatives) => {
                for alt in alternatives {
                    alt.left_refs(node_nullable, refs);
                }
            }
            Chunk::Group(items, _) => {
                for item in items {
                    item.left_refs(node_nullable, refs);
                    if !item.nullable(node_nullable) {
                        break;
                    }
                }
            }
        }
    }

    /// Find a repeated group whose body can match empty input.
    pub(crate) fn find_empty_repeatable(&self, node_nullable: &[bool]) -> bool {
        match self {
            Chunk::Token(_) | Chunk::Node(_) => false,
            Chunk::Variant(alternatives) => alternatives
                .iter()
                .any(|alt| alt.find_empty_repeatable(node_nullable)),
            Chunk::Group(items, mode) => {
                if *mode == GroupMode::Repeat
                    && items.iter().all(|item| item.nullable(node_nullable))
                {
                    return true;
                }
                items
                    .iter()
                    .any(|item| item.find_empty_repeatable(node_nullable))
            }
        }
    }
}

/// Per-node nullability, to a fixed point.
pub(crate) fn compute_nullables(bodies: &[Chunk]) -> Vec<bool> {
    let mut nullable = vec![false; bodies.len()];
    loop {
        let mut changed = false;
        for (index, body) in bodies.iter().enumerate() {
            if !nullable[index] && body.nullable(&nullable) {
                nullable[index] = true;
                changed = true;
            }
        }
        if !changed {
            break nullable;
        }
    }
}

/// Per-node FIRST sets via a worklist: bodies without forward dependencies
/// solve immediately, the rest are retried until nothing changes. A node
/// whose FIRST is still empty afterwards sits on an unresolvable cycle.
pub(crate) fn compute_firsts(
    bodies: &[Chunk],
    node_names: &[String],
    nullables: &[bool],
) -> Result<Vec<TokenSet>, GrammarError> {
    let mut firsts: Vec<TokenSet> = vec![TokenSet::new(); bodies.len()];
    loop {
        let mut changed = false;
        for index in 0..bodies.len() {
            let mut next = TokenSet::new();
            bodies[index].first(&firsts, nullables, &mut next);
            if next != firsts[index] {
                firsts[index] = next;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    for (index, first) in firsts.iter().enumerate() {
        if first.is_empty() {
            return Err(GrammarError::new(
                GrammarErrorKind::Unresolved,
                format!(
                    "First tokens of non-terminal {} cannot be resolved.",
                    node_names[index]
                ),
            ));
        }
    }
    Ok(firsts)
}

/// Left-recursion detection: a node reaching itself through left-position
/// references before any keyed rule would be emitted.
pub(crate) fn check_recursion(
    bodies: &[Chunk],
    node_names: &[String],
    nullables: &[bool],
) -> Result<(), GrammarError> {
    let edges: Vec<Vec<usize>> = bodies
        .iter()
        .map(|body| {
            let mut refs = Vec::new();
            body.left_refs(nullables, &mut refs);
            refs
        })
        .collect();

    // 0 unvisited, 1 on the current path, 2 done
    let mut color = vec![0u8; bodies.len()];
    for start in 0..bodies.len() {
        if color[start] == 0 {
            if let Some(node) = find_cycle(start, &edges, &mut color) {
                return Err(GrammarError::new(
                    GrammarErrorKind::Recursion,
                    format!("Non-terminal {} is left recursive.", node_names[node]),
                ));
            }
        }
    }
    Ok(())
}

fn find_cycle(start: usize, edges: &[Vec<usize>], color: &mut [u8]) -> Option<usize> {
    color[start] = 1;
    for &next in &edges[start] {
        match color[next] {
            1 => return Some(next),
            0 => {
                if let Some(node) = find_cycle(next, edges, color) {
                    return Some(node);
                }
            }
            _ => {}
        }
    }
    color[start] = 2;
    None
}
