//! Compilation of an EBNF-like grammar description into [Grammar] tables.
//!
//! The pipeline, in order: lex the description with the bootstrap table and
//! scan its records top-down (directives and token definitions, then node
//! definitions into representative chunk trees); resolve non-terminal
//! references; check reachability from the root; resolve FIRST sets with a
//! worklist; reject left recursion; emit states and rules with multi-rule
//! coalescing and the unused-state sweep; and infer tokenizer groups.
//!
//! # Example
//! ```
//! use lang_ll::compiler::compile;
//!
//! let grammar = compile(
//!     r#"
//!     !aside $space;
//!     $space = /\s+/;
//!     $num = /[0-9]+/;
//!     $op = /[-+]/;
//!     sum = $num, {('+' | '-'), $num};
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(grammar.nodes[0].name, "sum");
//! assert!(grammar.literal("+").is_some());
//! ```

mod chunk;
mod emit;
mod groups;
mod scan;

#[cfg(test)]
mod __tests__;

use crate::grammar::{Grammar, NodeEntry};
use crate::source::Source;
use crate::{GrammarError, GrammarErrorKind};
use chunk::Chunk;
use std::collections::HashMap;

/// Compile a grammar description into immutable parse tables. The first node
/// defined is the root.
pub fn compile(text: &str) -> Result<Grammar, GrammarError> {
    let source = Source::new("-grammar-", text);
    let scan = scan::scan(&source)?;

    let indices: HashMap<String, usize> = scan
        .node_names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), index))
        .collect();
    let bodies: Vec<Chunk> = scan
        .raw_bodies
        .into_iter()
        .map(|raw| raw.resolve(&indices))
        .collect::<Result<_, _>>()?;

    check_reachability(&bodies, &scan.node_names)?;
    let nullables = chunk::compute_nullables(&bodies);
    let firsts = chunk::compute_firsts(&bodies, &scan.node_names, &nullables)?;
    chunk::check_recursion(&bodies, &scan.node_names, &nullables)?;
    check_repeatables(&bodies, &scan.node_names, &nullables)?;

    let emission = emit::emit(&bodies, &firsts, &nullables);
    let mut tokens = scan.tokens;
    let mut literals = scan.literals;
    let mut states = emission.states;
    groups::assign_groups(
        &mut tokens,
        &mut literals,
        &mut states,
        &scan.node_names,
        &emission.node_first,
        scan.group_directives,
    )?;

    let nodes = scan
        .node_names
        .into_iter()
        .zip(emission.node_first)
        .map(|(name, first_state)| NodeEntry { name, first_state })
        .collect();
    Ok(Grammar {
        tokens,
        nodes,
        states,
        rules: emission.rules,
        multi_rules: emission.multi_rules,
        literals,
    })
}

/// Every node must be reachable from the root along depends-on edges.
fn check_reachability(bodies: &[Chunk], node_names: &[String]) -> Result<(), GrammarError> {
    let mut reached = vec![false; bodies.len()];
    let mut work = vec![0usize];
    reached[0] = true;
    while let Some(node) = work.pop() {
        let mut refs = Vec::new();
        bodies[node].node_refs(&mut refs);
        for next in refs {
            if !reached[next] {
                reached[next] = true;
                work.push(next);
            }
        }
    }
    match reached.iter().position(|flag| !flag) {
        Some(unused) => Err(GrammarError::new(
            GrammarErrorKind::UnusedNonTerminal,
            format!(
                "Non-terminal {} is not reachable from {}.",
                node_names[unused], node_names[0]
            ),
        )),
        None => Ok(()),
    }
}

/// A repeated group whose body can match empty input would loop forever.
fn check_repeatables(
    bodies: &[Chunk],
    node_names: &[String],
    nullables: &[bool],
) -> Result<(), GrammarError> {
    for (node, body) in bodies.iter().enumerate() {
        if body.find_empty_repeatable(nullables) {
            return Err(GrammarError::new(
                GrammarErrorKind::EmptyRepeatable,
                format!(
                    "Non-terminal {} repeats a group that can match empty input.",
                    node_names[node]
                ),
            ));
        }
    }
    Ok(())
}
