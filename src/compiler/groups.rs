//! Token-group assignment and per-state group inference.
//!
//! Explicit groups come from `!group` directives, one group bit per
//! directive. Side tokens belong to every group, as do external tokens not
//! grouped explicitly. Literals inherit the union of group masks of every
//! regex token whose pattern fully matches their text. Each state's group is
//! then the intersection of the masks of all tokens keyed in its rules; an
//! empty intersection is a `DisjointGroups` error, and the state's single
//! group id is the lowest set bit.

use crate::grammar::{StateEntry, TokenEntry, TokenFlags};
use crate::{GrammarError, GrammarErrorKind};
use regex::bytes::Regex;
use std::collections::BTreeMap;

pub(crate) fn assign_groups(
    tokens: &mut [TokenEntry],
    literals: &mut BTreeMap<String, usize>,
    states: &mut [StateEntry],
    node_names: &[String],
    node_first: &[usize],
    group_directives: usize,
) -> Result<(), GrammarError> {
    let group_count = group_directives.max(1);
    let every_group = if group_count >= 32 {
        u32::MAX
    } else {
        (1u32 << group_count) - 1
    };

    for entry in tokens.iter_mut() {
        if entry.flags.contains(TokenFlags::SIDE) {
            entry.groups = every_group;
        } else if entry.flags.contains(TokenFlags::EXTERNAL) {
            if entry.groups == 0 {
                entry.groups = every_group;
            }
        } else if !entry.pattern.is_empty() && entry.groups == 0 {
            entry.groups = 1;
        }
    }

    inherit_literal_groups(tokens, literals)?;

    for (index, state) in states.iter_mut().enumerate() {
        let mut mask = every_group;
        for token in state.expected.iter() {
            mask &= tokens[token].groups;
        }
        if mask == 0 {
            let node = owner_node(node_first, index);
            return Err(GrammarError::new(
                GrammarErrorKind::DisjointGroups,
                format!(
                    "Tokens expected in non-terminal {} share no tokenizer group.",
                    node_names[node]
                ),
            ));
        }
        state.group = mask.trailing_zeros();
    }
    Ok(())
}

/// A literal takes the union of groups of every defined regex whose pattern
/// accepts its full text, and becomes caseless if any such token is; the
/// literal lookup table is re-keyed uppercase in that case.
fn inherit_literal_groups(
    tokens: &mut [TokenEntry],
    literals: &mut BTreeMap<String, usize>,
) -> Result<(), GrammarError> {
    let matchers: Vec<(u32, bool, Regex)> = tokens
        .iter()
        .filter(|entry| !entry.pattern.is_empty())
        .map(|entry| {
            let full = Regex::new(&format!("^(?:{})$", entry.pattern)).map_err(|err| {
                GrammarError::new(
                    GrammarErrorKind::WrongRegexp,
                    format!("Token ${} pattern is not a valid regex: {}", entry.name, err),
                )
            })?;
            Ok((
                entry.groups,
                entry.flags.contains(TokenFlags::CASELESS),
                full,
            ))
        })
        .collect::<Result<_, GrammarError>>()?;

    let mut rekeyed: Vec<(String, String)> = Vec::new();
    for (text, &index) in literals.iter() {
        let entry = &mut tokens[index];
        let mut mask = 0u32;
        let mut caseless = false;
        for (groups, matcher_caseless, matcher) in &matchers {
            if matcher.is_match(text.as_bytes()) {
                mask |= groups;
                caseless |= matcher_caseless;
            }
        }
        if mask == 0 {
            return Err(GrammarError::new(
                GrammarErrorKind::UnresolvedTokenTypes,
                format!("Literal {:?} is not accepted by any token pattern.", text),
            ));
        }
        entry.groups = mask;
        if caseless {
            entry.flags.insert(TokenFlags::CASELESS);
            let upper = text.to_uppercase();
            if upper != *text {
                rekeyed.push((text.clone(), upper));
            }
        }
    }
    for (old, new) in rekeyed {
        if let Some(index) = literals.remove(&old) {
            literals.entry(new).or_insert(index);
        }
    }
    Ok(())
}

fn owner_node(node_first: &[usize], state: usize) -> usize {
    match node_first.binary_search(&state) {
        Ok(index) => index,
        Err(index) => index - 1,
    }
}
