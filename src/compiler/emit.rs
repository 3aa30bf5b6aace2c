//! State and rule emission from the chunk trees, multi-rule coalescing and
//! the unused-state sweep.

use super::chunk::{Chunk, GroupMode};
use crate::grammar::{MultiRule, Rule, StateEntry, TokenSet, ANY_TOKEN, FINAL_STATE, SAME_NODE};

pub(crate) struct Emission {
    /// `group` is a placeholder here; group inference fills it in.
    pub states: Vec<StateEntry>,
    pub rules: Vec<Rule>,
    pub multi_rules: Vec<MultiRule>,
    pub node_first: Vec<usize>,
}

struct Emitter<'c> {
    firsts: &'c [TokenSet],
    nullables: &'c [bool],
    states: Vec<Vec<Rule>>,
    node_first: Vec<usize>,
}

/// Lay out the states and rules of every node, then coalesce, sweep and
/// renumber into the flat table form.
pub(crate) fn emit(bodies: &[Chunk], firsts: &[TokenSet], nullables: &[bool]) -> Emission {
    let mut emitter = Emitter {
        firsts,
        nullables,
        states: Vec::new(),
        node_first: Vec::new(),
    };
    for body in bodies {
        let entry = emitter.alloc();
        emitter.node_first.push(entry);
        emitter.emit_chunk(body, entry, FINAL_STATE);
    }
    finalize(emitter.states, emitter.node_first)
}

impl<'c> Emitter<'c> {
    fn alloc(&mut self) -> usize {
        self.states.push(Vec::new());
        self.states.len() - 1
    }

    fn add_rule(&mut self, state: usize, rule: Rule) {
        let drafted = &mut self.states[state];
        if !drafted.contains(&rule) {
            drafted.push(rule);
        }
    }

    fn bypass(&mut self, state: usize, exit: i32) {
        self.add_rule(
            state,
            Rule {
                token: ANY_TOKEN,
                state: exit,
                node: SAME_NODE,
            },
        );
    }

    fn emit_chunk(&mut self, chunk: &Chunk, entry: usize, exit: i32) {
        match chunk {
            Chunk::Token(token) => self.add_rule(
                entry,
                Rule {
                    token: *token as i32,
                    state: exit,
                    node: SAME_NODE,
                },
            ),
            Chunk::Node(node) => {
                for token in self.firsts[*node].iter().collect::<Vec<_>>() {
                    self.add_rule(
                        entry,
                        Rule {
                            token: token as i32,
                            state: exit,
                            node: *node as i32,
                        },
                    );
                }
                if self.nullables[*node] {
                    self.bypass(entry, exit);
                }
            }
            Chunk::Variant(alternatives) => {
                let mut optional = false;
                for alt in alternatives {
                    self.emit_chunk(alt, entry, exit);
                    optional |= alt.nullable(self.nullables);
                }
                if optional {
                    self.bypass(entry, exit);
                }
            }
            Chunk::Group(items, mode) => match mode {
                GroupMode::Plain => self.emit_chain(items, entry, exit),
                GroupMode::Optional => {
                    self.emit_chain(items, entry, exit);
                    self.bypass(entry, exit);
                }
                GroupMode::Repeat => {
                    // the tail re-enters, the bypass leaves the loop
                    self.emit_chain(items, entry, entry as i32);
                    self.bypass(entry, exit);
                }
            },
        }
    }

    fn emit_chain(&mut self, items: &[Chunk], entry: usize, exit: i32) {
        let mut current = entry;
        for (index, item) in items.iter().enumerate() {
            if index + 1 == items.len() {
                self.emit_chunk(item, current, exit);
            } else {
                let next = self.alloc();
                self.emit_chunk(item, current, next as i32);
                current = next;
            }
        }
    }
}

fn finalize(drafted: Vec<Vec<Rule>>, node_first: Vec<usize>) -> Emission {
    // Sweep: a state survives only if it is a node entry or targeted by a
    // surviving rule.
    let mut keep = vec![false; drafted.len()];
    let mut work: Vec<usize> = node_first.clone();
    for &state in &work {
        keep[state] = true;
    }
    while let Some(state) = work.pop() {
        for rule in &drafted[state] {
            if rule.state >= 0 && !keep[rule.state as usize] {
                keep[rule.state as usize] = true;
                work.push(rule.state as usize);
            }
        }
    }
    let mut renumber = vec![usize::MAX; drafted.len()];
    let mut next = 0;
    for (old, kept) in keep.iter().enumerate() {
        if *kept {
            renumber[old] = next;
            next += 1;
        }
    }

    let mut states = Vec::with_capacity(next);
    let mut rules: Vec<Rule> = Vec::new();
    let mut multi_rules: Vec<MultiRule> = Vec::new();
    for (old, drafted_rules) in drafted.iter().enumerate() {
        if !keep[old] {
            continue;
        }
        let mut sorted: Vec<Rule> = drafted_rules
            .iter()
            .map(|rule| Rule {
                token: rule.token,
                state: if rule.state >= 0 {
                    renumber[rule.state as usize] as i32
                } else {
                    rule.state
                },
                node: rule.node,
            })
            .collect();
        sorted.sort_by_key(|rule| rule.token);

        let low_rule = rules.len();
        let mut shared: Vec<(i32, Vec<Rule>)> = Vec::new();
        let mut index = 0;
        while index < sorted.len() {
            let key = sorted[index].token;
            let mut end = index + 1;
            while end < sorted.len() && sorted[end].token == key {
                end += 1;
            }
            if end - index == 1 {
                rules.push(sorted[index]);
            } else {
                shared.push((key, sorted[index..end].to_vec()));
            }
            index = end;
        }
        let high_rule = rules.len();

        let low_multi = multi_rules.len();
        for (key, alternatives) in shared {
            let low = rules.len();
            rules.extend(alternatives);
            multi_rules.push(MultiRule {
                token: key,
                low_rule: low,
                high_rule: rules.len(),
            });
        }
        let high_multi = multi_rules.len();

        let expected: TokenSet = sorted
            .iter()
            .filter(|rule| rule.token >= 0)
            .map(|rule| rule.token as usize)
            .collect();
        states.push(StateEntry {
            group: 0,
            low_rule,
            high_rule,
            low_multi,
            high_multi,
            expected,
        });
    }

    let node_first = node_first.into_iter().map(|state| renumber[state]).collect();
    Emission {
        states,
        rules,
        multi_rules,
        node_first,
    }
}
