use crate::compiler::compile;
use crate::examples::calc::CALC_GRAMMAR;
use crate::grammar::{Grammar, TokenFlags, TokenSet, ANY_TOKEN};

#[test]
fn token_set_inserts_and_iterates() {
    let mut set = TokenSet::new();
    assert!(set.is_empty());
    set.insert(3);
    set.insert(64);
    set.insert(3);
    assert!(set.contains(3));
    assert!(set.contains(64));
    assert!(!set.contains(4));
    assert_eq!(set.len(), 2);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 64]);
}

#[test]
fn token_set_union_and_intersection() {
    let low: TokenSet = [1usize, 2].into_iter().collect();
    let high: TokenSet = [2usize, 70].into_iter().collect();
    let mut union = low.clone();
    union.union_with(&high);
    assert!(union.contains(1) && union.contains(2) && union.contains(70));
    assert!(low.intersects(&high));
    let disjoint: TokenSet = [5usize].into_iter().collect();
    assert!(!low.intersects(&disjoint));
}

#[test]
fn token_flags_compose() {
    let mut flags = TokenFlags::SIDE | TokenFlags::CASELESS;
    assert!(flags.contains(TokenFlags::SIDE));
    assert!(!flags.contains(TokenFlags::ERROR));
    flags.insert(TokenFlags::ERROR);
    assert!(flags.contains(TokenFlags::ERROR));
    assert_eq!(format!("{:?}", TokenFlags::SIDE), r#"["side"]"#);
}

#[test]
fn state_ranges_partition_the_nodes() {
    let grammar = compile(CALC_GRAMMAR).unwrap();
    let mut covered = 0;
    for node in 0..grammar.nodes.len() {
        let range = grammar.states_of(node);
        assert_eq!(range.start, grammar.nodes[node].first_state);
        for state in range.clone() {
            assert_eq!(grammar.node_of_state(state), node);
        }
        covered += range.len();
    }
    assert_eq!(covered, grammar.states.len());
}

#[test]
fn keyed_rules_are_sorted_and_unique() {
    let grammar = compile(CALC_GRAMMAR).unwrap();
    for state in 0..grammar.states.len() {
        let rules = grammar.keyed_rules(state);
        for pair in rules.windows(2) {
            assert!(
                pair[0].token < pair[1].token,
                "state {} keys must ascend strictly",
                state
            );
        }
        if let Some(first) = rules.first() {
            if rules.iter().any(|rule| rule.token == ANY_TOKEN) {
                assert_eq!(first.token, ANY_TOKEN, "wildcard must sort first");
            }
        }
        for multi in grammar.multi_rules_of(state) {
            assert!(multi.high_rule - multi.low_rule >= 2);
            for rule in &grammar.rules[multi.low_rule..multi.high_rule] {
                assert_eq!(rule.token, multi.token);
            }
        }
    }
}

#[test]
fn serialized_tables_reload_bit_equal() {
    let grammar = compile(CALC_GRAMMAR).unwrap();
    let reloaded = Grammar::from_json(&grammar.to_json()).unwrap();
    assert_eq!(grammar, reloaded);
    // and the round trip is stable
    assert_eq!(grammar.to_json(), reloaded.to_json());
}

#[test]
fn machine_tree_lists_every_node() {
    let grammar = compile(CALC_GRAMMAR).unwrap();
    let tree = grammar.machine_tree();
    assert_eq!(tree.children.len(), grammar.nodes.len());
    assert_eq!(tree.children[0].label, "sum");
}

#[test]
fn literals_index_the_token_table() {
    let grammar = compile(CALC_GRAMMAR).unwrap();
    let plus = grammar.literal("+").unwrap();
    assert!(grammar.tokens[plus].flags.contains(TokenFlags::LITERAL));
    assert_eq!(grammar.tokens[plus].name, "+");
    assert!(grammar.literal("%").is_none());
}
