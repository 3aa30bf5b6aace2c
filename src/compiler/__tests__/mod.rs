use super::compile;
use crate::examples::ini::INI_GRAMMAR;
use crate::grammar::{TokenFlags, ANY_TOKEN};
use crate::GrammarErrorKind;

fn expect_error(text: &str, kind: GrammarErrorKind) {
    match compile(text) {
        Ok(_) => panic!("grammar should fail with {:?}", kind),
        Err(err) => assert_eq!(err.kind, kind, "{}", err),
    }
}

#[test]
fn a_minimal_grammar_compiles() {
    let grammar = compile(r"$tok = /\S+/; s = 'foo';").unwrap();
    assert_eq!(grammar.nodes.len(), 1);
    assert_eq!(grammar.nodes[0].name, "s");
    let literal = grammar.literal("foo").unwrap();
    assert!(grammar.tokens[literal].flags.contains(TokenFlags::LITERAL));
    // the literal inherits the regex token's group
    assert_eq!(grammar.tokens[literal].groups, grammar.tokens[0].groups);
}

#[test]
fn comments_and_whitespace_are_ignored() {
    let grammar = compile(
        r"
        # token section
        $tok = /\S+/;   # the only terminal
        s = 'foo';      # the root
        ",
    )
    .unwrap();
    assert_eq!(grammar.nodes[0].name, "s");
}

#[test]
fn directives_mark_token_flags() {
    let grammar = compile(
        r"
        !aside $sp;
        !shrink $op;
        !extern $indent;
        $sp = /\s+/;
        $op = /[<>]+/;
        $w = /[a-z]+/;
        s = $w, [$op, $indent];
        ",
    )
    .unwrap();
    let sp = grammar.token_index("sp").unwrap();
    assert!(grammar.tokens[sp].flags.contains(TokenFlags::SIDE));
    let op = grammar.token_index("op").unwrap();
    assert!(grammar.tokens[op].flags.contains(TokenFlags::SHRINKABLE));
    let indent = grammar.token_index("indent").unwrap();
    assert!(grammar.tokens[indent].flags.contains(TokenFlags::EXTERNAL));
    assert!(grammar.tokens[indent].pattern.is_empty());
}

#[test]
fn optional_groups_emit_wildcard_bypasses() {
    let grammar = compile(r"$w = /[a-z]+/; s = $w, ['x'], $w;").unwrap();
    let has_wildcard = grammar.rules.iter().any(|rule| rule.token == ANY_TOKEN);
    assert!(has_wildcard, "optional group needs a bypass rule");
}

#[test]
fn shared_keys_become_multi_rules() {
    let grammar = compile(
        r"
        $name = /[a-z]+/;
        g = a | b;
        a = $name, 'x';
        b = $name, 'y';
        ",
    )
    .unwrap();
    let entry = grammar.nodes[0].first_state;
    let multis = grammar.multi_rules_of(entry);
    assert_eq!(multis.len(), 1);
    let name = grammar.token_index("name").unwrap();
    assert_eq!(multis[0].token, name as i32);
    assert_eq!(multis[0].high_rule - multis[0].low_rule, 2);
    // coalesced alternatives sit outside the binary-search window
    assert!(multis[0].low_rule >= grammar.states[entry].high_rule);
}

#[test]
fn duplicate_rules_coalesce_to_one() {
    let grammar = compile(r"$w = /[a-z]+/; s = $w | $w;").unwrap();
    let entry = grammar.nodes[0].first_state;
    assert_eq!(grammar.keyed_rules(entry).len(), 1);
    assert!(grammar.multi_rules_of(entry).is_empty());
}

#[test]
fn group_masks_intersect_per_state() {
    let grammar = compile(INI_GRAMMAR).unwrap();
    for (index, state) in grammar.states.iter().enumerate() {
        let mut mask = u32::MAX;
        for token in state.expected.iter() {
            mask &= grammar.tokens[token].groups;
        }
        assert_ne!(mask, 0, "state {} has a satisfiable group", index);
        assert_eq!(state.group, mask.trailing_zeros(), "state {}", index);
        for token in state.expected.iter() {
            assert_ne!(grammar.tokens[token].groups & (1 << state.group), 0);
        }
    }
}

#[test]
fn side_tokens_belong_to_every_group() {
    let grammar = compile(INI_GRAMMAR).unwrap();
    let space = grammar.token_index("space").unwrap();
    let value = grammar.token_index("value").unwrap();
    assert_eq!(grammar.tokens[space].groups, 0b11);
    assert_eq!(grammar.tokens[value].groups, 0b10);
}

#[test]
fn caseless_tokens_uppercase_their_literals() {
    let grammar = compile(
        r"
        !caseless $kw;
        $kw = /(?i)[a-z]+/;
        s = 'begin', $kw;
        ",
    )
    .unwrap();
    let literal = grammar.literal("BEGIN").unwrap();
    assert!(grammar.literal("begin").is_none());
    assert!(grammar.tokens[literal].flags.contains(TokenFlags::CASELESS));
}

#[test]
fn reserved_literals_are_flagged() {
    let grammar = compile(
        r"
        !reserved 'if';
        $w = /[a-z]+/;
        s = 'if', $w;
        ",
    )
    .unwrap();
    let literal = grammar.literal("if").unwrap();
    assert!(grammar.tokens[literal].flags.contains(TokenFlags::RESERVED));
}

#[test]
fn record_without_terminator_is_unexpected_eof() {
    expect_error(r"$a = /x/", GrammarErrorKind::UnexpectedEof);
}

#[test]
fn malformed_records_are_unexpected_tokens() {
    expect_error(r"$a = ; s = $a;", GrammarErrorKind::UnexpectedToken);
    expect_error(r"= /x/; s = 'x';", GrammarErrorKind::UnexpectedToken);
    expect_error(r"!nonsense $a; $a = /x/; s = $a;", GrammarErrorKind::UnexpectedToken);
}

#[test]
fn unterminated_body_group_is_unexpected_eof() {
    expect_error(r"$a = /x/; s = ($a; t = $a;", GrammarErrorKind::UnexpectedEof);
}

#[test]
fn redefined_token_is_rejected() {
    expect_error(r"$a = /x/; $a = /y/; s = $a;", GrammarErrorKind::TokenDefined);
}

#[test]
fn redefined_node_is_rejected() {
    expect_error(r"$a = /x/; s = $a; s = $a;", GrammarErrorKind::NodeDefined);
}

#[test]
fn invalid_regex_is_rejected_eagerly() {
    expect_error(r"$a = /[/; s = $a;", GrammarErrorKind::WrongRegexp);
}

#[test]
fn unknown_token_reference_is_rejected() {
    expect_error(r"s = $nope;", GrammarErrorKind::UnknownToken);
}

#[test]
fn side_tokens_cannot_appear_in_rules() {
    expect_error(
        r"!aside $sp; $sp = /\s+/; s = $sp;",
        GrammarErrorKind::WrongToken,
    );
}

#[test]
fn undefined_non_terminal_is_rejected() {
    expect_error(r"$a = /x/; s = $a, t;", GrammarErrorKind::UnknownNonTerminal);
}

#[test]
fn unreachable_non_terminal_is_rejected() {
    expect_error(
        r"$a = /x/; s = $a; t = $a;",
        GrammarErrorKind::UnusedNonTerminal,
    );
}

#[test]
fn first_set_cycles_are_unresolved() {
    expect_error(r"a = b; b = a;", GrammarErrorKind::Unresolved);
}

#[test]
fn left_recursion_is_rejected() {
    expect_error(
        r"$n = /[0-9]+/; $op = /[-+]/; a = (a, '+', $n) | $n;",
        GrammarErrorKind::Recursion,
    );
}

#[test]
fn mutual_left_recursion_is_rejected() {
    expect_error(
        r"$n = /[0-9]+/; a = b | $n; b = a, $n;",
        GrammarErrorKind::Recursion,
    );
}

#[test]
fn left_recursion_through_optional_prefix_is_rejected() {
    expect_error(
        r"$n = /[0-9]+/; $w = /[a-z]+/; a = [$n], a, $w | $w;",
        GrammarErrorKind::Recursion,
    );
}

#[test]
fn too_many_groups_are_rejected() {
    let mut text = String::from("$a = /x/;\n");
    for _ in 0..32 {
        text.push_str("!group $a;\n");
    }
    text.push_str("s = $a;\n");
    expect_error(&text, GrammarErrorKind::GroupNumber);
}

#[test]
fn orphan_literal_is_rejected() {
    expect_error(
        r"$a = /[a-z]+/; s = '123';",
        GrammarErrorKind::UnresolvedTokenTypes,
    );
}

#[test]
fn disjoint_groups_are_rejected() {
    expect_error(
        r"!group $a; !group $b; $a = /x/; $b = /y/; s = $a | $b;",
        GrammarErrorKind::DisjointGroups,
    );
}

#[test]
fn dangling_directive_reference_is_rejected() {
    expect_error(
        r"!aside $ghost; $a = /x/; s = $a;",
        GrammarErrorKind::UndefinedToken,
    );
}

#[test]
fn literal_whitelist_is_enforced() {
    expect_error(
        r"!literal 'a'; $c = /[a-z]/; s = 'b';",
        GrammarErrorKind::UnknownLiteral,
    );
    compile(r"!literal 'a'; $c = /[a-z]/; s = 'a';").unwrap();
}

#[test]
fn empty_repeatable_is_rejected() {
    expect_error(r"$a = /x/; s = {[$a]};", GrammarErrorKind::EmptyRepeatable);
}

#[test]
fn errors_carry_source_positions() {
    let err = compile("$a = /x/;\n$a = /y/;\ns = $a;").unwrap_err();
    assert_eq!(err.kind, GrammarErrorKind::TokenDefined);
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 1);
    assert!(err.message.contains("2:1"), "{}", err.message);
}

#[test]
fn nullable_node_references_get_bypasses() {
    // `opt` can match empty input, so a frame for `s` must be able to skip it
    let grammar = compile(r"$a = /a/; $b = /b/; s = opt, $b; opt = [$a];").unwrap();
    let entry = grammar.nodes[0].first_state;
    let rules = grammar.keyed_rules(entry);
    assert!(rules.iter().any(|rule| rule.token == ANY_TOKEN));
}
