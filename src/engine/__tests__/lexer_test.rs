use crate::compiler::compile;
use crate::grammar::TokenSet;
use crate::{Lexer, ParseErrorKind, Source, SourceQueue, TOKEN_EOF, TOKEN_EOI};

fn queue_of(text: &str) -> SourceQueue {
    SourceQueue::from_source(Source::new("input", text))
}

#[test]
fn longest_match_wins() {
    let grammar = compile(r"$word = /[a-z]+/; $letter = /[a-z]/; s = $word | $letter;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let mut queue = queue_of("abc");
    let token = lexer.fetch(&mut queue, 0, None).unwrap();
    assert_eq!(token.type_name(), "word");
    assert_eq!(token.text(), "abc");
    assert_eq!(queue.cursor(), 3);
}

#[test]
fn ties_go_to_the_earliest_pattern() {
    let grammar = compile(r"$x = /ab/; $y = /ab/; s = $x | $y;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let token = lexer.fetch(&mut queue_of("ab"), 0, None).unwrap();
    assert_eq!(token.type_name(), "x");
}

#[test]
fn empty_matches_are_insignificant() {
    let grammar = compile(r"$maybe = /q*/; $a = /a/; s = $a;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let token = lexer.fetch(&mut queue_of("a"), 0, None).unwrap();
    assert_eq!(token.type_name(), "a");
}

#[test]
fn no_match_is_a_wrong_char() {
    let grammar = compile(r"$a = /[a-z]+/; s = $a;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let err = lexer.fetch(&mut queue_of("!"), 0, None).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::WrongChar);
    assert_eq!((err.line, err.column), (1, 1));
}

#[test]
fn error_tokens_report_bad_token() {
    let grammar =
        compile(r"!error $bad; $bad = /[0-9]+[a-z]+/; $num = /[0-9]+/; s = $num;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let err = lexer.fetch(&mut queue_of("12ab"), 0, None).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::BadToken);
    assert!(err.message.contains("12ab"));
}

#[test]
fn end_of_buffer_yields_eof_and_drops_the_source() {
    let grammar = compile(r"$a = /[a-z]+/; s = $a;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let mut queue = queue_of("ab");
    queue.append(Source::new("next", "cd"));

    let first = lexer.fetch(&mut queue, 0, None).unwrap();
    assert_eq!(first.text(), "ab");
    let eof = lexer.fetch(&mut queue, 0, None).unwrap();
    assert_eq!(eof.kind(), TOKEN_EOF);
    assert_eq!(queue.current().unwrap().name(), "next");

    let second = lexer.fetch(&mut queue, 0, None).unwrap();
    assert_eq!(second.text(), "cd");
    assert_eq!(lexer.fetch(&mut queue, 0, None).unwrap().kind(), TOKEN_EOF);
    assert_eq!(lexer.fetch(&mut queue, 0, None).unwrap().kind(), TOKEN_EOI);
}

#[test]
fn shrink_produces_a_strictly_shorter_token() {
    let grammar = compile(r"!shrink $op; $op = /<<?/; $name = /[a-z]+/; s = '<', $name;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let mut queue = queue_of("<<x");
    let token = lexer.fetch(&mut queue, 0, None).unwrap();
    assert_eq!(token.text(), "<<");

    let short = lexer.shrink(&mut queue, 0, &token).unwrap();
    assert_eq!(short.text(), "<");
    assert_eq!(queue.cursor(), 1);
    // a single-byte token cannot shrink further
    assert!(lexer.shrink(&mut queue, 0, &short).is_none());
}

#[test]
fn next_of_restricts_the_match_to_expected_kinds() {
    let grammar = compile(r"$word = /[a-z]+/; $letter = /[a-z]/; s = $word | $letter;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let letter = grammar.token_index("letter").unwrap();
    let allowed: TokenSet = [letter].into_iter().collect();
    let token = lexer.next_of(&mut queue_of("abc"), 0, &allowed).unwrap();
    assert_eq!(token.type_name(), "letter");
    assert_eq!(token.text(), "a");
}

#[test]
fn side_tokens_pass_any_restriction() {
    let grammar =
        compile(r"!aside $sp; $sp = /\s+/; $word = /[a-z]+/; $num = /[0-9]+/; s = $num;").unwrap();
    let lexer = Lexer::new(&grammar).unwrap();
    let num = grammar.token_index("num").unwrap();
    let allowed: TokenSet = [num].into_iter().collect();
    let mut queue = queue_of(" 42");
    let side = lexer.next_of(&mut queue, 0, &allowed).unwrap();
    assert_eq!(side.type_name(), "sp");
    let token = lexer.next_of(&mut queue, 0, &allowed).unwrap();
    assert_eq!(token.text(), "42");
}
