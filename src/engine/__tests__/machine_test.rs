use super::trace_hooks;
use crate::compiler::compile;
use crate::hooks::ParseControl;
use crate::{
    Engine, HookLayer, HookSet, Lexer, NodeHandler, ParseError, ParseErrorKind, ParseOptions,
    Source, SourceQueue, Token,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn queue_of(text: &str) -> SourceQueue {
    SourceQueue::from_source(Source::new("input", text))
}

#[test]
fn minimal_literal_emits_begin_token_end() {
    let grammar = Rc::new(compile(r"$tok = /\S+/; s = 'foo';").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);

    let result = engine
        .parse(&mut queue_of("foo"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(
        log.borrow().as_slice(),
        ["[s", "token(foo)", "]s"],
        "root hooks run in emit order"
    );
}

#[test]
fn root_value_is_the_parse_result() {
    let grammar = Rc::new(compile(r"$tok = /\S+/; s = 'go';").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();

    struct Done;
    impl NodeHandler<String> for Done {
        fn finish(&mut self) -> Result<Option<String>, ParseError> {
            Ok(Some("done".to_string()))
        }
    }
    let mut hooks: HookSet<String> = HookSet::new(&grammar);
    hooks
        .add_layer(HookLayer::new().on_node("s", |_, _| {
            Ok(Box::new(Done) as Box<dyn NodeHandler<String>>)
        }))
        .unwrap();

    let result = engine
        .parse(&mut queue_of("go"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(result, Some("done".to_string()));
}

const SIDES_GRAMMAR: &str = r"
    !aside $sep;
    $sep = /-/;
    $char = /\w/;
    s = {'a' | 'b' | 'c'};
";

#[test]
fn side_tokens_skip_node_handlers_by_default() {
    let grammar = Rc::new(compile(SIDES_GRAMMAR).unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    engine
        .parse(&mut queue_of("-a-b-"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(log.borrow().as_slice(), ["[s", "token(a)", "token(b)", "]s"]);
}

#[test]
fn side_tokens_reach_node_handlers_with_sides() {
    let grammar = Rc::new(compile(SIDES_GRAMMAR).unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    engine
        .parse(&mut queue_of("-a-b-"), &hooks, &ParseOptions::new().with_sides())
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        ["[s", "token(-)", "token(a)", "token(-)", "token(b)", "token(-)", "]s"]
    );
}

#[test]
fn token_pipeline_observes_the_full_lexer_stream() {
    let grammar = Rc::new(compile(SIDES_GRAMMAR).unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let mut hooks: HookSet<()> = HookSet::new(&grammar);
    hooks
        .add_layer(HookLayer::new().on_any_token(move |token: &Token, _| {
            if !token.is_end() {
                record.borrow_mut().push(token.text().to_string());
            }
            Ok(true)
        }))
        .unwrap();

    engine
        .parse(&mut queue_of("-a-b-"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(seen.borrow().as_slice(), ["-", "a", "-", "b", "-"]);
}

#[test]
fn shrinkable_tokens_recover_dead_end_lookups() {
    let grammar = Rc::new(
        compile(
            r"
            !aside $sp;
            !shrink $op;
            $sp = /\s+/;
            $op = /<<?|>>?/;
            $name = /[a-z]+/;
            group = '<', item, {item}, '>';
            item = $name | group;
            ",
        )
        .unwrap(),
    );
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    engine
        .parse(
            &mut queue_of("<<foo> bar>"),
            &hooks,
            &ParseOptions::new().full_source(),
        )
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        [
            "[group",
            "token(<)",
            "[item",
            "[group",
            "token(<)",
            "[item",
            "token(foo)",
            "]item",
            "token(>)",
            "]group",
            "]item",
            "[item",
            "token(bar)",
            "]item",
            "token(>)",
            "]group"
        ]
    );
}

#[test]
fn remaining_source_fails_in_full_source_mode() {
    let grammar = Rc::new(compile(r"!aside $sp; $sp = / /; $w = /[a-z]+/; s = 'a';").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, _) = trace_hooks(&grammar);

    // trailing sides are fine
    engine
        .parse(&mut queue_of("a "), &hooks, &ParseOptions::new().full_source())
        .unwrap();

    let err = engine
        .parse(&mut queue_of("a b"), &hooks, &ParseOptions::new().full_source())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::RemainingSource);
}

#[test]
fn unexpected_token_names_the_expected_set() {
    let grammar = Rc::new(compile(r"$num = /[0-9]+/; $w = /[a-z]+/; s = $num;").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, _) = trace_hooks(&grammar);
    let err = engine
        .parse(&mut queue_of("abc"), &hooks, &ParseOptions::new())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    assert!(err.message.contains("num"), "{}", err.message);
    assert_eq!((err.line, err.column), (1, 1));
}

#[test]
fn cancellation_aborts_at_the_loop_head() {
    let grammar = Rc::new(compile(r"$tok = /\S+/; s = 'foo';").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    let flag = Arc::new(AtomicBool::new(true));
    let err = engine
        .parse(
            &mut queue_of("foo"),
            &hooks,
            &ParseOptions::new().cancel_flag(flag),
        )
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Cancelled);
    assert!(log.borrow().is_empty(), "no hook runs after cancellation");
}

#[test]
fn hook_emitted_tokens_are_group_checked() {
    let grammar = Rc::new(
        compile(
            r"
            !group $name $op;
            !group $value;
            $name = /[a-z]+/;
            $op = /=/;
            $value = /[^\n]+/;
            entry = $name, '=', $value;
            ",
        )
        .unwrap(),
    );
    let engine = Engine::new(grammar.clone()).unwrap();

    let mut hooks: HookSet<()> = HookSet::new(&grammar);
    hooks
        .add_layer(HookLayer::new().on_token("name", |_, control: &mut ParseControl| {
            let wrong = control.make_token("value", "v")?;
            control.emit_token(wrong)?;
            Ok(false)
        }))
        .unwrap();

    let err = engine
        .parse(&mut queue_of("a = b"), &hooks, &ParseOptions::new())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedGroup);
}

#[test]
fn hooks_may_emit_external_tokens() {
    let grammar = Rc::new(
        compile(
            r"
            !extern $marker;
            $w = /[a-z]/;
            s = $marker, 'x';
            ",
        )
        .unwrap(),
    );
    let engine = Engine::new(grammar.clone()).unwrap();

    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let trace = log.clone();
    let mut hooks: HookSet<()> = HookSet::new(&grammar);
    hooks
        .add_layer(
            HookLayer::new()
                .on_token("w", |token: &Token, control: &mut ParseControl| {
                    let marker = control.make_token("marker", "")?;
                    control.emit_token(marker)?;
                    control.emit_token(token.clone())?;
                    Ok(false)
                })
                .on_node("s", move |_, _| {
                    let trace = trace.clone();
                    Ok(Box::new(TokenTrace { trace }) as Box<dyn NodeHandler<()>>)
                }),
        )
        .unwrap();

    engine
        .parse(&mut queue_of("x"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(log.borrow().as_slice(), ["marker", "x"]);
}

struct TokenTrace {
    trace: Rc<RefCell<Vec<String>>>,
}

impl NodeHandler<()> for TokenTrace {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        let label = if token.text().is_empty() {
            token.type_name().to_string()
        } else {
            token.text().to_string()
        };
        self.trace.borrow_mut().push(label);
        Ok(())
    }
}

#[test]
fn reserved_literals_do_not_fall_back_to_their_kind() {
    // `if` is reserved: where a bare $name is expected the reserved literal
    // stops dispatch from falling through to the name kind
    let grammar = Rc::new(
        compile(
            r"
            !aside $sp;
            !reserved 'if';
            $sp = /\s+/;
            $name = /[a-z]+/;
            stmt = ('if', $name) | $name;
            ",
        )
        .unwrap(),
    );
    let engine = Engine::new(grammar.clone()).unwrap();

    let (hooks, log) = trace_hooks(&grammar);
    engine
        .parse(&mut queue_of("if x"), &hooks, &ParseOptions::new().full_source())
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        ["[stmt", "token(if)", "token(x)", "]stmt"]
    );

    let (hooks, _) = trace_hooks(&grammar);
    let err = engine
        .parse(&mut queue_of("if if"), &hooks, &ParseOptions::new().full_source())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
}

#[test]
fn caseless_kinds_uppercase_literal_lookups() {
    let grammar = Rc::new(
        compile(
            r"
            !aside $sp;
            !caseless $kw;
            $sp = /\s+/;
            $kw = /(?i)[a-z]+/;
            s = 'begin', 'end';
            ",
        )
        .unwrap(),
    );
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    engine
        .parse(&mut queue_of("Begin END"), &hooks, &ParseOptions::new().full_source())
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        ["[s", "token(Begin)", "token(END)", "]s"]
    );
}

#[test]
fn appended_sources_read_as_one_stream() {
    let grammar = Rc::new(compile(r"!aside $sp; $sp = /\s+/; $w = /[a-z]+/; s = $w, $w;").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, log) = trace_hooks(&grammar);
    let mut queue = SourceQueue::from_source(Source::new("first", "aa "));
    queue.append(Source::new("second", " bb"));
    engine
        .parse(&mut queue, &hooks, &ParseOptions::new().full_source())
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        ["[s", "token(aa)", "token(bb)", "]s"]
    );
}

#[test]
fn empty_input_for_a_non_nullable_root_is_unexpected_eof() {
    let grammar = Rc::new(compile(r"$w = /[a-z]+/; s = $w;").unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();
    let (hooks, _) = trace_hooks(&grammar);
    let err = engine
        .parse(&mut queue_of(""), &hooks, &ParseOptions::new())
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn literal_hooks_fire_on_matching_text() {
    let grammar = Rc::new(compile(SIDES_GRAMMAR).unwrap());
    let engine = Engine::new(grammar.clone()).unwrap();

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let mut hooks: HookSet<()> = HookSet::new(&grammar);
    hooks
        .add_layer(HookLayer::new().on_literal("b", move |token: &Token, _| {
            record.borrow_mut().push(token.text().to_string());
            Ok(true)
        }))
        .unwrap();

    engine
        .parse(&mut queue_of("-a-b-"), &hooks, &ParseOptions::new())
        .unwrap();
    assert_eq!(seen.borrow().as_slice(), ["b"]);
}

#[test]
fn include_is_refused_while_rules_are_pending() {
    let grammar = Rc::new(compile(r"$tok = /\S+/; s = 'foo';").unwrap());
    let lexer = Lexer::new(&grammar).unwrap();
    let mut queue = queue_of("");
    let mut control = ParseControl::new(&grammar, &lexer, &mut queue, true);
    let err = control
        .include_source(Source::new("inc", "text"))
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::IncludeUnresolved);

    let mut allowed = ParseControl::new(&grammar, &lexer, &mut queue, false);
    allowed.include_source(Source::new("inc", "text")).unwrap();
}
