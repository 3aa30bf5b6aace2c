//! A JSON grammar built on the engine, evaluating into a [Json] value tree.
//!
//! The grammar is LL(1): every alternative of `value` starts with a distinct
//! token, so parsing never speculates. Keyword literals borrow the `$word`
//! token as their lexeme carrier; `$word` itself never appears in a rule.

use crate::{
    compile, Engine, Grammar, HookLayer, HookSet, NodeHandler, ParseError, ParseOptions, Source,
    SourceQueue, Token,
};
use std::rc::Rc;

pub const JSON_GRAMMAR: &str = r#"
    !aside $space;
    $space = /\s+/;
    $string = /"(?:[^"\\]|\\.)*"/;
    $number = /-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?/;
    $punct = /[{}\[\]:,]/;
    $word = /[a-z]+/;
    value = $string | $number | 'true' | 'false' | 'null' | object | array;
    object = '{', [pair, {',', pair}], '}';
    pair = $string, ':', value;
    array = '[', [value, {',', value}], ']';
"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Json {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

#[derive(Debug, Clone, PartialEq)]
/// The value flowing between node frames: a finished JSON value, or one
/// key/value pair on its way from a `pair` frame to its `object` parent.
pub enum JsonPart {
    Value(Json),
    Pair(String, Json),
}

pub fn json_grammar() -> Rc<Grammar> {
    Rc::new(compile(JSON_GRAMMAR).expect("json grammar compiles"))
}

fn unescape(quoted: &str) -> String {
    let raw = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&code),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

struct ValueFrame {
    value: Option<Json>,
}

impl NodeHandler<JsonPart> for ValueFrame {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        self.value = Some(match token.type_name() {
            "string" => Json::String(unescape(token.text())),
            "number" => Json::Number(token.text().parse().unwrap_or(0.0)),
            _ => match token.text() {
                "true" => Json::Bool(true),
                "false" => Json::Bool(false),
                _ => Json::Null,
            },
        });
        Ok(())
    }

    fn on_child(&mut self, _name: &str, value: Option<JsonPart>) -> Result<(), ParseError> {
        if let Some(JsonPart::Value(nested)) = value {
            self.value = Some(nested);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<JsonPart>, ParseError> {
        Ok(self.value.take().map(JsonPart::Value))
    }
}

struct PairFrame {
    key: Option<String>,
    value: Option<Json>,
}

impl NodeHandler<JsonPart> for PairFrame {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        if token.type_name() == "string" {
            self.key = Some(unescape(token.text()));
        }
        Ok(())
    }

    fn on_child(&mut self, _name: &str, value: Option<JsonPart>) -> Result<(), ParseError> {
        if let Some(JsonPart::Value(nested)) = value {
            self.value = Some(nested);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<JsonPart>, ParseError> {
        let key = self.key.take().unwrap_or_default();
        let value = self.value.take().unwrap_or(Json::Null);
        Ok(Some(JsonPart::Pair(key, value)))
    }
}

struct ObjectFrame {
    entries: Vec<(String, Json)>,
}

impl NodeHandler<JsonPart> for ObjectFrame {
    fn on_child(&mut self, _name: &str, value: Option<JsonPart>) -> Result<(), ParseError> {
        if let Some(JsonPart::Pair(key, value)) = value {
            self.entries.push((key, value));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<JsonPart>, ParseError> {
        Ok(Some(JsonPart::Value(Json::Object(std::mem::take(
            &mut self.entries,
        )))))
    }
}

struct ArrayFrame {
    items: Vec<Json>,
}

impl NodeHandler<JsonPart> for ArrayFrame {
    fn on_child(&mut self, _name: &str, value: Option<JsonPart>) -> Result<(), ParseError> {
        if let Some(JsonPart::Value(item)) = value {
            self.items.push(item);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<JsonPart>, ParseError> {
        Ok(Some(JsonPart::Value(Json::Array(std::mem::take(
            &mut self.items,
        )))))
    }
}

pub fn json_hooks(grammar: &Rc<Grammar>) -> HookSet<JsonPart> {
    let mut hooks = HookSet::new(grammar);
    hooks
        .add_layer(
            HookLayer::new()
                .on_node("value", |_, _| {
                    Ok(Box::new(ValueFrame { value: None }) as Box<dyn NodeHandler<JsonPart>>)
                })
                .on_node("pair", |_, _| {
                    Ok(Box::new(PairFrame {
                        key: None,
                        value: None,
                    }) as _)
                })
                .on_node("object", |_, _| {
                    Ok(Box::new(ObjectFrame {
                        entries: Vec::new(),
                    }) as _)
                })
                .on_node("array", |_, _| {
                    Ok(Box::new(ArrayFrame { items: Vec::new() }) as _)
                }),
        )
        .expect("json hooks resolve");
    hooks
}

/// Parse a JSON text over the whole input.
pub fn parse_json(text: &str) -> Result<Json, ParseError> {
    let grammar = json_grammar();
    let hooks = json_hooks(&grammar);
    let engine = Engine::new(grammar).expect("json tables are valid");
    let mut queue = SourceQueue::from_source(Source::new("json", text));
    match engine.parse(&mut queue, &hooks, &ParseOptions::new().full_source())? {
        Some(JsonPart::Value(json)) => Ok(json),
        _ => Ok(Json::Null),
    }
}
