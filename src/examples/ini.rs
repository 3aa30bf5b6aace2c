//! A sectioned key/value configuration grammar exercising tokenizer groups
//! and source includes.
//!
//! The grammar defines two tokenizer groups: names and punctuation on the
//! structural side, and a free-form value tokenizer active only in the state
//! after `=`. An `@file` token never reaches a rule: a token hook swallows
//! it and includes the named source, so parsing continues inside the
//! included text and resumes behind the `@file` once it is exhausted.

use crate::{
    compile, Engine, Grammar, HookLayer, HookSet, NodeHandler, ParseControl, ParseError,
    ParseErrorKind, ParseOptions, Source, SourceQueue, Token,
};
use std::collections::HashMap;
use std::rc::Rc;

pub const INI_GRAMMAR: &str = r#"
    !aside $space $comment;
    !group $name $op $inc;
    !group $value;
    $space = /[ \t\r\n]+/;
    $comment = /#[^\n]*/;
    $name = /[A-Za-z_][A-Za-z0-9_.-]*/;
    $op = /[=\[\]]/;
    $inc = /@[A-Za-z0-9_.-]+/;
    $value = /[^\n#]+/;
    ini = {section | entry};
    section = '[', $name, ']';
    entry = $name, '=', $value;
"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Section(String),
    Entry(String, String),
    Document(Vec<Item>),
}

pub fn ini_grammar() -> Rc<Grammar> {
    Rc::new(compile(INI_GRAMMAR).expect("ini grammar compiles"))
}

struct Document {
    items: Vec<Item>,
}

impl NodeHandler<Item> for Document {
    fn on_child(&mut self, _name: &str, value: Option<Item>) -> Result<(), ParseError> {
        if let Some(item) = value {
            self.items.push(item);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Item>, ParseError> {
        Ok(Some(Item::Document(std::mem::take(&mut self.items))))
    }
}

struct SectionFrame {
    name: String,
}

impl NodeHandler<Item> for SectionFrame {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        if token.type_name() == "name" {
            self.name = token.text().to_string();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Item>, ParseError> {
        Ok(Some(Item::Section(std::mem::take(&mut self.name))))
    }
}

struct EntryFrame {
    key: String,
    value: String,
}

impl NodeHandler<Item> for EntryFrame {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        match token.type_name() {
            "name" => self.key = token.text().to_string(),
            "value" => self.value = token.text().trim().to_string(),
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<Item>, ParseError> {
        Ok(Some(Item::Entry(
            std::mem::take(&mut self.key),
            std::mem::take(&mut self.value),
        )))
    }
}

/// Hooks evaluating a document, resolving `@file` includes against the given
/// source texts.
pub fn ini_hooks(grammar: &Rc<Grammar>, includes: HashMap<String, String>) -> HookSet<Item> {
    let mut hooks = HookSet::new(grammar);
    hooks
        .add_layer(
            HookLayer::new()
                .on_token("inc", move |token: &Token, control: &mut ParseControl| {
                    let file = &token.text()[1..];
                    match includes.get(file) {
                        Some(text) => {
                            control.include_source(Source::new(file, text.as_str()))?;
                            Ok(false)
                        }
                        None => Err(ParseError::new(
                            ParseErrorKind::BadToken,
                            format!("Included source {} is not available.", file),
                        )),
                    }
                })
                .on_node("ini", |_, _| {
                    Ok(Box::new(Document { items: Vec::new() }) as Box<dyn NodeHandler<Item>>)
                })
                .on_node("section", |_, _| {
                    Ok(Box::new(SectionFrame {
                        name: String::new(),
                    }) as _)
                })
                .on_node("entry", |_, _| {
                    Ok(Box::new(EntryFrame {
                        key: String::new(),
                        value: String::new(),
                    }) as _)
                }),
        )
        .expect("ini hooks resolve");
    hooks
}

/// Parse a configuration text into its items, resolving includes from
/// `includes`.
pub fn parse_ini(text: &str, includes: HashMap<String, String>) -> Result<Vec<Item>, ParseError> {
    let grammar = ini_grammar();
    let hooks = ini_hooks(&grammar, includes);
    let engine = Engine::new(grammar).expect("ini tables are valid");
    let mut queue = SourceQueue::from_source(Source::new("config", text));
    match engine.parse(&mut queue, &hooks, &ParseOptions::new().full_source())? {
        Some(Item::Document(items)) => Ok(items),
        _ => Ok(Vec::new()),
    }
}
