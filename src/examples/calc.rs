//! An arithmetic calculator built on the engine: a precedence-layered
//! expression grammar whose node handlers fold frames into numbers.

use crate::{
    compile, Engine, Grammar, HookLayer, HookSet, NodeHandler, ParseError, ParseOptions, Source,
    SourceQueue, Token,
};
use std::rc::Rc;

pub const CALC_GRAMMAR: &str = r#"
    !aside $space;
    $space = /\s+/;
    $num = /[0-9]+(\.[0-9]+)?/;
    $op = /[-+*\/^()]/;
    sum = pro, {('+' | '-'), pro};
    pro = pow, {('*' | '/'), pow};
    pow = val, ['^', pow];
    val = $num | '(', sum, ')';
"#;

pub fn calc_grammar() -> Rc<Grammar> {
    Rc::new(compile(CALC_GRAMMAR).expect("calculator grammar compiles"))
}

/// `sum` and `pro` frames: a left fold over operator tokens.
struct Fold {
    value: f64,
    op: char,
}

impl Fold {
    fn new() -> Self {
        Self {
            value: 0.0,
            op: '\0',
        }
    }
}

impl NodeHandler<f64> for Fold {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        self.op = token.text().chars().next().unwrap_or('\0');
        Ok(())
    }

    fn on_child(&mut self, _name: &str, value: Option<f64>) -> Result<(), ParseError> {
        let operand = value.unwrap_or(0.0);
        match self.op {
            '\0' => self.value = operand,
            '+' => self.value += operand,
            '-' => self.value -= operand,
            '*' => self.value *= operand,
            _ => self.value /= operand,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<f64>, ParseError> {
        Ok(Some(self.value))
    }
}

/// `pow` frames: base and optional right-associative exponent.
struct Power {
    base: f64,
    exponent: Option<f64>,
}

impl NodeHandler<f64> for Power {
    fn on_child(&mut self, name: &str, value: Option<f64>) -> Result<(), ParseError> {
        let operand = value.unwrap_or(0.0);
        if name == "pow" {
            self.exponent = Some(operand);
        } else {
            self.base = operand;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<f64>, ParseError> {
        Ok(Some(match self.exponent {
            Some(exponent) => self.base.powf(exponent),
            None => self.base,
        }))
    }
}

/// `val` frames: a number token or a parenthesised sum.
struct Value {
    value: f64,
}

impl NodeHandler<f64> for Value {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        if let Ok(number) = token.text().parse() {
            self.value = number;
        }
        Ok(())
    }

    fn on_child(&mut self, _name: &str, value: Option<f64>) -> Result<(), ParseError> {
        if let Some(nested) = value {
            self.value = nested;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<f64>, ParseError> {
        Ok(Some(self.value))
    }
}

pub fn calc_hooks(grammar: &Rc<Grammar>) -> HookSet<f64> {
    let mut hooks = HookSet::new(grammar);
    hooks
        .add_layer(
            HookLayer::new()
                .on_node("sum", |_, _| {
                    Ok(Box::new(Fold::new()) as Box<dyn NodeHandler<f64>>)
                })
                .on_node("pro", |_, _| Ok(Box::new(Fold::new()) as _))
                .on_node("pow", |_, _| {
                    Ok(Box::new(Power {
                        base: 0.0,
                        exponent: None,
                    }) as _)
                })
                .on_node("val", |_, _| Ok(Box::new(Value { value: 0.0 }) as _)),
        )
        .expect("calculator hooks resolve");
    hooks
}

/// Evaluate an arithmetic expression over the whole input.
pub fn evaluate(text: &str) -> Result<f64, ParseError> {
    let grammar = calc_grammar();
    let hooks = calc_hooks(&grammar);
    let engine = Engine::new(grammar).expect("calculator tables are valid");
    let mut queue = SourceQueue::from_source(Source::new("expression", text));
    let result = engine.parse(&mut queue, &hooks, &ParseOptions::new().full_source())?;
    Ok(result.unwrap_or(0.0))
}
