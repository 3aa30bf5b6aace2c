mod lexer_test;
mod machine_test;

use crate::{Grammar, HookLayer, HookSet, NodeHandler, ParseError, Token};
use std::cell::RefCell;
use std::rc::Rc;

/// A hook set logging every node begin/end and consumed token, shared by the
/// engine scenarios.
pub fn trace_hooks(grammar: &Rc<Grammar>) -> (HookSet<()>, Rc<RefCell<Vec<String>>>) {
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let mut hooks = HookSet::new(grammar);
    let begin_log = log.clone();
    hooks
        .add_layer(HookLayer::new().on_any_node(move |name: &str, _: &Token| {
            begin_log.borrow_mut().push(format!("[{}", name));
            Ok(Box::new(Recorder {
                name: name.to_string(),
                log: begin_log.clone(),
            }) as Box<dyn NodeHandler<()>>)
        }))
        .unwrap();
    (hooks, log)
}

struct Recorder {
    name: String,
    log: Rc<RefCell<Vec<String>>>,
}

impl NodeHandler<()> for Recorder {
    fn on_token(&mut self, token: &Token) -> Result<(), ParseError> {
        self.log.borrow_mut().push(format!("token({})", token.text()));
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<()>, ParseError> {
        self.log.borrow_mut().push(format!("]{}", self.name));
        Ok(None)
    }
}
