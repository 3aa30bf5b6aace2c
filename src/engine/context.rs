//! Mutable per-parse state: the node stack, the pending-token and
//! pending-rule FIFOs and the per-layer hook buffers.

use crate::grammar::Rule;
use crate::hooks::NodeHandler;
use crate::token::Token;
use std::collections::VecDeque;

/// A frame on the node stack, alive while its node is being parsed.
pub(crate) struct Frame<V> {
    pub node: usize,
    pub state: i32,
    /// Side tokens accumulated since the last structural token.
    pub sides: Vec<Token>,
    /// Per-layer handler instances; None until the frame sees its first
    /// structural token.
    pub handlers: Option<Vec<Option<Box<dyn NodeHandler<V>>>>>,
}

pub(crate) struct ParseContext<V> {
    pub stack: Vec<Frame<V>>,
    /// Tokens reinserted after speculation or shrinking; served before the
    /// hook pipeline.
    pub pending: VecDeque<Token>,
    /// Rules decided by the resolver, replayed with hooks by the engine.
    pub pending_rules: VecDeque<Rule>,
    /// One token buffer per hook layer.
    pub fifos: Vec<VecDeque<Token>>,
    pub result: Option<V>,
}

impl<V> ParseContext<V> {
    pub fn new(layer_count: usize) -> Self {
        Self {
            stack: Vec::new(),
            pending: VecDeque::new(),
            pending_rules: VecDeque::new(),
            fifos: (0..layer_count).map(|_| VecDeque::new()).collect(),
            result: None,
        }
    }

    pub fn push_frame(&mut self, node: usize, state: i32) {
        self.stack.push(Frame {
            node,
            state,
            sides: Vec::new(),
            handlers: None,
        });
    }

    pub fn top(&self) -> &Frame<V> {
        self.stack.last().expect("non-empty node stack")
    }

    pub fn top_mut(&mut self) -> &mut Frame<V> {
        self.stack.last_mut().expect("non-empty node stack")
    }

    /// The (node, state) pairs of the live stack; the resolver's branch
    /// snapshots copy this, never the frames themselves.
    pub fn stack_snapshot(&self) -> Vec<(usize, i32)> {
        self.stack
            .iter()
            .map(|frame| (frame.node, frame.state))
            .collect()
    }
}
