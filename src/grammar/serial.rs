//! Grammar persistence and the state-machine dump.

use super::Grammar;
use crate::{GrammarError, GrammarErrorKind};
use ptree::TreeItem;
use std::borrow::Cow;

impl Grammar {
    /// Serialize the five table sections to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("grammar tables serialize to JSON")
    }

    /// Reload tables persisted by [to_json](Grammar::to_json).
    pub fn from_json(text: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(text).map_err(|err| {
            GrammarError::new(
                GrammarErrorKind::UnexpectedToken,
                format!("Malformed grammar tables: {}", err),
            )
        })
    }

    /// A printable nodes -> states -> rules view of the state machine.
    pub fn machine_tree(&self) -> MachineNode {
        let nodes = (0..self.nodes.len())
            .map(|node| {
                let states = self
                    .states_of(node)
                    .map(|state| {
                        let mut rules: Vec<MachineNode> = self
                            .keyed_rules(state)
                            .iter()
                            .map(|rule| MachineNode::leaf(self.rule_text(rule)))
                            .collect();
                        for multi in self.multi_rules_of(state) {
                            let alternatives = self.rules[multi.low_rule..multi.high_rule]
                                .iter()
                                .map(|rule| MachineNode::leaf(self.rule_text(rule)))
                                .collect();
                            rules.push(MachineNode::new(
                                format!("multi {}", self.key_name(multi.token)),
                                alternatives,
                            ));
                        }
                        MachineNode::new(
                            format!("s{} (group {})", state, self.states[state].group),
                            rules,
                        )
                    })
                    .collect();
                MachineNode::new(self.nodes[node].name.clone(), states)
            })
            .collect();
        MachineNode::new("grammar".to_string(), nodes)
    }

    pub fn print_machine(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(&self.machine_tree())
    }
}

#[derive(Debug, Clone)]
/// One line of the [machine_tree](Grammar::machine_tree) dump.
pub struct MachineNode {
    pub label: String,
    pub children: Vec<MachineNode>,
}

impl MachineNode {
    fn new(label: String, children: Vec<MachineNode>) -> Self {
        Self { label, children }
    }

    fn leaf(label: String) -> Self {
        Self {
            label,
            children: Vec::with_capacity(0),
        }
    }
}

impl TreeItem for MachineNode {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}
