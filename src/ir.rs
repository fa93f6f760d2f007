//! Compiled Form - Typed Intermediate Representation
//!
//! A compiled template is a flat node sequence. Loops are bracketed by
//! `LoopOpen`/`LoopClose` pairs named after the block; each iteration binds
//! one element of the block's collection as a variable scope.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
    Literal {
        text: String,
    },
    LoopOpen {
        block: String,
    },
    LoopClose {
        block: String,
    },
    VarRef {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<String>,
    },
}

impl Node {
    pub fn literal(text: impl Into<String>) -> Self {
        Node::Literal { text: text.into() }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::VarRef { name: name.into(), function: None }
    }
}

/// Appends literal text, merging with a trailing literal. Empty text is dropped.
pub(crate) fn push_literal(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Literal { text: last }) = nodes.last_mut() {
        last.push_str(text);
        return;
    }
    nodes.push(Node::literal(text));
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    nodes: Vec<Node>,
}

impl Program {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Blocks in the order their loops open.
    pub fn loops(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::LoopOpen { block } => Some(block.as_str()),
            _ => None,
        })
    }

    /// Textual marker form of the program. Literals are emitted verbatim.
    pub fn to_source(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            match node {
                Node::Literal { text } => f.write_str(text)?,
                Node::LoopOpen { block } => write!(f, "{{% for {block}_vars in {block} %}}")?,
                Node::LoopClose { block } => write!(f, "{{% endfor {block} %}}")?,
                Node::VarRef { name, .. } => write!(f, "{{{{ {name} }}}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_literal_merges() {
        let mut nodes = vec![];
        push_literal(&mut nodes, "a");
        push_literal(&mut nodes, "");
        push_literal(&mut nodes, "b");
        assert_eq!(nodes, vec![Node::literal("ab")]);
    }

    #[test]
    fn test_marker_source() {
        let program = Program::new(vec![
            Node::LoopOpen { block: "ROW".into() },
            Node::literal("<td>"),
            Node::var("NAME"),
            Node::literal("</td>"),
            Node::LoopClose { block: "ROW".into() },
        ]);
        assert_eq!(
            program.to_source(),
            "{% for ROW_vars in ROW %}<td>{{ NAME }}</td>{% endfor ROW %}"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&Node::var("X")).unwrap();
        assert_eq!(json, r#"{"op":"var_ref","name":"X"}"#);
    }
}
