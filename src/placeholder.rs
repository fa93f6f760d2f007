//! Placeholder Expansion
//!
//! `{name}` becomes a variable reference. The `{name:function}` form is
//! recognized, but functions are not implemented: the suffix is carried on
//! the node and otherwise ignored.

use tracing::trace;

use crate::grammar;
use crate::ir::{push_literal, Node};

#[derive(Debug, Clone, Default)]
pub struct PlaceholderExpander {
    placeholders: Vec<String>,
}

impl PlaceholderExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split every literal in `nodes` around its placeholders.
    pub fn expand(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Literal { text } => self.expand_text_into(&text, &mut out),
                other => out.push(other),
            }
        }
        out
    }

    pub fn expand_text(&mut self, text: &str) -> Vec<Node> {
        let mut out = Vec::new();
        self.expand_text_into(text, &mut out);
        out
    }

    /// Every placeholder seen so far, in order of occurrence.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn into_placeholders(self) -> Vec<String> {
        self.placeholders
    }

    fn expand_text_into(&mut self, text: &str, out: &mut Vec<Node>) {
        let mut cursor = 0;
        for tag in grammar::find_placeholders(text) {
            push_literal(out, &text[cursor..tag.span.start]);
            if let Some(function) = tag.function {
                trace!(placeholder = tag.name, function, "placeholder function ignored");
            }
            out.push(Node::VarRef {
                name: tag.name.to_string(),
                function: tag.function.map(str::to_string),
            });
            self.placeholders.push(tag.name.to_string());
            cursor = tag.span.end;
        }
        push_literal(out, &text[cursor..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_placeholder() {
        let mut expander = PlaceholderExpander::new();
        assert_eq!(expander.expand_text("{TEST_1}"), vec![Node::var("TEST_1")]);
        assert_eq!(expander.placeholders(), ["TEST_1".to_string()]);
    }

    #[test]
    fn test_duplicates_recorded_per_occurrence() {
        let mut expander = PlaceholderExpander::new();
        expander.expand_text("{a} and {b} and {a}");
        assert_eq!(expander.into_placeholders(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_loop_markers_pass_through() {
        let mut expander = PlaceholderExpander::new();
        let nodes = expander.expand(vec![
            Node::LoopOpen { block: "R".into() },
            Node::literal("<b>{x:upper}</b>"),
            Node::LoopClose { block: "R".into() },
        ]);
        assert_eq!(nodes.len(), 5);
        assert_eq!(
            nodes[2],
            Node::VarRef { name: "x".into(), function: Some("upper".into()) }
        );
    }
}
