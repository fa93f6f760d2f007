//! Block Expansion - Loop Markers
//!
//! Every matched block becomes a `LoopOpen`/`LoopClose` pair around its body.
//! Inner blocks are expanded before the enclosing block is finalized, so the
//! discovered-block list is in post-order.

use std::collections::BTreeSet;

use tracing::debug;

use crate::compiler::CompileError;
use crate::grammar::{self, TagKind};
use crate::ir::{push_literal, Node};
use crate::policy::{Descend, Policy};
use crate::replace::Replacements;

pub type Removals = BTreeSet<String>;

pub struct BlockExpander<'a> {
    replacements: &'a Replacements,
    removals: &'a Removals,
    policy: Policy,
    blocks: Vec<String>,
}

impl<'a> BlockExpander<'a> {
    pub fn new(replacements: &'a Replacements, removals: &'a Removals, policy: Policy) -> Self {
        Self {
            replacements,
            removals,
            policy,
            blocks: Vec::new(),
        }
    }

    /// Expand all blocks in `text`. Text outside blocks passes through as literals.
    pub fn expand(&mut self, text: &str) -> Result<Vec<Node>, CompileError> {
        self.blocks.clear();
        let mut nodes = Vec::new();
        self.expand_into(text, 0, &mut nodes)?;
        Ok(nodes)
    }

    /// Block names from the last `expand`, innermost first, duplicates kept.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<String> {
        self.blocks
    }

    fn expand_into(
        &mut self,
        text: &str,
        depth: usize,
        out: &mut Vec<Node>,
    ) -> Result<(), CompileError> {
        let mut cursor = 0;

        while let Some(tag) = grammar::next_block(text, cursor) {
            if self.policy.descend(TagKind::Block, depth)? == Descend::Truncate {
                break;
            }

            push_literal(out, &text[cursor..tag.span.start]);
            cursor = tag.span.end;

            let mut body = Vec::new();
            self.expand_into(tag.body.unwrap_or_default(), depth + 1, &mut body)?;

            // Replacement content is literal; it is not re-scanned for blocks.
            if let Some(replacement) = self.replacements.get(tag.name) {
                debug!(block = tag.name, "replacing block content");
                body.clear();
                push_literal(&mut body, replacement);
            }

            if self.removals.contains(tag.name) {
                debug!(block = tag.name, "removing block");
                continue;
            }

            out.push(Node::LoopOpen { block: tag.name.to_string() });
            for node in body {
                match node {
                    Node::Literal { text } => push_literal(out, &text),
                    other => out.push(other),
                }
            }
            out.push(Node::LoopClose { block: tag.name.to_string() });

            self.blocks.push(tag.name.to_string());
        }

        push_literal(out, &text[cursor..]);
        Ok(())
    }
}
