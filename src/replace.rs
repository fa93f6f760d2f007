//! REPLACE Tag Extraction
//!
//! `<!-- REPLACE name -->content<!-- /REPLACE -->` never reaches the output.
//! The tag is cut out of the template and `content` becomes the replacement
//! body for block `name`. Nested REPLACE tags are extracted first.

use std::collections::BTreeMap;

use tracing::debug;

use crate::compiler::CompileError;
use crate::grammar::{self, TagKind};
use crate::policy::{Descend, Policy};

pub type Replacements = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceTagExtractor {
    policy: Policy,
}

impl ReplaceTagExtractor {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Returns `text` with all REPLACE tags removed, plus the extracted
    /// name -> content pairs. Later tags win on name collision.
    pub fn extract(&self, text: &str) -> Result<(String, Replacements), CompileError> {
        let mut replacements = Replacements::new();
        let stripped = self.extract_at(text, 0, &mut replacements)?;
        Ok((stripped, replacements))
    }

    fn extract_at(
        &self,
        text: &str,
        depth: usize,
        replacements: &mut Replacements,
    ) -> Result<String, CompileError> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        while let Some(tag) = grammar::next_replace(text, cursor) {
            if self.policy.descend(TagKind::Replace, depth)? == Descend::Truncate {
                break;
            }

            out.push_str(&text[cursor..tag.span.start]);
            let content = self.extract_at(tag.body.unwrap_or_default(), depth + 1, replacements)?;
            debug!(block = tag.name, "replacement extracted from template");
            replacements.insert(tag.name.to_string(), content);
            cursor = tag.span.end;
        }

        out.push_str(&text[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stripped_and_collected() {
        let text = "<!-- INCLUDE layout.html -->\n\
            <!-- REPLACE BLOCK_1 -->Replace block 1<!-- /REPLACE -->\n\
            <!-- replace BLOCK_2 -->Replace block 2<!-- /replace -->\n";
        let (out, replacements) = ReplaceTagExtractor::default().extract(text).unwrap();
        assert_eq!(out.trim(), "<!-- INCLUDE layout.html -->");
        assert_eq!(replacements["BLOCK_1"], "Replace block 1");
        assert_eq!(replacements["BLOCK_2"], "Replace block 2");
    }

    #[test]
    fn test_nested_replace_resolves_inner_first() {
        let text = "<!-- REPLACE outer -->a<!-- REPLACE inner -->b<!-- /REPLACE -->c<!-- /REPLACE -->";
        let (out, replacements) = ReplaceTagExtractor::default().extract(text).unwrap();
        assert_eq!(out, "");
        assert_eq!(replacements["inner"], "b");
        assert_eq!(replacements["outer"], "ac");
    }

    #[test]
    fn test_last_tag_wins() {
        let text = "<!-- REPLACE A -->1<!-- /REPLACE --><!-- REPLACE A -->2<!-- /REPLACE -->";
        let (_, replacements) = ReplaceTagExtractor::default().extract(text).unwrap();
        assert_eq!(replacements["A"], "2");
    }

    #[test]
    fn test_unclosed_replace_is_left_alone() {
        let text = "<!-- REPLACE A -->dangling";
        let (out, replacements) = ReplaceTagExtractor::default().extract(text).unwrap();
        assert_eq!(out, text);
        assert!(replacements.is_empty());
    }

    #[test]
    fn test_strict_nesting_limit() {
        let text = "<!-- REPLACE a --><!-- REPLACE b -->x<!-- /REPLACE --><!-- /REPLACE -->";
        let err = ReplaceTagExtractor::new(Policy::new(true, 1)).extract(text).unwrap_err();
        assert!(matches!(err, CompileError::RecursionLimitExceeded { kind: TagKind::Replace, .. }));
    }
}
