//! Tag Grammar - Directive Syntax
//!
//! Four tag forms are recognized inside raw template text:
//!
//! ```text
//! <!-- INCLUDE path/to/file.html -->
//! <!-- BEGIN name --> ... <!-- END name -->      (or <!-- [name] --> ... <!-- [/name] -->)
//! <!-- REPLACE name --> ... <!-- /REPLACE -->
//! {name}  {name:function}
//! ```
//!
//! Paired tags are located with a depth-tracking scan over open/close
//! delimiters, so nesting of same-kind tags resolves to the correct partner
//! without back-references.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s+include\s+(\S+)\s+-->").unwrap());

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!--\s+(?:(BEGIN|END)\s+([0-9A-Za-z_-]+)|\[(/?)([^/\]]+)\])\s+-->").unwrap()
});

static REPLACE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!--\s+(?:replace\s+([0-9A-Za-z_-]+)|/replace)\s+-->").unwrap()
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([0-9A-Za-z._-]+)(?::([_a-zA-Z][A-Za-z_0-9]*))?\}").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagKind {
    Include,
    Block,
    Replace,
    Placeholder,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TagKind::Include => "INCLUDE",
            TagKind::Block => "BLOCK",
            TagKind::Replace => "REPLACE",
            TagKind::Placeholder => "PLACEHOLDER",
        };
        f.write_str(label)
    }
}

/// A located directive in template text.
///
/// For paired tags `span` covers the opening tag through the closing tag and
/// `body` is the text between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch<'a> {
    pub kind: TagKind,
    pub name: &'a str,
    /// `:function` suffix of a placeholder. Parsed, never applied.
    pub function: Option<&'a str>,
    pub body: Option<&'a str>,
    pub span: Range<usize>,
}

/// All INCLUDE tags in `text`, left to right.
pub fn find_includes(text: &str) -> impl Iterator<Item = TagMatch<'_>> {
    INCLUDE_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some(TagMatch {
            kind: TagKind::Include,
            name: caps.get(1)?.as_str(),
            function: None,
            body: None,
            span: whole.range(),
        })
    })
}

/// All placeholders in `text`, left to right.
pub fn find_placeholders(text: &str) -> impl Iterator<Item = TagMatch<'_>> {
    PLACEHOLDER_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some(TagMatch {
            kind: TagKind::Placeholder,
            name: caps.get(1)?.as_str(),
            function: caps.get(2).map(|m| m.as_str()),
            body: None,
            span: whole.range(),
        })
    })
}

/// First complete block at or after byte offset `from`.
///
/// Opening tags without a same-name closing partner are skipped and stay
/// literal text.
pub fn next_block(text: &str, from: usize) -> Option<TagMatch<'_>> {
    let delimiters: Vec<_> = BLOCK_TAG_RE
        .captures_iter(&text[from..])
        .filter_map(|caps| block_delimiter(&caps, from))
        .collect();
    pair(text, &delimiters, TagKind::Block)
}

/// First complete REPLACE tag at or after byte offset `from`.
pub fn next_replace(text: &str, from: usize) -> Option<TagMatch<'_>> {
    let delimiters: Vec<_> = REPLACE_TAG_RE
        .captures_iter(&text[from..])
        .filter_map(|caps| replace_delimiter(&caps, from))
        .collect();
    pair(text, &delimiters, TagKind::Replace)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Begin,
    Bracket,
    Replace,
}

#[derive(Debug, Clone)]
struct Delimiter<'a> {
    style: Style,
    opening: bool,
    name: &'a str,
    span: Range<usize>,
}

impl Delimiter<'_> {
    // REPLACE closing tags are anonymous, so any opener of the same style counts.
    fn same_tag(&self, open: &Delimiter<'_>) -> bool {
        self.style == open.style && (self.style == Style::Replace || self.name == open.name)
    }
}

fn block_delimiter<'a>(caps: &Captures<'a>, offset: usize) -> Option<Delimiter<'a>> {
    let whole = caps.get(0)?;
    let span = whole.start() + offset..whole.end() + offset;

    if let Some(keyword) = caps.get(1) {
        return Some(Delimiter {
            style: Style::Begin,
            opening: keyword.as_str().eq_ignore_ascii_case("begin"),
            name: caps.get(2)?.as_str(),
            span,
        });
    }

    Some(Delimiter {
        style: Style::Bracket,
        opening: caps.get(3).map_or(true, |m| m.as_str().is_empty()),
        name: caps.get(4)?.as_str(),
        span,
    })
}

fn replace_delimiter<'a>(caps: &Captures<'a>, offset: usize) -> Option<Delimiter<'a>> {
    let whole = caps.get(0)?;
    let name = caps.get(1);
    Some(Delimiter {
        style: Style::Replace,
        opening: name.is_some(),
        name: name.map_or("", |m| m.as_str()),
        span: whole.start() + offset..whole.end() + offset,
    })
}

fn pair<'a>(text: &'a str, delimiters: &[Delimiter<'a>], kind: TagKind) -> Option<TagMatch<'a>> {
    for (i, open) in delimiters.iter().enumerate() {
        if !open.opening {
            continue;
        }

        let mut depth = 1usize;
        for other in &delimiters[i + 1..] {
            if !other.same_tag(open) {
                continue;
            }
            if other.opening {
                depth += 1;
                continue;
            }
            depth -= 1;
            if depth == 0 {
                return Some(TagMatch {
                    kind,
                    name: open.name,
                    function: None,
                    body: Some(&text[open.span.end..other.span.start]),
                    span: open.span.start..other.span.end,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_keyword_is_case_insensitive() {
        let text = "a <!-- INCLUDE one.html --> b <!-- include two.html -->";
        let names: Vec<_> = find_includes(text).map(|m| m.name).collect();
        assert_eq!(names, vec!["one.html", "two.html"]);
    }

    #[test]
    fn test_include_requires_whitespace_around_path() {
        assert_eq!(find_includes("<!--INCLUDE a.html-->").count(), 0);
    }

    #[test]
    fn test_block_body_and_span() {
        let text = "x<!-- BEGIN A -->hello<!-- END A -->y";
        let block = next_block(text, 0).unwrap();
        assert_eq!(block.name, "A");
        assert_eq!(block.body, Some("hello"));
        assert_eq!(&text[block.span.clone()], "<!-- BEGIN A -->hello<!-- END A -->");
    }

    #[test]
    fn test_mismatched_block_names_do_not_pair() {
        let text = "<!-- BEGIN block_A -->text<!-- END block_B -->";
        assert!(next_block(text, 0).is_none());
    }

    #[test]
    fn test_same_name_nesting_pairs_outermost() {
        let text = "<!-- BEGIN A -->1<!-- BEGIN A -->2<!-- END A -->3<!-- END A -->";
        let block = next_block(text, 0).unwrap();
        assert_eq!(block.body, Some("1<!-- BEGIN A -->2<!-- END A -->3"));
    }

    #[test]
    fn test_unmatched_open_is_skipped() {
        let text = "<!-- BEGIN LOST --><!-- BEGIN B -->b<!-- END B -->";
        let block = next_block(text, 0).unwrap();
        assert_eq!(block.name, "B");
    }

    #[test]
    fn test_bracket_blocks_and_lowercase_keywords() {
        let text = "<!-- [row] -->r<!-- [/row] --><!-- begin x -->y<!-- end x -->";
        let first = next_block(text, 0).unwrap();
        assert_eq!(first.name, "row");
        let second = next_block(text, first.span.end).unwrap();
        assert_eq!(second.name, "x");
        assert_eq!(second.body, Some("y"));
    }

    #[test]
    fn test_bracket_close_does_not_pair_with_begin() {
        assert!(next_block("<!-- BEGIN a -->z<!-- [/a] -->", 0).is_none());
    }

    #[test]
    fn test_block_body_spans_lines() {
        let text = "<!-- BEGIN A -->\nline 1\nline 2\n<!-- END A -->";
        assert_eq!(next_block(text, 0).unwrap().body, Some("\nline 1\nline 2\n"));
    }

    #[test]
    fn test_nested_replace_pairs_with_outer_close() {
        let text = "<!-- REPLACE a -->1<!-- REPLACE b -->2<!-- /REPLACE -->3<!-- /replace -->";
        let tag = next_replace(text, 0).unwrap();
        assert_eq!(tag.name, "a");
        assert_eq!(tag.body, Some("1<!-- REPLACE b -->2<!-- /REPLACE -->3"));
    }

    #[test]
    fn test_placeholder_with_function_suffix() {
        let found: Vec<_> = find_placeholders("{user.name} {TOTAL:money} {not valid}").collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "user.name");
        assert_eq!(found[0].function, None);
        assert_eq!(found[1].name, "TOTAL");
        assert_eq!(found[1].function, Some("money"));
    }
}
