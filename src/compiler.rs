//! Compiler - Single Entry Point
//!
//! Fixed stage order, every call:
//! includes -> REPLACE extraction -> blocks -> placeholders.
//!
//! CRITICAL: a strict-mode failure in any stage aborts the whole compile.
//! There is no partial output.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::block::{BlockExpander, Removals};
use crate::config::CompilerConfig;
use crate::grammar::TagKind;
use crate::include::{FsLoader, IncludeResolver, SourceLoader};
use crate::ir::Program;
use crate::placeholder::PlaceholderExpander;
use crate::policy::Policy;
use crate::replace::{ReplaceTagExtractor, Replacements};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Could not INCLUDE template \"{0}\"; Please check that the file exists.")]
    IncludeNotFound(String),

    #[error("Maximum number of recursive/nested {kind} tags has been reached (limit {limit}).")]
    RecursionLimitExceeded { kind: TagKind, limit: usize },

    #[error("{} is not a valid directory.", .0.display())]
    InvalidIncludeDir(PathBuf),

    #[error("Failed to read include {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub struct Compiler {
    config: CompilerConfig,
    loader: Option<Box<dyn SourceLoader>>,
    replacements: Replacements,
    removals: Removals,
    blocks: Vec<String>,
    placeholders: Vec<String>,
}

impl Compiler {
    /// A compiler without an include directory. INCLUDE tags resolve to
    /// nothing (lenient) or fail (strict).
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            loader: None,
            replacements: Replacements::new(),
            removals: Removals::new(),
            blocks: Vec::new(),
            placeholders: Vec::new(),
        }
    }

    /// Fails when `dir` is not an existing directory.
    pub fn with_include_dir(dir: impl AsRef<Path>, config: CompilerConfig) -> Result<Self, CompileError> {
        Ok(Self::with_loader(FsLoader::new(dir)?, config))
    }

    pub fn with_loader(loader: impl SourceLoader + 'static, config: CompilerConfig) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CompilerConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Set replacement content per block name. With `merge`, entries are added
    /// over the existing ones; otherwise the map is replaced.
    pub fn set_replacements<I, K, V>(&mut self, replacements: I, merge: bool) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !merge {
            self.replacements.clear();
        }
        self.replacements
            .extend(replacements.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set blocks to drop from the output. `merge` behaves as in
    /// [`Compiler::set_replacements`]; passing an empty list with
    /// `merge = false` clears all removals.
    pub fn set_removals<I, S>(&mut self, removals: I, merge: bool) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !merge {
            self.removals.clear();
        }
        self.removals.extend(removals.into_iter().map(Into::into));
        self
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub fn removals(&self) -> &Removals {
        &self.removals
    }

    /// Block names from the last successful compile: post-order, duplicates kept.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Placeholder names from the last successful compile, per occurrence.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn compile(&mut self, template: &str) -> Result<Program, CompileError> {
        let policy = Policy::from(&self.config);

        // 1. Includes first, so everything below sees included content.
        let resolved = IncludeResolver::new(self.loader.as_deref(), policy).resolve(template)?;
        self.trace_stage("include", &resolved);

        // 2. REPLACE tags feed the block stage. They only live for this compile.
        let (stripped, extracted) = ReplaceTagExtractor::new(policy).extract(&resolved)?;
        self.trace_stage("replace", &stripped);
        let mut replacements = self.replacements.clone();
        replacements.extend(extracted);

        // 3. Blocks, with every replacement and removal already known.
        let mut blocks = BlockExpander::new(&replacements, &self.removals, policy);
        let nodes = blocks.expand(&stripped)?;
        let blocks = blocks.into_blocks();

        // 4. Placeholders.
        let mut placeholders = PlaceholderExpander::new();
        let nodes = placeholders.expand(nodes);

        let program = Program::new(nodes);
        if self.config.debug {
            debug!(stage = "placeholder", output = %program, "stage complete");
        }

        self.blocks = blocks;
        self.placeholders = placeholders.into_placeholders();
        Ok(program)
    }

    fn trace_stage(&self, stage: &str, text: &str) {
        if self.config.debug {
            debug!(stage, output = text, "stage complete");
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

/// One-shot compile. `base_dir` must be an existing directory when given.
pub fn compile(template: &str, base_dir: Option<&Path>, strict: bool) -> Result<Program, CompileError> {
    let config = CompilerConfig { strict, ..CompilerConfig::default() };
    let mut compiler = match base_dir {
        Some(dir) => Compiler::with_include_dir(dir, config)?,
        None => Compiler::new(config),
    };
    compiler.compile(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::MemoryLoader;
    use crate::ir::Node;

    #[test]
    fn test_single_placeholder_compiles_to_var_ref() {
        let program = Compiler::default().compile("{TEST_1}").unwrap();
        assert_eq!(program.nodes(), [Node::var("TEST_1")]);
        assert!(!program.to_source().contains("{TEST_1}"));
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let text = "<html><!-- just a comment --><p>hi</p></html>";
        let program = Compiler::default().compile(text).unwrap();
        assert_eq!(program.to_source(), text);
    }

    #[test]
    fn test_template_replace_tag_overrides_block() {
        let loader = MemoryLoader::new().with(
            "layout.html",
            "<!-- BEGIN BLOCK_1 -->Block 1 content.<!-- END BLOCK_1 -->",
        );
        let mut compiler = Compiler::with_loader(loader, CompilerConfig::strict());
        let program = compiler
            .compile("<!-- INCLUDE layout.html --><!-- REPLACE BLOCK_1 -->Content was replaced.<!-- /REPLACE -->")
            .unwrap();
        let source = program.to_source();
        assert!(source.contains("Content was replaced."));
        assert!(!source.contains("Block 1 content."));
        assert!(!source.contains("REPLACE"));
    }

    #[test]
    fn test_template_replacements_do_not_persist() {
        let mut compiler = Compiler::default();
        compiler
            .compile("<!-- REPLACE A -->x<!-- /REPLACE -->")
            .unwrap();
        assert!(compiler.replacements().is_empty());
    }

    #[test]
    fn test_set_removals_without_merge_clears() {
        let mut compiler = Compiler::default();
        compiler.set_removals(["A", "B"], true);
        compiler.set_removals(Vec::<String>::new(), false);
        assert!(compiler.removals().is_empty());
    }

    #[test]
    fn test_replacement_placeholders_are_expanded() {
        let mut compiler = Compiler::default();
        compiler.set_replacements([("A", "hi {who}")], true);
        let program = compiler.compile("<!-- BEGIN A -->old<!-- END A -->").unwrap();
        assert_eq!(compiler.placeholders(), ["who".to_string()]);
        assert!(program.nodes().contains(&Node::var("who")));
    }

    #[test]
    fn test_invalid_include_dir() {
        let err = compile("x", Some(Path::new("fake-dir")), false).unwrap_err();
        assert_eq!(err.to_string(), "fake-dir is not a valid directory.");
    }
}
