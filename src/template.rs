//! Template Facade - File-Backed Compile and Render
//!
//! Loads a template file from a root directory, resolves includes against
//! that same directory, optionally goes through the compile cache, and
//! renders with accumulated block iterations and placeholder values.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cache::{CacheEntry, CacheError, CompileCache};
use crate::compiler::{CompileError, Compiler};
use crate::config::CompilerConfig;
use crate::ir::Program;
use crate::render::{Bindings, RenderError, Renderer, Scope};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("The template \"{}\" does not exist.", .0.display())]
    BadTemplateFile(PathBuf),

    #[error("Attempt to set cache directory to \"{}\", which does not exist.", .0.display())]
    BadCacheDir(PathBuf),

    #[error("Attempt to set template root directory to \"{}\", which does not exist.", .0.display())]
    BadTemplateRootDir(PathBuf),

    #[error("Failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct Template {
    path: PathBuf,
    compiler: Compiler,
    cache: Option<CompileCache>,
    bindings: Bindings,
    compiled: Option<CacheEntry>,
}

impl Template {
    pub fn open(
        root_dir: impl AsRef<Path>,
        file: impl AsRef<Path>,
        config: CompilerConfig,
    ) -> Result<Self, TemplateError> {
        let root_dir = root_dir.as_ref();
        if !root_dir.is_dir() {
            return Err(TemplateError::BadTemplateRootDir(root_dir.to_path_buf()));
        }

        let path = root_dir.join(file);
        if !path.is_file() {
            return Err(TemplateError::BadTemplateFile(path));
        }

        Ok(Self {
            path,
            compiler: Compiler::with_include_dir(root_dir, config)?,
            cache: None,
            bindings: Bindings::new(),
            compiled: None,
        })
    }

    /// Compile through a cache stored in `dir`.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        self.cache = Some(
            CompileCache::new(dir).map_err(|_| TemplateError::BadCacheDir(dir.to_path_buf()))?,
        );
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access to replacements and removals. Any change invalidates the
    /// current compiled program.
    pub fn compiler_mut(&mut self) -> &mut Compiler {
        self.compiled = None;
        &mut self.compiler
    }

    /// Add one iteration of `block` with its own placeholder values.
    pub fn parse_block(&mut self, block: impl Into<String>, scope: Scope) -> &mut Self {
        self.bindings.push_iteration(block, scope);
        self
    }

    /// Merge global placeholder values.
    pub fn set_placeholders(&mut self, values: Scope) -> &mut Self {
        self.bindings.extend_values(values);
        self
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn compile(&mut self) -> Result<&Program, TemplateError> {
        let entry = match self.compiled.take() {
            Some(entry) => entry,
            None => self.compile_entry()?,
        };
        Ok(&self.compiled.insert(entry).program)
    }

    pub fn render(&mut self) -> Result<String, TemplateError> {
        let entry = match self.compiled.take() {
            Some(entry) => entry,
            None => self.compile_entry()?,
        };
        let entry = self.compiled.insert(entry);
        let renderer = Renderer::new(self.compiler.config().strict);
        Ok(renderer.render(&entry.program, &self.bindings)?)
    }

    /// Blocks of the compiled program; empty before `compile`.
    pub fn blocks(&self) -> &[String] {
        self.compiled.as_ref().map_or(&[], |entry| entry.blocks.as_slice())
    }

    pub fn placeholders(&self) -> &[String] {
        self.compiled.as_ref().map_or(&[], |entry| entry.placeholders.as_slice())
    }

    fn compile_entry(&mut self) -> Result<CacheEntry, TemplateError> {
        let source = fs::read_to_string(&self.path).map_err(|source| TemplateError::Io {
            path: self.path.clone(),
            source,
        })?;

        let entry = match &self.cache {
            Some(cache) => cache.get_or_compile(&mut self.compiler, &source)?.0,
            None => {
                let key = CompileCache::key_for(&self.compiler, &source)?;
                CacheEntry::compile(&mut self.compiler, &source, key)?
            }
        };
        Ok(entry)
    }
}
