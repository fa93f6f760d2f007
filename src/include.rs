//! Include Resolution
//!
//! INCLUDE tags are replaced by the contents of the referenced file, which is
//! itself re-scanned for INCLUDE tags. Runs before every other stage so tags
//! inside included content are visible downstream.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::compiler::CompileError;
use crate::grammar::{self, TagKind};
use crate::policy::{Descend, Policy};

/// Where include paths are looked up.
pub trait SourceLoader {
    /// Path as reported in errors and logs.
    fn locate(&self, path: &str) -> String;
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> io::Result<String>;
}

/// Loads includes relative to a base directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    base_dir: PathBuf,
}

impl FsLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, CompileError> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(CompileError::InvalidIncludeDir(base_dir.to_path_buf()));
        }
        Ok(Self { base_dir: base_dir.to_path_buf() })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Include paths always hang off the base directory, even with a leading separator.
    fn path_of(&self, path: &str) -> PathBuf {
        self.base_dir.join(path.trim_start_matches(['/', '\\']))
    }
}

impl SourceLoader for FsLoader {
    fn locate(&self, path: &str) -> String {
        self.path_of(path).display().to_string()
    }

    fn exists(&self, path: &str) -> bool {
        self.path_of(path).is_file()
    }

    /// Invalid UTF-8 is replaced, not rejected.
    fn read(&self, path: &str) -> io::Result<String> {
        let bytes = fs::read(self.path_of(path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// In-memory sources keyed by include path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn locate(&self, path: &str) -> String {
        path.to_string()
    }

    fn exists(&self, path: &str) -> bool {
        self.sources.contains_key(path)
    }

    fn read(&self, path: &str) -> io::Result<String> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

pub struct IncludeResolver<'a> {
    loader: Option<&'a dyn SourceLoader>,
    policy: Policy,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(loader: Option<&'a dyn SourceLoader>, policy: Policy) -> Self {
        Self { loader, policy }
    }

    /// Flatten every INCLUDE tag in `text`.
    pub fn resolve(&self, text: &str) -> Result<String, CompileError> {
        self.resolve_at(text, 0)
    }

    fn resolve_at(&self, text: &str, depth: usize) -> Result<String, CompileError> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for tag in grammar::find_includes(text) {
            out.push_str(&text[cursor..tag.span.start]);
            out.push_str(&self.include(tag.name, depth)?);
            cursor = tag.span.end;
        }

        out.push_str(&text[cursor..]);
        Ok(out)
    }

    fn include(&self, path: &str, depth: usize) -> Result<String, CompileError> {
        if self.policy.descend(TagKind::Include, depth)? == Descend::Truncate {
            return Ok(String::new());
        }

        let Some(loader) = self.loader.filter(|loader| loader.exists(path)) else {
            let located = self.loader.map_or_else(|| path.to_string(), |l| l.locate(path));
            if self.policy.strict {
                return Err(CompileError::IncludeNotFound(located));
            }
            warn!(include = %located, "include not found, substituting empty content");
            return Ok(String::new());
        };

        let located = loader.locate(path);
        debug!(include = %located, depth, "resolving include");

        let content = match loader.read(path) {
            Ok(content) => content,
            Err(source) if self.policy.strict => {
                return Err(CompileError::Io { path: located, source });
            }
            Err(error) => {
                warn!(include = %located, %error, "include unreadable, substituting empty content");
                return Ok(String::new());
            }
        };

        self.resolve_at(&content, depth + 1)
    }
}
