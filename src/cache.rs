//! Compiled Program Cache - Write-Through
//!
//! Entries are keyed by template source plus compile options (config,
//! replacements, removals). Included files are not part of the key: clear
//! the cache directory when includes change. Entries have no TTL.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::compiler::{CompileError, Compiler};
use crate::hashing::compute_compile_key;
use crate::ir::Program;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache directory \"{}\" does not exist", .0.display())]
    MissingDir(PathBuf),

    #[error("Cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub engine_version: String,
    pub compiled_at: DateTime<Utc>,
    pub blocks: Vec<String>,
    pub placeholders: Vec<String>,
    pub program: Program,
}

impl CacheEntry {
    /// Compile `source` and capture what the compiler discovered.
    pub fn compile(compiler: &mut Compiler, source: &str, key: String) -> Result<Self, CompileError> {
        let program = compiler.compile(source)?;
        Ok(Self {
            key,
            engine_version: ENGINE_VERSION.to_string(),
            compiled_at: Utc::now(),
            blocks: compiler.blocks().to_vec(),
            placeholders: compiler.placeholders().to_vec(),
            program,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct CompileCache {
    dir: PathBuf,
}

impl CompileCache {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CacheError::MissingDir(dir.to_path_buf()));
        }
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_for(compiler: &Compiler, source: &str) -> Result<String, CacheError> {
        let options = json!({
            "engineVersion": ENGINE_VERSION,
            "config": compiler.config(),
            "replacements": compiler.replacements(),
            "removals": compiler.removals(),
        });
        Ok(compute_compile_key(source, &options)?)
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// `None` when absent or written by an incompatible engine version.
    pub fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let entry: CacheEntry = serde_json::from_str(&content)?;

        if !is_compatible(&entry.engine_version) {
            debug!(key, cached = %entry.engine_version, engine = ENGINE_VERSION, "stale cache entry");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    pub fn store(&self, entry: &CacheEntry) -> Result<PathBuf, CacheError> {
        let path = self.path_for(&entry.key);
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn get_or_compile(
        &self,
        compiler: &mut Compiler,
        source: &str,
    ) -> Result<(CacheEntry, CacheStatus), CacheError> {
        let key = Self::key_for(compiler, source)?;
        if let Some(entry) = self.load(&key)? {
            debug!(key = %entry.key, "cache hit");
            return Ok((entry, CacheStatus::Hit));
        }

        let entry = CacheEntry::compile(compiler, source, key)?;
        let path = self.store(&entry)?;
        debug!(path = %path.display(), "cache miss, compiled and stored");
        Ok((entry, CacheStatus::Miss))
    }
}

/// Same major.minor as the running engine.
fn is_compatible(version: &str) -> bool {
    match (semver::Version::parse(version), semver::Version::parse(ENGINE_VERSION)) {
        (Ok(cached), Ok(engine)) => cached.major == engine.major && cached.minor == engine.minor,
        _ => false,
    }
}
