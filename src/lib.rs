//! TagForge Core - Comment-Tag Template Compiler
//!
//! Compiles HTML-comment template tags (INCLUDE, BEGIN/END blocks, REPLACE)
//! and `{NAME}` placeholders into a flat, typed program that a renderer
//! executes against variable bindings.
//!
//! # Pipeline (fixed order)
//! 1. Includes are inlined recursively.
//! 2. REPLACE tags are extracted and merged over explicit replacements.
//! 3. Blocks become loops, unless removed or replaced.
//! 4. Placeholders become variable references.

pub mod block;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod grammar;
pub mod hashing;
pub mod include;
pub mod ir;
pub mod placeholder;
pub mod policy;
pub mod render;
pub mod replace;
pub mod template;

pub use cache::{CacheEntry, CacheError, CacheStatus, CompileCache};
pub use compiler::{compile, CompileError, Compiler};
pub use config::CompilerConfig;
pub use grammar::TagKind;
pub use hashing::{canonical_json, compute_compile_key};
pub use include::{FsLoader, MemoryLoader, SourceLoader};
pub use ir::{Node, Program};
pub use render::{Bindings, RenderError, Renderer};
pub use template::{Template, TemplateError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum nesting depth for INCLUDE, BLOCK and REPLACE tags.
pub const RECURSION_LIMIT: usize = 10;
