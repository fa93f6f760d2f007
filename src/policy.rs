//! Recursion Policy - Strict vs Lenient
//!
//! Each compilation carries its own policy; depth is passed down the
//! recursive call chain instead of living in shared counters.

use tracing::warn;

use crate::compiler::CompileError;
use crate::config::CompilerConfig;
use crate::grammar::TagKind;

/// Outcome of asking whether a tag at some nesting depth may be expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Enter,
    /// Limit reached in lenient mode. The caller degrades instead of failing.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub strict: bool,
    pub limit: usize,
}

impl Policy {
    pub fn new(strict: bool, limit: usize) -> Self {
        Self { strict, limit }
    }

    /// Tags at depth 0 are top-level. A tag at `depth >= limit` is refused.
    pub fn descend(&self, kind: TagKind, depth: usize) -> Result<Descend, CompileError> {
        if depth < self.limit {
            return Ok(Descend::Enter);
        }

        if self.strict {
            return Err(CompileError::RecursionLimitExceeded {
                kind,
                limit: self.limit,
            });
        }

        warn!(%kind, depth, limit = self.limit, "recursion limit reached, truncating");
        Ok(Descend::Truncate)
    }
}

impl From<&CompilerConfig> for Policy {
    fn from(config: &CompilerConfig) -> Self {
        Self::new(config.strict, config.recursion_limit)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from(&CompilerConfig::default())
    }
}
