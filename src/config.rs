//! Evaluation limits.

use std::env;

use tracing::warn;

/// Limits applied to every evaluation in an environment tree.
///
/// The default depth leaves room for lambda-heavy evaluation on a 2 MB
/// thread stack in unoptimized builds. Raise it only on threads with a
/// larger stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of `eval` calls before an evaluation error is raised
    pub max_depth: usize,
    /// Maximum head substitutions applied to a single tagged form
    pub max_rewrites: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: 128,
            max_rewrites: 64,
        }
    }
}

impl EvalConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_rewrites(mut self, max_rewrites: usize) -> Self {
        self.max_rewrites = max_rewrites;
        self
    }

    /// Defaults overridden by `MCCARTHY_MAX_DEPTH` and `MCCARTHY_MAX_REWRITES`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EvalConfig::default();
        EvalConfig {
            max_depth: read_var(&var, "MCCARTHY_MAX_DEPTH").unwrap_or(defaults.max_depth),
            max_rewrites: read_var(&var, "MCCARTHY_MAX_REWRITES")
                .unwrap_or(defaults.max_rewrites),
        }
    }
}

fn read_var<F>(var: &F, name: &str) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable limit");
            None
        }
    }
}
