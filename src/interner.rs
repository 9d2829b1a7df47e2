use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

// Names are process-wide; registries that map them to definitions are not.
static INTERNER: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

/// A symbol name interned in the process-wide string table.
///
/// Two symbols with the same spelling are the same symbol, so comparison and
/// hashing never touch the string data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    /// Intern a name and return its symbol
    pub fn new(name: &str) -> Self {
        let mut interner = INTERNER.write().unwrap_or_else(PoisonError::into_inner);
        Symbol(interner.get_or_intern(name))
    }

    /// Resolve the symbol back to an owned name
    pub fn resolve(&self) -> String {
        self.with_str(str::to_string)
    }

    /// Run a function against the interned name without allocating
    pub fn with_str<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = INTERNER.read().unwrap_or_else(PoisonError::into_inner);
        // Symbols only come from `Symbol::new`, which interned them.
        f(interner.resolve(self.0).unwrap_or_default())
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}
