//! Declaration display names: the host lookup capability and its memoizing cache.

use crate::event::DeclId;
use std::collections::HashMap;
use std::fmt;

/// How much qualification a rendered declaration name carries (`verbose-decl`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Bare identifier.
    Name = 0,
    /// Identifier with enclosing scopes.
    #[default]
    Scoped = 1,
    /// Scoped identifier with its full signature.
    Full = 2,
}

impl Verbosity {
    /// Numeric level as understood by the host.
    #[inline]
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Verbosity {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, u8> {
        match level {
            0 => Ok(Self::Name),
            1 => Ok(Self::Scoped),
            2 => Ok(Self::Full),
            other => Err(other),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Host capability: render a declaration as a human-readable string.
///
/// Closures `Fn(DeclId, Verbosity) -> String` implement this directly.
pub trait DeclNames {
    /// Raw (unescaped) display name for `decl`.
    fn printable_name(&self, decl: DeclId, verbosity: Verbosity) -> String;
}

impl<F> DeclNames for F
where
    F: Fn(DeclId, Verbosity) -> String,
{
    fn printable_name(&self, decl: DeclId, verbosity: Verbosity) -> String {
        self(decl, verbosity)
    }
}

/// Lookup table of recorded names, one entry per verbosity level.
///
/// Used when replaying a recorded run; unknown decls render as `decl#<id>`.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    names: HashMap<DeclId, Vec<String>>,
}

impl NameTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register names for `decl`, indexed by verbosity level. Shorter lists
    /// fall back to their last entry for higher levels.
    pub fn insert(&mut self, decl: DeclId, by_level: Vec<String>) {
        self.names.insert(decl, by_level);
    }

    /// Number of known declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl DeclNames for NameTable {
    fn printable_name(&self, decl: DeclId, verbosity: Verbosity) -> String {
        self.names
            .get(&decl)
            .and_then(|levels| {
                levels
                    .get(usize::from(verbosity.level()))
                    .or_else(|| levels.last())
            })
            .cloned()
            .unwrap_or_else(|| decl.to_string())
    }
}

/// Escape `raw` for use inside a JSON string literal (without the quotes).
///
/// Every `"` becomes `\"`; backslashes and control characters are escaped too.
#[must_use]
pub fn escape_json(raw: &str) -> String {
    match serde_json::to_string(raw) {
        Ok(quoted) => quoted[1..quoted.len() - 1].to_owned(),
        Err(_) => raw.replace('\\', "\\\\").replace('"', "\\\""),
    }
}

/// Memoizing front for a [`DeclNames`] lookup, keyed by decl uid.
///
/// The host is asked at most once per uid; cached strings are already escaped.
/// Entries are never evicted.
pub struct DeclNameCache<N> {
    lookup: N,
    verbosity: Verbosity,
    cache: HashMap<u32, String>,
}

impl<N: DeclNames> DeclNameCache<N> {
    /// Wrap `lookup`, rendering names at `verbosity`.
    pub fn new(lookup: N, verbosity: Verbosity) -> Self {
        Self { lookup, verbosity, cache: HashMap::new() }
    }

    /// Escaped display name for `decl` (identified by `uid`).
    pub fn get(&mut self, decl: DeclId, uid: u32) -> &str {
        let Self { lookup, verbosity, cache } = self;
        cache
            .entry(uid)
            .or_insert_with(|| escape_json(&lookup.printable_name(decl, *verbosity)))
    }

    /// Number of cached names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been looked up yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
