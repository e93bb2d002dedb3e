//! The macro environment (`spec.md` §3.2) and its deterministic fingerprint
//! (§4.3.4), used both as the variant-cache key and for diagnostics /
//! artifact naming.

use hashbrown::HashMap;
use std::fmt;

/// A macro name or value. Both are byte strings in the source project
/// (compiletools keeps them as `stringzilla.Str` for cheap hashing); here a
/// plain owned `String` is precise enough since the grammar this engine
/// accepts (identifiers, decimal/hex/octal/binary literals, C operators) is
/// ASCII, and `String`'s `Hash`/`Eq` already give us content identity.
pub type MacroName = String;
pub type MacroValue = String;

/// A snapshot of `#define`d names to their values. Undefined is absence
/// from the map; an empty value (`#define FOO`) is legal and distinct from
/// absence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MacroEnv(HashMap<MacroName, MacroValue>);

impl MacroEnv {
    pub fn new() -> Self {
        MacroEnv(HashMap::new())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn define<N: Into<MacroName>, V: Into<MacroValue>>(&mut self, name: N, value: V) {
        self.0.insert(name.into(), value.into());
    }

    pub fn undef(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if none of `keys` names a macro this environment defines —
    /// the invariance test of §4.3.1, reused directly for §3.1's
    /// `conditional_macros` check.
    pub fn disjoint_from<'a, I: IntoIterator<Item = &'a str>>(&self, keys: I) -> bool {
        keys.into_iter().all(|k| !self.0.contains_key(k))
    }
}

impl Extend<(MacroName, MacroValue)> for MacroEnv {
    fn extend<T: IntoIterator<Item = (MacroName, MacroValue)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<(MacroName, MacroValue)> for MacroEnv {
    fn from_iter<T: IntoIterator<Item = (MacroName, MacroValue)>>(iter: T) -> Self {
        let mut env = MacroEnv::new();
        env.extend(iter);
        env
    }
}

/// A frozen, hashable, order-independent view of a `MacroEnv`, used as the
/// variant-cache key (§3.4). Two environments with the same entries in any
/// insertion order produce equal `FrozenMacros`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrozenMacros(Vec<(MacroName, MacroValue)>);

impl FrozenMacros {
    pub fn freeze(env: &MacroEnv) -> Self {
        let mut pairs: Vec<(MacroName, MacroValue)> =
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        pairs.sort();
        FrozenMacros(pairs)
    }
}

impl fmt::Display for FrozenMacros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fingerprint_pairs(&self.0))
    }
}

/// The 16-hex-character deterministic fingerprint of §4.3.4 / §6.6: the
/// hash of a macro environment's `(name, value)` pairs in sorted order.
/// Empty environments get a fixed fingerprint (the hash of the empty byte
/// string), matching `simple_preprocessor.compute_macro_hash`'s behavior
/// for an empty dict.
pub fn macro_fingerprint(env: &MacroEnv) -> String {
    let mut pairs: Vec<(&str, &str)> = env.iter().collect();
    pairs.sort();
    fingerprint_pairs_str(&pairs)
}

fn fingerprint_pairs(pairs: &[(MacroName, MacroValue)]) -> String {
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    fingerprint_pairs_str(&borrowed)
}

fn fingerprint_pairs_str(pairs: &[(&str, &str)]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    // A content-addressed 16-hex digest. `DefaultHasher` is not specified to
    // be stable across Rust versions, which would be disqualifying for a
    // persisted on-disk cache key; this engine's caches are process-local
    // (spec.md §5), so that instability is invisible. A persisted cache
    // would need a fixed-algorithm hasher (e.g. `sha2`) instead.
    let mut hasher = DefaultHasher::new();
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("|");
    joined.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
