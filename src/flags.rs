//! The flag bag (`spec.md` §3.5, §4.4.3) and its pair-aware deduplication
//! (§8.1 "Flag deduplication", §8.3 Scenario 6), grounded on
//! `compiletools.utils.deduplicate_compiler_flags`.

use linked_hash_map::LinkedHashMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Flags that take a following argument, in both the separate (`-I path`)
/// and combined (`-Ipath`) forms. `-isystem`/`-isystempath` is deliberately
/// tracked as its own namespace, independent of `-I`/`-Ipath` — see
/// DESIGN.md for the open question this resolves.
const FLAGS_WITH_ARGS: &[&str] = &["-I", "-isystem", "-L", "-l", "-D", "-U", "-F", "-framework"];

/// An ordered, deduplicated list of flag values for one `flag_key`
/// (`CPPFLAGS`, `CFLAGS`, ..., or a user-defined key). Preserves first-seen
/// order; a flag and its argument are deduplicated as a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagList(Vec<String>);

impl FlagList {
    pub fn new() -> Self {
        FlagList(Vec::new())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Append `value`, then re-run pair-aware dedup over the whole list.
    /// Appending one token at a time keeps the dedup bookkeeping (which
    /// flag-argument pairs have been seen) simple at the cost of being
    /// O(n) per append; flag lists are short (tens of entries) in practice.
    pub fn push(&mut self, value: impl Into<String>) {
        self.0.push(value.into());
        self.0 = dedup_flags(&self.0);
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, values: I) {
        self.0.extend(values);
        self.0 = dedup_flags(&self.0);
    }
}

/// Pair-aware deduplication: `-I a`, `-Ia`, `-I b`, `-DX`, `-DX` becomes
/// `-I a`, `-I b`, `-DX` (§8.3 Scenario 6). The canonical form kept for a
/// given argument is whichever form (`-I a` vs `-Ia`) was seen first.
fn dedup_flags(flags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(flags.len());
    let mut seen: LinkedHashMap<&'static str, hashbrown::HashSet<String>> = LinkedHashMap::new();
    let mut i = 0;

    while i < flags.len() {
        let flag = &flags[i];
        let matched = FLAGS_WITH_ARGS.iter().find(|prefix| {
            flag == **prefix || (flag.starts_with(**prefix) && flag.len() > prefix.len())
        });

        match matched {
            Some(&prefix) if flag == prefix && i + 1 < flags.len() => {
                let arg = flags[i + 1].clone();
                let bucket = seen.entry(prefix).or_insert_with(hashbrown::HashSet::new);
                if bucket.insert(arg.clone()) {
                    out.push(flag.clone());
                    out.push(arg);
                }
                i += 2;
            }
            Some(&prefix) if flag.starts_with(prefix) => {
                let arg = flag[prefix.len()..].to_string();
                let bucket = seen.entry(prefix).or_insert_with(hashbrown::HashSet::new);
                if bucket.insert(arg) {
                    out.push(flag.clone());
                }
                i += 1;
            }
            _ => {
                if !out.contains(flag) {
                    out.push(flag.clone());
                }
                i += 1;
            }
        }
    }

    out
}

impl Serialize for FlagList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for value in &self.0 {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// The per-translation-unit flag bag: `flag_key -> ordered deduplicated
/// values` (§3.5).
#[derive(Clone, Debug, Default)]
pub struct FlagBag(LinkedHashMap<String, FlagList>);

impl Serialize for FlagBag {
    // `linked-hash-map` doesn't carry a `serde` feature in this dependency
    // set, so the map is serialized by hand rather than derived.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, values) in &self.0 {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl FlagBag {
    pub fn new() -> Self {
        FlagBag(LinkedHashMap::new())
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(key.to_string())
            .or_insert_with(FlagList::new)
            .push(value);
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(FlagList::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

