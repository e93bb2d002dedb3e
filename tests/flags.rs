//! Integration checks of pair-aware flag deduplication and the flag bag's
//! key ordering (`spec.md` §8.1, §8.3 Scenario 6).

use depscan::flags::{FlagBag, FlagList};

#[test]
fn dedup_separate_and_combined_include_forms() {
    let mut list = FlagList::new();
    for v in ["-I", "a", "-Ia", "-I", "b", "-DX", "-DX"] {
        list.push(v);
    }
    assert_eq!(list.as_slice(), &["-I", "a", "-I", "b", "-DX"]);
}

#[test]
fn isystem_is_a_separate_namespace_from_dash_i() {
    let mut list = FlagList::new();
    for v in ["-I", "/opt/include", "-isystem", "/opt/include"] {
        list.push(v);
    }
    assert_eq!(list.as_slice(), &["-I", "/opt/include", "-isystem", "/opt/include"]);
}

#[test]
fn flag_bag_preserves_first_seen_key_order() {
    let mut bag = FlagBag::new();
    bag.push("LDFLAGS", "-lz");
    bag.push("CPPFLAGS", "-DFOO");
    bag.push("LDFLAGS", "-lm");
    assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["LDFLAGS", "CPPFLAGS"]);
    assert_eq!(bag.get("LDFLAGS").unwrap(), &["-lz", "-lm"]);
}

#[test]
fn plain_flags_dedup_by_equality() {
    let mut list = FlagList::new();
    list.push("-fsomeoption");
    list.push("-fsomeoption");
    assert_eq!(list.as_slice(), &["-fsomeoption"]);
}
