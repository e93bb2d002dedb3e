//! The six concrete end-to-end scenarios this engine is specified against,
//! built from real temp-file trees through the public `HunterSession` API.
//! Continues `tests/preprocess.rs`'s style of building a small file tree
//! with `tempfile::tempdir()` and asserting on the result.

use std::fs;
use std::path::{Path, PathBuf};

use depscan::registry::InMemoryHashRegistry;
use depscan::toolrunner::ToolRunner;
use depscan::{HunterOptions, HunterSession};

struct FakeToolRunner {
    pkg_config: Vec<(String, String, String)>, // (package, cflags, libs)
}

impl ToolRunner for FakeToolRunner {
    fn run(&self, argv: &[String], _stdin: Option<&[u8]>) -> depscan::Result<String> {
        if argv.first().map(String::as_str) == Some("pkg-config") {
            let package = argv.last().cloned().unwrap_or_default();
            let wants_cflags = argv.iter().any(|a| a == "--cflags");
            if let Some((_, cflags, libs)) = self.pkg_config.iter().find(|(p, _, _)| *p == package) {
                return Ok(if wants_cflags { cflags.clone() } else { libs.clone() });
            }
        }
        Ok(String::new())
    }
}

fn hash_all(root: &Path, registry: &mut InMemoryHashRegistry) {
    for entry in walk(root) {
        let contents = fs::read(&entry).unwrap();
        let hash = format!("{:x}:{}", contents.len(), entry.file_name().unwrap().to_string_lossy());
        registry.insert(entry.canonicalize().unwrap(), hash);
    }
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

#[test]
fn scenario_1_include_guard_chain_discovered_transitively() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.cpp"), "#include \"b.hpp\"\n").unwrap();
    fs::write(
        dir.path().join("b.hpp"),
        "#ifndef B_HPP\n#define B_HPP\n#include \"c.hpp\"\n#endif\n#define USE_HASH 1\n",
    )
    .unwrap();
    fs::write(dir.path().join("c.hpp"), "#ifdef USE_HASH\n#include \"d.hpp\"\n#endif\n//#PKG-CONFIG=zlib\n").unwrap();
    fs::write(dir.path().join("d.hpp"), "int x;\n").unwrap();

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);

    let options = HunterOptions::default();
    let runner = FakeToolRunner {
        pkg_config: vec![("zlib".to_string(), "-I/usr/include/zlib".to_string(), "-lz".to_string())],
    };
    let mut session = HunterSession::new(options);
    let entry = dir.path().join("a.cpp").canonicalize().unwrap();
    let closure = session.hunt(dir.path(), &registry, &runner, &entry).unwrap();

    let names: Vec<_> = closure
        .header_dependencies
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["b.hpp", "c.hpp", "d.hpp"]);
    assert_eq!(closure.flags.get("LDFLAGS"), Some(&["-lz".to_string()][..]));
    assert_eq!(closure.flags.get("PKG-CONFIG"), Some(&["zlib".to_string()][..]));
}

#[test]
fn scenario_2_undef_takes_effect() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.cpp"), "#include \"outer.hpp\"\n").unwrap();
    fs::write(
        dir.path().join("outer.hpp"),
        "#include \"cleans.hpp\"\n#ifndef TEMP\n#include \"enabled.hpp\"\n#endif\n",
    )
    .unwrap();
    fs::write(dir.path().join("cleans.hpp"), "#include \"defs.hpp\"\n#undef TEMP\n").unwrap();
    fs::write(dir.path().join("defs.hpp"), "#define TEMP 1\n").unwrap();
    fs::write(dir.path().join("enabled.hpp"), "int y;\n").unwrap();

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);

    let options = HunterOptions::default();
    let runner = FakeToolRunner { pkg_config: vec![] };
    let mut session = HunterSession::new(options);
    let entry = dir.path().join("main.cpp").canonicalize().unwrap();
    let closure = session.hunt(dir.path(), &registry, &runner, &entry).unwrap();

    assert!(closure.header_dependencies.contains(&dir.path().join("enabled.hpp").canonicalize().unwrap()));
}

#[test]
fn scenario_3_macro_state_does_not_leak_across_translation_units() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("u1.cpp"), "#define FEATURE\n#include \"cond.hpp\"\n").unwrap();
    fs::write(dir.path().join("u2.cpp"), "#include \"cond.hpp\"\n").unwrap();
    fs::write(
        dir.path().join("cond.hpp"),
        "#ifdef FEATURE\n#include \"on.hpp\"\n#else\n#include \"off.hpp\"\n#endif\n",
    )
    .unwrap();
    fs::write(dir.path().join("on.hpp"), "int a;\n").unwrap();
    fs::write(dir.path().join("off.hpp"), "int b;\n").unwrap();

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);

    let run = |order: [&str; 2]| -> (Vec<PathBuf>, Vec<PathBuf>) {
        let options = HunterOptions::default();
        let runner = FakeToolRunner { pkg_config: vec![] };
        let mut session = HunterSession::new(options);
        let first = dir.path().join(order[0]).canonicalize().unwrap();
        let second = dir.path().join(order[1]).canonicalize().unwrap();
        let closure1 = session.hunt(dir.path(), &registry, &runner, &first).unwrap();
        let closure2 = session.hunt(dir.path(), &registry, &runner, &second).unwrap();
        (closure1.header_dependencies, closure2.header_dependencies)
    };

    let (u1_deps, u2_deps) = run(["u1.cpp", "u2.cpp"]);
    assert!(u1_deps.contains(&dir.path().join("on.hpp").canonicalize().unwrap()));
    assert!(!u1_deps.contains(&dir.path().join("off.hpp").canonicalize().unwrap()));
    assert!(u2_deps.contains(&dir.path().join("off.hpp").canonicalize().unwrap()));
    assert!(!u2_deps.contains(&dir.path().join("on.hpp").canonicalize().unwrap()));

    let (u2_deps_rev, u1_deps_rev) = run(["u2.cpp", "u1.cpp"]);
    assert_eq!(u1_deps, u1_deps_rev);
    assert_eq!(u2_deps, u2_deps_rev);
}

#[test]
fn scenario_4_invariance_cache_hits_across_environments() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("widget.hpp"), "#define WIDGET_VERSION 3\n#include <cstdint>\n").unwrap();

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);

    let mut options = HunterOptions::default();
    options.cppflags = vec!["-DX=1".to_string()];
    let runner = FakeToolRunner { pkg_config: vec![] };
    let mut session = HunterSession::new(options);
    let entry = dir.path().join("widget.hpp").canonicalize().unwrap();

    session.hunt(dir.path(), &registry, &runner, &entry).unwrap();
    session.hunt(dir.path(), &registry, &runner, &entry).unwrap();

    assert!(session.cache().invariant_stats().hits >= 1);
}

#[test]
fn scenario_5_pkg_config_rewrites_include_to_isystem() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.cpp"), "//#PKG-CONFIG=zlib\nint x;\n").unwrap();

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);

    let options = HunterOptions::default();
    let runner = FakeToolRunner {
        pkg_config: vec![("zlib".to_string(), "-I/opt/include -DFOO=1".to_string(), String::new())],
    };
    let mut session = HunterSession::new(options);
    let entry = dir.path().join("main.cpp").canonicalize().unwrap();
    let closure = session.hunt(dir.path(), &registry, &runner, &entry).unwrap();

    let cxxflags = closure.flags.get("CXXFLAGS").unwrap();
    assert!(cxxflags.contains(&"-isystem/opt/include".to_string()));
    assert!(!cxxflags.iter().any(|f| f == "-I/opt/include"));
    assert!(cxxflags.contains(&"-DFOO=1".to_string()));
}

#[test]
fn scenario_6_flag_deduplication_with_pairs() {
    let mut list = depscan::flags::FlagList::new();
    for v in ["-I", "a", "-Ia", "-I", "b", "-DX", "-DX"] {
        list.push(v);
    }
    assert_eq!(list.as_slice(), &["-I", "a", "-I", "b", "-DX"]);
}
