//! Demo CLI: hunt one translation unit's dependency closure and print it.
//! Grounded on `armake2`'s `commands/preprocess.rs` for the `clap` 2.33
//! `App`/`Arg` wiring; unlike the library this binary owns a registry built
//! by walking the filesystem, since there is no git index to delegate to.

use std::path::{Path, PathBuf};

use clap::{App, Arg};

use depscan::registry::InMemoryHashRegistry;
use depscan::toolrunner::SubprocessToolRunner;
use depscan::{HunterOptions, HunterSession};

fn main() {
    env_logger::init();

    let matches = App::new("depscan")
        .version("0.1.0")
        .about("C/C++ dependency-closure scanner")
        .arg(Arg::with_name("entry").help("Translation unit to scan").required(true))
        .arg(
            Arg::with_name("include")
                .short("I")
                .long("include")
                .help("Project include directory (repeatable)")
                .multiple(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("system-include")
                .long("isystem")
                .help("System include directory, excluded from the closure (repeatable)")
                .multiple(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("define")
                .short("D")
                .help("Predefine NAME or NAME=VALUE (repeatable)")
                .multiple(true)
                .takes_value(true),
        )
        .arg(Arg::with_name("cc").long("cc").help("Compiler to query for predefined macros").takes_value(true))
        .arg(Arg::with_name("verbose").short("v").long("verbose").help("Increase warning verbosity").multiple(true))
        .arg(Arg::with_name("json").long("json").help("Print the closure as JSON instead of plain text"))
        .get_matches();

    let entry = PathBuf::from(matches.value_of("entry").unwrap());
    let mut options = HunterOptions::default();
    options.include_dirs = matches.values_of("include").map(|v| v.map(PathBuf::from).collect()).unwrap_or_default();
    options.system_include_dirs =
        matches.values_of("system-include").map(|v| v.map(PathBuf::from).collect()).unwrap_or_default();
    options.cppflags = matches.values_of("define").map(|v| v.map(|d| format!("-D{}", d)).collect()).unwrap_or_default();
    if let Some(cc) = matches.value_of("cc") {
        options.cc = cc.to_string();
    }
    options.verbose = matches.occurrences_of("verbose").min(9) as u8;

    let working_tree = entry.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let registry = match build_registry(&working_tree) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: failed to walk {}: {}", working_tree.display(), e);
            std::process::exit(1);
        }
    };

    let runner = SubprocessToolRunner;
    let mut session = HunterSession::new(options);

    let want_json = matches.is_present("json");
    let entry_canonical = entry.canonicalize().unwrap_or(entry);
    match session.hunt(&working_tree, &registry, &runner, &entry_canonical) {
        Ok(closure) => {
            let fingerprint = session.dependency_set_fingerprint(&registry, &closure).unwrap_or_default();

            if want_json {
                let payload = serde_json::json!({
                    "closure": closure,
                    "dependency_set_fingerprint": fingerprint,
                });
                println!("{}", serde_json::to_string_pretty(&payload).expect("closure serializes"));
            } else {
                println!("# header dependencies ({})", closure.header_dependencies.len());
                for path in &closure.header_dependencies {
                    println!("{}", path.display());
                }
                if !closure.required_source_files.is_empty() {
                    println!("\n# required source files ({})", closure.required_source_files.len());
                    for path in &closure.required_source_files {
                        println!("{}", path.display());
                    }
                }
                if !closure.flags.is_empty() {
                    println!("\n# flags");
                    for (key, values) in closure.flags.iter() {
                        println!("{}: {}", key, values.join(" "));
                    }
                }
                println!("\n# dependency-set fingerprint: {}", fingerprint);
            }
            session.print_warning_summary();
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Walk `root` recursively and register every regular file under a
/// process-local fingerprint. The production integration point is a real
/// [`ContentHashRegistry`] backed by a git index or build manifest; this
/// binary has neither, so it hashes file contents itself purely to have
/// something to hand the engine.
fn build_registry(root: &Path) -> std::io::Result<InMemoryHashRegistry> {
    let mut registry = InMemoryHashRegistry::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                let contents = std::fs::read(&path)?;
                let hash = content_fingerprint(&contents);
                registry.insert(path.canonicalize()?, hash);
            }
        }
    }
    Ok(registry)
}

fn content_fingerprint(bytes: &[u8]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
