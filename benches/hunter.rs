use std::fs;
use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};

use depscan::registry::InMemoryHashRegistry;
use depscan::toolrunner::ToolRunner;
use depscan::{HunterOptions, HunterSession};

struct NoopToolRunner;
impl ToolRunner for NoopToolRunner {
    fn run(&self, _argv: &[String], _stdin: Option<&[u8]>) -> depscan::Result<String> {
        Ok(String::new())
    }
}

fn hash_all(dir: &Path, registry: &mut InMemoryHashRegistry) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_file() {
            let contents = fs::read(&path).unwrap();
            let hash = format!("{:x}", contents.len()) + &path.file_name().unwrap().to_string_lossy();
            registry.insert(path.canonicalize().unwrap(), hash);
        }
    }
}

fn bench_closure_chain_of_ten(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        let next = if i + 1 < 10 { format!("#include \"h{}.h\"\n", i + 1) } else { String::new() };
        fs::write(dir.path().join(format!("h{}.h", i)), format!("#ifndef H{0}\n#define H{0}\n{1}#endif\n", i, next))
            .unwrap();
    }

    let mut registry = InMemoryHashRegistry::new();
    hash_all(dir.path(), &mut registry);
    let runner = NoopToolRunner;
    let entry = dir.path().join("h0.h").canonicalize().unwrap();

    c.bench_function("hunter::closure (10-header chain)", |b| {
        b.iter(|| {
            let mut session = HunterSession::new(HunterOptions::default());
            session.hunt(dir.path(), &registry, &runner, &entry).unwrap();
        })
    });
}

criterion_group!(benches, bench_closure_chain_of_ten);
criterion_main!(benches);
