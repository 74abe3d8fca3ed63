//! Benchmarks for lexstore write and query paths

use criterion::{criterion_group, criterion_main, Criterion};
use std::fmt::Write as _;

/// Synthetic dictionary source with `count` entries
fn synthetic_source(count: usize) -> String {
    let mut xml = String::from("<body>");
    for i in 0..count {
        write!(
            xml,
            r#"<entry xml:id="{id}"><w><form type="k_ele"><orth>word{id}</orth></form><sense><quote>meaning {id} of many</quote></sense></w></entry>"#,
            id = i + 1
        )
        .unwrap();
    }
    xml.push_str("</body>");
    xml
}

fn store_benchmarks(c: &mut Criterion) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let src = temp_dir.path().join("source.xml");
    let dst = temp_dir.path().join("store.lex");
    std::fs::write(&src, synthetic_source(500)).unwrap();

    let paths = vec!["/w/form/orth".to_string()];

    c.bench_function("write_500_entries", |b| {
        b.iter(|| lexstore::write(&src, &dst, &paths, 64000).unwrap())
    });

    lexstore::write(&src, &dst, &paths, 64000).unwrap();
    let reader = lexstore::Reader::open(&dst).unwrap();

    c.bench_function("find_prefix", |b| {
        b.iter(|| reader.find("word4%", 0, 0, 0, None, 0).unwrap())
    });

    c.bench_function("get_entry", |b| {
        b.iter(|| reader.get(250).unwrap().unwrap())
    });
}

criterion_group!(benches, store_benchmarks);
criterion_main!(benches);
