#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use unitable::schema::AttributeDeclaration;
use unitable::{compile, Config, DeclarationSource, EntityDeclaration};

/// Star-shaped design: `owners` roots, each with `children` dependents that
/// belong to it and carry a unique attribute.
fn star(owners: usize, children: usize) -> DeclarationSource {
    let mut decls = Vec::with_capacity(owners * (children + 1));
    for o in 0..owners {
        let owner = format!("Owner{o}");
        let mut root = EntityDeclaration::new(owner.as_str());
        for c in 0..children {
            let child = format!("Child{o}x{c}");
            root = root.has_many(child.as_str());
            decls.push(
                EntityDeclaration::new(child)
                    .belongs_to(owner.as_str())
                    .attribute(AttributeDeclaration::new("slug").unique()),
            );
        }
        decls.push(root);
    }
    DeclarationSource::Inline(decls)
}

fn compile_designs(c: &mut Criterion) {
    let mut group = c.benchmark_group("design/compile");
    group.sample_size(40);
    let config = Config {
        max_index_count: 20,
        ..Config::default()
    };
    for (owners, children) in [(4, 4), (16, 8), (64, 4)] {
        let source = star(owners, children);
        group.throughput(Throughput::Elements((owners * (children + 1)) as u64));
        group.bench_with_input(
            BenchmarkId::new("star", format!("{owners}x{children}")),
            &source,
            |b, source| {
                b.iter(|| black_box(compile(source, &config)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, compile_designs);
criterion_main!(benches);
