use criterion::{criterion_group, criterion_main, Criterion};
use svg_fallback::{FallbackConfig, Stylesheet};

// Run with: cargo bench

fn large_stylesheet(rules: usize) -> String {
    let mut css = String::new();
    for i in 0..rules {
        match i % 3 {
            0 => css.push_str(&format!(
                ".icon-{i} {{ background: url(images/icon-{i}.svg) no-repeat; background-size: 24px 24px; }}\n"
            )),
            1 => css.push_str(&format!(
                ".inline-{i} {{ background-image: url(\"data:image/svg+xml;charset=utf8,%3Csvg id='{i}'%3E%3C/svg%3E\"); background-size: 16px; }}\n"
            )),
            _ => css.push_str(&format!(".plain-{i} {{ color: red; margin: {i}px; }}\n")),
        }
    }
    css
}

/// Bench: parse + rewrite (no conversion)
fn bench_rewrite(c: &mut Criterion) {
    let css = large_stylesheet(3000);
    let config = FallbackConfig { disable_convert: true, ..Default::default() };
    let transform = svg_fallback::new_transform(config).expect("valid config");

    c.bench_function("rewrite_3000_rules", |b| {
        b.iter(|| {
            let mut sheet = Stylesheet::parse(&css).unwrap();
            let tasks = transform.rewrite(&mut sheet);
            assert_eq!(tasks.len(), 2000);
        })
    });
}

/// Bench: print a rewritten sheet
fn bench_print(c: &mut Criterion) {
    let css = large_stylesheet(3000);
    let transform = svg_fallback::new_transform(FallbackConfig::default()).expect("valid config");
    let mut sheet = Stylesheet::parse(&css).unwrap();
    transform.rewrite(&mut sheet);

    c.bench_function("print_rewritten", |b| {
        b.iter(|| sheet.to_string().len())
    });
}

criterion_group!(benches, bench_rewrite, bench_print);
criterion_main!(benches);
