//! Criterion benchmarks for Sitepipe critical paths
//!
//! Benchmarks the per-file transformations a build runs:
//! - Sass: compile with nesting and imports-free variables
//! - PostCss: prefixing and minification with and without source maps
//! - HTML and JS minification
//! - SVG cleanup and sprite assembly

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sitepipe::build::FileRecord;
use sitepipe::transforms::{CompileSass, MinifyHtml, MinifyJs, OnError, OptimizeSvg, PostCss, Step, SvgStore};

// =============================================================================
// Test Data Generators
// =============================================================================

/// Generate an SCSS file with n nested blocks
fn make_scss(n: usize) -> String {
    let mut scss = String::from("$accent: #336699;\n$gap: 8px;\n");
    for i in 0..n {
        scss.push_str(&format!(
            ".block-{i} {{\n  padding: $gap;\n  .title {{ color: darken($accent, {}%); user-select: none; }}\n  &:hover {{ opacity: 0.9; }}\n}}\n",
            i % 20
        ));
    }
    scss
}

/// Generate an HTML page with n list items
fn make_html(n: usize) -> String {
    let items: String = (0..n).map(|i| format!("      <li class=\"item\">  Item   {}  </li>\n", i)).collect();
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Bench</title>\n  </head>\n  <body>\n    <!-- list -->\n    <ul>\n{}    </ul>\n  </body>\n</html>\n",
        items
    )
}

/// Generate a script with n functions
fn make_js(n: usize) -> String {
    (0..n)
        .map(|i| format!("// handler {i}\nfunction handler{i}(event) {{\n  var target = event.target;\n  return target.value + {i};\n}}\n"))
        .collect()
}

/// Generate an SVG with n paths and editor noise
fn make_svg(n: usize) -> String {
    let paths: String = (0..n).map(|i| format!("<path inkscape:label=\"p{i}\" d=\"M{i} 0h10v10H{i}z\"/>")).collect();
    format!(
        r#"<?xml version="1.0"?><!-- editor --><svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 100 100"><metadata>x</metadata>{}</svg>"#,
        paths
    )
}

fn record(name: &str, contents: &str) -> FileRecord {
    FileRecord::new("/bench", name, contents)
}

// =============================================================================
// Stylesheet Benchmarks
// =============================================================================

fn bench_styles(c: &mut Criterion) {
    let mut group = c.benchmark_group("styles");

    for blocks in [10, 100, 500] {
        let scss = make_scss(blocks);
        group.throughput(Throughput::Bytes(scss.len() as u64));

        group.bench_with_input(BenchmarkId::new("sass", blocks), &scss, |b, scss| {
            let step = CompileSass::new();
            b.iter(|| step.apply(record("style.scss", black_box(scss))))
        });

        let css = CompileSass::new().apply(record("style.scss", &scss)).unwrap().unwrap();
        for maps in [false, true] {
            let label = if maps { "postcss_maps" } else { "postcss" };
            group.bench_with_input(BenchmarkId::new(label, blocks), &css, |b, css| {
                let step = PostCss::new().with_source_maps(maps);
                b.iter(|| step.apply(black_box(css.clone())))
            });
        }
    }

    group.finish();
}

// =============================================================================
// Markup and Script Benchmarks
// =============================================================================

fn bench_html(c: &mut Criterion) {
    let mut group = c.benchmark_group("html");
    let step = MinifyHtml::new();

    for items in [10, 100, 1000] {
        let html = make_html(items);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("minify", items), &html, |b, html| {
            b.iter(|| step.apply(record("index.html", black_box(html))))
        });
    }

    group.finish();
}

fn bench_js(c: &mut Criterion) {
    let mut group = c.benchmark_group("js");
    let step = MinifyJs::new();

    for functions in [10, 100, 1000] {
        let js = make_js(functions);
        group.throughput(Throughput::Bytes(js.len() as u64));
        group.bench_with_input(BenchmarkId::new("minify", functions), &js, |b, js| {
            b.iter(|| step.apply(record("script.js", black_box(js))))
        });
    }

    group.finish();
}

// =============================================================================
// SVG Benchmarks
// =============================================================================

fn bench_svg(c: &mut Criterion) {
    let mut group = c.benchmark_group("svg");

    for paths in [10, 100, 1000] {
        let svg = make_svg(paths);
        group.throughput(Throughput::Bytes(svg.len() as u64));
        group.bench_with_input(BenchmarkId::new("optimize", paths), &svg, |b, svg| {
            let step = OptimizeSvg::new();
            b.iter(|| step.apply(record("icon.svg", black_box(svg))))
        });
    }

    for icons in [10, 50, 200] {
        let records: Vec<FileRecord> =
            (0..icons).map(|i| record(&format!("icons/icon-{i}.svg"), &make_svg(5))).collect();
        group.bench_with_input(BenchmarkId::new("store", icons), &records, |b, records| {
            let step = SvgStore::new();
            b.iter(|| step.apply_all(black_box(records.clone()), OnError::Fail))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_styles, bench_html, bench_js, bench_svg);
criterion_main!(benches);
