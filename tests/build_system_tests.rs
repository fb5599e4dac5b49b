//! Build System Test Suite
//!
//! Integration tests for the sitepipe task pipelines.
//! Tests cover:
//!
//! - Full production build over a realistic source tree
//! - Idempotence and stale output removal
//! - Recoverable style errors
//! - Sprite generation
//! - Watch rule dispatch
//! - Output claim conflicts

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use image::{Rgba, RgbaImage};
use sitepipe::build::{BuildContext, BuildResult, Clean, OutputClaim, Pipeline, SourceSet, Task, TaskStatus};
use sitepipe::config::default_config;
use sitepipe::server::{ReloadEvent, ReloadHandle};
use sitepipe::tasks::TaskCatalog;
use sitepipe::watch::{ErrorTracker, Watcher};

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a test build context with a temporary project.
fn create_test_context() -> (TempDir, BuildContext) {
    let temp = TempDir::new().unwrap();
    let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
    fs::create_dir_all(ctx.src_dir()).unwrap();
    (temp, ctx)
}

/// Create a test file with content.
fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

/// Write a small PNG.
fn create_test_png(dir: &Path, name: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let image = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 200, 255]));
    image.save(&path).unwrap();
}

const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <link rel="stylesheet" href="css/style.min.css">
  </head>
  <body>
    <!-- navigation -->
    <p>
      Hello    world
    </p>
    <script src="js/script.js"></script>
  </body>
</html>
"#;

const ICON_A: &str = r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><path d="M0 0h16v16H0z"/></svg>"#;
const ICON_B: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><circle cx="12" cy="12" r="10"/></svg>"#;

/// Populate the source tree the default tasks expect.
fn create_site(src: &Path) {
    create_test_file(src, "sass/style.scss", "@import \"blocks/header\";\n$gap: 4px;\nbody { margin: $gap; }\n");
    create_test_file(src, "sass/blocks/_header.scss", ".header { .title { user-select: none; } }\n");
    create_test_file(src, "index.html", PAGE);
    create_test_file(src, "about.html", PAGE);
    create_test_file(src, "js/script.js", "// menu\nfunction toggle() {\n  document.body.classList.toggle('open');\n}\n");
    create_test_png(src, "img/photo.png");
    create_test_file(
        src,
        "img/logo.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><title>Logo</title><rect width="10" height="10"/></svg>"#,
    );
    create_test_file(src, "img/icons/a.svg", ICON_A);
    create_test_file(src, "img/icons/b.svg", ICON_B);
    create_test_file(src, "fonts/body.woff2", "wOF2");
    create_test_file(src, "favicon.ico", "ico");
}

async fn run_build(ctx: &BuildContext) -> BuildResult {
    let catalog = TaskCatalog::new(ctx, ReloadHandle::new());
    catalog.build().unwrap().execute(ctx).await
}

/// Digest every file under a directory, keyed by relative path.
fn digest_tree(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut digests = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let digest = Sha256::digest(fs::read(&path).unwrap());
                let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();
                digests.insert(path.strip_prefix(root).unwrap().to_path_buf(), hex);
            }
        }
    }
    digests
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(path).unwrap()
}

// ============================================================================
// Full Build Tests
// ============================================================================

#[tokio::test]
async fn test_build_produces_output_contract() {
    let (_temp, ctx) = create_test_context();
    create_site(&ctx.src_dir());

    let result = run_build(&ctx).await;
    assert!(result.is_success(), "{}", result.summary());
    assert!(result.all_warnings().is_empty());

    let out = ctx.out_dir();

    let css = read(out.join("css/style.min.css"));
    assert!(css.contains(".header .title{"));
    assert!(css.contains("-webkit-user-select:none") || css.contains("user-select:none"));
    assert!(css.ends_with("/*# sourceMappingURL=style.min.css.map */"));
    let map: serde_json::Value = serde_json::from_str(&read(out.join("css/style.min.css.map"))).unwrap();
    assert_eq!(map["version"], 3);

    let html = read(out.join("index.html"));
    assert!(html.len() < PAGE.len());
    assert!(html.contains("Hello world"));
    assert!(!html.contains("navigation"));
    assert!(out.join("about.html").is_file());

    let js = read(out.join("js/script.js"));
    assert!(!js.contains("// menu"));
    assert!(js.contains("toggle"));

    assert!(image::open(out.join("img/photo.png")).is_ok());
    let webp = fs::read(out.join("img/photo.webp")).unwrap();
    assert_eq!(&webp[8..12], b"WEBP");
    assert!(!out.join("img/logo.webp").exists());

    let logo = read(out.join("img/logo.svg"));
    assert!(!logo.contains("<title>"));

    assert!(out.join("fonts/body.woff2").is_file());
    assert!(out.join("favicon.ico").is_file());
}

#[tokio::test]
async fn test_build_sprite_has_one_symbol_per_icon() {
    let (_temp, ctx) = create_test_context();
    create_site(&ctx.src_dir());

    let result = run_build(&ctx).await;
    assert!(result.is_success(), "{}", result.summary());

    let out = ctx.out_dir();
    let sprite = read(out.join("img/sprite.svg"));
    assert!(sprite.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\">"));
    assert!(!sprite.contains("<?xml"));
    assert_eq!(sprite.matches("<symbol").count(), 2);
    assert!(sprite.contains(r#"<symbol id="a" viewBox="0 0 16 16">"#));
    assert!(sprite.contains(r#"<symbol id="b" viewBox="0 0 24 24">"#));

    assert!(!out.join("img/a.svg").exists());
    assert!(!out.join("img/b.svg").exists());
    assert!(!out.join("img/icons.svg").exists());
}

#[tokio::test]
async fn test_build_is_idempotent() {
    let (_temp, ctx) = create_test_context();
    create_site(&ctx.src_dir());

    assert!(run_build(&ctx).await.is_success());
    let first = digest_tree(&ctx.out_dir());
    assert!(run_build(&ctx).await.is_success());
    let second = digest_tree(&ctx.out_dir());

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_build_removes_stale_outputs() {
    let (_temp, ctx) = create_test_context();
    create_site(&ctx.src_dir());
    create_test_file(&ctx.out_dir(), "old/stale.txt", "stale");
    create_test_file(&ctx.out_dir(), "removed.html", "<p>gone</p>");

    assert!(run_build(&ctx).await.is_success());
    assert!(!ctx.out_dir().join("old").exists());
    assert!(!ctx.out_dir().join("removed.html").exists());
}

#[tokio::test]
async fn test_build_empty_source_tree_succeeds() {
    let (_temp, ctx) = create_test_context();

    let result = run_build(&ctx).await;
    assert!(result.is_success(), "{}", result.summary());
    assert!(result.all_outputs().is_empty());
}

#[tokio::test]
async fn test_clean_missing_output_succeeds() {
    let (_temp, ctx) = create_test_context();
    assert!(!ctx.out_dir().exists());

    let result = Pipeline::job(Clean).execute(&ctx).await;
    assert!(result.is_success());
}

// ============================================================================
// Error Policy Tests
// ============================================================================

#[tokio::test]
async fn test_broken_style_partial_is_skipped() {
    let (_temp, ctx) = create_test_context();
    let src = ctx.src_dir();
    create_site(&src);
    create_test_file(&src, "sass/style.scss", "@import \"broken\";\nbody { margin: 0; }\n");
    create_test_file(&src, "sass/_broken.scss", ".a { color: red;\n");

    let result = run_build(&ctx).await;
    assert!(result.is_success(), "{}", result.summary());

    let styles = result.get("styles").unwrap();
    assert_eq!(styles.status, TaskStatus::Success);
    assert_eq!(styles.warnings.len(), 1);
    assert!(!ctx.out_dir().join("css/style.min.css").exists());

    for name in ["html", "scripts", "svg", "sprite", "webp"] {
        assert!(result.get(name).unwrap().is_success(), "{} did not complete", name);
    }
    assert!(ctx.out_dir().join("img/sprite.svg").is_file());
}

#[tokio::test]
async fn test_broken_script_fails_build() {
    let (_temp, ctx) = create_test_context();
    let src = ctx.src_dir();
    create_site(&src);
    fs::write(src.join("js/script.js"), [0xff, 0xfe, 0xfd]).unwrap();

    let result = run_build(&ctx).await;
    assert!(!result.is_success());
    assert!(result.get("scripts").unwrap().status.is_failure());
    // Parallel siblings still finish
    assert!(result.get("html").unwrap().is_success());
    assert!(ctx.out_dir().join("index.html").is_file());
}

// ============================================================================
// Watch Tests
// ============================================================================

#[tokio::test]
async fn test_html_change_runs_html_then_reload_only() {
    let (_temp, ctx) = create_test_context();
    create_site(&ctx.src_dir());

    let handle = ReloadHandle::new();
    let mut events = handle.subscribe();
    let catalog = TaskCatalog::new(&ctx, handle);
    let watcher = Watcher::new(catalog.watch_rules().unwrap());
    let mut tracker = ErrorTracker::new();

    let runs = watcher.dispatch(&ctx, &[PathBuf::from("index.html")], &mut tracker).await;

    assert_eq!(runs.len(), 1);
    let (pattern, result) = &runs[0];
    assert_eq!(pattern, "*.html");
    let names: Vec<_> = result.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["html", "reload"]);

    assert!(ctx.out_dir().join("index.html").is_file());
    assert!(!ctx.out_dir().join("css").exists());
    assert!(!ctx.out_dir().join("js").exists());
    assert_eq!(events.try_recv().unwrap(), ReloadEvent::Reload);
}

#[tokio::test]
async fn test_style_change_injects_css_and_recovers() {
    let (_temp, ctx) = create_test_context();
    let src = ctx.src_dir();
    create_site(&src);

    let handle = ReloadHandle::new();
    let mut events = handle.subscribe();
    let watcher = Watcher::new(TaskCatalog::new(&ctx, handle).watch_rules().unwrap());
    let mut tracker = ErrorTracker::new();
    let changed = [PathBuf::from("sass/blocks/_header.scss")];

    create_test_file(&src, "sass/blocks/_header.scss", ".header { color: red;\n");
    let runs = watcher.dispatch(&ctx, &changed, &mut tracker).await;
    assert_eq!(runs.len(), 1);
    assert!(runs[0].1.is_success());
    assert!(tracker.has_errors());
    assert!(events.try_recv().is_err());

    create_test_file(&src, "sass/blocks/_header.scss", ".header { color: red; }\n");
    watcher.dispatch(&ctx, &changed, &mut tracker).await;
    assert!(!tracker.has_errors());
    assert_eq!(events.try_recv().unwrap(), ReloadEvent::Css("css/style.min.css".to_string()));
    assert!(ctx.out_dir().join("css/style.min.css").is_file());
}

#[tokio::test]
async fn test_unrelated_change_runs_nothing() {
    let (_temp, ctx) = create_test_context();
    let watcher = Watcher::new(TaskCatalog::new(&ctx, ReloadHandle::new()).watch_rules().unwrap());
    let runs = watcher.dispatch(&ctx, &[PathBuf::from("js/vendor.js")], &mut ErrorTracker::new()).await;
    assert!(runs.is_empty());
}

// ============================================================================
// Output Claim Tests
// ============================================================================

#[test]
fn test_parallel_overlapping_tasks_rejected() {
    let images = Task::new("images", SourceSet::new(["img/**/*.png"]), "img");
    let thumbs = Task::new("thumbs", SourceSet::new(["thumbs/*.png"]), "img/thumbs");

    let err = Pipeline::parallel([Pipeline::job(images), Pipeline::job(thumbs)]).unwrap_err();
    assert_eq!(err.first, "images");
    assert_eq!(err.second, "thumbs");
}

#[test]
fn test_parallel_disjoint_tasks_accepted() {
    let svg = Task::new("svg", SourceSet::new(["img/*.svg"]), "img")
        .claim(OutputClaim::extensions("img", ["svg"]).except("sprite.svg"));
    let sprite =
        Task::new("sprite", SourceSet::new(["img/icons/*.svg"]), "img").claim(OutputClaim::file("img", "sprite.svg"));
    let webp = Task::new("webp", SourceSet::new(["img/*.png"]), "img").claim(OutputClaim::extensions("img", ["webp"]));

    assert!(Pipeline::parallel([Pipeline::job(svg), Pipeline::job(sprite), Pipeline::job(webp)]).is_ok());
}
