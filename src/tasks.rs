//! The named tasks and the `build` / `start` pipelines.
//!
//! Paths are relative to the configured source and output roots:
//!
//! | Task | Sources | Output |
//! |---|---|---|
//! | `styles` | `sass/style.scss` | `css/style.min.css` (+ map) |
//! | `html` | `*.html` | `*.html` |
//! | `scripts` | `js/*.js` | `js/*.js` |
//! | `optimize-images`, `copy-images` | `img/**/*.{jpg,png,svg}` | `img/**` |
//! | `webp` | `img/*.{jpg,png,svg}` | `img/*.webp` |
//! | `svg` | `img/*.svg` except icons and the sprite | `img/*.svg` |
//! | `sprite` | `img/icons/*.svg` | `img/sprite.svg` |
//! | `copy` | `fonts/**/*.{woff2,woff}`, `*.ico` | same paths |

use crate::build::{BuildContext, ClaimConflict, Clean, DiscoveryError, Job, OutputClaim, Pipeline, SourceSet, Task};
use crate::server::{Reload, ReloadHandle, Serve};
use crate::transforms::{
    CompileSass, MinifyHtml, MinifyJs, OnError, OptimizeImages, OptimizeSvg, PostCss, Rename, SvgStore, WebpEncode,
};
use crate::watch::{WatchRule, Watcher};
use std::sync::Arc;
use thiserror::Error;

const IMAGES: &str = "img/**/*.{jpg,png,svg}";

/// A pipeline could not be assembled.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Parallel members with overlapping outputs
    #[error(transparent)]
    Conflict(#[from] ClaimConflict),
    /// Invalid watch pattern
    #[error(transparent)]
    Pattern(#[from] DiscoveryError),
}

/// Every named job, built once from the configuration.
pub struct TaskCatalog {
    clean: Arc<dyn Job>,
    copy: Arc<dyn Job>,
    optimize_images: Arc<dyn Job>,
    copy_images: Arc<dyn Job>,
    styles: Arc<dyn Job>,
    html: Arc<dyn Job>,
    scripts: Arc<dyn Job>,
    svg: Arc<dyn Job>,
    sprite: Arc<dyn Job>,
    webp: Arc<dyn Job>,
    reload: Arc<dyn Job>,
    server: Arc<dyn Job>,
}

impl TaskCatalog {
    /// Define the tasks for a project.
    ///
    /// `reload` reaches the dev server's browsers; it is handed to `styles`
    /// (stylesheet injection), `reload` and `server`.
    pub fn new(ctx: &BuildContext, reload: ReloadHandle) -> Self {
        let config = ctx.config();
        let source_maps = config.styles.source_maps;

        let styles = Task::new("styles", SourceSet::new(["sass/style.scss"]), "css")
            .step(CompileSass::new())
            .step(PostCss::new().with_source_maps(source_maps))
            .step(Rename::to("style.min.css"))
            .on_error(OnError::Skip)
            .write_source_maps(source_maps)
            .claim(OutputClaim::tree("css"))
            .notify(reload.clone());

        let html = Task::new("html", SourceSet::new(["*.html"]), ".")
            .step(MinifyHtml::new())
            .claim(OutputClaim::extensions("", ["html"]));

        let scripts = Task::new("scripts", SourceSet::new(["js/*.js"]), "js").step(MinifyJs::new());

        let optimize_images = Task::new("optimize-images", SourceSet::new([IMAGES]), "img")
            .step(OptimizeImages::new(config.images.jpeg_quality));

        let copy_images = Task::new("copy-images", SourceSet::new([IMAGES]), "img");

        let webp = Task::new("webp", SourceSet::new(["img/*.{jpg,png,svg}"]), "img")
            .step(WebpEncode::new(config.images.webp_quality))
            .claim(OutputClaim::extensions("img", ["webp"]));

        let svg = Task::new("svg", SourceSet::new(["img/*.svg", "!img/icons/*.svg", "!img/sprite.svg"]), "img")
            .step(OptimizeSvg::new())
            .claim(OutputClaim::extensions("img", ["svg"]).except("sprite.svg"));

        let sprite = Task::new("sprite", SourceSet::new(["img/icons/*.svg"]), "img")
            .step(OptimizeSvg::new())
            .step(SvgStore::new())
            .step(Rename::to("sprite.svg"))
            .claim(OutputClaim::file("img", "sprite.svg"));

        let copy = Task::new("copy", SourceSet::new(["fonts/**/*.{woff2,woff}", "*.ico"]).with_base("."), ".")
            .claim(OutputClaim::tree("fonts"))
            .claim(OutputClaim::extensions("", ["ico"]));

        Self {
            clean: Arc::new(Clean),
            copy: Arc::new(copy),
            optimize_images: Arc::new(optimize_images),
            copy_images: Arc::new(copy_images),
            styles: Arc::new(styles),
            html: Arc::new(html),
            scripts: Arc::new(scripts),
            svg: Arc::new(svg),
            sprite: Arc::new(sprite),
            webp: Arc::new(webp),
            reload: Arc::new(Reload::new(reload.clone())),
            server: Arc::new(Serve::new(reload)),
        }
    }

    fn jobs(&self) -> [&Arc<dyn Job>; 12] {
        [
            &self.clean,
            &self.copy,
            &self.optimize_images,
            &self.copy_images,
            &self.styles,
            &self.html,
            &self.scripts,
            &self.svg,
            &self.sprite,
            &self.webp,
            &self.reload,
            &self.server,
        ]
    }

    /// Names of every job that can be run on its own.
    pub fn names(&self) -> Vec<&str> {
        self.jobs().into_iter().map(|job| job.name()).chain(std::iter::once("watcher")).collect()
    }

    /// A single named job as a pipeline.
    pub fn get(&self, name: &str) -> Option<Pipeline> {
        if name == "watcher" {
            return self.watcher().ok();
        }
        self.jobs().into_iter().find(|job| job.name() == name).map(|job| Pipeline::Job(Arc::clone(job)))
    }

    /// The asset tasks that run side by side after the copy steps.
    fn assets(&self) -> Result<Pipeline, ClaimConflict> {
        Pipeline::parallel(
            [&self.styles, &self.html, &self.scripts, &self.svg, &self.sprite, &self.webp]
                .map(|job| Pipeline::Job(Arc::clone(job))),
        )
    }

    /// One-shot production build.
    pub fn build(&self) -> Result<Pipeline, PipelineError> {
        Ok(Pipeline::series([
            Pipeline::Job(Arc::clone(&self.clean)),
            Pipeline::Job(Arc::clone(&self.copy)),
            Pipeline::Job(Arc::clone(&self.optimize_images)),
            self.assets()?,
        ]))
    }

    /// Build, then serve and watch.
    pub fn start(&self) -> Result<Pipeline, PipelineError> {
        let serve_and_watch = Pipeline::series([Pipeline::Job(Arc::clone(&self.server)), self.watcher()?]);
        Ok(Pipeline::series([
            Pipeline::Job(Arc::clone(&self.clean)),
            Pipeline::Job(Arc::clone(&self.copy)),
            Pipeline::Job(Arc::clone(&self.copy_images)),
            self.assets()?,
            serve_and_watch,
        ]))
    }

    /// The rules the watcher dispatches.
    pub fn watch_rules(&self) -> Result<Vec<WatchRule>, DiscoveryError> {
        let html_then_reload =
            Pipeline::series([Pipeline::Job(Arc::clone(&self.html)), Pipeline::Job(Arc::clone(&self.reload))]);
        Ok(vec![
            WatchRule::new("sass/**/*.scss", Pipeline::Job(Arc::clone(&self.styles)))?,
            WatchRule::new("js/script.js", Pipeline::Job(Arc::clone(&self.scripts)))?,
            WatchRule::new("*.html", html_then_reload)?,
        ])
    }

    fn watcher(&self) -> Result<Pipeline, DiscoveryError> {
        Ok(Pipeline::job(Watcher::new(self.watch_rules()?)))
    }
}
