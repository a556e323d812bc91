//! Conversion pipeline: drains the task list one task at a time.
//!
//! Each task is checked against the files on disk before anything is
//! rendered. Rasters in the destination directory double as the cache: a
//! raster newer than its SVG (or, for inline SVGs, any existing raster with
//! the same content hash) is left alone.

use crate::extract::ImageSource;
use crate::renderer::{RenderJob, RenderSource, Renderer};
use crate::task::{ConversionTask, Diagnostics};
use crate::{FallbackConfig, Result};
use log::{debug, info};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Outcome of the staleness check for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Destination missing or older than the source
    Render,
    /// Destination is current
    UpToDate,
    /// File-based source does not exist
    MissingSource,
}

async fn stat(path: &Path) -> Result<Option<Metadata>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Decide whether `dest` must be (re)rendered from `source`.
///
/// Inline sources have no timestamp, so they render only when `dest` is
/// missing.
pub async fn freshness(source: &RenderSource, dest: &Path) -> Result<Freshness> {
    match source {
        RenderSource::File(path) => {
            let Some(src_meta) = stat(path).await? else {
                return Ok(Freshness::MissingSource);
            };
            let Some(dest_meta) = stat(dest).await? else {
                return Ok(Freshness::Render);
            };
            if src_meta.modified()? > dest_meta.modified()? {
                Ok(Freshness::Render)
            } else {
                Ok(Freshness::UpToDate)
            }
        }
        RenderSource::Inline(_) => match stat(dest).await? {
            None => Ok(Freshness::Render),
            Some(_) => Ok(Freshness::UpToDate),
        },
    }
}

/// Resolve `reference` against `base`, relative to the working directory
/// when `base` is relative.
pub fn resolve(base: &Path, reference: &str) -> Result<PathBuf> {
    let base = if base.is_absolute() {
        base.to_path_buf()
    } else {
        std::env::current_dir()?.join(base)
    };
    Ok(base.join(reference))
}

pub struct ConversionPipeline<'a, R: Renderer + ?Sized> {
    config: &'a FallbackConfig,
    renderer: &'a R,
}

impl<'a, R: Renderer + ?Sized> ConversionPipeline<'a, R> {
    pub fn new(config: &'a FallbackConfig, renderer: &'a R) -> Self {
        Self { config, renderer }
    }

    /// Run every task in order, at most one render in flight.
    ///
    /// Missing sources become warnings in `diagnostics`; the first renderer
    /// failure stops the pipeline and is returned.
    pub async fn run(&self, tasks: &[ConversionTask], diagnostics: &mut Diagnostics) -> Result<()> {
        if self.config.disable_convert {
            debug!("conversion disabled, skipping {} task(s)", tasks.len());
            return Ok(());
        }
        for task in tasks {
            self.run_task(task, diagnostics).await?;
        }
        Ok(())
    }

    async fn run_task(&self, task: &ConversionTask, diagnostics: &mut Diagnostics) -> Result<()> {
        let dest = resolve(&self.config.dest, &task.image_name)?;
        let source = match &task.descriptor.source {
            ImageSource::File(path) => RenderSource::File(resolve(&self.config.base_path, path)?),
            ImageSource::Inline(markup) => RenderSource::Inline(markup.clone()),
        };

        match freshness(&source, &dest).await? {
            Freshness::MissingSource => {
                if let RenderSource::File(path) = &source {
                    diagnostics.warn(
                        task,
                        format!(
                            "could not find `{}` at `{}`",
                            task.descriptor.source.reference(),
                            path.display()
                        ),
                    );
                }
                Ok(())
            }
            Freshness::UpToDate => {
                debug!("{} is up to date", dest.display());
                Ok(())
            }
            Freshness::Render => {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                info!(
                    "rendering {} at {}x{}",
                    dest.display(),
                    task.descriptor.size.width,
                    task.descriptor.size.height
                );
                let job = RenderJob {
                    source,
                    width: task.descriptor.size.width,
                    height: task.descriptor.size.height,
                    dest,
                };
                self.renderer.render(&job).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, mtime: SystemTime) {
        std::fs::write(path, b"x").unwrap();
        let f = std::fs::File::options().write(true).open(path).unwrap();
        f.set_modified(mtime).unwrap();
    }

    #[tokio::test]
    async fn missing_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = RenderSource::File(dir.path().join("nope.svg"));
        assert_eq!(freshness(&src, &dir.path().join("nope.png")).await.unwrap(), Freshness::MissingSource);
    }

    #[tokio::test]
    async fn missing_destination_renders() {
        let dir = tempfile::tempdir().unwrap();
        let svg = dir.path().join("a.svg");
        touch(&svg, SystemTime::now());
        let src = RenderSource::File(svg);
        assert_eq!(freshness(&src, &dir.path().join("a.png")).await.unwrap(), Freshness::Render);
    }

    #[tokio::test]
    async fn newer_source_renders_older_source_skips() {
        let dir = tempfile::tempdir().unwrap();
        let svg = dir.path().join("a.svg");
        let png = dir.path().join("a.png");
        let now = SystemTime::now();

        touch(&svg, now);
        touch(&png, now - Duration::from_secs(60));
        let src = RenderSource::File(svg.clone());
        assert_eq!(freshness(&src, &png).await.unwrap(), Freshness::Render);

        touch(&png, now + Duration::from_secs(60));
        assert_eq!(freshness(&src, &png).await.unwrap(), Freshness::UpToDate);

        // equal timestamps are not "strictly newer"
        touch(&png, now);
        assert_eq!(freshness(&src, &png).await.unwrap(), Freshness::UpToDate);
    }

    #[tokio::test]
    async fn inline_renders_only_when_destination_missing() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("hash-20x20.png");
        let src = RenderSource::Inline("<svg/>".into());
        assert_eq!(freshness(&src, &png).await.unwrap(), Freshness::Render);
        touch(&png, SystemTime::now());
        assert_eq!(freshness(&src, &png).await.unwrap(), Freshness::UpToDate);
    }

    #[test]
    fn resolve_keeps_absolute_bases() {
        let base = std::env::temp_dir();
        assert_eq!(resolve(&base, "images/a.svg").unwrap(), base.join("images/a.svg"));
        let rel = resolve(Path::new("test"), "a.svg").unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("test/a.svg"));
    }
}
