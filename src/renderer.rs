//! Renderer seam: turns one SVG into a PNG of a given size.
//!
//! The pipeline only ever talks to the [`Renderer`] trait. [`CommandRenderer`]
//! runs an external program once per image, which is how headless-browser
//! rasterizers are usually driven; the `cdp` feature adds a renderer that keeps
//! one headless Chrome alive for the whole build.

use crate::{Error, RendererConfig, Result};
use async_trait::async_trait;
use base64::Engine as Base64Engine;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

/// What to rasterize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    /// Absolute path of an SVG file
    File(PathBuf),
    /// SVG markup taken from a data URL
    Inline(String),
}

impl RenderSource {
    /// `data:` URL carrying inline markup, base64-encoded so it survives a
    /// command line intact.
    pub fn data_url(markup: &str) -> String {
        format!(
            "data:image/svg+xml;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(markup)
        )
    }

    fn as_arg(&self) -> OsString {
        match self {
            RenderSource::File(path) => path.clone().into_os_string(),
            RenderSource::Inline(markup) => Self::data_url(markup).into(),
        }
    }
}

/// A single rasterization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub source: RenderSource,
    pub width: u32,
    pub height: u32,
    pub dest: PathBuf,
}

/// Writes a `width`×`height` PNG of `job.source` to `job.dest`.
///
/// Errors are fatal to the build; the `Error::Render` text is shown to the user
/// as-is.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<()>;
}

#[async_trait]
impl<R: Renderer + ?Sized> Renderer for Box<R> {
    async fn render(&self, job: &RenderJob) -> Result<()> {
        (**self).render(job).await
    }
}

/// Runs `program [args..] <source> <width> <height> <dest>` for every job.
///
/// The run counts as failed when the program exits non-zero or prints
/// anything on stdout or stderr.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    /// Arguments placed before the job arguments, e.g. a rasterizer script
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(config.program.clone()).with_args(config.args.iter().cloned())
    }

    fn command(&self, job: &RenderJob) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .arg(job.source.as_arg())
            .arg(job.width.to_string())
            .arg(job.height.to_string())
            .arg(&job.dest)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

/// Interpret a finished renderer process. Stdout is checked before stderr.
pub(crate) fn check_output(success: bool, status: &str, stdout: &[u8], stderr: &[u8]) -> Result<()> {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let (stdout, stderr) = (stdout.trim(), stderr.trim());

    if !success {
        let detail = [stdout, stderr].into_iter().find(|s| !s.is_empty());
        return Err(Error::Render(match detail {
            Some(text) => text.to_string(),
            None => format!("renderer exited with {}", status),
        }));
    }
    if !stdout.is_empty() {
        return Err(Error::Render(stdout.to_string()));
    }
    if !stderr.is_empty() {
        return Err(Error::Render(stderr.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, job: &RenderJob) -> Result<()> {
        log::debug!(
            "running {} for {} ({}x{})",
            self.program.display(),
            job.dest.display(),
            job.width,
            job.height
        );
        let output = self.command(job).output().await.map_err(|e| {
            Error::Render(format!("Failed to run renderer `{}`: {}", self.program.display(), e))
        })?;
        check_output(
            output.status.success(),
            &output.status.to_string(),
            &output.stdout,
            &output.stderr,
        )
    }
}
