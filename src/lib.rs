//! SVG background fallbacks for stylesheets
//!
//! Rewrites a stylesheet so that every rule with an SVG background and an
//! explicit pixel `background-size` gets a sibling rule, gated by a marker
//! selector, that points at a PNG rendering of the same image. The PNGs are
//! produced by an external renderer, one at a time, and only when missing or
//! older than their SVG.
//!
//! # Features
//!
//! - **Command renderer** (default): runs an external rasterizer program per image
//! - **CDP renderer** (`cdp` feature): renders with a long-lived headless Chrome
//! - **Plan-only builds**: `disable_convert` rewrites CSS without touching disk
//!
//! # Example
//!
//! ```no_run
//! use svg_fallback::{FallbackConfig, SvgFallback};
//! use svg_fallback::renderer::CommandRenderer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FallbackConfig {
//!     base_path: "assets".into(),
//!     dest: "public".into(),
//!     ..Default::default()
//! };
//! let renderer = CommandRenderer::from_config(&config.renderer);
//! let transform = SvgFallback::new(config, renderer)?;
//!
//! let out = transform
//!     .process_css(".icon { background: url(images/email.svg); background-size: 20px; }")
//!     .await?;
//! println!("{}", out.css);
//! for w in &out.warnings {
//!     eprintln!("warning: {}", w);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod extract;
pub mod pipeline;
pub mod renderer;
pub mod stylesheet;
pub mod synth;
pub mod task;
pub mod transform;

// Headless Chrome renderer
#[cfg(feature = "cdp")]
pub mod cdp;

pub use renderer::{CommandRenderer, RenderJob, RenderSource, Renderer};
pub use stylesheet::Stylesheet;
pub use task::{ConversionTask, Diagnostics, Warning};
pub use transform::{ProcessedCss, SvgFallback};

/// Name attached to every warning this crate emits
pub const PLUGIN_NAME: &str = "svg-fallback";

/// Configuration for the transform
///
/// Field names follow the camelCase option names when (de)serialized, so a
/// JSON config file looks like:
///
/// ```json
/// { "fallbackSelector": ".no-svg", "basePath": "assets", "dest": "public" }
/// ```
///
/// # Examples
///
/// ```
/// let cfg = svg_fallback::FallbackConfig::default();
/// assert_eq!(cfg.fallback_selector, ".no-svg");
/// assert!(!cfg.disable_convert);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Marker selector prefixed to every fallback rule
    pub fallback_selector: String,
    /// Directory file references are resolved against
    pub base_path: PathBuf,
    /// Directory rasters are written into
    pub dest: PathBuf,
    /// Rewrite CSS only; never stat, write or render
    pub disable_convert: bool,
    /// External renderer used by `CommandRenderer`
    pub renderer: RendererConfig,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            fallback_selector: ".no-svg".to_string(),
            base_path: PathBuf::new(),
            dest: PathBuf::new(),
            disable_convert: false,
            renderer: RendererConfig::default(),
        }
    }
}

impl FallbackConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_selector.trim().is_empty() {
            return Err(Error::Config("fallbackSelector must not be empty".into()));
        }
        if self.renderer.program.as_os_str().is_empty() {
            return Err(Error::Config("renderer program must not be empty".into()));
        }
        Ok(())
    }
}

/// External rasterizer invocation: `program [args..] <source> <width> <height> <dest>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub program: PathBuf,
    /// Leading arguments, typically the rasterizer script
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { program: PathBuf::from("phantomjs"), args: Vec::new() }
    }
}

/// Create a transform using the command renderer described by `config`
pub fn new_transform(config: FallbackConfig) -> Result<SvgFallback<CommandRenderer>> {
    let renderer = CommandRenderer::from_config(&config.renderer);
    SvgFallback::new(config, renderer)
}
