use anyhow::Context;
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use svg_fallback::{Diagnostics, FallbackConfig, Renderer, Stylesheet, SvgFallback};

/// Add PNG fallback rules for SVG backgrounds and render the PNGs
#[derive(Parser, Debug)]
#[command(name = "svg-fallback", version, about)]
struct Cli {
    /// Input stylesheet (`-` for stdin)
    input: PathBuf,

    /// Where to write the rewritten stylesheet (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Marker selector for fallback rules
    #[arg(long)]
    fallback_selector: Option<String>,

    /// Directory SVG references are resolved against
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// Directory PNGs are written into
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Only rewrite the stylesheet, don't render anything
    #[arg(long)]
    disable_convert: bool,

    /// Rasterizer program
    #[arg(long)]
    renderer: Option<PathBuf>,

    /// Argument passed to the rasterizer before the job arguments (repeatable)
    #[arg(long = "renderer-arg", allow_hyphen_values = true)]
    renderer_args: Vec<String>,

    /// Render with headless Chrome instead of an external program
    #[cfg(feature = "cdp")]
    #[arg(long)]
    cdp: bool,
}

impl Cli {
    fn config(&self) -> anyhow::Result<FallbackConfig> {
        let mut config = match &self.config {
            Some(path) => FallbackConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => FallbackConfig::default(),
        };
        if let Some(s) = &self.fallback_selector {
            config.fallback_selector = s.clone();
        }
        if let Some(p) = &self.base_path {
            config.base_path = p.clone();
        }
        if let Some(p) = &self.dest {
            config.dest = p.clone();
        }
        if self.disable_convert {
            config.disable_convert = true;
        }
        if let Some(p) = &self.renderer {
            config.renderer.program = p.clone();
        }
        if !self.renderer_args.is_empty() {
            config.renderer.args = self.renderer_args.clone();
        }
        Ok(config)
    }

    fn read_input(&self) -> anyhow::Result<String> {
        if self.input.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
            Ok(buf)
        } else {
            std::fs::read_to_string(&self.input)
                .with_context(|| format!("failed to read {}", self.input.display()))
        }
    }
}

async fn run_with<R: Renderer>(cli: &Cli, config: FallbackConfig, renderer: R) -> anyhow::Result<()> {
    let transform = SvgFallback::new(config, renderer)?;
    let mut sheet = Stylesheet::parse(&cli.read_input()?)
        .with_context(|| format!("failed to parse {}", cli.input.display()))?;

    let mut diagnostics = Diagnostics::new();
    let result = transform.process(&mut sheet, &mut diagnostics).await;
    for warning in diagnostics.warnings() {
        eprintln!("{}: warning: {}", cli.input.display(), warning);
    }
    result.context("image conversion failed")?;

    let mut css = sheet.to_string();
    css.push('\n');
    match &cli.output {
        Some(path) => std::fs::write(path, css)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout().write_all(css.as_bytes())?,
    }
    Ok(())
}

#[cfg(feature = "cdp")]
async fn run_cdp(cli: &Cli, config: FallbackConfig) -> anyhow::Result<()> {
    use svg_fallback::cdp::{CdpOptions, CdpRenderer};
    let renderer = CdpRenderer::launch(CdpOptions::default())
        .await
        .context("failed to launch headless Chrome")?;
    let result = run_with(cli, config, renderer.clone()).await;
    renderer.close().await?;
    result
}

#[cfg(not(feature = "cdp"))]
async fn run_cdp(_cli: &Cli, _config: FallbackConfig) -> anyhow::Result<()> {
    anyhow::bail!("svg-fallback was built without the `cdp` feature")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = cli.config()?;

    #[cfg(feature = "cdp")]
    let use_cdp = cli.cdp;
    #[cfg(not(feature = "cdp"))]
    let use_cdp = false;

    if use_cdp {
        return run_cdp(&cli, config).await;
    }
    let renderer = svg_fallback::CommandRenderer::from_config(&config.renderer);
    run_with(&cli, config, renderer).await
}
