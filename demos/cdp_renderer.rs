//! Rasterize an inline SVG background with headless Chrome.
//! Run with: cargo run --example cdp_renderer --features cdp

use svg_fallback::cdp::{CdpOptions, CdpRenderer};
use svg_fallback::{FallbackConfig, SvgFallback};

const CSS: &str = ".dot {
	background-image: url(\"data:image/svg+xml;charset=utf8,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 10 10'%3E%3Ccircle cx='5' cy='5' r='4' fill='teal'/%3E%3C/svg%3E\");
	background-size: 32px;
}";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Launching headless Chrome...");
    let renderer = CdpRenderer::launch(CdpOptions::default()).await?;

    let config = FallbackConfig { dest: "target/demo-out".into(), ..Default::default() };
    let transform = SvgFallback::new(config, renderer.clone())?;
    let processed = transform.process_css(CSS).await?;
    println!("{}\n", processed.css);
    println!("PNG written under target/demo-out");

    renderer.close().await?;
    Ok(())
}
