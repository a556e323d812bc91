//! Rewrite a stylesheet and rasterize its SVG backgrounds with an external program.
//! Run with: cargo run --example command_renderer -- <renderer> [renderer args..]

use svg_fallback::{new_transform, FallbackConfig, RendererConfig};

const CSS: &str = ".icon {
	background: url(images/email.svg) no-repeat;
	background-size: 20px 20px;
}";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let program = args.next().unwrap_or_else(|| "phantomjs".to_string());

    let config = FallbackConfig {
        base_path: "demos/assets".into(),
        dest: "target/demo-out".into(),
        renderer: RendererConfig { program: program.into(), args: args.collect() },
        ..Default::default()
    };
    println!("Rendering into {} with {}", config.dest.display(), config.renderer.program.display());

    let transform = new_transform(config)?;
    let processed = transform.process_css(CSS).await?;
    for warning in &processed.warnings {
        println!("warning: {}", warning);
    }
    println!("{}", processed.css);
    Ok(())
}
