//! Headless Chrome renderer (Chrome DevTools Protocol via `headless_chrome`)
//!
//! A dedicated worker thread owns the browser and a single tab. Render jobs
//! are sent over a channel and answered through oneshot replies, so the async
//! pipeline never blocks on the synchronous CDP client.

use crate::renderer::{RenderJob, RenderSource, Renderer};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Render(RenderJob, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Launch options for [`CdpRenderer`]
#[derive(Debug, Clone)]
pub struct CdpOptions {
    /// Browser window size; images larger than this are clipped
    pub window_size: (u32, u32),
    /// Path to a Chrome/Chromium binary, autodetected when `None`
    pub chrome_path: Option<std::path::PathBuf>,
}

impl Default for CdpOptions {
    fn default() -> Self {
        Self { window_size: (1024, 1024), chrome_path: None }
    }
}

/// Renderer backed by one long-lived headless Chrome instance
#[derive(Clone)]
pub struct CdpRenderer {
    cmd_tx: Sender<Command>,
}

impl CdpRenderer {
    /// Launch the browser on a worker thread and wait until it is ready.
    pub async fn launch(options: CdpOptions) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let (browser, tab) = match start_browser(&options) {
                Ok(pair) => pair,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Render(job, resp) => {
                        let _ = resp.send(render_with_tab(&tab, &job));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
            drop(tab);
            drop(browser);
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Browser init canceled: {}", e)))??;
        Ok(Self { cmd_tx })
    }

    /// Shut the browser down.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

fn start_browser(options: &CdpOptions) -> Result<(Browser, Arc<Tab>)> {
    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some(options.window_size))
        .path(options.chrome_path.clone())
        .build()
        .map_err(|e| Error::Render(format!("Failed to build launch options: {}", e)))?;

    let browser = Browser::new(launch_options)
        .map_err(|e| Error::Render(format!("Failed to launch browser: {}", e)))?;
    let tab = browser
        .new_tab()
        .map_err(|e| Error::Render(format!("Failed to create tab: {}", e)))?;
    Ok((browser, tab))
}

/// HTML page that draws the SVG at exactly the requested size in the top-left corner
fn wrapper_page(svg: &[u8], width: u32, height: u32) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;
    let img = format!("data:image/svg+xml;base64,{}", b64.encode(svg));
    let html = format!(
        "<!doctype html><html><body style=\"margin:0;background:transparent\">\
         <img src=\"{}\" width=\"{}\" height=\"{}\" style=\"display:block\"></body></html>",
        img, width, height
    );
    format!("data:text/html;base64,{}", b64.encode(html))
}

fn render_with_tab(tab: &Tab, job: &RenderJob) -> Result<()> {
    let svg = match &job.source {
        RenderSource::File(path) => std::fs::read(path)?,
        RenderSource::Inline(markup) => markup.clone().into_bytes(),
    };

    tab.navigate_to(&wrapper_page(&svg, job.width, job.height))
        .map_err(|e| Error::Render(format!("Navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| Error::Render(format!("Wait for navigation failed: {}", e)))?;

    let clip = Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: job.width as f64,
        height: job.height as f64,
        scale: 1.0,
    };
    let png = tab
        .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|e| Error::Render(format!("Screenshot failed: {}", e)))?;

    std::fs::write(&job.dest, png)?;
    Ok(())
}

#[async_trait]
impl Renderer for CdpRenderer {
    async fn render(&self, job: &RenderJob) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Render(job.clone(), tx))
            .map_err(|_| Error::Render("Browser worker has shut down".into()))?;
        rx.await
            .map_err(|e| Error::Render(format!("Render canceled: {}", e)))?
    }
}
